//! Translation of protocol requests into reader calls.

use crate::data::DataType;
use crate::pipeline::time::resolve_time_index;
use crate::pipeline::{
    Information, PipelineError, PipelineResult, PortLayout, Request, RequestKind,
};
use crate::reader::ReaderAlgorithm;
use std::sync::Arc;

/// Wraps a reader so the pipeline can drive it like any other node.
pub struct ReaderExecutive {
    reader: Box<dyn ReaderAlgorithm>,
    ports: PortLayout,
}

impl ReaderExecutive {
    pub fn new(reader: Box<dyn ReaderAlgorithm>) -> Self {
        Self {
            reader,
            // The concrete output type comes from `create_output`.
            ports: PortLayout::source(DataType::DataObject),
        }
    }

    pub fn reader(&self) -> &dyn ReaderAlgorithm {
        self.reader.as_ref()
    }

    pub fn reader_mut(&mut self) -> &mut dyn ReaderAlgorithm {
        self.reader.as_mut()
    }

    pub fn ports(&self) -> &PortLayout {
        &self.ports
    }

    pub fn process_request(
        &mut self,
        request: &mut Request,
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        let class_name = self.reader.class_name().to_string();
        let info = outputs.get_mut(0).ok_or_else(|| PipelineError::MissingDataObject {
            algorithm: class_name.clone(),
            port: 0,
        })?;

        match request.kind {
            RequestKind::DataObject => {
                let current = info.data_object.clone();
                let created = self.reader.create_output(current.clone())?;
                let same = current.is_some_and(|c| Arc::ptr_eq(&c, &created));
                if !same {
                    info.data_object = Some(created);
                }
                Ok(())
            }
            RequestKind::Information => self.reader.read_meta_data(info),
            RequestKind::TimeDependentInformation => {
                let index = time_index(info);
                self.reader.read_time_dependent_meta_data(index, info)
            }
            RequestKind::Data => {
                let pieces = info.piece_request();
                let index = time_index(info);
                let step = info
                    .time_steps
                    .as_ref()
                    .and_then(|steps| steps.get(index))
                    .copied();
                let output = info.data_object_mut().ok_or(PipelineError::MissingDataObject {
                    algorithm: class_name,
                    port: 0,
                })?;

                let (piece, n, ghost) = (pieces.piece, pieces.number_of_pieces, pieces.ghost_levels);
                self.reader.read_mesh(piece, n, ghost, index, output)?;
                self.reader.read_points(piece, n, ghost, index, output)?;
                self.reader.read_arrays(piece, n, ghost, index, output)?;

                if step.is_some() {
                    output.info.time_step = step;
                }
                Ok(())
            }
            RequestKind::UpdateExtent | RequestKind::UpdateTime => Ok(()),
        }
    }
}

fn time_index(info: &Information) -> usize {
    let steps = info.time_steps.as_deref().unwrap_or(&[]);
    resolve_time_index(steps, info.update_time_step)
}
