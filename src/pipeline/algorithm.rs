//! The algorithm contract driven by the executive.
//!
//! An algorithm declares its ports through an [`AlgorithmBase`] and answers
//! requests through [`Algorithm::process_request`], which dispatches on the
//! closed [`RequestKind`] enum. Every handler except `request_data` has a
//! default, so concrete filters implement only the phases they care about.
//!
//! Handlers return `PipelineResult<()>`. An `Err` aborts the update that
//! issued the request; the executive wraps it with the algorithm's class
//! name and the request kind.

use crate::data::DataObject;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::information::{input_data, Information};
use crate::pipeline::port::{InputPortInfo, OutputPortInfo, OutputType, PortLayout};
use crate::pipeline::request::{Request, RequestKind};
use crate::pipeline::time::ModifiedTime;
use std::any::Any;
use std::sync::Arc;

/// Downcasting support for trait objects held by the pipeline.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// State every algorithm carries: its port layout and modification time.
#[derive(Debug, Clone)]
pub struct AlgorithmBase {
    ports: PortLayout,
    mtime: ModifiedTime,
}

impl AlgorithmBase {
    pub fn new(ports: PortLayout) -> Self {
        Self {
            ports,
            mtime: ModifiedTime::new(),
        }
    }

    pub fn ports(&self) -> &PortLayout {
        &self.ports
    }

    pub fn set_number_of_input_ports(&mut self, n: usize) {
        self.ports.set_number_of_inputs(n);
        self.modified();
    }

    pub fn set_number_of_output_ports(&mut self, n: usize) {
        self.ports.set_number_of_outputs(n);
        self.modified();
    }

    /// Mark a parameter change; the next update re-executes.
    pub fn modified(&mut self) {
        self.mtime.modified();
    }

    pub fn mtime(&self) -> u64 {
        self.mtime.get()
    }
}

pub trait Algorithm: AsAny + Send {
    /// Concrete class name used in logs and error messages.
    fn class_name(&self) -> &str;

    fn base(&self) -> &AlgorithmBase;

    fn base_mut(&mut self) -> &mut AlgorithmBase;

    fn mtime(&self) -> u64 {
        self.base().mtime()
    }

    fn fill_input_port_information(&self, port: usize) -> Option<InputPortInfo> {
        self.base().ports().inputs.get(port).cloned()
    }

    fn fill_output_port_information(&self, port: usize) -> Option<OutputPortInfo> {
        self.base().ports().outputs.get(port).cloned()
    }

    fn process_request(
        &mut self,
        request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        match request.kind {
            RequestKind::DataObject => self.request_data_object(request, inputs, outputs),
            RequestKind::Information => self.request_information(request, inputs, outputs),
            RequestKind::UpdateExtent => self.request_update_extent(request, inputs, outputs),
            RequestKind::UpdateTime => self.request_update_time(request, inputs, outputs),
            RequestKind::TimeDependentInformation => {
                self.request_time_dependent_information(request, inputs, outputs)
            }
            RequestKind::Data => self.request_data(request, inputs, outputs),
        }
    }

    /// Make sure each output holds a data object of the declared type.
    fn request_data_object(
        &mut self,
        _request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        let ports = self.base().ports().clone();
        default_request_data_object(self.class_name(), &ports, inputs, outputs)
    }

    /// Publish whole extent and time metadata on the outputs.
    fn request_information(
        &mut self,
        _request: &mut Request,
        _inputs: &mut [Vec<Information>],
        _outputs: &mut [Information],
    ) -> PipelineResult<()> {
        Ok(())
    }

    /// Adjust what each input is asked for, given the outputs' requests.
    fn request_update_extent(
        &mut self,
        _request: &mut Request,
        _inputs: &mut [Vec<Information>],
        _outputs: &mut [Information],
    ) -> PipelineResult<()> {
        Ok(())
    }

    fn request_update_time(
        &mut self,
        _request: &mut Request,
        _inputs: &mut [Vec<Information>],
        _outputs: &mut [Information],
    ) -> PipelineResult<()> {
        Ok(())
    }

    fn request_time_dependent_information(
        &mut self,
        _request: &mut Request,
        _inputs: &mut [Vec<Information>],
        _outputs: &mut [Information],
    ) -> PipelineResult<()> {
        Ok(())
    }

    /// Produce the output data.
    fn request_data(
        &mut self,
        request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()>;
}

/// Allocate or replace output data objects according to the port layout.
///
/// An existing object is kept when its concrete type already matches, so
/// downstream handles stay valid across re-executions.
pub fn default_request_data_object(
    class_name: &str,
    ports: &PortLayout,
    inputs: &[Vec<Information>],
    outputs: &mut [Information],
) -> PipelineResult<()> {
    for (port, (info, out)) in ports.outputs.iter().zip(outputs.iter_mut()).enumerate() {
        let wanted = match info.data_type {
            OutputType::Fixed(data_type) => data_type,
            OutputType::SameAsInput(input) => input_data(inputs, input)
                .map(DataObject::data_type)
                .ok_or_else(|| PipelineError::MissingDataObject {
                    algorithm: class_name.to_string(),
                    port: input,
                })?,
        };

        let current = out.data_object().map(DataObject::data_type);
        if current.is_some_and(|t| t.is_a(wanted)) {
            continue;
        }
        if !wanted.is_concrete() {
            return Err(PipelineError::AbstractDataType(wanted));
        }
        let data = DataObject::new(wanted).ok_or(PipelineError::AbstractDataType(wanted))?;
        tracing::trace!("{} output {}: new {}", class_name, port, wanted);
        out.data_object = Some(Arc::new(data));
    }
    Ok(())
}
