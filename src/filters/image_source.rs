//! ImageSource: structured source sampling a function on a grid.
//!
//! Announces its whole extent and `can_produce_sub_extent`, then fills exactly
//! the update extent it is handed, so the executive can stream it piece by piece.

use crate::data::{DataType, Extent};
use crate::pipeline::time::resolve_time_index;
use crate::pipeline::{
    Algorithm, AlgorithmBase, Information, PipelineError, PipelineResult, PortLayout, Request,
};

/// Value at grid index `(i, j, k)` for time `t` (0 without time steps).
pub type ScalarFunction = Box<dyn Fn(i32, i32, i32, f64) -> f64 + Send>;

pub struct ImageSource {
    base: AlgorithmBase,
    whole_extent: Extent,
    origin: [f64; 3],
    spacing: [f64; 3],
    time_steps: Vec<f64>,
    array_name: String,
    function: ScalarFunction,
    executions: usize,
}

impl ImageSource {
    pub fn new(dimensions: [usize; 3]) -> Self {
        Self {
            base: AlgorithmBase::new(PortLayout::source(DataType::ImageData)),
            whole_extent: Extent::from_dimensions(dimensions),
            origin: [0.0; 3],
            spacing: [1.0; 3],
            time_steps: Vec::new(),
            array_name: "scalars".to_string(),
            function: Box::new(|i, j, k, _| (i + j + k) as f64),
            executions: 0,
        }
    }

    pub fn with_function(mut self, f: impl Fn(i32, i32, i32, f64) -> f64 + Send + 'static) -> Self {
        self.function = Box::new(f);
        self.base.modified();
        self
    }

    pub fn with_time_steps(mut self, steps: Vec<f64>) -> Self {
        self.set_time_steps(steps);
        self
    }

    pub fn set_whole_extent(&mut self, extent: Extent) {
        if self.whole_extent != extent {
            self.whole_extent = extent;
            self.base.modified();
        }
    }

    pub fn whole_extent(&self) -> Extent {
        self.whole_extent
    }

    pub fn set_spacing(&mut self, spacing: [f64; 3]) {
        if self.spacing != spacing {
            self.spacing = spacing;
            self.base.modified();
        }
    }

    pub fn set_time_steps(&mut self, steps: Vec<f64>) {
        self.time_steps = steps;
        self.base.modified();
    }

    pub fn array_name(&self) -> &str {
        &self.array_name
    }

    /// Number of `REQUEST_DATA` passes run so far.
    pub fn executions(&self) -> usize {
        self.executions
    }
}

impl Algorithm for ImageSource {
    fn class_name(&self) -> &str {
        "ImageSource"
    }

    fn base(&self) -> &AlgorithmBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AlgorithmBase {
        &mut self.base
    }

    fn request_information(
        &mut self,
        _request: &mut Request,
        _inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        for out in outputs.iter_mut() {
            out.whole_extent = Some(self.whole_extent);
            out.can_produce_sub_extent = true;
            if !self.time_steps.is_empty() {
                out.set_time_steps(self.time_steps.clone());
            }
        }
        Ok(())
    }

    fn request_data(
        &mut self,
        request: &mut Request,
        _inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        self.executions += 1;
        let missing = || PipelineError::MissingDataObject {
            algorithm: "ImageSource".to_string(),
            port: 0,
        };
        let info = outputs.get_mut(0).ok_or_else(missing)?;

        let extent = info
            .update_extent
            .unwrap_or(self.whole_extent)
            .clamped_to(&self.whole_extent);
        let time = (!self.time_steps.is_empty())
            .then(|| self.time_steps[resolve_time_index(&self.time_steps, info.update_time_step)]);
        let t = time.unwrap_or(0.0);

        let data = info.data_object_mut().ok_or_else(missing)?;
        let image = data.as_image_data_mut().ok_or_else(missing)?;
        image.origin = self.origin;
        image.spacing = self.spacing;

        let dims = extent.dimensions();
        let slice_len = dims[0] * dims[1];
        let values = image.allocate_scalars(&self.array_name, extent);
        if !extent.is_empty() {
            for (slice, k) in values.chunks_mut(slice_len).zip(extent.min(2)..) {
                if request.abort_requested() {
                    return Err(PipelineError::Aborted);
                }
                for (row, j) in slice.chunks_mut(dims[0]).zip(extent.min(1)..) {
                    for (value, i) in row.iter_mut().zip(extent.min(0)..) {
                        *value = (self.function)(i, j, k, t);
                    }
                }
                let done = (k - extent.min(2) + 1) as f64 / dims[2] as f64;
                request.update_progress(done);
            }
        }

        data.info.time_step = time;
        tracing::trace!("ImageSource filled {} at t={}", extent, t);
        Ok(())
    }
}
