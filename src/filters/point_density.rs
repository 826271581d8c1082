//! PointDensityFilter: bin points into an image.
//!
//! The grid spans the bounds of the input points. Each z-slice is filled on
//! the rayon pool independently; the pipeline only sees one blocking
//! `REQUEST_DATA`.

use crate::data::{DataType, Extent};
use crate::pipeline::{
    input_data, Algorithm, AlgorithmBase, Information, PipelineError, PipelineResult, PortLayout,
    Request,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DensityMode {
    /// Number of points per grid point.
    #[default]
    Count,
    /// 1 where at least one point landed, 0 elsewhere.
    Occupancy,
}

pub struct PointDensityFilter {
    base: AlgorithmBase,
    dimensions: [usize; 3],
    mode: DensityMode,
    array_name: String,
}

impl PointDensityFilter {
    pub fn new(dimensions: [usize; 3]) -> Self {
        Self {
            base: AlgorithmBase::new(PortLayout::filter(DataType::PolyData, DataType::ImageData)),
            dimensions: dimensions.map(|d| d.max(1)),
            mode: DensityMode::Count,
            array_name: "density".to_string(),
        }
    }

    pub fn set_dimensions(&mut self, dimensions: [usize; 3]) {
        let dimensions = dimensions.map(|d| d.max(1));
        if self.dimensions != dimensions {
            self.dimensions = dimensions;
            self.base.modified();
        }
    }

    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    pub fn set_mode(&mut self, mode: DensityMode) {
        if self.mode != mode {
            self.mode = mode;
            self.base.modified();
        }
    }

    pub fn mode(&self) -> DensityMode {
        self.mode
    }

    pub fn array_name(&self) -> &str {
        &self.array_name
    }
}

/// Grid index of `value` along an axis spanning `[min, max]` with `n` samples.
fn bin(value: f64, min: f64, max: f64, n: usize) -> usize {
    if n <= 1 || max <= min {
        return 0;
    }
    let t = (value - min) / (max - min) * (n - 1) as f64;
    (t.round().max(0.0) as usize).min(n - 1)
}

impl Algorithm for PointDensityFilter {
    fn class_name(&self) -> &str {
        "PointDensityFilter"
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
            out.whole_extent = Some(Extent::from_dimensions(self.dimensions));
        }
        Ok(())
    }

    fn request_data(
        &mut self,
        request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        let input = input_data(inputs, 0).ok_or(PipelineError::MissingInput {
            algorithm: "PointDensityFilter".to_string(),
            port: 0,
        })?;
        let poly = input.as_poly_data().ok_or(PipelineError::PortMismatch {
            algorithm: "PointDensityFilter".to_string(),
            port: 0,
            required: DataType::PolyData,
            actual: input.data_type(),
        })?;
        let time_step = input.info.time_step;

        let [nx, ny, nz] = self.dimensions;
        let bounds = poly.bounds().unwrap_or([0.0; 6]);
        let mut slices: Vec<Vec<usize>> = vec![Vec::new(); nz];
        for p in &poly.points {
            let i = bin(p[0], bounds[0], bounds[1], nx);
            let j = bin(p[1], bounds[2], bounds[3], ny);
            let k = bin(p[2], bounds[4], bounds[5], nz);
            slices[k].push(j * nx + i);
        }
        if request.abort_requested() {
            return Err(PipelineError::Aborted);
        }

        let mode = self.mode;
        let mut values = vec![0.0; nx * ny * nz];
        values
            .par_chunks_mut(nx * ny)
            .zip(slices.par_iter())
            .for_each(|(slice, hits)| {
                for &idx in hits {
                    match mode {
                        DensityMode::Count => slice[idx] += 1.0,
                        DensityMode::Occupancy => slice[idx] = 1.0,
                    }
                }
            });
        request.update_progress(1.0);

        let spacing = [
            (bounds[1] - bounds[0]) / (nx.max(2) - 1) as f64,
            (bounds[3] - bounds[2]) / (ny.max(2) - 1) as f64,
            (bounds[5] - bounds[4]) / (nz.max(2) - 1) as f64,
        ]
        .map(|s| if s > 0.0 { s } else { 1.0 });

        let missing = PipelineError::MissingDataObject {
            algorithm: "PointDensityFilter".to_string(),
            port: 0,
        };
        let data = outputs
            .get_mut(0)
            .and_then(|out| out.data_object_mut())
            .ok_or(missing)?;
        data.info.time_step = time_step;
        if let Some(image) = data.as_image_data_mut() {
            image.origin = [bounds[0], bounds[2], bounds[4]];
            image.spacing = spacing;
            *image.allocate_scalars(&self.array_name, Extent::from_dimensions(self.dimensions)) = values;
        }
        Ok(())
    }
}
