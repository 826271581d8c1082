//! Readers: a reduced algorithm contract for file-backed sources.
//!
//! A [`ReaderAlgorithm`] never sees [`Information`] vectors for inputs or
//! requests. The [`ReaderExecutive`] translates each protocol phase into the
//! matching reader call:
//!
//! ```text
//! REQUEST_DATA_OBJECT                → create_output
//! REQUEST_INFORMATION                → read_meta_data
//! REQUEST_TIME_DEPENDENT_INFORMATION → read_time_dependent_meta_data(time index)
//! REQUEST_DATA                       → read_mesh → read_points → read_arrays
//! ```
//!
//! [`ParallelReader`] and [`SimpleReader`] narrow the contract further to one
//! file per time step.

pub mod executive;
pub mod parallel;
pub mod point_series;
pub mod simple;

pub use executive::ReaderExecutive;
pub use parallel::{ParallelFileReader, ParallelReader};
pub use point_series::{PointFile, PointSeriesFiles, PointSeriesReader};
pub use simple::{SimpleFileReader, SimpleReader};

use crate::data::{DataObject, DataType};
use crate::pipeline::{AsAny, Information, PipelineError, PipelineResult};
use std::sync::Arc;

/// Keep `current` when it already has type `data_type`, else allocate a new one.
pub fn reuse_or_create(
    current: Option<Arc<DataObject>>,
    data_type: DataType,
) -> PipelineResult<Arc<DataObject>> {
    match current {
        Some(current) if current.data_type() == data_type => Ok(current),
        _ => DataObject::new(data_type)
            .map(Arc::new)
            .ok_or(PipelineError::AbstractDataType(data_type)),
    }
}

pub trait ReaderAlgorithm: AsAny + Send {
    fn class_name(&self) -> &str;

    /// Modification time of the reader's parameters (file names etc.).
    fn mtime(&self) -> u64 {
        0
    }

    /// Return the data object to use as output. Returning `current` keeps it;
    /// anything else replaces it.
    fn create_output(&mut self, current: Option<Arc<DataObject>>) -> PipelineResult<Arc<DataObject>>;

    /// Publish time steps, piece capability and structural extents. Must not
    /// depend on the pending update request.
    fn read_meta_data(&mut self, info: &mut Information) -> PipelineResult<()>;

    fn read_time_dependent_meta_data(
        &mut self,
        _time_index: usize,
        _info: &mut Information,
    ) -> PipelineResult<()> {
        Ok(())
    }

    fn read_mesh(
        &mut self,
        piece: usize,
        number_of_pieces: usize,
        ghost_levels: usize,
        time_index: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()>;

    fn read_points(
        &mut self,
        piece: usize,
        number_of_pieces: usize,
        ghost_levels: usize,
        time_index: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()>;

    fn read_arrays(
        &mut self,
        piece: usize,
        number_of_pieces: usize,
        ghost_levels: usize,
        time_index: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()>;
}
