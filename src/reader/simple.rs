//! One file per time step, no partitioning within a file.

use crate::data::{DataObject, DataType};
use crate::pipeline::time::ModifiedTime;
use crate::pipeline::{Information, PipelineResult};
use crate::reader::parallel::{file_at, file_series_time_steps};
use crate::reader::{reuse_or_create, ReaderAlgorithm};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-file hooks of a [`SimpleReader`].
#[cfg_attr(test, mockall::automock)]
pub trait SimpleFileReader: Send + 'static {
    fn class_name(&self) -> &'static str;

    fn output_type(&self) -> DataType;

    /// Time value stored in `file`, or NaN when the file carries none.
    fn time_value(&mut self, _file: &Path) -> f64 {
        f64::NAN
    }

    /// Structural metadata (extents and the like) stored in `file`.
    fn read_meta_data(&mut self, _file: &Path, _info: &mut Information) -> PipelineResult<()> {
        Ok(())
    }

    fn read_mesh(&mut self, file: &Path, output: &mut DataObject) -> PipelineResult<()>;

    fn read_points(&mut self, file: &Path, output: &mut DataObject) -> PipelineResult<()>;

    fn read_arrays(&mut self, file: &Path, output: &mut DataObject) -> PipelineResult<()>;
}

/// Reader over an ordered file list where every file is read whole.
///
/// Requests for any piece but 0 succeed without touching the output, so the
/// data ends up on exactly one piece of a split request.
pub struct SimpleReader<F> {
    file_reader: F,
    file_names: Vec<PathBuf>,
    has_temporal_metadata: bool,
    current_file_index: Option<usize>,
    mtime: ModifiedTime,
}

impl<F: SimpleFileReader> SimpleReader<F> {
    pub fn new(file_reader: F) -> Self {
        Self {
            file_reader,
            file_names: Vec::new(),
            has_temporal_metadata: false,
            current_file_index: None,
            mtime: ModifiedTime::new(),
        }
    }

    pub fn with_files(file_reader: F, files: Vec<PathBuf>) -> Self {
        let mut reader = Self::new(file_reader);
        reader.set_file_names(files);
        reader
    }

    pub fn add_file_name(&mut self, file: impl Into<PathBuf>) {
        self.file_names.push(file.into());
        self.mtime.modified();
    }

    pub fn set_file_names(&mut self, files: Vec<PathBuf>) {
        self.file_names = files;
        self.current_file_index = None;
        self.mtime.modified();
    }

    pub fn file_names(&self) -> &[PathBuf] {
        &self.file_names
    }

    /// Re-read metadata for every time step instead of once from the first file.
    pub fn set_has_temporal_metadata(&mut self, temporal: bool) {
        if self.has_temporal_metadata != temporal {
            self.has_temporal_metadata = temporal;
            self.mtime.modified();
        }
    }

    pub fn has_temporal_metadata(&self) -> bool {
        self.has_temporal_metadata
    }

    /// File the last mesh read came from.
    pub fn current_file_name(&self) -> Option<&Path> {
        self.current_file_index
            .and_then(|i| self.file_names.get(i))
            .map(PathBuf::as_path)
    }

    pub fn current_file_index(&self) -> Option<usize> {
        self.current_file_index
    }

    pub fn file_reader(&self) -> &F {
        &self.file_reader
    }

    fn file(&self, time_index: usize) -> PipelineResult<PathBuf> {
        file_at(&self.file_names, time_index).map(Path::to_path_buf)
    }
}

impl<F: SimpleFileReader> ReaderAlgorithm for SimpleReader<F> {
    fn class_name(&self) -> &str {
        self.file_reader.class_name()
    }

    fn mtime(&self) -> u64 {
        self.mtime.get()
    }

    fn create_output(&mut self, current: Option<Arc<DataObject>>) -> PipelineResult<Arc<DataObject>> {
        reuse_or_create(current, self.file_reader.output_type())
    }

    fn read_meta_data(&mut self, info: &mut Information) -> PipelineResult<()> {
        // Piece requests are accepted and answered with empty output for piece > 0.
        info.can_handle_piece_request = true;
        if self.file_names.is_empty() {
            return Ok(());
        }

        if self.has_temporal_metadata {
            info.time_dependent_information = true;
        } else {
            let first = self.file(0)?;
            self.file_reader.read_meta_data(&first, info)?;
        }

        let values: Vec<f64> = self
            .file_names
            .iter()
            .map(|file| self.file_reader.time_value(file))
            .collect();
        info.set_time_steps(file_series_time_steps(&values));
        Ok(())
    }

    fn read_time_dependent_meta_data(
        &mut self,
        time_index: usize,
        info: &mut Information,
    ) -> PipelineResult<()> {
        if !self.has_temporal_metadata {
            return Ok(());
        }
        let file = self.file(time_index)?;
        self.file_reader.read_meta_data(&file, info)
    }

    fn read_mesh(
        &mut self,
        piece: usize,
        _number_of_pieces: usize,
        _ghost_levels: usize,
        time_index: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()> {
        if piece > 0 {
            return Ok(());
        }
        let file = self.file(time_index)?;
        self.current_file_index = Some(time_index);
        tracing::debug!("{} reading {:?}", self.file_reader.class_name(), file);
        self.file_reader.read_mesh(&file, output)
    }

    fn read_points(
        &mut self,
        piece: usize,
        _number_of_pieces: usize,
        _ghost_levels: usize,
        time_index: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()> {
        if piece > 0 {
            return Ok(());
        }
        let file = self.file(time_index)?;
        self.file_reader.read_points(&file, output)
    }

    fn read_arrays(
        &mut self,
        piece: usize,
        _number_of_pieces: usize,
        _ghost_levels: usize,
        time_index: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()> {
        if piece > 0 {
            return Ok(());
        }
        let file = self.file(time_index)?;
        self.file_reader.read_arrays(&file, output)
    }
}
