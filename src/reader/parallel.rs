//! One file per time step, pieces handled by the file reader.

use crate::data::{DataObject, DataType};
use crate::pipeline::time::ModifiedTime;
use crate::pipeline::{Information, PipelineError, PipelineResult};
use crate::reader::{reuse_or_create, ReaderAlgorithm};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-file hooks of a [`ParallelReader`].
#[cfg_attr(test, mockall::automock)]
pub trait ParallelFileReader: Send + 'static {
    fn class_name(&self) -> &'static str;

    fn output_type(&self) -> DataType;

    /// Time value stored in `file`, or NaN when the file carries none.
    fn time_value(&mut self, _file: &Path) -> f64 {
        f64::NAN
    }

    fn read_mesh(
        &mut self,
        file: &Path,
        piece: usize,
        number_of_pieces: usize,
        ghost_levels: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()>;

    fn read_points(
        &mut self,
        file: &Path,
        piece: usize,
        number_of_pieces: usize,
        ghost_levels: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()>;

    fn read_arrays(
        &mut self,
        file: &Path,
        piece: usize,
        number_of_pieces: usize,
        ghost_levels: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()>;
}

/// Reader over an ordered file list, file `i` holding time step `i`.
pub struct ParallelReader<F> {
    file_reader: F,
    file_names: Vec<PathBuf>,
    mtime: ModifiedTime,
}

impl<F: ParallelFileReader> ParallelReader<F> {
    pub fn new(file_reader: F) -> Self {
        Self {
            file_reader,
            file_names: Vec::new(),
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
        self.mtime.modified();
    }

    pub fn file_names(&self) -> &[PathBuf] {
        &self.file_names
    }

    pub fn number_of_file_names(&self) -> usize {
        self.file_names.len()
    }

    pub fn file_reader(&self) -> &F {
        &self.file_reader
    }

    fn file(&self, time_index: usize) -> PipelineResult<PathBuf> {
        file_at(&self.file_names, time_index).map(Path::to_path_buf)
    }
}

impl<F: ParallelFileReader> ReaderAlgorithm for ParallelReader<F> {
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
        info.can_handle_piece_request = true;
        if self.file_names.is_empty() {
            return Ok(());
        }
        let values: Vec<f64> = self
            .file_names
            .iter()
            .map(|file| self.file_reader.time_value(file))
            .collect();
        info.set_time_steps(file_series_time_steps(&values));
        Ok(())
    }

    fn read_mesh(
        &mut self,
        piece: usize,
        number_of_pieces: usize,
        ghost_levels: usize,
        time_index: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()> {
        let file = self.file(time_index)?;
        self.file_reader
            .read_mesh(&file, piece, number_of_pieces, ghost_levels, output)
    }

    fn read_points(
        &mut self,
        piece: usize,
        number_of_pieces: usize,
        ghost_levels: usize,
        time_index: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()> {
        let file = self.file(time_index)?;
        self.file_reader
            .read_points(&file, piece, number_of_pieces, ghost_levels, output)
    }

    fn read_arrays(
        &mut self,
        piece: usize,
        number_of_pieces: usize,
        ghost_levels: usize,
        time_index: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()> {
        let file = self.file(time_index)?;
        self.file_reader
            .read_arrays(&file, piece, number_of_pieces, ghost_levels, output)
    }
}

/// Per-file time values, or `0..N` when any file has none.
pub(crate) fn file_series_time_steps(values: &[f64]) -> Vec<f64> {
    if values.iter().any(|v| v.is_nan()) {
        (0..values.len()).map(|i| i as f64).collect()
    } else {
        values.to_vec()
    }
}

pub(crate) fn file_at(files: &[PathBuf], time_index: usize) -> PipelineResult<&Path> {
    files
        .get(time_index)
        .map(PathBuf::as_path)
        .ok_or(PipelineError::TimeIndexOutOfRange {
            index: time_index,
            count: files.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("step_{i}.dat"))).collect()
    }

    fn mock() -> MockParallelFileReader {
        let mut m = MockParallelFileReader::new();
        m.expect_class_name().return_const("MockSeries");
        m.expect_output_type().return_const(DataType::PolyData);
        m
    }

    #[test]
    fn test_time_values_become_time_steps() {
        let mut m = mock();
        m.expect_time_value()
            .returning(|file| if file.ends_with("step_1.dat") { 0.5 } else { 0.25 });
        let mut reader = ParallelReader::with_files(m, files(2));

        let mut info = Information::new();
        reader.read_meta_data(&mut info).unwrap();
        assert!(info.can_handle_piece_request);
        assert_eq!(info.time_steps.as_deref(), Some(&[0.25, 0.5][..]));
        assert_eq!(info.time_range, Some([0.25, 0.5]));
    }

    #[test]
    fn test_one_missing_time_falls_back_to_indices() {
        let mut m = mock();
        m.expect_time_value()
            .returning(|file| if file.ends_with("step_2.dat") { f64::NAN } else { 7.0 });
        let mut reader = ParallelReader::with_files(m, files(3));

        let mut info = Information::new();
        reader.read_meta_data(&mut info).unwrap();
        assert_eq!(info.time_steps.as_deref(), Some(&[0.0, 1.0, 2.0][..]));
    }

    #[test]
    fn test_time_index_out_of_range() {
        let m = mock();
        let mut reader = ParallelReader::with_files(m, files(2));
        let mut out = DataObject::new(DataType::PolyData).unwrap();
        let err = reader.read_mesh(0, 1, 0, 2, &mut out).unwrap_err();
        assert!(matches!(err, PipelineError::TimeIndexOutOfRange { index: 2, count: 2 }));
    }

    #[test]
    fn test_reads_delegate_with_file_for_index() {
        let mut m = mock();
        m.expect_read_mesh()
            .with(eq(PathBuf::from("step_1.dat")), eq(1), eq(4), eq(0), always())
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));
        let mut reader = ParallelReader::with_files(m, files(2));
        let mut out = DataObject::new(DataType::PolyData).unwrap();
        reader.read_mesh(1, 4, 0, 1, &mut out).unwrap();
    }

    #[test]
    fn test_file_list_changes_bump_mtime() {
        let mut reader = ParallelReader::new(mock());
        let before = ReaderAlgorithm::mtime(&reader);
        reader.add_file_name("a.dat");
        assert!(ReaderAlgorithm::mtime(&reader) > before);
        assert_eq!(reader.number_of_file_names(), 1);
    }
}
