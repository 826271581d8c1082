//! Mock construction helpers

use mockall::mock;
use std::path::{Path, PathBuf};
use streamexec::data::{DataObject, DataType};
use streamexec::pipeline::{Information, PipelineResult};
use streamexec::reader::{ParallelFileReader, SimpleFileReader};

mock! {
    pub SimpleFiles {}

    impl SimpleFileReader for SimpleFiles {
        fn class_name(&self) -> &'static str;
        fn output_type(&self) -> DataType;
        fn time_value(&mut self, file: &Path) -> f64;
        fn read_meta_data(&mut self, file: &Path, info: &mut Information) -> PipelineResult<()>;
        fn read_mesh(&mut self, file: &Path, output: &mut DataObject) -> PipelineResult<()>;
        fn read_points(&mut self, file: &Path, output: &mut DataObject) -> PipelineResult<()>;
        fn read_arrays(&mut self, file: &Path, output: &mut DataObject) -> PipelineResult<()>;
    }
}

mock! {
    pub PieceFiles {}

    impl ParallelFileReader for PieceFiles {
        fn class_name(&self) -> &'static str;
        fn output_type(&self) -> DataType;
        fn time_value(&mut self, file: &Path) -> f64;
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
}

/// `n` file names that need not exist.
pub fn file_names(n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| PathBuf::from(format!("frame_{:03}.dat", i))).collect()
}

/// Simple-reader hooks with identity and type answered.
pub fn simple_files() -> MockSimpleFiles {
    let mut m = MockSimpleFiles::new();
    m.expect_class_name().return_const("MockSimpleFiles");
    m.expect_output_type().return_const(DataType::PolyData);
    m
}

/// Parallel-reader hooks with identity and type answered.
pub fn piece_files() -> MockPieceFiles {
    let mut m = MockPieceFiles::new();
    m.expect_class_name().return_const("MockPieceFiles");
    m.expect_output_type().return_const(DataType::PolyData);
    m
}
