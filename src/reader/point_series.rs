//! JSON point-series files.
//!
//! Each file holds one time step:
//!
//! ```json
//! { "time": 0.5, "points": [[0.0, 0.0, 0.0], [1.0, 0.5, 0.0]], "arrays": { "mass": [1.0, 2.0] } }
//! ```
//!
//! Points are split into contiguous pieces; ghost levels do not apply to
//! unconnected points.

use crate::data::{DataObject, DataType, PolyData};
use crate::pipeline::{PipelineError, PipelineResult};
use crate::reader::parallel::{ParallelFileReader, ParallelReader};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointFile {
    #[serde(default)]
    pub time: Option<f64>,
    pub points: Vec<[f64; 3]>,
    #[serde(default)]
    pub arrays: BTreeMap<String, Vec<f64>>,
}

impl PointFile {
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: PointFile = serde_json::from_str(&content)
            .map_err(|e| PipelineError::Parse(format!("{}: {}", path.display(), e)))?;
        for (name, values) in &file.arrays {
            if values.len() != file.points.len() {
                return Err(PipelineError::Parse(format!(
                    "{}: array '{}' has {} values for {} points",
                    path.display(),
                    name,
                    values.len(),
                    file.points.len()
                )));
            }
        }
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// File hooks for point-series JSON. Keeps the last parsed file so mesh,
/// points and arrays of one step parse it once.
#[derive(Debug, Default)]
pub struct PointSeriesFiles {
    cached: Option<(PathBuf, PointFile)>,
}

impl PointSeriesFiles {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(&mut self, path: &Path) -> PipelineResult<&PointFile> {
        let hit = self.cached.as_ref().is_some_and(|(p, _)| p == path);
        if !hit {
            let file = PointFile::load(path)?;
            self.cached = Some((path.to_path_buf(), file));
        }
        self.cached
            .as_ref()
            .map(|(_, file)| file)
            .ok_or_else(|| PipelineError::Parse(format!("{}: not loaded", path.display())))
    }
}

/// Range of `len` items belonging to `piece` of `number_of_pieces`.
pub fn piece_range(len: usize, piece: usize, number_of_pieces: usize) -> Range<usize> {
    let n = number_of_pieces.max(1);
    if piece >= n {
        return 0..0;
    }
    (len * piece / n)..(len * (piece + 1) / n)
}

fn poly_data_output<'a>(
    output: &'a mut DataObject,
) -> PipelineResult<&'a mut PolyData> {
    let data_type = output.data_type();
    output.as_poly_data_mut().ok_or(PipelineError::PortMismatch {
        algorithm: "PointSeriesReader".to_string(),
        port: 0,
        required: DataType::PolyData,
        actual: data_type,
    })
}

impl ParallelFileReader for PointSeriesFiles {
    fn class_name(&self) -> &'static str {
        "PointSeriesReader"
    }

    fn output_type(&self) -> DataType {
        DataType::PolyData
    }

    fn time_value(&mut self, file: &Path) -> f64 {
        match self.load(file) {
            Ok(contents) => contents.time.unwrap_or(f64::NAN),
            Err(e) => {
                tracing::warn!("No time value for {:?}: {}", file, e);
                f64::NAN
            }
        }
    }

    fn read_mesh(
        &mut self,
        file: &Path,
        _piece: usize,
        _number_of_pieces: usize,
        _ghost_levels: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()> {
        // Unconnected points: loading validates the file, nothing else to build.
        self.load(file)?;
        poly_data_output(output)?.points.clear();
        Ok(())
    }

    fn read_points(
        &mut self,
        file: &Path,
        piece: usize,
        number_of_pieces: usize,
        _ghost_levels: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()> {
        let contents = self.load(file)?;
        let range = piece_range(contents.points.len(), piece, number_of_pieces);
        let points = contents.points[range].to_vec();
        poly_data_output(output)?.points = points;
        Ok(())
    }

    fn read_arrays(
        &mut self,
        file: &Path,
        piece: usize,
        number_of_pieces: usize,
        _ghost_levels: usize,
        output: &mut DataObject,
    ) -> PipelineResult<()> {
        let contents = self.load(file)?;
        let range = piece_range(contents.points.len(), piece, number_of_pieces);
        let arrays: Vec<(String, Vec<f64>)> = contents
            .arrays
            .iter()
            .map(|(name, values)| (name.clone(), values[range.clone()].to_vec()))
            .collect();

        let poly = poly_data_output(output)?;
        for (name, values) in arrays {
            poly.point_data.insert(name, values);
        }
        Ok(())
    }
}

pub type PointSeriesReader = ParallelReader<PointSeriesFiles>;

impl PointSeriesReader {
    pub fn open(files: Vec<PathBuf>) -> Self {
        ParallelReader::with_files(PointSeriesFiles::new(), files)
    }
}
