//! Data objects carried on pipeline ports.
//!
//! A [`DataObject`] is a tagged union over the concrete dataset types plus the
//! per-object [`DataInformation`] the executive stamps after each execution.
//! Output slots replace the whole object when the concrete type changes and
//! mutate it in place otherwise.

use crate::data::extent::Extent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dataset type hierarchy. `DataObject` and `DataSet` are abstract and only
/// appear as port requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    DataObject,
    DataSet,
    PolyData,
    ImageData,
    StructuredGrid,
    Table,
    Selection,
    Molecule,
}

/// Which partitioning scheme applies to a data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentType {
    /// 3D index extents (`WHOLE_EXTENT` / `UPDATE_EXTENT`).
    Structured,
    /// Piece / number of pieces / ghost levels.
    Pieces,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::DataObject => "DataObject",
            DataType::DataSet => "DataSet",
            DataType::PolyData => "PolyData",
            DataType::ImageData => "ImageData",
            DataType::StructuredGrid => "StructuredGrid",
            DataType::Table => "Table",
            DataType::Selection => "Selection",
            DataType::Molecule => "Molecule",
        }
    }

    /// True when a value of type `self` satisfies a requirement for `required`.
    pub fn is_a(&self, required: DataType) -> bool {
        match required {
            DataType::DataObject => true,
            DataType::DataSet => matches!(
                self,
                DataType::DataSet | DataType::PolyData | DataType::ImageData | DataType::StructuredGrid
            ),
            other => *self == other,
        }
    }

    pub fn is_concrete(&self) -> bool {
        !matches!(self, DataType::DataObject | DataType::DataSet)
    }

    pub fn extent_type(&self) -> ExtentType {
        match self {
            DataType::ImageData | DataType::StructuredGrid => ExtentType::Structured,
            _ => ExtentType::Pieces,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named `f64` arrays, one value (or tuple) per point / row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    pub arrays: BTreeMap<String, Vec<f64>>,
}

impl FieldData {
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.arrays.get(name).map(Vec::as_slice)
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.arrays.insert(name.into(), values);
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn clear(&mut self) {
        self.arrays.clear();
    }
}

/// What the last execution actually delivered, as opposed to what was requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataInformation {
    pub extent: Option<Extent>,
    /// Full request a piece was cut from when the producer split it.
    pub all_pieces_extent: Option<Extent>,
    pub piece: Option<usize>,
    pub number_of_pieces: Option<usize>,
    pub ghost_levels: usize,
    pub time_step: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolyData {
    pub points: Vec<[f64; 3]>,
    pub point_data: FieldData,
}

impl PolyData {
    /// Axis-aligned bounds `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    pub fn bounds(&self) -> Option<[f64; 6]> {
        let first = self.points.first()?;
        let mut b = [first[0], first[0], first[1], first[1], first[2], first[2]];
        for p in &self.points[1..] {
            for axis in 0..3 {
                b[2 * axis] = b[2 * axis].min(p[axis]);
                b[2 * axis + 1] = b[2 * axis + 1].max(p[axis]);
            }
        }
        Some(b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub extent: Extent,
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
    pub point_data: FieldData,
}

impl Default for ImageData {
    fn default() -> Self {
        Self {
            extent: Extent::EMPTY,
            origin: [0.0; 3],
            spacing: [1.0; 3],
            point_data: FieldData::default(),
        }
    }
}

impl ImageData {
    /// Allocate a zeroed single-component scalar array over `extent`.
    pub fn allocate_scalars(&mut self, name: &str, extent: Extent) -> &mut Vec<f64> {
        self.extent = extent;
        self.point_data.arrays.clear();
        self.point_data
            .arrays
            .entry(name.to_string())
            .or_insert_with(|| vec![0.0; extent.number_of_points()])
    }

    pub fn scalar_at(&self, name: &str, i: i32, j: i32, k: i32) -> Option<f64> {
        let idx = self.extent.point_index(i, j, k)?;
        self.point_data.get(name)?.get(idx).copied()
    }

    fn crop(&mut self, target: &Extent) {
        let cropped = target.clamped_to(&self.extent);
        if cropped == self.extent {
            return;
        }
        self.point_data.arrays = crop_arrays(&self.point_data, &self.extent, &cropped);
        self.extent = cropped;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredGrid {
    pub extent: Extent,
    pub points: Vec<[f64; 3]>,
    pub point_data: FieldData,
}

impl StructuredGrid {
    fn crop(&mut self, target: &Extent) {
        let cropped = target.clamped_to(&self.extent);
        if cropped == self.extent {
            return;
        }
        let mut points = Vec::with_capacity(cropped.number_of_points());
        for_each_index(&cropped, |i, j, k| {
            if let Some(p) = self.extent.point_index(i, j, k).and_then(|idx| self.points.get(idx)) {
                points.push(*p);
            }
        });
        self.point_data.arrays = crop_arrays(&self.point_data, &self.extent, &cropped);
        self.points = points;
        self.extent = cropped;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: FieldData,
}

impl Table {
    pub fn number_of_rows(&self) -> usize {
        self.columns.arrays.values().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub ids: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub atom_positions: Vec<[f64; 3]>,
    pub atomic_numbers: Vec<u16>,
}

/// Concrete payload of a data object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataBody {
    PolyData(PolyData),
    ImageData(ImageData),
    StructuredGrid(StructuredGrid),
    Table(Table),
    Selection(Selection),
    Molecule(Molecule),
}

/// A dataset plus the information describing what it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataObject {
    pub info: DataInformation,
    pub body: DataBody,
}

impl DataObject {
    /// Create an empty instance of a concrete type. Abstract types yield `None`.
    pub fn new(data_type: DataType) -> Option<Self> {
        let body = match data_type {
            DataType::PolyData => DataBody::PolyData(PolyData::default()),
            DataType::ImageData => DataBody::ImageData(ImageData::default()),
            DataType::StructuredGrid => DataBody::StructuredGrid(StructuredGrid::default()),
            DataType::Table => DataBody::Table(Table::default()),
            DataType::Selection => DataBody::Selection(Selection::default()),
            DataType::Molecule => DataBody::Molecule(Molecule::default()),
            DataType::DataObject | DataType::DataSet => return None,
        };
        Some(Self {
            info: DataInformation::default(),
            body,
        })
    }

    pub fn from_body(body: DataBody) -> Self {
        Self {
            info: DataInformation::default(),
            body,
        }
    }

    pub fn data_type(&self) -> DataType {
        match &self.body {
            DataBody::PolyData(_) => DataType::PolyData,
            DataBody::ImageData(_) => DataType::ImageData,
            DataBody::StructuredGrid(_) => DataType::StructuredGrid,
            DataBody::Table(_) => DataType::Table,
            DataBody::Selection(_) => DataType::Selection,
            DataBody::Molecule(_) => DataType::Molecule,
        }
    }

    pub fn extent_type(&self) -> ExtentType {
        self.data_type().extent_type()
    }

    /// A fresh, empty object of the same concrete type.
    pub fn new_instance(&self) -> Self {
        let body = match &self.body {
            DataBody::PolyData(_) => DataBody::PolyData(PolyData::default()),
            DataBody::ImageData(_) => DataBody::ImageData(ImageData::default()),
            DataBody::StructuredGrid(_) => DataBody::StructuredGrid(StructuredGrid::default()),
            DataBody::Table(_) => DataBody::Table(Table::default()),
            DataBody::Selection(_) => DataBody::Selection(Selection::default()),
            DataBody::Molecule(_) => DataBody::Molecule(Molecule::default()),
        };
        Self::from_body(body)
    }

    /// Structured extent actually held, if this is a structured type.
    pub fn structured_extent(&self) -> Option<Extent> {
        match &self.body {
            DataBody::ImageData(img) => Some(img.extent),
            DataBody::StructuredGrid(grid) => Some(grid.extent),
            _ => None,
        }
    }

    /// Number of points, atoms or rows, whichever the type carries.
    pub fn number_of_elements(&self) -> usize {
        match &self.body {
            DataBody::PolyData(p) => p.points.len(),
            DataBody::ImageData(img) => img.extent.number_of_points(),
            DataBody::StructuredGrid(g) => g.points.len(),
            DataBody::Table(t) => t.number_of_rows(),
            DataBody::Selection(s) => s.ids.len(),
            DataBody::Molecule(m) => m.atom_positions.len(),
        }
    }

    /// Crop structured data down to `extent`. Unstructured types are left alone.
    pub fn crop(&mut self, extent: &Extent) {
        match &mut self.body {
            DataBody::ImageData(img) => img.crop(extent),
            DataBody::StructuredGrid(grid) => grid.crop(extent),
            _ => return,
        }
        self.info.extent = self.structured_extent();
    }

    pub fn point_data(&self) -> Option<&FieldData> {
        match &self.body {
            DataBody::PolyData(p) => Some(&p.point_data),
            DataBody::ImageData(img) => Some(&img.point_data),
            DataBody::StructuredGrid(g) => Some(&g.point_data),
            DataBody::Table(t) => Some(&t.columns),
            DataBody::Selection(_) | DataBody::Molecule(_) => None,
        }
    }

    pub fn as_poly_data(&self) -> Option<&PolyData> {
        match &self.body {
            DataBody::PolyData(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_poly_data_mut(&mut self) -> Option<&mut PolyData> {
        match &mut self.body {
            DataBody::PolyData(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_image_data(&self) -> Option<&ImageData> {
        match &self.body {
            DataBody::ImageData(img) => Some(img),
            _ => None,
        }
    }

    pub fn as_image_data_mut(&mut self) -> Option<&mut ImageData> {
        match &mut self.body {
            DataBody::ImageData(img) => Some(img),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match &self.body {
            DataBody::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match &mut self.body {
            DataBody::Table(t) => Some(t),
            _ => None,
        }
    }
}

fn for_each_index(extent: &Extent, mut f: impl FnMut(i32, i32, i32)) {
    for k in extent.min(2)..=extent.max(2) {
        for j in extent.min(1)..=extent.max(1) {
            for i in extent.min(0)..=extent.max(0) {
                f(i, j, k);
            }
        }
    }
}

fn crop_arrays(fields: &FieldData, from: &Extent, to: &Extent) -> BTreeMap<String, Vec<f64>> {
    let n_from = from.number_of_points().max(1);
    fields
        .arrays
        .iter()
        .map(|(name, values)| {
            let components = (values.len() / n_from).max(1);
            let mut out = Vec::with_capacity(to.number_of_points() * components);
            if !to.is_empty() {
                for_each_index(to, |i, j, k| {
                    if let Some(idx) = from.point_index(i, j, k) {
                        let start = idx * components;
                        if let Some(tuple) = values.get(start..start + components) {
                            out.extend_from_slice(tuple);
                        }
                    }
                });
            }
            (name.clone(), out)
        })
        .collect()
}
