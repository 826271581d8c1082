//! Data model flowing through pipeline ports.

pub mod extent;
pub mod object;

pub use extent::Extent;
pub use object::{
    DataBody, DataInformation, DataObject, DataType, ExtentType, FieldData, ImageData, Molecule,
    PolyData, Selection, StructuredGrid, Table,
};
