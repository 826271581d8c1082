//! Port descriptors for algorithms.
//!
//! Each algorithm declares its ports (inputs/outputs) through a [`PortLayout`].
//! The pipeline uses these to validate connections and input data types, and
//! the default data-object request uses the output descriptors to decide what
//! to allocate.

use crate::data::DataType;
use serde::{Deserialize, Serialize};

/// Contract of one input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPortInfo {
    pub name: String,
    pub required_type: DataType,
    /// The port may be left unconnected.
    pub optional: bool,
    /// The port accepts more than one connection.
    pub repeatable: bool,
}

impl InputPortInfo {
    pub fn required(name: impl Into<String>, required_type: DataType) -> Self {
        Self {
            name: name.into(),
            required_type,
            optional: false,
            repeatable: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }
}

/// What an output port manufactures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    /// Always this concrete type.
    Fixed(DataType),
    /// Mirror whatever concrete type arrives on the given input port.
    SameAsInput(usize),
}

/// Contract of one output port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPortInfo {
    pub name: String,
    pub data_type: OutputType,
}

impl OutputPortInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type: OutputType::Fixed(data_type),
        }
    }

    pub fn same_as_input(name: impl Into<String>, port: usize) -> Self {
        Self {
            name: name.into(),
            data_type: OutputType::SameAsInput(port),
        }
    }
}

/// Port arity and typed contracts of an algorithm.
///
/// The presets mirror the usual algorithm families: they differ only in how
/// many ports they have and which types flow through them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortLayout {
    pub inputs: Vec<InputPortInfo>,
    pub outputs: Vec<OutputPortInfo>,
}

impl PortLayout {
    pub fn new(inputs: Vec<InputPortInfo>, outputs: Vec<OutputPortInfo>) -> Self {
        Self { inputs, outputs }
    }

    /// Source with one output of `data_type`.
    pub fn source(data_type: DataType) -> Self {
        Self::new(Vec::new(), vec![OutputPortInfo::new("output", data_type)])
    }

    /// One input of `input` type, one output of `output` type.
    pub fn filter(input: DataType, output: DataType) -> Self {
        Self::new(
            vec![InputPortInfo::required("input", input)],
            vec![OutputPortInfo::new("output", output)],
        )
    }

    /// Generic data-object algorithm: any input, output type decided by the
    /// algorithm's own data-object request.
    pub fn data_object(output: DataType) -> Self {
        Self::filter(DataType::DataObject, output)
    }

    /// Output mirrors the concrete type of input 0.
    pub fn pass_input_type() -> Self {
        Self::new(
            vec![InputPortInfo::required("input", DataType::DataObject)],
            vec![OutputPortInfo::same_as_input("output", 0)],
        )
    }

    /// Selection algorithms take the data to select from plus an optional
    /// selection input.
    pub fn selection() -> Self {
        Self::new(
            vec![
                InputPortInfo::required("input", DataType::DataObject),
                InputPortInfo::required("selection", DataType::Selection).optional(),
            ],
            vec![OutputPortInfo::new("output", DataType::Selection)],
        )
    }

    pub fn number_of_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn number_of_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Resize the input list; new ports require a generic data object.
    pub fn set_number_of_inputs(&mut self, n: usize) {
        let next = self.inputs.len();
        self.inputs.truncate(n);
        for port in next..n {
            self.inputs
                .push(InputPortInfo::required(format!("input{port}"), DataType::DataObject));
        }
    }

    /// Resize the output list; new ports mirror input 0 when there is one.
    pub fn set_number_of_outputs(&mut self, n: usize) {
        let next = self.outputs.len();
        self.outputs.truncate(n);
        for port in next..n {
            let info = if self.inputs.is_empty() {
                OutputPortInfo::new(format!("output{port}"), DataType::PolyData)
            } else {
                OutputPortInfo::same_as_input(format!("output{port}"), 0)
            };
            self.outputs.push(info);
        }
    }
}
