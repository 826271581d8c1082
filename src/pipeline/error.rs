//! Pipeline-specific error types.

use crate::data::DataType;
use crate::pipeline::id::NodeId;
use crate::pipeline::request::RequestKind;
use thiserror::Error;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{algorithm} ({node_id:?}) failed {request}: {source}")]
    RequestFailed {
        node_id: NodeId,
        algorithm: String,
        request: RequestKind,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Invalid node: {0:?}")]
    InvalidNode(NodeId),

    #[error("Invalid port {port} on {node_id:?}: {message}")]
    InvalidPort {
        node_id: NodeId,
        port: usize,
        message: String,
    },

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    #[error("Cycle detected in pipeline graph")]
    CycleDetected,

    #[error("Port mismatch on input {port} of {algorithm}: requires {required}, got {actual}")]
    PortMismatch {
        algorithm: String,
        port: usize,
        required: DataType,
        actual: DataType,
    },

    #[error("Input port {port} of {algorithm} requires a connection")]
    MissingInput { algorithm: String, port: usize },

    #[error("Input port {port} of {algorithm} accepts a single connection")]
    NotRepeatable { algorithm: String, port: usize },

    #[error("No data object on output port {port} of {algorithm}")]
    MissingDataObject { algorithm: String, port: usize },

    #[error("Cannot create a data object of abstract type {0}")]
    AbstractDataType(DataType),

    #[error("Update extent {update:?} lies outside whole extent {whole:?} on output {port} of {algorithm}")]
    ExtentOutOfBounds {
        algorithm: String,
        port: usize,
        update: crate::data::Extent,
        whole: crate::data::Extent,
    },

    #[error("{algorithm} cannot handle piece {piece} of {number_of_pieces}")]
    PieceRequestUnsupported {
        algorithm: String,
        piece: usize,
        number_of_pieces: usize,
    },

    #[error("{algorithm} requested continued execution more than {limit} times")]
    ContinueLimitExceeded { algorithm: String, limit: usize },

    #[error("Time index {index} out of range for {count} time steps")]
    TimeIndexOutOfRange { index: usize, count: usize },

    #[error("Execution aborted")]
    Aborted,

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Innermost cause, skipping `RequestFailed` wrappers.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::RequestFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
