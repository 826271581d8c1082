//! # streamexec: demand-driven streaming pipeline
//!
//! A pull-based dataflow executive. Algorithms are wired into a graph and
//! nothing runs until a consumer asks for an output; the executive then
//! negotiates metadata, time, extents and pieces upstream and re-executes only
//! what the request is not already satisfied by.
//!
//! ## Architecture
//!
//! - **Pipeline**: the executive and its request protocol ([`pipeline`])
//! - **Data**: the data objects flowing through ports ([`data`])
//! - **Readers**: a reduced contract for file-backed sources ([`reader`])
//! - **Filters**: concrete algorithms built on the protocol ([`filters`])
//!
//! ## Example
//!
//! ```ignore
//! use streamexec::filters::{ExtractExtent, ImageSource};
//! use streamexec::data::Extent;
//! use streamexec::pipeline::Pipeline;
//!
//! let mut pipeline = Pipeline::default();
//! let source = pipeline.add_algorithm(ImageSource::new([64, 64, 64]));
//! let voi = pipeline.add_algorithm(ExtractExtent::new(Extent::new(0, 15, 0, 15, 0, 15)));
//! pipeline.connect(source, 0, voi, 0)?;
//!
//! pipeline.set_update_piece(voi, 0, 1, 4, 0)?;
//! pipeline.update(voi)?;
//! let image = pipeline.output(voi, 0);
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod filters;
pub mod pipeline;
pub mod reader;

// Re-export commonly used types
pub use config::AppConfig;
pub use data::{DataObject, DataType, Extent};
pub use error::{Result, StreamExecError};
pub use pipeline::{Algorithm, Pipeline, PipelineError, PipelineResult, RequestKind};
pub use reader::{ReaderAlgorithm, ReaderExecutive};
