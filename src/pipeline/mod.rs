//! Demand-driven streaming pipeline.
//!
//! Algorithms are connected output-to-input into a directed acyclic graph
//! owned by a [`Pipeline`]. Nothing executes until a consumer asks for an
//! output; the executive then walks upstream, negotiating what each node
//! must produce, and re-executes only what is stale.
//!
//! # Architecture
//!
//! ```text
//! [ImageSource] ──► [ExtractExtent] ──► consumer
//! [Reader]      ──► [PointDensity]  ──► consumer
//!
//! update(port)
//!   ├─ information   REQUEST_DATA_OBJECT, REQUEST_INFORMATION   (upstream first)
//!   ├─ time          REQUEST_UPDATE_TIME, REQUEST_TIME_DEPENDENT_INFORMATION
//!   ├─ extent        REQUEST_UPDATE_EXTENT                      (downstream first)
//!   └─ data          REQUEST_DATA                               (upstream first, cached)
//! ```
//!
//! # Design
//!
//! - **Closed request set**: [`RequestKind`] is an enum; algorithms match on it.
//! - **Typed information**: [`Information`] is a plain struct, not a key map.
//! - **Arena graph**: nodes live in a `Vec`, addressed by [`NodeId`].
//! - **Staged outputs**: data is committed only when `REQUEST_DATA` succeeds.
//! - **Events**: [`PipelineEvent`]s go out over crossbeam channels.

pub mod algorithm;
pub mod error;
pub mod events;
pub mod executor;
pub mod freshness;
pub mod id;
pub mod information;
pub mod node;
pub mod port;
pub mod request;
pub mod time;

pub use algorithm::{default_request_data_object, Algorithm, AlgorithmBase, AsAny};
pub use error::{PipelineError, PipelineResult};
pub use events::{EdgeSnapshot, EventBus, NodeSnapshot, PipelineEvent, TopologySnapshot};
pub use executor::{Edge, Pipeline};
pub use id::{EdgeId, NodeId, PortId};
pub use information::{input_data, input_information, Information, PieceRequest, UpdateRequest};
pub use node::AnyNode;
pub use port::{InputPortInfo, OutputPortInfo, OutputType, PortLayout};
pub use request::{AbortFlag, Request, RequestKind};
