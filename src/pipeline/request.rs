//! Requests sent from the executive to an algorithm.
//!
//! A [`Request`] names one of the six protocol phases plus the little state
//! that travels with it: the output port that triggered it, the
//! continue-executing flag an algorithm may raise during `RequestData`, and
//! handles for cooperative abort and progress reporting.

use crate::pipeline::events::{EventBus, PipelineEvent};
use crate::pipeline::id::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The closed set of protocol phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    DataObject,
    Information,
    UpdateExtent,
    UpdateTime,
    TimeDependentInformation,
    Data,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::DataObject => "REQUEST_DATA_OBJECT",
            RequestKind::Information => "REQUEST_INFORMATION",
            RequestKind::UpdateExtent => "REQUEST_UPDATE_EXTENT",
            RequestKind::UpdateTime => "REQUEST_UPDATE_TIME",
            RequestKind::TimeDependentInformation => "REQUEST_TIME_DEPENDENT_INFORMATION",
            RequestKind::Data => "REQUEST_DATA",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared cancellation flag. Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One request delivered to `Algorithm::process_request`.
#[derive(Debug, Clone)]
pub struct Request {
    pub kind: RequestKind,
    /// Output port whose consumer triggered the request, if any.
    pub from_output_port: Option<usize>,
    /// Raised by an algorithm during `RequestData` to be run again.
    pub continue_executing: bool,
    /// Zero for the first `RequestData` of an execution, then one more per
    /// continue-executing pass.
    pub pass: usize,
    node: NodeId,
    abort: AbortFlag,
    events: EventBus,
}

impl Request {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            from_output_port: None,
            continue_executing: false,
            pass: 0,
            node: NodeId::INVALID,
            abort: AbortFlag::new(),
            events: EventBus::new(),
        }
    }

    pub(crate) fn attach(mut self, node: NodeId, abort: AbortFlag, events: EventBus) -> Self {
        self.node = node;
        self.abort = abort;
        self.events = events;
        self
    }

    /// Output port the request applies to, falling back to port 0.
    pub fn output_port(&self) -> usize {
        self.from_output_port.unwrap_or(0)
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.is_set()
    }

    /// Report progress of the running `RequestData`.
    pub fn update_progress(&self, fraction: f64) {
        self.events.emit_shared(PipelineEvent::Progress {
            node: self.node,
            fraction: fraction.clamp(0.0, 1.0),
        });
    }
}
