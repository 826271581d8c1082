//! Observer side of the pipeline.
//!
//! Subscribers receive [`PipelineEvent`]s over crossbeam channels while an
//! update runs. The executive never blocks on a subscriber: channels are
//! unbounded and disconnected receivers are pruned on the next send.

use crate::data::DataType;
use crate::pipeline::id::{EdgeId, NodeId};
use crate::pipeline::port::PortLayout;
use crate::pipeline::request::RequestKind;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Progress and lifecycle notifications emitted during an update.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// An algorithm is about to handle a request.
    Start {
        node: NodeId,
        algorithm: String,
        request: RequestKind,
    },
    /// An algorithm finished a request successfully.
    End {
        node: NodeId,
        algorithm: String,
        request: RequestKind,
    },
    /// Fraction in `[0, 1]` reported from inside `RequestData`.
    Progress { node: NodeId, fraction: f64 },
    /// A request failed; the message carries the full error chain.
    Error {
        node: NodeId,
        algorithm: String,
        request: RequestKind,
        message: String,
    },
}

/// Fan-out list of subscriber channels.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    senders: Vec<Sender<PipelineEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<PipelineEvent> {
        let (tx, rx) = unbounded();
        self.senders.push(tx);
        rx
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    pub fn emit(&mut self, event: PipelineEvent) {
        if self.senders.is_empty() {
            return;
        }
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Send without pruning, for use through a shared reference.
    pub fn emit_shared(&self, event: PipelineEvent) {
        for tx in &self.senders {
            let _ = tx.send(event.clone());
        }
    }
}

/// Snapshot of a single pipeline node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub name: String,
    pub ports: PortLayout,
    /// Concrete type currently held on each output, if any.
    pub output_types: Vec<Option<DataType>>,
}

/// Snapshot of a single pipeline edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub id: EdgeId,
    pub from_node: NodeId,
    pub from_port: usize,
    pub to_node: NodeId,
    pub to_port: usize,
}

/// Complete topology snapshot of the pipeline graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}
