//! Node abstraction for the pipeline.
//!
//! Two kinds of node share one graph:
//! - **`Algorithm`**: full protocol access through information vectors.
//! - **`Reader`**: a [`ReaderAlgorithm`] driven through the
//!   [`ReaderExecutive`] translation.
//!
//! `AnyNode` wraps either variant so the executive can handle both uniformly.

use crate::pipeline::algorithm::Algorithm;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::information::Information;
use crate::pipeline::port::{InputPortInfo, PortLayout};
use crate::pipeline::request::Request;
use crate::reader::{ReaderAlgorithm, ReaderExecutive};
use std::any::Any;

pub enum AnyNode {
    Algorithm(Box<dyn Algorithm>),
    Reader(ReaderExecutive),
}

impl AnyNode {
    pub fn algorithm(algorithm: impl Algorithm + 'static) -> Self {
        AnyNode::Algorithm(Box::new(algorithm))
    }

    pub fn reader(reader: impl ReaderAlgorithm + 'static) -> Self {
        AnyNode::Reader(ReaderExecutive::new(Box::new(reader)))
    }

    pub fn class_name(&self) -> &str {
        match self {
            AnyNode::Algorithm(a) => a.class_name(),
            AnyNode::Reader(r) => r.reader().class_name(),
        }
    }

    pub fn ports(&self) -> &PortLayout {
        match self {
            AnyNode::Algorithm(a) => a.base().ports(),
            AnyNode::Reader(r) => r.ports(),
        }
    }

    /// Input port requirements as the node declares them.
    pub fn input_port_information(&self, port: usize) -> Option<InputPortInfo> {
        match self {
            AnyNode::Algorithm(a) => a.fill_input_port_information(port),
            AnyNode::Reader(r) => r.ports().inputs.get(port).cloned(),
        }
    }

    pub fn mtime(&self) -> u64 {
        match self {
            AnyNode::Algorithm(a) => a.mtime(),
            AnyNode::Reader(r) => r.reader().mtime(),
        }
    }

    pub fn process_request(
        &mut self,
        request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        match self {
            AnyNode::Algorithm(a) => a.process_request(request, inputs, outputs),
            AnyNode::Reader(r) => r.process_request(request, outputs),
        }
    }

    /// The wrapped algorithm or reader, for downcasting.
    pub fn as_any(&self) -> &dyn Any {
        match self {
            AnyNode::Algorithm(a) => a.as_ref().as_any(),
            AnyNode::Reader(r) => r.reader().as_any(),
        }
    }

    pub fn as_any_mut(&mut self) -> &mut dyn Any {
        match self {
            AnyNode::Algorithm(a) => a.as_mut().as_any_mut(),
            AnyNode::Reader(r) => r.reader_mut().as_any_mut(),
        }
    }
}
