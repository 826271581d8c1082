//! Streaming demand-driven executive.
//!
//! The pipeline owns every node and drives them through the request protocol
//! when a consumer asks for an output. An update of one output port runs:
//!
//! 1. **Information**: upstream first, `REQUEST_DATA_OBJECT` then
//!    `REQUEST_INFORMATION` on every node whose pipeline changed.
//! 2. **Time**: `REQUEST_UPDATE_TIME` forwarded upstream, then
//!    `REQUEST_TIME_DEPENDENT_INFORMATION` for nodes that announce it.
//! 3. **Update extent**: the consumer's request (defaulting to the whole
//!    extent) is clamped, handed to `REQUEST_UPDATE_EXTENT` and pushed to
//!    every input.
//! 4. **Data**: inputs are brought up to date, then `REQUEST_DATA` runs if
//!    the delivered data does not satisfy the request. An algorithm that
//!    raises `continue_executing` is run again, data phase only.
//!
//! # Architecture
//!
//! ```text
//! nodes: Vec<NodeSlot>     NodeSlot { node, outputs: Vec<Information>, inputs: Vec<Vec<PortId>> }
//! edges: Vec<Edge>         (upstream output PortId) ──► (downstream input PortId)
//! ```
//!
//! Output information lives in the producing slot. Algorithms see copies of
//! their inputs' upstream output information; request fields they write are
//! merged back upstream. Data passes run on staged outputs that are committed
//! only when the last `REQUEST_DATA` pass succeeds, so a failed update keeps
//! the previous data.

use crate::config::ExecutiveConfig;
use crate::data::{DataObject, Extent, ExtentType};
use crate::pipeline::algorithm::Algorithm;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::events::{EdgeSnapshot, EventBus, NodeSnapshot, PipelineEvent, TopologySnapshot};
use crate::pipeline::freshness;
use crate::pipeline::id::{EdgeId, NodeId, PortId};
use crate::pipeline::information::{input_data, Information, UpdateRequest};
use crate::pipeline::node::AnyNode;
use crate::pipeline::request::{AbortFlag, Request, RequestKind};
use crate::pipeline::time::{piece_to_extent, ModifiedTime, TimeStamp};
use crate::reader::ReaderAlgorithm;
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// Largest port index a [`PortId`] can address.
const MAX_PORTS: usize = 4096;

/// Outcome of one `REQUEST_DATA` pass.
enum DataPass {
    /// The algorithm finished; these outputs are ready to commit.
    Done(Vec<Information>),
    Continue,
}

/// A connection from an output port of one node to an input port of another.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub from: PortId,
    pub to: PortId,
}

/// A slot holding a node and its per-port pipeline state.
struct NodeSlot {
    node: AnyNode,
    outputs: Vec<Information>,
    /// Upstream output feeding each connection of each input port.
    inputs: Vec<Vec<PortId>>,
    /// Structural changes: connections, explicit `Pipeline::modified`.
    modified: ModifiedTime,
    information_time: u64,
    data_time: u64,
}

impl NodeSlot {
    fn new(node: AnyNode) -> Self {
        let ports = node.ports();
        let inputs = vec![Vec::new(); ports.number_of_inputs()];
        let outputs = vec![Information::new(); ports.number_of_outputs()];
        Self {
            node,
            outputs,
            inputs,
            modified: ModifiedTime::new(),
            information_time: 0,
            data_time: 0,
        }
    }

    fn upstream_ports(&self) -> Vec<PortId> {
        let mut ports: Vec<PortId> = Vec::new();
        for source in self.inputs.iter().flatten() {
            if !ports.contains(source) {
                ports.push(*source);
            }
        }
        ports
    }

    fn upstream_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = Vec::new();
        for source in self.inputs.iter().flatten() {
            if !nodes.contains(&source.node()) {
                nodes.push(source.node());
            }
        }
        nodes
    }
}

/// The pipeline graph and its executive.
pub struct Pipeline {
    nodes: Vec<NodeSlot>,
    edges: Vec<Edge>,
    next_edge: u32,
    config: ExecutiveConfig,
    events: EventBus,
    abort: AbortFlag,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(ExecutiveConfig::default())
    }
}

impl Pipeline {
    pub fn new(config: ExecutiveConfig) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            next_edge: 0,
            config,
            events: EventBus::new(),
            abort: AbortFlag::new(),
        }
    }

    pub fn config(&self) -> &ExecutiveConfig {
        &self.config
    }

    // ── Graph building ──

    /// Add a node to the pipeline. Returns its NodeId.
    pub fn add_node(&mut self, node: AnyNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        tracing::debug!("Added {} as {:?}", node.class_name(), id);
        self.nodes.push(NodeSlot::new(node));
        id
    }

    pub fn add_algorithm(&mut self, algorithm: impl Algorithm + 'static) -> NodeId {
        self.add_node(AnyNode::algorithm(algorithm))
    }

    pub fn add_reader(&mut self, reader: impl ReaderAlgorithm + 'static) -> NodeId {
        self.add_node(AnyNode::reader(reader))
    }

    /// Make `from:from_port` the only connection of `to:to_port`.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_port: usize,
        to: NodeId,
        to_port: usize,
    ) -> PipelineResult<EdgeId> {
        self.validate_connection(from, from_port, to, to_port)?;
        self.remove_input_edges(to, to_port);
        Ok(self.insert_edge(from, from_port, to, to_port))
    }

    /// Append a connection to a repeatable input port.
    pub fn add_connection(
        &mut self,
        from: NodeId,
        from_port: usize,
        to: NodeId,
        to_port: usize,
    ) -> PipelineResult<EdgeId> {
        self.validate_connection(from, from_port, to, to_port)?;
        let slot = &self.nodes[to.index()];
        let repeatable = slot
            .node
            .input_port_information(to_port)
            .is_some_and(|info| info.repeatable);
        if !repeatable && !slot.inputs[to_port].is_empty() {
            return Err(PipelineError::NotRepeatable {
                algorithm: slot.node.class_name().to_string(),
                port: to_port,
            });
        }
        Ok(self.insert_edge(from, from_port, to, to_port))
    }

    /// Drop every connection of `to:to_port`.
    pub fn disconnect(&mut self, to: NodeId, to_port: usize) -> PipelineResult<()> {
        self.sync_ports(to)?;
        if to_port >= self.nodes[to.index()].inputs.len() {
            return Err(PipelineError::InvalidPort {
                node_id: to,
                port: to_port,
                message: "no such input port".to_string(),
            });
        }
        self.remove_input_edges(to, to_port);
        self.nodes[to.index()].modified.modified();
        tracing::info!("Disconnected input {} of {:?}", to_port, to);
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    fn validate_connection(
        &mut self,
        from: NodeId,
        from_port: usize,
        to: NodeId,
        to_port: usize,
    ) -> PipelineResult<()> {
        self.sync_ports(from)?;
        self.sync_ports(to)?;

        if from_port >= self.nodes[from.index()].outputs.len() || from_port >= MAX_PORTS {
            return Err(PipelineError::InvalidPort {
                node_id: from,
                port: from_port,
                message: "no such output port".to_string(),
            });
        }
        if to_port >= self.nodes[to.index()].inputs.len() || to_port >= MAX_PORTS {
            return Err(PipelineError::InvalidPort {
                node_id: to,
                port: to_port,
                message: "no such input port".to_string(),
            });
        }
        if from == to || self.would_create_cycle(from, to) {
            return Err(PipelineError::CycleDetected);
        }
        Ok(())
    }

    fn insert_edge(&mut self, from: NodeId, from_port: usize, to: NodeId, to_port: usize) -> EdgeId {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;

        let source = PortId::new(from, from_port as u16);
        self.edges.push(Edge {
            id,
            from: source,
            to: PortId::new(to, to_port as u16),
        });
        let slot = &mut self.nodes[to.index()];
        slot.inputs[to_port].push(source);
        slot.modified.modified();

        tracing::info!(
            "Connected {:?}:{} -> {:?}:{} ({:?})",
            from,
            from_port,
            to,
            to_port,
            id
        );
        id
    }

    fn remove_input_edges(&mut self, to: NodeId, to_port: usize) {
        self.edges
            .retain(|e| !(e.to.node() == to && e.to.port_index() == to_port));
        self.nodes[to.index()].inputs[to_port].clear();
    }

    /// Check if adding an edge from `from` to `to` would create a cycle.
    fn would_create_cycle(&self, from: NodeId, to: NodeId) -> bool {
        // If `to` can reach `from` through existing edges, adding from->to creates a cycle.
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![to];

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            let idx = current.index();
            if idx >= self.nodes.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;

            for edge in &self.edges {
                if edge.from.node() == current {
                    stack.push(edge.to.node());
                }
            }
        }
        false
    }

    /// Bring a slot's port vectors in line with its algorithm's layout.
    fn sync_ports(&mut self, id: NodeId) -> PipelineResult<()> {
        let slot = self
            .nodes
            .get_mut(id.index())
            .ok_or(PipelineError::InvalidNode(id))?;
        let (n_in, n_out) = {
            let ports = slot.node.ports();
            (ports.number_of_inputs(), ports.number_of_outputs())
        };
        if slot.inputs.len() == n_in && slot.outputs.len() == n_out {
            return Ok(());
        }

        tracing::debug!(
            "{} ({:?}) now has {} inputs and {} outputs",
            slot.node.class_name(),
            id,
            n_in,
            n_out
        );
        slot.inputs.resize_with(n_in, Vec::new);
        slot.outputs.resize_with(n_out, Information::new);
        for out in &mut slot.outputs {
            out.reset_pipeline_information();
        }
        slot.information_time = 0;
        slot.modified.modified();

        self.edges.retain(|e| {
            let dangling_in = e.to.node() == id && e.to.port_index() >= n_in;
            let dangling_out = e.from.node() == id && e.from.port_index() >= n_out;
            !dangling_in && !dangling_out
        });
        for other in &mut self.nodes {
            for conns in &mut other.inputs {
                conns.retain(|p| !(p.node() == id && p.port_index() >= n_out));
            }
        }
        Ok(())
    }

    // ── Topological sort (Kahn's algorithm) ──

    /// Nodes ordered so every producer precedes its consumers.
    pub fn execution_order(&self) -> PipelineResult<Vec<NodeId>> {
        let n = self.nodes.len();
        let mut in_degree = vec![0u32; n];
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];

        for edge in &self.edges {
            let from = edge.from.node().index();
            let to = edge.to.node().index();
            if from < n && to < n {
                adj[from].push(to);
                in_degree[to] += 1;
            }
        }

        let mut queue: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop() {
            order.push(NodeId(node as u32));
            for &next in &adj[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push(next);
                }
            }
        }

        if order.len() != n {
            tracing::warn!(
                "Pipeline graph has a cycle! Only {} of {} nodes scheduled.",
                order.len(),
                n
            );
            return Err(PipelineError::CycleDetected);
        }
        Ok(order)
    }

    // ── Node access ──

    pub fn class_name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id.index()).map(|s| s.node.class_name())
    }

    /// Downcast a node's algorithm or reader to its concrete type.
    pub fn algorithm<T: 'static>(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id.index())?.node.as_any().downcast_ref::<T>()
    }

    /// Mutable access for changing parameters. Setters are expected to bump
    /// their own modification time.
    pub fn algorithm_mut<T: 'static>(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes
            .get_mut(id.index())?
            .node
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Force the node (and everything downstream) to re-execute on the next update.
    pub fn modified(&mut self, id: NodeId) -> PipelineResult<()> {
        let slot = self
            .nodes
            .get_mut(id.index())
            .ok_or(PipelineError::InvalidNode(id))?;
        slot.modified.modified();
        Ok(())
    }

    pub fn subscribe(&mut self) -> Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Flag polled by algorithms through `Request::abort_requested`.
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    pub fn output(&self, id: NodeId, port: usize) -> Option<Arc<DataObject>> {
        self.output_information(id, port)?.data_object.clone()
    }

    pub fn output_information(&self, id: NodeId, port: usize) -> Option<&Information> {
        self.nodes.get(id.index())?.outputs.get(port)
    }

    pub fn whole_extent(&self, id: NodeId, port: usize) -> Option<Extent> {
        self.output_information(id, port)?.whole_extent
    }

    pub fn time_steps(&self, id: NodeId, port: usize) -> Option<&[f64]> {
        self.output_information(id, port)?.time_steps.as_deref()
    }

    pub fn time_range(&self, id: NodeId, port: usize) -> Option<[f64; 2]> {
        self.output_information(id, port)?.time_range
    }

    fn output_information_mut(&mut self, id: NodeId, port: usize) -> PipelineResult<&mut Information> {
        self.check_output_port(id, port)?;
        Ok(&mut self.nodes[id.index()].outputs[port])
    }

    fn check_output_port(&mut self, id: NodeId, port: usize) -> PipelineResult<()> {
        self.sync_ports(id)?;
        let n = self.nodes[id.index()].outputs.len();
        if port >= n {
            return Err(PipelineError::InvalidPort {
                node_id: id,
                port,
                message: format!("node has {} output ports", n),
            });
        }
        Ok(())
    }

    // ── Consumer requests ──

    pub fn set_update_extent(&mut self, id: NodeId, port: usize, extent: Extent) -> PipelineResult<()> {
        self.output_information_mut(id, port)?.set_update_extent(extent);
        Ok(())
    }

    /// Like [`Pipeline::set_update_extent`], but the extent is not combined
    /// with what other consumers of this output asked for.
    pub fn set_update_extent_replace(&mut self, id: NodeId, port: usize, extent: Extent) -> PipelineResult<()> {
        self.output_information_mut(id, port)?
            .replace_update_extent_with(extent);
        Ok(())
    }

    pub fn set_update_piece(
        &mut self,
        id: NodeId,
        port: usize,
        piece: usize,
        number_of_pieces: usize,
        ghost_levels: usize,
    ) -> PipelineResult<()> {
        self.output_information_mut(id, port)?
            .set_update_piece(piece, number_of_pieces, ghost_levels);
        Ok(())
    }

    pub fn set_update_time_step(&mut self, id: NodeId, port: usize, time: f64) -> PipelineResult<()> {
        self.output_information_mut(id, port)?.update_time_step = Some(time);
        Ok(())
    }

    /// Ask the producer of this output to crop to exactly the update extent.
    pub fn set_request_exact_extent(&mut self, id: NodeId, port: usize, exact: bool) -> PipelineResult<()> {
        self.output_information_mut(id, port)?.exact_extent = exact;
        Ok(())
    }

    pub fn request_exact_extent(&self, id: NodeId, port: usize) -> bool {
        self.output_information(id, port)
            .is_some_and(|info| info.exact_extent)
    }

    // ── Update entry points ──

    pub fn update(&mut self, id: NodeId) -> PipelineResult<()> {
        self.update_port(id, 0)
    }

    /// Make output `port` of `id` current.
    pub fn update_port(&mut self, id: NodeId, port: usize) -> PipelineResult<()> {
        self.abort.reset();
        self.update_information(id)?;
        self.check_output_port(id, port)?;

        match self.propagate_and_execute(id, port) {
            Err(err) if matches!(err.root_cause(), PipelineError::PieceRequestUnsupported { .. }) => {
                tracing::warn!("{}; requesting the whole extent instead", err);
                let ghost_levels = self.config.default_ghost_levels;
                let info = &mut self.nodes[id.index()].outputs[port];
                info.set_update_extent_to_whole(ghost_levels);
                info.update_extent_initialized = true;
                self.propagate_and_execute(id, port)
            }
            other => other,
        }
    }

    /// Merge a one-off request into the output, then update it.
    pub fn update_with_request(
        &mut self,
        id: NodeId,
        port: usize,
        request: &UpdateRequest,
    ) -> PipelineResult<()> {
        self.output_information_mut(id, port)?
            .merge_update_request(request);
        self.update_port(id, port)
    }

    /// Request the whole extent of output 0 and update it.
    pub fn update_whole_extent(&mut self, id: NodeId) -> PipelineResult<()> {
        self.update_information(id)?;
        let ghost_levels = self.config.default_ghost_levels;
        let info = self.output_information_mut(id, 0)?;
        info.set_update_extent_to_whole(ghost_levels);
        info.update_extent_initialized = false;
        self.update_port(id, 0)
    }

    /// Update every node nothing else consumes.
    pub fn update_all(&mut self) -> PipelineResult<()> {
        for id in self.execution_order()? {
            let consumed = self.edges.iter().any(|e| e.from.node() == id);
            if !consumed && !self.nodes[id.index()].outputs.is_empty() {
                self.update(id)?;
            }
        }
        Ok(())
    }

    fn propagate_and_execute(&mut self, id: NodeId, port: usize) -> PipelineResult<()> {
        self.propagate_time(id, port)?;
        self.update_time_dependent_information(id, port)?;
        self.propagate_update_extent(id, port)?;
        self.update_data(id)
    }

    // ── Information phase ──

    /// Run `REQUEST_DATA_OBJECT` and `REQUEST_INFORMATION` wherever the
    /// pipeline changed since the last information pass, upstream first.
    pub fn update_information(&mut self, id: NodeId) -> PipelineResult<()> {
        self.sync_ports(id)?;
        let upstream = self.nodes[id.index()].upstream_nodes();
        for &source in &upstream {
            self.update_information(source)?;
        }

        let pipeline_mtime = self.pipeline_mtime(id);
        let newest_upstream = upstream
            .iter()
            .map(|u| self.nodes[u.index()].information_time)
            .max()
            .unwrap_or(0);
        let slot = &self.nodes[id.index()];
        let missing = slot.outputs.iter().any(|o| o.data_object.is_none());
        if !missing
            && slot.information_time >= pipeline_mtime
            && slot.information_time >= newest_upstream
        {
            return Ok(());
        }

        self.check_inputs(id)?;
        let mut inputs = self.gather_inputs(id);
        let mut outputs = std::mem::take(&mut self.nodes[id.index()].outputs);
        let result = self.execute_information(id, &mut inputs, &mut outputs);
        let slot = &mut self.nodes[id.index()];
        slot.outputs = outputs;
        result?;
        slot.information_time = TimeStamp::next();
        Ok(())
    }

    fn execute_information(
        &mut self,
        id: NodeId,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        let mut request = self.request(id, RequestKind::DataObject, None);
        self.call_algorithm(id, &mut request, inputs, outputs)?;
        for (port, out) in outputs.iter().enumerate() {
            if out.data_object.is_none() {
                return Err(PipelineError::MissingDataObject {
                    algorithm: self.nodes[id.index()].node.class_name().to_string(),
                    port,
                });
            }
        }

        for out in outputs.iter_mut() {
            out.reset_pipeline_information();
            if let Some(input) = inputs.first().and_then(|conns| conns.first()) {
                out.copy_metadata_from(input);
            }
        }

        let mut request = self.request(id, RequestKind::Information, None);
        self.call_algorithm(id, &mut request, inputs, outputs)?;

        for out in outputs.iter_mut() {
            if is_structured(out) && out.whole_extent.is_none() {
                out.whole_extent = Some(Extent::EMPTY);
            }
        }
        Ok(())
    }

    // ── Time passes ──

    /// Forward the requested time upstream through `REQUEST_UPDATE_TIME`.
    pub fn propagate_time(&mut self, id: NodeId, port: usize) -> PipelineResult<()> {
        self.check_output_port(id, port)?;
        if !self.needs_time_pass(id, port) {
            return Ok(());
        }

        let mut inputs = self.gather_inputs(id);
        if let Some(time) = self.nodes[id.index()].outputs[port].update_time_step {
            for info in inputs.iter_mut().flatten() {
                info.update_time_step = Some(time);
            }
        }

        let mut request = self.request(id, RequestKind::UpdateTime, Some(port));
        self.call_with_outputs(id, &mut request, &mut inputs)?;

        let mut sources = Vec::new();
        for (p, conns) in inputs.iter().enumerate() {
            for (c, info) in conns.iter().enumerate() {
                let Some(time) = info.update_time_step else {
                    continue;
                };
                if let Some(source) = self.push_upstream(id, p, c, &UpdateRequest::time_step(time)) {
                    if !sources.contains(&source) {
                        sources.push(source);
                    }
                }
            }
        }
        for source in sources {
            self.propagate_time(source.node(), source.port_index())?;
        }
        Ok(())
    }

    /// Run `REQUEST_TIME_DEPENDENT_INFORMATION`, upstream first.
    pub fn update_time_dependent_information(&mut self, id: NodeId, port: usize) -> PipelineResult<()> {
        self.check_output_port(id, port)?;
        if !self.needs_time_pass(id, port) {
            return Ok(());
        }

        for source in self.nodes[id.index()].upstream_ports() {
            self.update_time_dependent_information(source.node(), source.port_index())?;
        }

        let mut inputs = self.gather_inputs(id);
        let mut request = self.request(id, RequestKind::TimeDependentInformation, Some(port));
        self.call_with_outputs(id, &mut request, &mut inputs)
    }

    fn needs_time_pass(&self, id: NodeId, port: usize) -> bool {
        let newest = self.newest_input(id);
        let slot = &self.nodes[id.index()];
        let Some(out) = slot.outputs.get(port) else {
            return false;
        };
        if freshness::data_is_stale(out, slot.data_time, newest) {
            return true;
        }
        out.time_dependent_information
            && out
                .data_object()
                .is_some_and(|data| freshness::need_to_execute_based_on_time(out, data))
    }

    // ── Update-extent phase ──

    /// Settle the request on output `port`, let the algorithm translate it
    /// into input requests, and push those upstream.
    pub fn propagate_update_extent(&mut self, id: NodeId, port: usize) -> PipelineResult<()> {
        self.check_output_port(id, port)?;
        let ghost_levels = self.config.default_ghost_levels;
        let clamp = self.config.clamp_update_extent;
        let newest = self.newest_input(id);

        let slot = &mut self.nodes[id.index()];
        let algorithm = slot.node.class_name().to_string();
        let is_source = slot.node.ports().number_of_inputs() == 0;
        let data_time = slot.data_time;
        let out = &mut slot.outputs[port];
        settle_update_request(out, ghost_levels, clamp, &algorithm, port)?;

        // Consumers sharing this output get the union of their extents until
        // a request is met by the data already delivered.
        if is_structured(out) && !out.replace_update_extent {
            out.combine_update_extent();
        }
        if !freshness::need_to_execute_data(out, data_time, newest) {
            out.combined_update_extent = None;
        }

        let pieces = out.piece_request();
        if is_source
            && pieces.number_of_pieces > 1
            && pieces.piece > 0
            && !out.can_handle_piece_request
            && !out.can_produce_sub_extent
        {
            return Err(PipelineError::PieceRequestUnsupported {
                algorithm,
                piece: pieces.piece,
                number_of_pieces: pieces.number_of_pieces,
            });
        }

        let mut inputs = self.gather_inputs(id);
        {
            let out = &self.nodes[id.index()].outputs[port];
            let out_structured = is_structured(out);
            for info in inputs.iter_mut().flatten() {
                info.update_extent = if out_structured && is_structured(info) {
                    out.update_extent.or(info.whole_extent)
                } else {
                    info.whole_extent
                };
                info.replace_update_extent = false;
                info.copy_request_from(out);
            }
        }

        let mut request = self.request(id, RequestKind::UpdateExtent, Some(port));
        self.call_with_outputs(id, &mut request, &mut inputs)?;

        let mut sources = Vec::new();
        for (p, conns) in inputs.iter().enumerate() {
            for (c, info) in conns.iter().enumerate() {
                if let Some(source) = self.push_upstream(id, p, c, &info.update_request()) {
                    if !sources.contains(&source) {
                        sources.push(source);
                    }
                }
            }
        }
        for source in sources {
            self.propagate_update_extent(source.node(), source.port_index())?;
        }
        Ok(())
    }

    // ── Data phase ──

    /// Bring inputs up to date, then execute if the output is stale.
    pub fn update_data(&mut self, id: NodeId) -> PipelineResult<()> {
        self.sync_ports(id)?;
        for source in self.nodes[id.index()].upstream_nodes() {
            self.update_data(source)?;
        }

        if !self.need_to_execute(id) {
            tracing::debug!(
                "{} ({:?}) is up to date",
                self.nodes[id.index()].node.class_name(),
                id
            );
            return Ok(());
        }
        self.execute_data(id)
    }

    fn need_to_execute(&self, id: NodeId) -> bool {
        let newest = self.newest_input(id);
        let slot = &self.nodes[id.index()];
        if slot.outputs.is_empty() {
            return newest > slot.data_time;
        }
        slot.outputs
            .iter()
            .any(|out| freshness::need_to_execute_data(out, slot.data_time, newest))
    }

    /// Run `REQUEST_DATA` until the algorithm stops asking to continue, then
    /// commit the final pass. Intermediate passes never reach the slot, so an
    /// error on any pass leaves the previous outputs and data time untouched.
    fn execute_data(&mut self, id: NodeId) -> PipelineResult<()> {
        let limit = self.config.max_continue_iterations;
        let mut pass = 0usize;
        let staged = loop {
            match self.execute_data_pass(id, pass)? {
                DataPass::Done(staged) => break staged,
                DataPass::Continue => {
                    pass += 1;
                    if pass >= limit {
                        return Err(PipelineError::ContinueLimitExceeded {
                            algorithm: self.nodes[id.index()].node.class_name().to_string(),
                            limit,
                        });
                    }
                    tracing::debug!(
                        "{} ({:?}) continues executing (pass {})",
                        self.nodes[id.index()].node.class_name(),
                        id,
                        pass + 1
                    );
                }
            }
        };

        let slot = &mut self.nodes[id.index()];
        for (committed, out) in slot.outputs.iter_mut().zip(staged) {
            committed.data_object = out.data_object;
            committed.previous_update_time_step = out.previous_update_time_step;
        }
        slot.data_time = TimeStamp::next();
        Ok(())
    }

    /// One `REQUEST_DATA` on freshly staged outputs.
    fn execute_data_pass(&mut self, id: NodeId, pass: usize) -> PipelineResult<DataPass> {
        if self.abort.is_set() {
            return Err(PipelineError::Aborted);
        }
        self.check_inputs(id)?;

        let mut inputs = self.gather_inputs(id);
        let before: Vec<Vec<UpdateRequest>> = inputs
            .iter()
            .map(|conns| conns.iter().map(Information::update_request).collect())
            .collect();
        let input_time = input_data(&inputs, 0).and_then(|data| data.info.time_step);

        let mut staged = self.nodes[id.index()].outputs.clone();
        let mut all_pieces = Vec::with_capacity(staged.len());
        for out in staged.iter_mut() {
            if let Some(data) = &out.data_object {
                out.data_object = Some(Arc::new(data.new_instance()));
            }
            all_pieces.push(split_for_piece(out));
        }

        let mut request = self.request(id, RequestKind::Data, None);
        request.pass = pass;
        self.call_algorithm(id, &mut request, &mut inputs, &mut staged)?;

        if !request.continue_executing {
            for (out, full) in staged.iter_mut().zip(all_pieces) {
                if let Some(full) = full {
                    out.update_extent = Some(full);
                }
                mark_output_generated(out, full, input_time);
            }
            return Ok(DataPass::Done(staged));
        }

        // Requests changed during the pass are pushed upstream and satisfied
        // before the next pass; this node's own update extent is left alone.
        let mut changed = Vec::new();
        for (p, conns) in inputs.iter().enumerate() {
            for (c, info) in conns.iter().enumerate() {
                let now = info.update_request();
                if before.get(p).and_then(|b| b.get(c)) == Some(&now) {
                    continue;
                }
                if let Some(source) = self.push_upstream(id, p, c, &now) {
                    if !changed.contains(&source) {
                        changed.push(source);
                    }
                }
            }
        }
        for source in changed {
            let (node, port) = (source.node(), source.port_index());
            self.propagate_time(node, port)?;
            self.update_time_dependent_information(node, port)?;
            self.propagate_update_extent(node, port)?;
            self.update_data(node)?;
        }
        Ok(DataPass::Continue)
    }

    // ── Helpers ──

    fn request(&self, id: NodeId, kind: RequestKind, port: Option<usize>) -> Request {
        let mut request = Request::new(kind).attach(id, self.abort.clone(), self.events.clone());
        request.from_output_port = port;
        request
    }

    /// Call the algorithm on the slot's own output information.
    fn call_with_outputs(
        &mut self,
        id: NodeId,
        request: &mut Request,
        inputs: &mut [Vec<Information>],
    ) -> PipelineResult<()> {
        let mut outputs = std::mem::take(&mut self.nodes[id.index()].outputs);
        let result = self.call_algorithm(id, request, inputs, &mut outputs);
        self.nodes[id.index()].outputs = outputs;
        result
    }

    fn call_algorithm(
        &mut self,
        id: NodeId,
        request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        let Self { nodes, events, .. } = self;
        let slot = &mut nodes[id.index()];
        let algorithm = slot.node.class_name().to_string();
        let kind = request.kind;

        tracing::trace!("{} ({:?}) execute {}", algorithm, id, kind);
        events.emit(PipelineEvent::Start {
            node: id,
            algorithm: algorithm.clone(),
            request: kind,
        });

        match slot.node.process_request(request, inputs, outputs) {
            Ok(()) => {
                events.emit(PipelineEvent::End {
                    node: id,
                    algorithm,
                    request: kind,
                });
                Ok(())
            }
            Err(source) => {
                tracing::error!("{} ({:?}) failed {}: {}", algorithm, id, kind, source);
                events.emit(PipelineEvent::Error {
                    node: id,
                    algorithm: algorithm.clone(),
                    request: kind,
                    message: source.to_string(),
                });
                Err(PipelineError::RequestFailed {
                    node_id: id,
                    algorithm,
                    request: kind,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Copies of the upstream output information for every input connection.
    fn gather_inputs(&self, id: NodeId) -> Vec<Vec<Information>> {
        self.nodes[id.index()]
            .inputs
            .iter()
            .map(|conns| {
                conns
                    .iter()
                    .filter_map(|source| {
                        self.nodes
                            .get(source.node().index())?
                            .outputs
                            .get(source.port_index())
                            .cloned()
                    })
                    .collect()
            })
            .collect()
    }

    /// Merge a request into the upstream output feeding `port`/`conn`.
    fn push_upstream(
        &mut self,
        id: NodeId,
        port: usize,
        conn: usize,
        request: &UpdateRequest,
    ) -> Option<PortId> {
        let source = *self.nodes[id.index()].inputs.get(port)?.get(conn)?;
        let info = self
            .nodes
            .get_mut(source.node().index())?
            .outputs
            .get_mut(source.port_index())?;
        info.merge_update_request(request);
        Some(source)
    }

    fn check_inputs(&self, id: NodeId) -> PipelineResult<()> {
        let slot = &self.nodes[id.index()];
        let algorithm = slot.node.class_name();
        for (port, conns) in slot.inputs.iter().enumerate() {
            let Some(info) = slot.node.input_port_information(port) else {
                continue;
            };
            if conns.is_empty() && !info.optional {
                return Err(PipelineError::MissingInput {
                    algorithm: algorithm.to_string(),
                    port,
                });
            }
            if conns.len() > 1 && !info.repeatable {
                return Err(PipelineError::NotRepeatable {
                    algorithm: algorithm.to_string(),
                    port,
                });
            }
            for source in conns {
                let actual = self
                    .nodes
                    .get(source.node().index())
                    .and_then(|s| s.outputs.get(source.port_index()))
                    .and_then(Information::data_object)
                    .map(DataObject::data_type);
                if let Some(actual) = actual {
                    if !actual.is_a(info.required_type) {
                        return Err(PipelineError::PortMismatch {
                            algorithm: algorithm.to_string(),
                            port,
                            required: info.required_type,
                            actual,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Latest modification of this node or anything upstream of it.
    fn pipeline_mtime(&self, id: NodeId) -> u64 {
        let slot = &self.nodes[id.index()];
        let own = slot.modified.get().max(slot.node.mtime());
        slot.upstream_nodes()
            .into_iter()
            .map(|source| self.pipeline_mtime(source))
            .fold(own, u64::max)
    }

    /// Pipeline modification time or the latest upstream execution, whichever is newer.
    fn newest_input(&self, id: NodeId) -> u64 {
        let slot = &self.nodes[id.index()];
        slot.upstream_nodes()
            .into_iter()
            .map(|source| self.nodes[source.index()].data_time)
            .fold(self.pipeline_mtime(id), u64::max)
    }

    pub fn topology(&self) -> TopologySnapshot {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, slot)| NodeSnapshot {
                id: NodeId(i as u32),
                name: slot.node.class_name().to_string(),
                ports: slot.node.ports().clone(),
                output_types: slot
                    .outputs
                    .iter()
                    .map(|o| o.data_object().map(DataObject::data_type))
                    .collect(),
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .map(|e| EdgeSnapshot {
                id: e.id,
                from_node: e.from.node(),
                from_port: e.from.port_index(),
                to_node: e.to.node(),
                to_port: e.to.port_index(),
            })
            .collect();
        TopologySnapshot { nodes, edges }
    }
}

fn is_structured(info: &Information) -> bool {
    info.data_object()
        .is_some_and(|data| data.extent_type() == ExtentType::Structured)
}

/// Fill in defaults for an output's request and keep it inside the whole extent.
fn settle_update_request(
    out: &mut Information,
    ghost_levels: usize,
    clamp: bool,
    algorithm: &str,
    port: usize,
) -> PipelineResult<()> {
    if !out.update_extent_initialized {
        out.set_update_extent_to_whole(ghost_levels);
    }
    out.update_piece.get_or_insert(0);
    out.update_number_of_pieces.get_or_insert(1);
    out.update_ghost_levels.get_or_insert(ghost_levels);
    if out.update_extent.is_none() {
        out.update_extent = out.whole_extent;
    }

    if let (Some(update), Some(whole)) = (out.update_extent, out.whole_extent) {
        if !update.is_empty() && !whole.contains(&update) {
            if !clamp {
                return Err(PipelineError::ExtentOutOfBounds {
                    algorithm: algorithm.to_string(),
                    port,
                    update,
                    whole,
                });
            }
            let clamped = update.clamped_to(&whole);
            tracing::warn!(
                "{} output {}: update extent {} outside whole extent {}, clamped to {}",
                algorithm,
                port,
                update,
                whole,
                clamped
            );
            out.update_extent = Some(clamped);
        }
    }
    Ok(())
}

/// For a split request on a producer of sub-extents, narrow the update extent
/// to this piece's block. Returns the full request when split into pieces.
fn split_for_piece(out: &mut Information) -> Option<Extent> {
    let pieces = out.piece_request();
    if pieces.number_of_pieces <= 1 {
        return None;
    }
    let full = out.update_extent?;
    if out.can_produce_sub_extent {
        out.update_extent = Some(piece_to_extent(
            pieces.piece,
            pieces.number_of_pieces,
            pieces.ghost_levels,
            &full,
        ));
    }
    Some(full)
}

/// Record on the produced data what request it answers.
fn mark_output_generated(out: &mut Information, all_pieces: Option<Extent>, input_time: Option<f64>) {
    let pieces = out.piece_request();
    let requested_time = out.update_time_step;
    let has_time = out.has_time();
    let exact = out.exact_extent.then_some(out.update_extent).flatten();

    if let Some(data) = out.data_object_mut() {
        if let Some(update) = exact.filter(|u| !u.is_empty()) {
            let larger = data
                .structured_extent()
                .is_some_and(|e| e != update && e.contains(&update));
            if larger {
                data.crop(&update);
            }
        }

        let extent = data.structured_extent();
        let info = &mut data.info;
        if info.piece.is_none() {
            info.piece = Some(pieces.piece);
            info.number_of_pieces = Some(pieces.number_of_pieces);
            info.ghost_levels = info.ghost_levels.max(pieces.ghost_levels);
        }
        info.extent = extent;
        info.all_pieces_extent = all_pieces;
        if info.time_step.is_none() && has_time {
            info.time_step = input_time.or(requested_time);
        }
    }
    out.previous_update_time_step = requested_time;
}
