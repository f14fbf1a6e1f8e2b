//! Graph executor: builder, phase scheduler and watchdog.
//!
//! A run proceeds phase by phase in ascending phase number:
//! 1. Every component of the phase gets its own named thread.
//! 2. Each thread runs `pre_execute`, then waits at the phase barrier so no
//!    component executes before all of them are prepared.
//! 3. `execute` runs until the component returns. On success the runtime
//!    signals EOF on all outputs, checks that no input was left unread, and
//!    calls `post_execute`. On failure the component's ports are dropped, so
//!    consumers observe EOF and producers get `PortClosed`.
//! 4. Threads report to a watchdog over a channel. A failure stops the whole
//!    graph (unless disabled or the error is an ordering violation), and a
//!    failed phase prevents later phases from starting.

use crate::config::EngineConfig;
use crate::error::{FlowError, Result, ResultExt};
use crate::graph::edge::{self, EdgeOptions, InputPort, OutputPort};
use crate::graph::error::GraphError;
use crate::graph::id::{EdgeId, NodeId, PortRef};
use crate::graph::node::{Component, InitContext, NodeContext};
use crate::graph::port::{validate_ports, PortDirection};
use crate::graph::registry::Registry;
use crate::graph::status::NodeStatus;
use crate::graph::stop::{stop_pair, StopHandle, StopSignal};
use crate::record::Schema;
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

/// A connection from an output port to an input port.
#[derive(Debug, Clone)]
pub struct EdgeDef {
    pub id: EdgeId,
    pub from: PortRef,
    pub to: PortRef,
    pub schema: Arc<Schema>,
}

struct NodeEntry {
    component: Box<dyn Component>,
    phase: u32,
}

/// Assembles and validates a graph.
pub struct GraphBuilder {
    config: EngineConfig,
    registry: Registry,
    nodes: Vec<NodeEntry>,
    edges: Vec<EdgeDef>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Add a component to run in `phase`. Returns its NodeId.
    pub fn add_node(&mut self, component: impl Component + 'static, phase: u32) -> NodeId {
        self.add_boxed(Box::new(component), phase)
    }

    pub fn add_boxed(&mut self, component: Box<dyn Component>, phase: u32) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeEntry { component, phase });
        id
    }

    /// Connect output `out_port` of `from` to input `in_port` of `to`.
    pub fn connect(
        &mut self,
        from: NodeId,
        out_port: usize,
        to: NodeId,
        in_port: usize,
        schema: Arc<Schema>,
    ) -> Result<EdgeId> {
        for node in [from, to] {
            if node.index() >= self.nodes.len() {
                return Err(GraphError::UnknownNode(node).into());
            }
        }
        if from == to {
            return Err(GraphError::InvalidEdge(format!("{:?} is connected to itself", from)).into());
        }

        let from = PortRef::new(from, out_port);
        let to = PortRef::new(to, in_port);
        if self.edges.iter().any(|e| e.from == from) {
            return Err(GraphError::InvalidEdge(format!("output {:?} is already connected", from)).into());
        }
        if self.edges.iter().any(|e| e.to == to) {
            return Err(GraphError::InvalidEdge(format!("input {:?} is already connected", to)).into());
        }

        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(EdgeDef {
            id,
            from,
            to,
            schema,
        });
        Ok(id)
    }

    /// Validate ports, phases and acyclicity.
    pub fn build(self) -> Result<Graph> {
        let n = self.nodes.len();

        for (i, entry) in self.nodes.iter().enumerate() {
            let id = NodeId(i as u32);
            let mut inputs: Vec<usize> = self
                .edges
                .iter()
                .filter(|e| e.to.node == id)
                .map(|e| e.to.port)
                .collect();
            let mut outputs: Vec<usize> = self
                .edges
                .iter()
                .filter(|e| e.from.node == id)
                .map(|e| e.from.port)
                .collect();
            inputs.sort_unstable();
            outputs.sort_unstable();

            let ports = entry.component.ports();
            validate_ports(ports, PortDirection::Input, &inputs)
                .and_then(|_| validate_ports(ports, PortDirection::Output, &outputs))
                .map_err(|message| GraphError::PortMismatch {
                    node: entry.component.name().to_string(),
                    message,
                })?;
        }

        for edge in &self.edges {
            let from = self.nodes[edge.from.node.index()].phase;
            let to = self.nodes[edge.to.node.index()].phase;
            if to < from {
                return Err(GraphError::PhaseOrder { from, to }.into());
            }
        }

        let order = topological_order(n, &self.edges)?;

        tracing::info!(
            "Graph built: {} components, {} edges",
            n,
            self.edges.len()
        );

        let (stop_handle, stop_signal) = stop_pair();
        Ok(Graph {
            config: self.config,
            registry: Arc::new(self.registry),
            phases: self.nodes.iter().map(|e| e.phase).collect(),
            names: self
                .nodes
                .iter()
                .map(|e| e.component.name().to_string())
                .collect(),
            kinds: self.nodes.iter().map(|e| e.component.kind()).collect(),
            components: self.nodes.into_iter().map(|e| Some(e.component)).collect(),
            edges: self.edges,
            order,
            initialized: false,
            runs: 0,
            stop_handle: Arc::new(stop_handle),
            stop_signal,
        })
    }
}

// ── Topological sort (Kahn's algorithm) ──

fn topological_order(n: usize, edges: &[EdgeDef]) -> Result<Vec<usize>> {
    let mut in_degree = vec![0u32; n];
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];

    for edge in edges {
        let from = edge.from.node.index();
        let to = edge.to.node.index();
        adj[from].push(to);
        in_degree[to] += 1;
    }

    let mut queue: Vec<usize> = (0..n).rev().filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = queue.pop() {
        order.push(node);
        for &next in &adj[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push(next);
            }
        }
    }

    if order.len() != n {
        tracing::warn!(
            "Graph has a cycle! Only {} of {} components scheduled.",
            order.len(),
            n
        );
        return Err(GraphError::CycleDetected {
            scheduled: order.len(),
            total: n,
        }
        .into());
    }
    Ok(order)
}

/// Outcome of one component in one run.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub id: NodeId,
    pub name: String,
    pub kind: &'static str,
    pub phase: u32,
    pub status: NodeStatus,
    /// Error message for failed components
    pub message: Option<String>,
    /// Records read per input port
    pub records_in: Vec<u64>,
    /// Records written per output port
    pub records_out: Vec<u64>,
}

impl NodeReport {
    fn port_summary(&self) -> String {
        let ins = self
            .records_in
            .iter()
            .enumerate()
            .map(|(i, n)| format!("In{}: {} recs", i, n));
        let outs = self
            .records_out
            .iter()
            .enumerate()
            .map(|(i, n)| format!("Out{}: {} recs", i, n));
        ins.chain(outs).collect::<Vec<_>>().join(", ")
    }
}

/// Outcome of a graph run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub status: NodeStatus,
    pub nodes: Vec<NodeReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn is_ok(&self) -> bool {
        self.status == NodeStatus::Ok
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeReport> {
        self.nodes.get(id.index())
    }

    pub fn by_name(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|r| r.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|r| r.status.is_failure())
    }
}

/// Messages from component threads to the watchdog.
#[derive(Debug)]
enum NodeEvent {
    Started {
        id: NodeId,
    },
    Finished {
        id: NodeId,
        status: NodeStatus,
        message: Option<String>,
        aborts_graph: bool,
    },
}

/// A validated graph, ready to run.
pub struct Graph {
    config: EngineConfig,
    registry: Arc<Registry>,
    components: Vec<Option<Box<dyn Component>>>,
    names: Vec<String>,
    kinds: Vec<&'static str>,
    phases: Vec<u32>,
    edges: Vec<EdgeDef>,
    order: Vec<usize>,
    initialized: bool,
    runs: u64,
    stop_handle: Arc<StopHandle>,
    stop_signal: StopSignal,
}

impl Graph {
    pub fn edges(&self) -> &[EdgeDef] {
        &self.edges
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Handle that stops the next (or current) run from another thread.
    pub fn stop_handle(&self) -> Arc<StopHandle> {
        Arc::clone(&self.stop_handle)
    }

    /// Components in dependency order.
    pub fn execution_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().map(|&i| NodeId(i as u32))
    }

    fn init_components(&mut self) -> Result<()> {
        for i in 0..self.components.len() {
            let id = NodeId(i as u32);
            let mut input_schemas: Vec<(usize, Arc<Schema>)> = Vec::new();
            let mut output_schemas: Vec<(usize, Arc<Schema>)> = Vec::new();
            for edge in &self.edges {
                if edge.to.node == id {
                    input_schemas.push((edge.to.port, Arc::clone(&edge.schema)));
                }
                if edge.from.node == id {
                    output_schemas.push((edge.from.port, Arc::clone(&edge.schema)));
                }
            }
            input_schemas.sort_by_key(|(p, _)| *p);
            output_schemas.sort_by_key(|(p, _)| *p);

            let ctx = InitContext {
                id,
                name: &self.names[i],
                phase: self.phases[i],
                input_schemas: input_schemas.into_iter().map(|(_, s)| s).collect(),
                output_schemas: output_schemas.into_iter().map(|(_, s)| s).collect(),
                registry: &self.registry,
                config: &self.config,
            };

            let component = self.components[i]
                .as_mut()
                .ok_or_else(|| lost_component(&self.names[i]))?;
            component
                .init(&ctx)
                .with_context(|| format!("Failed to initialize component '{}'", self.names[i]))?;
            tracing::debug!("Initialized {} '{}'", self.kinds[i], self.names[i]);
        }
        Ok(())
    }

    /// Create every edge of the graph for one run.
    fn open_edges(&self) -> (Vec<Vec<Option<InputPort>>>, Vec<Vec<Option<OutputPort>>>) {
        let n = self.components.len();
        let mut inputs: Vec<Vec<Option<InputPort>>> = (0..n).map(|_| Vec::new()).collect();
        let mut outputs: Vec<Vec<Option<OutputPort>>> = (0..n).map(|_| Vec::new()).collect();

        for edge in &self.edges {
            let same_phase = self.phases[edge.from.node.index()] == self.phases[edge.to.node.index()];
            let options = EdgeOptions {
                capacity: same_phase.then_some(self.config.edge.capacity),
                record_limit: self.config.edge.record_limit,
            };
            let (out, inp) = edge::channel(
                edge.id,
                Arc::clone(&edge.schema),
                options,
                self.stop_signal.clone(),
            );

            let slots = &mut inputs[edge.to.node.index()];
            if slots.len() <= edge.to.port {
                slots.resize_with(edge.to.port + 1, || None);
            }
            slots[edge.to.port] = Some(inp);

            let slots = &mut outputs[edge.from.node.index()];
            if slots.len() <= edge.from.port {
                slots.resize_with(edge.from.port + 1, || None);
            }
            slots[edge.from.port] = Some(out);
        }
        (inputs, outputs)
    }

    fn not_run_report(&self, i: usize) -> NodeReport {
        NodeReport {
            id: NodeId(i as u32),
            name: self.names[i].clone(),
            kind: self.kinds[i],
            phase: self.phases[i],
            status: NodeStatus::NotAvailable,
            message: None,
            records_in: Vec::new(),
            records_out: Vec::new(),
        }
    }

    /// Run every phase to completion.
    ///
    /// Configuration errors from `init` are returned as `Err` before any
    /// component thread starts; runtime failures are reported per component
    /// in the summary.
    pub fn run(&mut self) -> Result<RunSummary> {
        let started = Instant::now();

        if !self.initialized {
            self.init_components()?;
            self.initialized = true;
        } else {
            for (i, slot) in self.components.iter_mut().enumerate() {
                let component = slot.as_mut().ok_or_else(|| lost_component(&self.names[i]))?;
                component.reset()?;
            }
            self.registry.reset();
            let (handle, signal) = stop_pair();
            self.stop_handle = Arc::new(handle);
            self.stop_signal = signal;
        }
        self.runs += 1;

        let (mut inputs, mut outputs) = self.open_edges();
        let mut reports: Vec<NodeReport> = (0..self.components.len())
            .map(|i| self.not_run_report(i))
            .collect();

        let mut phases: Vec<u32> = self.phases.clone();
        phases.sort_unstable();
        phases.dedup();

        let (event_tx, event_rx) = crossbeam_channel::unbounded::<NodeEvent>();
        let stop_handle = Arc::clone(&self.stop_handle);
        let abort_on_error = self.config.runtime.abort_on_error;

        std::thread::scope(|scope| {
            let watchdog_thread = scope.spawn(|| watchdog(event_rx, &stop_handle, abort_on_error));

            for &phase in &phases {
                if !stop_handle.is_running() {
                    tracing::warn!("Graph stopped, phase {} not started", phase);
                    break;
                }
                tracing::info!("Starting phase {}", phase);

                let members: Vec<usize> = self
                    .order
                    .iter()
                    .copied()
                    .filter(|&i| self.phases[i] == phase)
                    .collect();

                let finished = self.run_phase(&members, &mut inputs, &mut outputs, &event_tx);
                let mut phase_failed = false;
                for (i, component, report) in finished {
                    phase_failed |= report.status.is_failure() || report.status == NodeStatus::Aborted;
                    self.components[i] = component;
                    reports[i] = report;
                }

                if phase_failed {
                    tracing::error!("Phase {} finished with errors", phase);
                    break;
                }
                tracing::info!("Phase {} finished OK", phase);
            }

            drop(event_tx);
            if watchdog_thread.join().is_err() {
                tracing::error!("Watchdog thread panicked");
            }
        });

        let status = reports
            .iter()
            .filter(|r| r.status != NodeStatus::NotAvailable)
            .fold(NodeStatus::Ok, |acc, r| acc.worst(r.status));
        let status = if reports.iter().any(|r| r.status == NodeStatus::NotAvailable)
            && status == NodeStatus::Ok
        {
            NodeStatus::Aborted
        } else {
            status
        };

        let elapsed = started.elapsed();
        tracing::info!("Graph run {} finished with status {} in {:?}", self.runs, status, elapsed);
        Ok(RunSummary {
            status,
            nodes: reports,
            elapsed,
        })
    }

    fn run_phase(
        &mut self,
        members: &[usize],
        inputs: &mut [Vec<Option<InputPort>>],
        outputs: &mut [Vec<Option<OutputPort>>],
        events: &Sender<NodeEvent>,
    ) -> Vec<(usize, Option<Box<dyn Component>>, NodeReport)> {
        let (start_tx, start_rx) = crossbeam_channel::unbounded::<Arc<Barrier>>();
        let mut finished = Vec::with_capacity(members.len());

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(members.len());

            for &i in members {
                let id = NodeId(i as u32);
                let Some(component) = self.components[i].take() else {
                    let mut report = self.not_run_report(i);
                    report.status = NodeStatus::FatalError;
                    report.message = Some(lost_component(&self.names[i]).to_string());
                    finished.push((i, None, report));
                    continue;
                };

                let ctx = NodeContext::new(
                    id,
                    self.names[i].clone(),
                    std::mem::take(&mut inputs[i]).into_iter().flatten().collect(),
                    std::mem::take(&mut outputs[i]).into_iter().flatten().collect(),
                    self.stop_signal.clone(),
                    Arc::clone(&self.registry),
                );
                let meta = (self.kinds[i], self.phases[i]);
                let thread_name = format!("{}-{}-{}", self.config.runtime.thread_prefix, i, self.names[i]);
                let start = start_rx.clone();
                let events = events.clone();

                let spawned = std::thread::Builder::new()
                    .name(thread_name)
                    .spawn_scoped(scope, move || run_node(component, ctx, meta, start, events));
                match spawned {
                    Ok(handle) => handles.push((i, handle)),
                    Err(e) => {
                        tracing::error!("Failed to spawn thread for '{}': {}", self.names[i], e);
                        self.stop_handle.stop();
                        let mut report = self.not_run_report(i);
                        report.status = NodeStatus::FatalError;
                        report.message = Some(format!("thread spawn failed: {}", e));
                        finished.push((i, None, report));
                    }
                }
            }

            let barrier = Arc::new(Barrier::new(handles.len()));
            for _ in 0..handles.len() {
                let _ = start_tx.send(Arc::clone(&barrier));
            }

            for (i, handle) in handles {
                match handle.join() {
                    Ok((component, report)) => finished.push((i, Some(component), report)),
                    Err(_) => {
                        tracing::error!("Component '{}' panicked", self.names[i]);
                        self.stop_handle.stop();
                        let mut report = self.not_run_report(i);
                        report.status = NodeStatus::FatalError;
                        report.message = Some("component thread panicked".to_string());
                        finished.push((i, None, report));
                    }
                }
            }
        });
        finished
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        for component in self.components.iter_mut().flatten() {
            component.free();
        }
    }
}

fn lost_component(name: &str) -> FlowError {
    FlowError::Configuration(format!(
        "Component '{}' is unavailable after an earlier failure",
        name
    ))
}

/// Body of one component thread.
fn run_node(
    mut component: Box<dyn Component>,
    mut ctx: NodeContext,
    (kind, phase): (&'static str, u32),
    start: Receiver<Arc<Barrier>>,
    events: Sender<NodeEvent>,
) -> (Box<dyn Component>, NodeReport) {
    let id = ctx.id();
    let span = tracing::info_span!("node", id = id.0, name = %ctx.name());
    let _enter = span.enter();

    let prepared = component.pre_execute();
    if let Ok(barrier) = start.recv() {
        barrier.wait();
    }
    let _ = events.send(NodeEvent::Started { id });

    let outcome = prepared.and_then(|_| component.execute(&mut ctx));
    let (status, error) = match outcome {
        Ok(NodeStatus::Ok) => finish_ok(component.as_mut(), &mut ctx),
        Ok(other) => (other, None),
        Err(e) => (e.status(), Some(e)),
    };

    let mut report = NodeReport {
        id,
        name: ctx.name().to_string(),
        kind,
        phase,
        status,
        message: error.as_ref().map(|e| e.to_string()),
        records_in: ctx.records_in(),
        records_out: ctx.records_out(),
    };

    if status.is_failure() {
        tracing::error!(
            "Component {} finished with status {}. ({}): {}",
            report.name,
            status,
            report.port_summary(),
            report.message.as_deref().unwrap_or("")
        );
    } else {
        tracing::info!(
            "Component {} finished with status {}. ({})",
            report.name,
            status,
            report.port_summary()
        );
    }

    // Dropping the ports releases neighbours blocked on them.
    drop(ctx);

    let aborts_graph = error.as_ref().map(FlowError::aborts_graph).unwrap_or(false);
    let _ = events.send(NodeEvent::Finished {
        id,
        status,
        message: report.message.clone(),
        aborts_graph,
    });
    if status == NodeStatus::Aborted && report.message.is_none() {
        report.message = Some("stopped before completion".to_string());
    }
    (component, report)
}

fn finish_ok(
    component: &mut dyn Component,
    ctx: &mut NodeContext,
) -> (NodeStatus, Option<FlowError>) {
    ctx.broadcast_eof();

    match ctx.find_unread_input() {
        Ok(None) => {}
        Ok(Some(port)) => {
            return (
                NodeStatus::Error,
                Some(FlowError::Configuration(format!(
                    "Component has finished and input port {} still contains some unread records",
                    port
                ))),
            )
        }
        Err(e) => return (e.status(), Some(e)),
    }

    match component.post_execute() {
        Ok(()) => (NodeStatus::Ok, None),
        Err(e) => (e.status(), Some(e)),
    }
}

/// Collects component events and stops the graph on failure.
fn watchdog(events: Receiver<NodeEvent>, stop: &StopHandle, abort_on_error: bool) {
    for event in events.iter() {
        match event {
            NodeEvent::Started { id } => tracing::debug!("Component {} started", id),
            NodeEvent::Finished {
                id,
                status,
                message,
                aborts_graph,
            } => {
                tracing::debug!("Component {} reported {}", id, status);
                if status.is_failure() && abort_on_error && aborts_graph && stop.is_running() {
                    tracing::warn!(
                        "Stopping graph after failure of component {}: {}",
                        id,
                        message.as_deref().unwrap_or("unknown error")
                    );
                    stop.stop();
                }
            }
        }
    }
}
