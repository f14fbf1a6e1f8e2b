//! Component abstraction for the graph.
//!
//! Every component kind is an independent type implementing [`Component`].
//! Shared behaviour (traversal patterns, file windows) lives in helper types
//! the components compose, not in a base type.
//!
//! Lifecycle per graph run:
//!
//! ```text
//! init -> pre_execute -> execute -> post_execute -> ... -> free
//!         (once per phase run; reset between runs)
//! ```

use crate::config::EngineConfig;
use crate::error::{FlowError, Result};
use crate::graph::edge::{self, InputPort, OutputPort};
use crate::graph::id::NodeId;
use crate::graph::port::PortDescriptor;
use crate::graph::registry::Registry;
use crate::graph::status::NodeStatus;
use crate::graph::stop::StopSignal;
use crate::record::{Record, Schema};
use std::sync::Arc;

/// Context passed to [`Component::init`].
pub struct InitContext<'a> {
    pub id: NodeId,
    pub name: &'a str,
    pub phase: u32,
    /// Schema of each connected input port, by port number
    pub input_schemas: Vec<Arc<Schema>>,
    /// Schema of each connected output port, by port number
    pub output_schemas: Vec<Arc<Schema>>,
    pub registry: &'a Arc<Registry>,
    pub config: &'a EngineConfig,
}

impl InitContext<'_> {
    pub fn input_schema(&self, port: usize) -> Result<&Arc<Schema>> {
        self.input_schemas.get(port).ok_or_else(|| {
            FlowError::Configuration(format!("'{}': input port {} is not connected", self.name, port))
        })
    }

    pub fn output_schema(&self, port: usize) -> Result<&Arc<Schema>> {
        self.output_schemas.get(port).ok_or_else(|| {
            FlowError::Configuration(format!("'{}': output port {} is not connected", self.name, port))
        })
    }

    /// Fail unless every input and output shares the layout of input 0.
    pub fn require_uniform_schemas(&self) -> Result<()> {
        let Some(first) = self.input_schemas.first().or(self.output_schemas.first()) else {
            return Ok(());
        };
        for schema in self.input_schemas.iter().chain(&self.output_schemas) {
            if !schema.is_compatible(first) {
                return Err(FlowError::Configuration(format!(
                    "'{}': schema '{}' is incompatible with '{}'",
                    self.name,
                    schema.name(),
                    first.name()
                )));
            }
        }
        Ok(())
    }
}

/// Context passed to [`Component::execute`]: the component's ports plus the
/// graph services it may use.
pub struct NodeContext {
    id: NodeId,
    name: String,
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
    stop: StopSignal,
    registry: Arc<Registry>,
}

impl NodeContext {
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        inputs: Vec<InputPort>,
        outputs: Vec<OutputPort>,
        stop: StopSignal,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            inputs,
            outputs,
            stop,
            registry,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn input(&mut self, port: usize) -> Result<&mut InputPort> {
        let name = &self.name;
        self.inputs.get_mut(port).ok_or_else(|| {
            FlowError::Configuration(format!("'{}': input port {} is not connected", name, port))
        })
    }

    pub fn output(&mut self, port: usize) -> Result<&mut OutputPort> {
        let name = &self.name;
        self.outputs.get_mut(port).ok_or_else(|| {
            FlowError::Configuration(format!("'{}': output port {} is not connected", name, port))
        })
    }

    /// Optional output port, `None` when not connected.
    pub fn output_opt(&mut self, port: usize) -> Option<&mut OutputPort> {
        self.outputs.get_mut(port)
    }

    pub fn inputs_mut(&mut self) -> &mut [InputPort] {
        &mut self.inputs
    }

    pub fn outputs_mut(&mut self) -> &mut [OutputPort] {
        &mut self.outputs
    }

    /// Inputs and outputs borrowed together.
    pub fn ports_mut(&mut self) -> (&mut [InputPort], &mut [OutputPort]) {
        (&mut self.inputs, &mut self.outputs)
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.stop.is_running()
    }

    /// `Err(Aborted)` once the graph has been asked to stop.
    #[inline]
    pub fn check_running(&self) -> Result<()> {
        if self.stop.is_running() {
            Ok(())
        } else {
            Err(FlowError::Aborted)
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Fresh record for input `port`.
    pub fn new_input_record(&self, port: usize) -> Result<Record> {
        self.inputs
            .get(port)
            .map(|p| Record::new(Arc::clone(p.schema())))
            .ok_or_else(|| {
                FlowError::Configuration(format!(
                    "'{}': input port {} is not connected",
                    self.name, port
                ))
            })
    }

    /// Write `record` to every output port.
    pub fn broadcast(&mut self, record: &Record) -> Result<()> {
        edge::broadcast(&mut self.outputs, record)
    }

    pub fn broadcast_eof(&mut self) {
        edge::broadcast_eof(&mut self.outputs);
    }

    pub(crate) fn records_in(&self) -> Vec<u64> {
        self.inputs.iter().map(|p| p.records_read()).collect()
    }

    pub(crate) fn records_out(&self) -> Vec<u64> {
        self.outputs.iter().map(|p| p.records_written()).collect()
    }

    /// Block until each input reaches EOF; the first input still holding
    /// records is reported.
    pub(crate) fn find_unread_input(&mut self) -> Result<Option<usize>> {
        for (i, port) in self.inputs.iter_mut().enumerate() {
            if port.drain_check()? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

/// A graph vertex.
pub trait Component: Send {
    /// Instance name, unique within a graph by convention.
    fn name(&self) -> &str;

    /// Component kind, e.g. `"MERGE"`.
    fn kind(&self) -> &'static str;

    /// Declared ports.
    fn ports(&self) -> &[PortDescriptor];

    /// Resolve configuration against the connected schemas. Errors here stop
    /// the graph before any thread starts.
    fn init(&mut self, _ctx: &InitContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Per-run preparation, before the phase's execute barrier.
    fn pre_execute(&mut self) -> Result<()> {
        Ok(())
    }

    /// Process records until the inputs are exhausted or the graph stops.
    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus>;

    /// Per-run cleanup after a successful execute.
    fn post_execute(&mut self) -> Result<()> {
        Ok(())
    }

    /// Return to the post-init state so the graph can run again.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release resources at graph teardown.
    fn free(&mut self) {}
}
