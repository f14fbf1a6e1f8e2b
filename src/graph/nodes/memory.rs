//! In-memory endpoints for building and testing graphs.

use crate::error::Result;
use crate::graph::edge;
use crate::graph::node::{Component, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;
use crate::record::{Record, Value};
use parking_lot::Mutex;
use std::sync::Arc;

static SOURCE_PORTS: &[PortDescriptor] = &[PortDescriptor::output("out", Multiplicity::Many)];

static SINK_PORTS: &[PortDescriptor] = &[PortDescriptor::input("in", Multiplicity::One)];

/// Writes a fixed list of records to every output, on every run.
pub struct VecSource {
    name: String,
    records: Vec<Record>,
}

impl VecSource {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

impl Component for VecSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "VEC_SOURCE"
    }

    fn ports(&self) -> &[PortDescriptor] {
        SOURCE_PORTS
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        for record in &self.records {
            ctx.check_running()?;
            edge::broadcast(ctx.outputs_mut(), record)?;
        }
        Ok(NodeStatus::Ok)
    }
}

/// Handle to the records gathered by a [`CollectSink`].
#[derive(Debug, Clone, Default)]
pub struct Collected(Arc<Mutex<Vec<Record>>>);

impl Collected {
    pub fn records(&self) -> Vec<Record> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Values of one field across all gathered records.
    pub fn column(&self, index: usize) -> Vec<Value> {
        self.0
            .lock()
            .iter()
            .map(|r| r.get(index).cloned().unwrap_or_default())
            .collect()
    }
}

/// Stores every record of its input. Each run starts from an empty list.
pub struct CollectSink {
    name: String,
    collected: Collected,
}

impl CollectSink {
    pub fn new(name: impl Into<String>) -> (Self, Collected) {
        let collected = Collected::default();
        let sink = Self {
            name: name.into(),
            collected: collected.clone(),
        };
        (sink, collected)
    }
}

impl Component for CollectSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "COLLECT_SINK"
    }

    fn ports(&self) -> &[PortDescriptor] {
        SINK_PORTS
    }

    fn pre_execute(&mut self) -> Result<()> {
        self.collected.0.lock().clear();
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        let [input] = ctx.inputs_mut() else {
            return Err(missing_port(&self.name, "input 0"));
        };
        let mut record = Record::new(Arc::clone(input.schema()));
        while input.read_record(&mut record)? {
            self.collected.0.lock().push(record.duplicate());
        }
        Ok(NodeStatus::Ok)
    }
}
