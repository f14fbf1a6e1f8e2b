//! SimpleCopy: every record of the single input goes to all outputs.
//!
//! Frames are forwarded without decoding; each consumer receives a reference
//! to the same immutable buffer.

use crate::error::Result;
use crate::graph::node::{Component, InitContext, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", Multiplicity::One),
    PortDescriptor::output("out", Multiplicity::Many),
];

pub struct SimpleCopy {
    name: String,
}

impl SimpleCopy {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Component for SimpleCopy {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "SIMPLE_COPY"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        ctx.require_uniform_schemas()
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        let (inputs, outputs) = ctx.ports_mut();
        let [input] = inputs else {
            return Err(missing_port(&self.name, "input 0"));
        };
        while let Some(frame) = input.read_raw()? {
            for port in outputs.iter_mut() {
                port.write_raw(frame.clone())?;
            }
        }
        Ok(NodeStatus::Ok)
    }
}
