//! Concatenate: input 0 is drained to EOF before input 1 is touched, and so
//! on. Input order is preserved record for record.

use crate::error::Result;
use crate::graph::node::{Component, InitContext, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", Multiplicity::Many),
    PortDescriptor::output("out", Multiplicity::One),
];

pub struct Concatenate {
    name: String,
}

impl Concatenate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Component for Concatenate {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "CONCATENATE"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        ctx.require_uniform_schemas()
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        let (inputs, outputs) = ctx.ports_mut();
        let [output] = outputs else {
            return Err(missing_port(&self.name, "output 0"));
        };
        for (i, input) in inputs.iter_mut().enumerate() {
            // A stop request surfaces as Aborted from the blocking read.
            while let Some(frame) = input.read_raw()? {
                output.write_raw(frame)?;
            }
            tracing::debug!("Input {} exhausted", i);
        }
        Ok(NodeStatus::Ok)
    }
}
