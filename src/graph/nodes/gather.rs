//! SimpleGather: round-robin fan-in.
//!
//! Inputs are visited in rotating order starting after the last one read
//! from. Only inputs that can deliver without blocking are read; when none
//! can, the component parks on all open inputs at once until one of them
//! receives a frame. Output order across inputs is fair, not global.

use crate::error::Result;
use crate::graph::edge;
use crate::graph::node::{Component, InitContext, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", Multiplicity::Many),
    PortDescriptor::output("out", Multiplicity::One),
];

pub struct SimpleGather {
    name: String,
}

impl SimpleGather {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Component for SimpleGather {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "SIMPLE_GATHER"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        ctx.require_uniform_schemas()
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        let stop = ctx.stop_signal().clone();
        let (inputs, outputs) = ctx.ports_mut();
        let [output] = outputs else {
            return Err(missing_port(&self.name, "output 0"));
        };

        let mut open: Vec<usize> = (0..inputs.len()).collect();
        let mut cursor = 0;

        loop {
            open.retain(|&i| !inputs[i].is_eof());
            if open.is_empty() {
                break;
            }

            // First open port at or after the cursor with data, wrapping.
            let start = open.partition_point(|&i| i < cursor);
            let ready = (0..open.len())
                .map(|k| open[(start + k) % open.len()])
                .find(|&i| inputs[i].has_data());

            match ready {
                Some(i) => {
                    if let Some(frame) = inputs[i].read_raw()? {
                        output.write_raw(frame)?;
                    }
                    cursor = i + 1;
                }
                None => edge::wait_any(inputs, &open, &stop)?,
            }
        }
        Ok(NodeStatus::Ok)
    }
}
