//! Reformat: maps each input record onto an output record of another
//! layout with a closure injected at build time.
//!
//! The output record is reset to its defaults before every call. Returning
//! `Ok(false)` drops the record.

use crate::error::{FlowError, Result};
use crate::graph::node::{Component, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;
use crate::record::Record;
use std::sync::Arc;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", Multiplicity::One),
    PortDescriptor::output("out", Multiplicity::One),
];

type Transform = Box<dyn FnMut(&Record, &mut Record) -> anyhow::Result<bool> + Send>;

pub struct Reformat {
    name: String,
    transform: Transform,
}

impl Reformat {
    pub fn new<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: FnMut(&Record, &mut Record) -> anyhow::Result<bool> + Send + 'static,
    {
        Self {
            name: name.into(),
            transform: Box::new(transform),
        }
    }
}

impl Component for Reformat {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "REFORMAT"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        let (inputs, outputs) = ctx.ports_mut();
        let ([input], [output]) = (inputs, outputs) else {
            return Err(missing_port(&self.name, "input 0 or output 0"));
        };

        let mut source = Record::new(Arc::clone(input.schema()));
        let mut target = Record::new(Arc::clone(output.schema()));
        let mut number = 0u64;
        while input.read_record(&mut source)? {
            number += 1;
            target.reset();
            let emit = (self.transform)(&source, &mut target).map_err(|e| {
                FlowError::from_transform(e).with_context(format!("'{}' at record {}", self.name, number))
            })?;
            if emit {
                output.write_record(&target)?;
            }
        }
        Ok(NodeStatus::Ok)
    }
}
