//! Filter: routes each record by a predicate injected at build time.
//!
//! Matching records go to port 0, the others to the optional reject port 1.
//! A predicate error fails the component with the record number attached.

use crate::error::{FlowError, Result};
use crate::graph::node::{Component, InitContext, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;
use crate::record::Record;
use std::sync::Arc;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", Multiplicity::One),
    PortDescriptor::output("out", Multiplicity::One),
    PortDescriptor::output("reject", Multiplicity::Optional),
];

type Predicate = Box<dyn Fn(&Record) -> anyhow::Result<bool> + Send>;

pub struct Filter {
    name: String,
    predicate: Predicate,
}

impl Filter {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Record) -> anyhow::Result<bool> + Send + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl Component for Filter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "FILTER"
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
        let (out, mut reject) = match outputs {
            [out] => (out, None),
            [out, reject] => (out, Some(reject)),
            _ => return Err(missing_port(&self.name, "output 0")),
        };

        let mut record = Record::new(Arc::clone(input.schema()));
        let mut number = 0u64;
        while input.read_record(&mut record)? {
            number += 1;
            let keep = (self.predicate)(&record).map_err(|e| {
                FlowError::from_transform(e).with_context(format!("'{}' at record {}", self.name, number))
            })?;
            if keep {
                out.write_record(&record)?;
            } else if let Some(port) = reject.as_deref_mut() {
                port.write_record(&record)?;
            }
        }
        Ok(NodeStatus::Ok)
    }
}
