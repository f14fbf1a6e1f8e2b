//! Merge: k-way merge of inputs that are each sorted by the same key.
//!
//! One decoded record is held per open input. The input whose held record
//! compares lowest is emitted and refilled; ties go to the lowest port
//! number, so equal keys keep input order. NULL keys tie with each other
//! here. Frames are forwarded as read.

use crate::error::{FlowError, Result};
use crate::graph::edge::InputPort;
use crate::graph::node::{Component, InitContext, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;
use crate::record::{Record, RecordKey};
use bytes::Bytes;
use std::cmp::Ordering;
use std::sync::Arc;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", Multiplicity::Many),
    PortDescriptor::output("out", Multiplicity::One),
];

struct Head {
    record: Record,
    frame: Bytes,
}

pub struct Merge {
    name: String,
    key_spec: String,
    key: Option<RecordKey>,
}

impl Merge {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_spec: key.into(),
            key: None,
        }
    }

    fn fill(port: &mut InputPort, record: Record) -> Result<Option<Head>> {
        let mut record = record;
        match port.read_raw()? {
            Some(frame) => {
                record.deserialize(&mut &frame[..])?;
                Ok(Some(Head { record, frame }))
            }
            None => Ok(None),
        }
    }
}

impl Component for Merge {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "MERGE"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        ctx.require_uniform_schemas()?;
        let schema = Arc::clone(ctx.input_schema(0)?);
        let key = RecordKey::parse(schema, &self.key_spec)
            .map_err(|e| e.with_context(format!("'{}': invalid merge key", self.name)))?;
        self.key = Some(key);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        // Distinct NULLs would compare Less both ways and break the port tie rule.
        let key = self
            .key
            .clone()
            .ok_or_else(|| FlowError::Configuration(format!("'{}' is not initialized", self.name)))?
            .with_equal_nulls(true);
        let (inputs, outputs) = ctx.ports_mut();
        let [output] = outputs else {
            return Err(missing_port(&self.name, "output 0"));
        };

        let mut heads: Vec<Option<Head>> = Vec::with_capacity(inputs.len());
        for port in inputs.iter_mut() {
            let record = Record::new(Arc::clone(port.schema()));
            heads.push(Self::fill(port, record)?);
        }

        loop {
            let mut lowest: Option<usize> = None;
            for (i, head) in heads.iter().enumerate() {
                let Some(head) = head else { continue };
                let better = match lowest.and_then(|l| heads[l].as_ref()) {
                    None => true,
                    Some(best) => key.compare(&head.record, &best.record) == Ordering::Less,
                };
                if better {
                    lowest = Some(i);
                }
            }
            let Some(i) = lowest else { break };

            let Some(head) = heads[i].take() else { break };
            output.write_raw(head.frame)?;
            heads[i] = Self::fill(&mut inputs[i], head.record)?;
        }
        Ok(NodeStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::{channel, EdgeOptions};
    use crate::graph::id::{EdgeId, NodeId};
    use crate::graph::registry::Registry;
    use crate::graph::stop::stop_pair;
    use crate::record::{FieldDef, FieldType, Schema, Value};

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(
                "kv",
                vec![
                    FieldDef::new("k", FieldType::Integer),
                    FieldDef::new("src", FieldType::String),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_ties_prefer_lower_port() {
        let (_handle, signal) = stop_pair();
        let opts = EdgeOptions {
            capacity: None,
            record_limit: 1024,
        };
        let mut outs = Vec::new();
        let mut ins = Vec::new();
        for i in 0..2 {
            let (o, inp) = channel(EdgeId(i), schema(), opts, signal.clone());
            outs.push(o);
            ins.push(inp);
        }
        let (out, mut result) = channel(EdgeId(9), schema(), opts, signal.clone());

        let mut r = Record::new(schema());
        for (port, rows) in [(0, [(1, "a"), (2, "a")]), (1, [(1, "b"), (3, "b")])] {
            for (k, src) in rows {
                r.set(0, k).unwrap();
                r.set(1, src).unwrap();
                outs[port].write_record(&r).unwrap();
            }
            outs[port].set_eof();
        }

        let mut merge = Merge::new("merge", "k");
        merge.key = Some(RecordKey::parse(schema(), "k").unwrap());
        let mut ctx = NodeContext::new(NodeId(0), "merge", ins, vec![out], signal, Arc::new(Registry::new()));
        assert_eq!(merge.execute(&mut ctx).unwrap(), NodeStatus::Ok);
        ctx.broadcast_eof();

        let mut got = Vec::new();
        while result.read_record(&mut r).unwrap() {
            got.push((r.get(0).cloned().unwrap(), r.get(1).cloned().unwrap()));
        }
        assert_eq!(
            got,
            vec![
                (Value::Integer(1), Value::from("a")),
                (Value::Integer(1), Value::from("b")),
                (Value::Integer(2), Value::from("a")),
                (Value::Integer(3), Value::from("b")),
            ]
        );
    }

    #[test]
    fn test_null_keys_prefer_lower_port() {
        let (_handle, signal) = stop_pair();
        let opts = EdgeOptions {
            capacity: None,
            record_limit: 1024,
        };
        let mut outs = Vec::new();
        let mut ins = Vec::new();
        for i in 0..2 {
            let (o, inp) = channel(EdgeId(i), schema(), opts, signal.clone());
            outs.push(o);
            ins.push(inp);
        }
        let (out, mut result) = channel(EdgeId(9), schema(), opts, signal.clone());

        let mut r = Record::new(schema());
        for (port, src) in [(0, "a"), (1, "b")] {
            for k in [None, Some(4)] {
                r.set(0, k).unwrap();
                r.set(1, src).unwrap();
                outs[port].write_record(&r).unwrap();
            }
            outs[port].set_eof();
        }

        let mut merge = Merge::new("merge", "k");
        merge.key = Some(RecordKey::parse(schema(), "k").unwrap().with_equal_nulls(false));
        let mut ctx = NodeContext::new(NodeId(0), "merge", ins, vec![out], signal, Arc::new(Registry::new()));
        assert_eq!(merge.execute(&mut ctx).unwrap(), NodeStatus::Ok);
        ctx.broadcast_eof();

        let mut got = Vec::new();
        while result.read_record(&mut r).unwrap() {
            got.push((r.get(0).cloned().unwrap(), r.get(1).cloned().unwrap()));
        }
        assert_eq!(
            got,
            vec![
                (Value::Null, Value::from("a")),
                (Value::Null, Value::from("b")),
                (Value::Integer(4), Value::from("a")),
                (Value::Integer(4), Value::from("b")),
            ]
        );
    }
}
