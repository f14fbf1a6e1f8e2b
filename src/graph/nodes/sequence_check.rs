//! SequenceChecker: verifies the input is ordered by a key.
//!
//! Each record is compared with its predecessor; `(d)` key parts must be
//! non-increasing, the others non-decreasing. With `unique_keys` equal
//! consecutive keys are a violation too. Records seen before the violation
//! are passed through to every connected output.

use crate::config::SequenceCheckSettings;
use crate::error::{FlowError, Result};
use crate::graph::edge;
use crate::graph::node::{Component, InitContext, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;
use crate::record::{Record, RecordKey};
use std::cmp::Ordering;
use std::sync::Arc;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", Multiplicity::One),
    PortDescriptor::output("out", Multiplicity::Many),
];

pub struct SequenceChecker {
    name: String,
    settings: SequenceCheckSettings,
    key: Option<RecordKey>,
}

impl SequenceChecker {
    pub fn new(name: impl Into<String>, settings: SequenceCheckSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            key: None,
        }
    }
}

impl Component for SequenceChecker {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "SEQUENCE_CHECKER"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        ctx.require_uniform_schemas()?;
        let schema = Arc::clone(ctx.input_schema(0)?);
        let key = RecordKey::parse(schema, &self.settings.key)
            .map_err(|e| e.with_context(format!("'{}': invalid sort key", self.name)))?;
        self.key = Some(key.with_equal_nulls(self.settings.equal_nulls));
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| FlowError::Configuration(format!("'{}' is not initialized", self.name)))?;
        let (inputs, outputs) = ctx.ports_mut();
        let [input] = inputs else {
            return Err(missing_port(&self.name, "input 0"));
        };

        let schema = Arc::clone(input.schema());
        let mut prev = Record::new(Arc::clone(&schema));
        let mut cur = Record::new(schema);
        let mut have_prev = false;
        let mut row = 1u64;

        while input.read_record(&mut cur)? {
            if have_prev {
                let violated = match key.compare(&prev, &cur) {
                    Ordering::Equal => self.settings.unique_keys,
                    Ordering::Greater => true,
                    Ordering::Less => false,
                };
                if violated {
                    return Err(FlowError::OrderingViolation(format!(
                        "The sequence checker fails at row '{}'",
                        row
                    )));
                }
            }
            edge::broadcast(outputs, &cur)?;
            std::mem::swap(&mut prev, &mut cur);
            have_prev = true;
            row += 1;
        }
        tracing::debug!("'{}' checked {} records", self.name, row - 1);
        Ok(NodeStatus::Ok)
    }
}
