//! Dedup: keeps the first, last or only record of every key group.
//!
//! In sorted mode (the default) groups are runs of consecutive records with
//! equal keys and the input must be ordered by the key; a record that sorts
//! before its predecessor is an ordering violation. In unsorted mode groups
//! are found by hashing the serialized key, and `last`/`unique` survivors are
//! written once the input is exhausted, in order of first appearance.
//!
//! `no_dup_record` survivors are kept per group for `first` and `last`.
//! Everything else goes to the optional reject port 1.

use crate::config::{DedupSettings, Keep};
use crate::error::{FlowError, Result};
use crate::graph::edge::{InputPort, OutputPort};
use crate::graph::node::{Component, InitContext, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;
use crate::record::{Record, RecordKey};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", Multiplicity::One),
    PortDescriptor::output("out", Multiplicity::One),
    PortDescriptor::output("reject", Multiplicity::Optional),
];

struct Sinks<'a> {
    out: &'a mut OutputPort,
    reject: Option<&'a mut OutputPort>,
    rejected: u64,
}

impl Sinks<'_> {
    fn keep(&mut self, record: &Record) -> Result<()> {
        self.out.write_record(record)
    }

    fn reject(&mut self, record: &Record) -> Result<()> {
        self.rejected += 1;
        match self.reject.as_mut() {
            Some(port) => port.write_record(record),
            None => Ok(()),
        }
    }
}

pub struct Dedup {
    name: String,
    settings: DedupSettings,
    key: Option<RecordKey>,
}

impl Dedup {
    pub fn new(name: impl Into<String>, settings: DedupSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            key: None,
        }
    }

    /// Whether `cur` continues the group of `prev`. An empty key makes the
    /// whole input one group.
    fn same_group(&self, prev: &Record, cur: &Record, number: u64) -> Result<bool> {
        let Some(key) = &self.key else {
            return Ok(true);
        };
        match key.compare(prev, cur) {
            Ordering::Equal => Ok(true),
            Ordering::Less => Ok(false),
            Ordering::Greater => Err(FlowError::OrderingViolation(format!(
                "'{}': input is not sorted by '{}' at record {}",
                self.name, self.settings.key, number
            ))),
        }
    }

    fn sorted_first(&self, input: &mut InputPort, sinks: &mut Sinks<'_>) -> Result<()> {
        let schema = Arc::clone(input.schema());
        let mut prev = Record::new(Arc::clone(&schema));
        let mut cur = Record::new(schema);
        let mut have_prev = false;
        let mut group = 0usize;
        let mut number = 0u64;

        while input.read_record(&mut cur)? {
            number += 1;
            if have_prev && !self.same_group(&prev, &cur, number)? {
                group = 0;
            }
            if group < self.settings.no_dup_record {
                sinks.keep(&cur)?;
            } else {
                sinks.reject(&cur)?;
            }
            group += 1;
            std::mem::swap(&mut prev, &mut cur);
            have_prev = true;
        }
        Ok(())
    }

    fn sorted_last(&self, input: &mut InputPort, sinks: &mut Sinks<'_>) -> Result<()> {
        let schema = Arc::clone(input.schema());
        let mut ring: VecDeque<Record> = VecDeque::with_capacity(self.settings.no_dup_record);
        let mut cur = Record::new(Arc::clone(&schema));
        let mut number = 0u64;

        while input.read_record(&mut cur)? {
            number += 1;
            if let Some(prev) = ring.back() {
                if !self.same_group(prev, &cur, number)? {
                    while let Some(r) = ring.pop_front() {
                        sinks.keep(&r)?;
                    }
                }
            }
            // Reuse the evicted slot to hold the new record.
            let mut slot = if ring.len() >= self.settings.no_dup_record {
                match ring.pop_front() {
                    Some(oldest) => {
                        sinks.reject(&oldest)?;
                        oldest
                    }
                    None => Record::new(Arc::clone(&schema)),
                }
            } else {
                Record::new(Arc::clone(&schema))
            };
            slot.copy_from(&cur)?;
            ring.push_back(slot);
        }
        while let Some(r) = ring.pop_front() {
            sinks.keep(&r)?;
        }
        Ok(())
    }

    fn sorted_unique(&self, input: &mut InputPort, sinks: &mut Sinks<'_>) -> Result<()> {
        let schema = Arc::clone(input.schema());
        let mut prev = Record::new(Arc::clone(&schema));
        let mut cur = Record::new(schema);
        let mut have_prev = false;
        let mut group = 0usize;
        let mut number = 0u64;

        while input.read_record(&mut cur)? {
            number += 1;
            if have_prev {
                if self.same_group(&prev, &cur, number)? {
                    sinks.reject(&prev)?;
                } else {
                    if group == 1 {
                        sinks.keep(&prev)?;
                    } else {
                        sinks.reject(&prev)?;
                    }
                    group = 0;
                }
            }
            group += 1;
            std::mem::swap(&mut prev, &mut cur);
            have_prev = true;
        }
        if have_prev {
            if group == 1 {
                sinks.keep(&prev)?;
            } else {
                sinks.reject(&prev)?;
            }
        }
        Ok(())
    }

    /// Serialize the record's group key into `buf`. `false` when the record
    /// forms a group of its own (NULL key part with `equal_nulls` off).
    fn group_key(&self, record: &Record, buf: &mut Vec<u8>) -> bool {
        buf.clear();
        match &self.key {
            Some(key) => {
                if !key.equal_nulls() && key.has_null(record) {
                    return false;
                }
                key.serialize_key(record, buf);
                true
            }
            None => true,
        }
    }

    fn unsorted(&self, input: &mut InputPort, sinks: &mut Sinks<'_>) -> Result<()> {
        let mut record = Record::new(Arc::clone(input.schema()));
        let mut buf = Vec::new();
        let mut index: HashMap<Vec<u8>, usize> = HashMap::new();
        let limit = self.settings.no_dup_record;

        match self.settings.keep {
            Keep::First => {
                while input.read_record(&mut record)? {
                    if !self.group_key(&record, &mut buf) {
                        sinks.keep(&record)?;
                        continue;
                    }
                    let count = index.entry(buf.clone()).or_insert(0);
                    if *count < limit {
                        *count += 1;
                        sinks.keep(&record)?;
                    } else {
                        sinks.reject(&record)?;
                    }
                }
            }
            Keep::Last => {
                let mut groups: Vec<VecDeque<Record>> = Vec::new();
                while input.read_record(&mut record)? {
                    let slot = if self.group_key(&record, &mut buf) {
                        *index.entry(buf.clone()).or_insert_with(|| {
                            groups.push(VecDeque::new());
                            groups.len() - 1
                        })
                    } else {
                        groups.push(VecDeque::new());
                        groups.len() - 1
                    };
                    let group = &mut groups[slot];
                    if group.len() >= limit {
                        if let Some(oldest) = group.pop_front() {
                            sinks.reject(&oldest)?;
                        }
                    }
                    group.push_back(record.duplicate());
                }
                for group in &groups {
                    for r in group {
                        sinks.keep(r)?;
                    }
                }
            }
            Keep::Unique => {
                let mut groups: Vec<(Record, bool)> = Vec::new();
                while input.read_record(&mut record)? {
                    let hashed = self.group_key(&record, &mut buf);
                    let existing = if hashed {
                        index.get(&buf).copied()
                    } else {
                        None
                    };
                    match existing {
                        Some(slot) => {
                            let (first, rejected) = &mut groups[slot];
                            if !*rejected {
                                *rejected = true;
                                sinks.reject(first)?;
                            }
                            sinks.reject(&record)?;
                        }
                        None => {
                            if hashed {
                                index.insert(buf.clone(), groups.len());
                            }
                            groups.push((record.duplicate(), false));
                        }
                    }
                }
                for (r, rejected) in &groups {
                    if !*rejected {
                        sinks.keep(r)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Component for Dedup {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "DEDUP"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        ctx.require_uniform_schemas()?;
        if self.settings.no_dup_record < 1 {
            return Err(FlowError::Configuration(format!(
                "'{}': no_dup_record must be a positive number",
                self.name
            )));
        }
        self.key = if self.settings.key.trim().is_empty() {
            None
        } else {
            let schema = Arc::clone(ctx.input_schema(0)?);
            let key = RecordKey::parse(schema, &self.settings.key)
                .map_err(|e| e.with_context(format!("'{}': invalid dedup key", self.name)))?;
            Some(key.with_equal_nulls(self.settings.equal_nulls))
        };
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        let (inputs, outputs) = ctx.ports_mut();
        let [input] = inputs else {
            return Err(missing_port(&self.name, "input 0"));
        };
        let mut sinks = match outputs {
            [out] => Sinks {
                out,
                reject: None,
                rejected: 0,
            },
            [out, reject] => Sinks {
                out,
                reject: Some(reject),
                rejected: 0,
            },
            _ => return Err(missing_port(&self.name, "output 0")),
        };

        match (self.settings.sorted, self.settings.keep) {
            (true, Keep::First) => self.sorted_first(input, &mut sinks)?,
            (true, Keep::Last) => self.sorted_last(input, &mut sinks)?,
            (true, Keep::Unique) => self.sorted_unique(input, &mut sinks)?,
            (false, _) => self.unsorted(input, &mut sinks)?,
        }
        tracing::debug!("'{}' rejected {} records", self.name, sinks.rejected);
        Ok(NodeStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::graph::edge::{channel, EdgeOptions};
    use crate::graph::id::{EdgeId, NodeId};
    use crate::graph::registry::Registry;
    use crate::graph::stop::stop_pair;
    use crate::record::{FieldDef, FieldType, Schema};

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(
                "kv",
                vec![
                    FieldDef::new("k", FieldType::Integer),
                    FieldDef::new("tag", FieldType::String),
                ],
            )
            .unwrap(),
        )
    }

    /// Tags of the records sent to `out` and to `reject`.
    type Split = (Vec<String>, Vec<String>);

    fn run(settings: DedupSettings, rows: &[(Option<i32>, &str)]) -> Result<Split> {
        let (_handle, signal) = stop_pair();
        let opts = EdgeOptions {
            capacity: None,
            record_limit: 1024,
        };
        let (mut feed, input) = channel(EdgeId(0), schema(), opts, signal.clone());
        let (out, mut kept) = channel(EdgeId(1), schema(), opts, signal.clone());
        let (reject, mut rejected) = channel(EdgeId(2), schema(), opts, signal.clone());

        let mut r = Record::new(schema());
        for (k, tag) in rows {
            r.set(0, *k).unwrap();
            r.set(1, *tag).unwrap();
            feed.write_record(&r).unwrap();
        }
        feed.set_eof();

        let registry = Arc::new(Registry::new());
        let config = EngineConfig::default();
        let mut dedup = Dedup::new("dedup", settings);
        dedup.init(&InitContext {
            id: NodeId(0),
            name: "dedup",
            phase: 0,
            input_schemas: vec![schema()],
            output_schemas: vec![schema(), schema()],
            registry: &registry,
            config: &config,
        })?;
        let mut ctx = NodeContext::new(NodeId(0), "dedup", vec![input], vec![out, reject], signal, registry);
        dedup.execute(&mut ctx)?;
        ctx.broadcast_eof();

        let mut drain = |port: &mut InputPort| {
            let mut tags = Vec::new();
            while port.read_record(&mut r).unwrap() {
                tags.push(r.get(1).and_then(|v| v.as_str()).unwrap_or_default().to_string());
            }
            tags
        };
        Ok((drain(&mut kept), drain(&mut rejected)))
    }

    fn settings(keep: Keep, no_dup_record: usize, equal_nulls: bool, sorted: bool) -> DedupSettings {
        DedupSettings {
            keep,
            no_dup_record,
            equal_nulls,
            sorted,
            ..DedupSettings::new("k")
        }
    }

    #[test]
    fn test_sorted_first_with_distinct_nulls() {
        let rows = [(None, "a"), (None, "b"), (Some(1), "c"), (Some(1), "d")];
        let (kept, rejected) = run(settings(Keep::First, 1, false, true), &rows).unwrap();
        assert_eq!(kept, ["a", "b", "c"]);
        assert_eq!(rejected, ["d"]);

        let (kept, rejected) = run(settings(Keep::First, 1, true, true), &rows).unwrap();
        assert_eq!(kept, ["a", "c"]);
        assert_eq!(rejected, ["b", "d"]);
    }

    #[test]
    fn test_sorted_last_keeps_tail_of_group() {
        let rows = [(Some(1), "a1"), (Some(1), "a2"), (Some(1), "a3"), (Some(2), "b")];
        let (kept, rejected) = run(settings(Keep::Last, 2, true, true), &rows).unwrap();
        assert_eq!(kept, ["a2", "a3", "b"]);
        assert_eq!(rejected, ["a1"]);
    }

    #[test]
    fn test_sorted_unique_flushes_last_group() {
        let rows = [(Some(1), "a"), (Some(2), "b1"), (Some(2), "b2"), (Some(3), "c")];
        let (kept, rejected) = run(settings(Keep::Unique, 1, true, true), &rows).unwrap();
        assert_eq!(kept, ["a", "c"]);
        assert_eq!(rejected, ["b1", "b2"]);

        let rows = [(Some(1), "a"), (Some(2), "b1"), (Some(2), "b2")];
        let (kept, rejected) = run(settings(Keep::Unique, 1, true, true), &rows).unwrap();
        assert_eq!(kept, ["a"]);
        assert_eq!(rejected, ["b1", "b2"]);
    }

    #[test]
    fn test_sorted_input_out_of_order() {
        for keep in [Keep::First, Keep::Last, Keep::Unique] {
            let rows = [(Some(1), "a"), (Some(3), "b"), (Some(2), "c")];
            let err = run(settings(keep, 1, true, true), &rows).unwrap_err();
            assert!(matches!(err, FlowError::OrderingViolation(_)));
            assert!(err.to_string().contains("record 3"));
            assert_eq!(err.status(), NodeStatus::Error);
        }
    }

    #[test]
    fn test_unsorted_groups_by_hash() {
        let rows = [(Some(2), "a"), (Some(1), "b"), (Some(2), "c"), (Some(1), "d"), (Some(3), "e")];
        let (kept, rejected) = run(settings(Keep::Last, 1, true, false), &rows).unwrap();
        assert_eq!(kept, ["c", "d", "e"]);
        assert_eq!(rejected, ["a", "b"]);

        let (kept, rejected) = run(settings(Keep::Unique, 1, true, false), &rows).unwrap();
        assert_eq!(kept, ["e"]);
        assert_eq!(rejected, ["a", "c", "b", "d"]);
    }

    #[test]
    fn test_unsorted_distinct_nulls_are_own_groups() {
        let rows = [(None, "a"), (Some(1), "b"), (None, "c"), (Some(1), "d")];
        let (kept, rejected) = run(settings(Keep::Unique, 1, false, false), &rows).unwrap();
        assert_eq!(kept, ["a", "c"]);
        assert_eq!(rejected, ["b", "d"]);

        let (kept, rejected) = run(settings(Keep::First, 1, true, false), &rows).unwrap();
        assert_eq!(kept, ["a", "b"]);
        assert_eq!(rejected, ["c", "d"]);
    }

    #[test]
    fn test_rejects_zero_no_dup_record() {
        let err = run(settings(Keep::First, 0, true, true), &[]).unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
    }
}
