//! ParallelSort: in-memory sort fanned out over a striped record pool.
//!
//! ## Design
//!
//! - The component thread fills empty stripes straight from the input port.
//! - Worker threads take full stripes, sort them by key and keep each one as
//!   a sorted run.
//! - Once the input is exhausted the pool is closed, the workers drain what
//!   is left and exit, and the runs are merged through a binary heap.
//!
//! Runs finish in no particular order, so records with equal keys may come
//! out in any order.

use crate::config::SortSettings;
use crate::error::{FlowError, Result};
use crate::graph::node::{Component, InitContext, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;
use crate::pool::{CloseOnDrop, StripedRecordPool};
use crate::record::{Record, RecordKey};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in", Multiplicity::One),
    PortDescriptor::output("out", Multiplicity::One),
];

/// Heap entry; ordered so the lowest key is popped first.
struct RunHead<'a> {
    key: &'a RecordKey,
    record: &'a Record,
    run: usize,
}

impl Ord for RunHead<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .compare(other.record, self.record)
            .then_with(|| other.run.cmp(&self.run))
    }
}

impl PartialOrd for RunHead<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RunHead<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RunHead<'_> {}

pub struct ParallelSort {
    name: String,
    settings: SortSettings,
    key: Option<RecordKey>,
    stripes: usize,
    stripe_capacity: usize,
    workers: usize,
}

impl ParallelSort {
    pub fn new(name: impl Into<String>, settings: SortSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            key: None,
            stripes: 0,
            stripe_capacity: 0,
            workers: 0,
        }
    }
}

fn sort_worker(pool: &StripedRecordPool, key: &RecordKey, runs: &Mutex<Vec<Vec<Record>>>) {
    while let Some(mut stripe) = pool.next_full_stripe() {
        stripe.sort_by_key(key);
        let run = stripe.records().to_vec();
        stripe.clear();
        stripe.release();
        tracing::debug!("Sorted run of {} records", run.len());
        runs.lock().push(run);
    }
}

impl Component for ParallelSort {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "PARALLEL_SORT"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        ctx.require_uniform_schemas()?;
        let schema = Arc::clone(ctx.input_schema(0)?);
        self.key = Some(
            RecordKey::parse(schema, &self.settings.key)
                .map_err(|e| e.with_context(format!("'{}': invalid sort key", self.name)))?,
        );
        let pool = &ctx.config.pool;
        self.stripes = self.settings.stripes.unwrap_or(pool.stripes);
        self.stripe_capacity = self.settings.stripe_capacity.unwrap_or(pool.stripe_capacity);
        self.workers = self.settings.workers.unwrap_or(pool.workers);
        if self.stripes == 0 || self.stripe_capacity == 0 || self.workers == 0 {
            return Err(FlowError::Configuration(format!(
                "'{}': stripes, stripe capacity and workers must be positive",
                self.name
            )));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| FlowError::Configuration(format!("'{}' is not initialized", self.name)))?;
        let (inputs, outputs) = ctx.ports_mut();
        let ([input], [output]) = (inputs, outputs) else {
            return Err(missing_port(&self.name, "input 0 or output 0"));
        };

        let pool = StripedRecordPool::new(self.stripes, self.stripe_capacity);
        pool.populate(&Record::new(Arc::clone(input.schema())));
        pool.open();
        let runs = Mutex::new(Vec::new());

        std::thread::scope(|scope| -> Result<()> {
            // Closes the pool on every exit path so the workers can finish.
            let _close = CloseOnDrop(&pool);
            for w in 0..self.workers {
                let (pool, runs) = (&pool, &runs);
                std::thread::Builder::new()
                    .name(format!("{}-sort-{}", self.name, w))
                    .spawn_scoped(scope, move || sort_worker(pool, key, runs))?;
            }

            while let Some(mut stripe) = pool.next_empty_stripe() {
                let mut filled = 0;
                let slots = stripe.slots_mut();
                while filled < slots.len() && input.read_record(&mut slots[filled])? {
                    filled += 1;
                }
                stripe.set_len(filled);
                let exhausted = filled < stripe.capacity();
                stripe.release();
                if exhausted {
                    break;
                }
            }
            Ok(())
        })?;

        let runs = runs.into_inner();
        tracing::debug!("'{}' merging {} runs", self.name, runs.len());
        let mut positions = vec![1usize; runs.len()];
        let mut heap: BinaryHeap<RunHead<'_>> = runs
            .iter()
            .enumerate()
            .filter_map(|(run, records)| records.first().map(|record| RunHead { key, record, run }))
            .collect();

        while let Some(head) = heap.pop() {
            output.write_record(head.record)?;
            let pos = &mut positions[head.run];
            if let Some(record) = runs[head.run].get(*pos) {
                *pos += 1;
                heap.push(RunHead {
                    key,
                    record,
                    run: head.run,
                });
            }
        }
        Ok(NodeStatus::Ok)
    }
}
