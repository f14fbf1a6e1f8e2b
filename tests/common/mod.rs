//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use recordflow::graph::nodes::Collected;
use recordflow::{RunSummary, Value};

/// Route engine logs to the test output. `RUST_LOG=debug` for detail.
pub fn init_logging() {
    let _ = recordflow::logging::init_tracing("warn");
}

/// The integer column `index` of everything a sink collected.
pub fn ints(collected: &Collected, index: usize) -> Vec<i32> {
    collected
        .column(index)
        .into_iter()
        .map(|v| match v {
            Value::Integer(i) => i,
            other => panic!("expected an integer, got {:?}", other),
        })
        .collect()
}

/// The string column `index` of everything a sink collected.
pub fn strings(collected: &Collected, index: usize) -> Vec<String> {
    collected
        .column(index)
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            other => panic!("expected a string, got {:?}", other),
        })
        .collect()
}

/// Panic with the per-component messages when a run did not succeed.
pub fn assert_run_ok(summary: &RunSummary) {
    if !summary.is_ok() {
        let failures: Vec<String> = summary
            .nodes
            .iter()
            .map(|r| format!("{} [{}]: {:?}", r.name, r.status, r.message))
            .collect();
        panic!("graph finished with {}:\n{}", summary.status, failures.join("\n"));
    }
}
