//! Integration tests for file-backed readers and writers

mod common;

use common::builders::{id_name_schema, id_records};
use common::{assert_run_ok, ints, strings};
use recordflow::config::{ReaderSettings, WriterSettings};
use recordflow::graph::nodes::{CollectSink, Reader, VecSource, Writer};
use recordflow::io::codec::{DelimitedFormatter, DelimitedParser};
use recordflow::io::{FaultPolicy, MemoryTarget, Sink, TargetSettings};
use recordflow::{FieldDef, FieldType, GraphBuilder, NodeStatus, Schema};
use std::path::Path;
use std::sync::Arc;

/// Write `per_file` consecutive ids into each of `files` CSV files.
fn write_csv_files(dir: &Path, files: usize, per_file: usize) -> Vec<String> {
    (0..files)
        .map(|f| {
            let path = dir.join(format!("part-{}.csv", f));
            let text: String = (0..per_file)
                .map(|i| {
                    let id = f * per_file + i;
                    format!("{},item-{}\n", id, id)
                })
                .collect();
            std::fs::write(&path, text).unwrap();
            path.display().to_string()
        })
        .collect()
}

/// Run `reader -> sink` and return the summary with the collected ids.
fn read_all(schema: &Arc<Schema>, settings: ReaderSettings) -> (NodeStatus, Vec<i32>) {
    let (sink, collected) = CollectSink::new("sink");
    let parser = Box::new(DelimitedParser::new(schema.clone(), ','));

    let mut builder = GraphBuilder::new();
    let reader = builder.add_node(Reader::new("reader", settings, parser), 0);
    let sink = builder.add_node(sink, 0);
    builder.connect(reader, 0, sink, 0, schema.clone()).unwrap();

    let summary = builder.build().unwrap().run().unwrap();
    (summary.by_name("reader").unwrap().status, ints(&collected, 0))
}

#[test]
fn test_global_skip_and_limit_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_csv_files(dir.path(), 3, 10);
    let schema = id_name_schema();

    let settings = ReaderSettings {
        source: paths.join(";"),
        skip: 15,
        limit: Some(5),
        ..ReaderSettings::default()
    };
    let (status, ids) = read_all(&schema, settings);
    assert_eq!(status, NodeStatus::Ok);
    assert_eq!(ids, vec![15, 16, 17, 18, 19]);
}

#[test]
fn test_per_source_window_with_wildcard() {
    let dir = tempfile::tempdir().unwrap();
    write_csv_files(dir.path(), 3, 10);
    let schema = id_name_schema();

    let settings = ReaderSettings {
        source: dir.path().join("part-?.csv").display().to_string(),
        source_skip: 2,
        source_limit: Some(3),
        ..ReaderSettings::default()
    };
    let (status, ids) = read_all(&schema, settings);
    assert_eq!(status, NodeStatus::Ok);
    assert_eq!(ids, vec![2, 3, 4, 12, 13, 14, 22, 23, 24]);
}

#[test]
fn test_missing_file_fails_reader() {
    let dir = tempfile::tempdir().unwrap();
    let schema = id_name_schema();
    let settings = ReaderSettings {
        source: dir.path().join("absent.csv").display().to_string(),
        ..ReaderSettings::default()
    };
    let (status, ids) = read_all(&schema, settings);
    assert_eq!(status, NodeStatus::Error);
    assert!(ids.is_empty());
}

fn malformed_file(dir: &Path) -> String {
    let path = dir.join("bad.csv");
    std::fs::write(&path, "1,a\nx,b\n3,c\n").unwrap();
    path.display().to_string()
}

#[test]
fn test_strict_policy_fails_on_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let schema = id_name_schema();
    let settings = ReaderSettings {
        source: malformed_file(dir.path()),
        policy: Some(FaultPolicy::Strict),
        ..ReaderSettings::default()
    };
    let (status, ids) = read_all(&schema, settings);
    assert_eq!(status, NodeStatus::FatalError);
    // The sink may be stopped before it drains the one good record.
    assert!(ids.len() <= 1);
}

#[test]
fn test_lenient_policy_keeps_record_count() {
    let dir = tempfile::tempdir().unwrap();
    // A non-nullable id falls back to zero instead of NULL.
    let schema = Arc::new(
        Schema::new(
            "item",
            vec![
                FieldDef::new("id", FieldType::Integer).not_null(),
                FieldDef::new("name", FieldType::String),
            ],
        )
        .unwrap(),
    );
    let settings = ReaderSettings {
        source: malformed_file(dir.path()),
        policy: Some(FaultPolicy::Lenient),
        ..ReaderSettings::default()
    };
    let (status, ids) = read_all(&schema, settings);
    assert_eq!(status, NodeStatus::Ok);
    assert_eq!(ids, vec![1, 0, 3]);
}

#[test]
fn test_controlled_policy_reports_on_error_port() {
    let dir = tempfile::tempdir().unwrap();
    let schema = id_name_schema();
    let error_schema = Reader::error_schema().unwrap();
    let settings = ReaderSettings {
        source: malformed_file(dir.path()),
        policy: Some(FaultPolicy::Controlled),
        ..ReaderSettings::default()
    };
    let (good, good_rows) = CollectSink::new("good");
    let (bad, bad_rows) = CollectSink::new("bad");

    let mut builder = GraphBuilder::new();
    let parser = Box::new(DelimitedParser::new(schema.clone(), ','));
    let reader = builder.add_node(Reader::new("reader", settings, parser), 0);
    let good = builder.add_node(good, 0);
    let bad = builder.add_node(bad, 0);
    builder.connect(reader, 0, good, 0, schema).unwrap();
    builder.connect(reader, 1, bad, 0, error_schema).unwrap();

    let summary = builder.build().unwrap().run().unwrap();
    assert_run_ok(&summary);
    assert_eq!(ints(&good_rows, 0), vec![1, 3]);

    let failures = bad_rows.records();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].get(0), Some(&recordflow::Value::Long(2)));
    assert!(strings(&bad_rows, 1)[0].ends_with("bad.csv"));
}

#[test]
fn test_reader_runs_twice() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_csv_files(dir.path(), 1, 4);
    let schema = id_name_schema();
    let (sink, collected) = CollectSink::new("sink");
    let settings = ReaderSettings {
        source: paths[0].clone(),
        ..ReaderSettings::default()
    };

    let mut builder = GraphBuilder::new();
    let parser = Box::new(DelimitedParser::new(schema.clone(), ','));
    let reader = builder.add_node(Reader::new("reader", settings, parser), 0);
    let sink = builder.add_node(sink, 0);
    builder.connect(reader, 0, sink, 0, schema).unwrap();

    let mut graph = builder.build().unwrap();
    for _ in 0..2 {
        assert_run_ok(&graph.run().unwrap());
        assert_eq!(ints(&collected, 0), vec![0, 1, 2, 3]);
    }
}

#[test]
fn test_writer_rotation_then_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let schema = id_name_schema();
    let ids: Vec<i32> = (0..7).collect();
    let settings = WriterSettings {
        target: dir.path().join("out-##.csv").display().to_string(),
        records_per_file: Some(3),
        ..WriterSettings::default()
    };

    let mut builder = GraphBuilder::new();
    let source = builder.add_node(VecSource::new("source", id_records(&schema, &ids)), 0);
    let writer = builder.add_node(
        Writer::new("writer", &settings, Box::new(DelimitedFormatter::new(','))).unwrap(),
        0,
    );
    builder.connect(source, 0, writer, 0, schema.clone()).unwrap();
    assert_run_ok(&builder.build().unwrap().run().unwrap());

    let lines = |name: &str| {
        std::fs::read_to_string(dir.path().join(name))
            .unwrap()
            .lines()
            .count()
    };
    assert_eq!(lines("out-00.csv"), 3);
    assert_eq!(lines("out-01.csv"), 3);
    assert_eq!(lines("out-02.csv"), 1);
    assert!(!dir.path().join("out-03.csv").exists());

    let read_back = ReaderSettings {
        source: dir.path().join("out-*.csv").display().to_string(),
        ..ReaderSettings::default()
    };
    let (status, got) = read_all(&schema, read_back);
    assert_eq!(status, NodeStatus::Ok);
    assert_eq!(got, ids);
}

#[test]
fn test_writer_window_over_sinks() {
    let schema = id_name_schema();
    let ids: Vec<i32> = (0..10).collect();
    let first = MemoryTarget::new();
    let second = MemoryTarget::new();
    let settings = TargetSettings {
        records_per_file: Some(2),
        skip: 3,
        limit: Some(4),
        ..TargetSettings::default()
    };
    let writer = Writer::with_sinks(
        "writer",
        [
            Sink::new("first", first.clone()),
            Sink::new("second", second.clone()),
        ],
        settings,
        Box::new(DelimitedFormatter::new(',')),
    )
    .unwrap();

    let mut builder = GraphBuilder::new();
    let source = builder.add_node(VecSource::new("source", id_records(&schema, &ids)), 0);
    let writer = builder.add_node(writer, 0);
    builder.connect(source, 0, writer, 0, schema).unwrap();

    let summary = builder.build().unwrap().run().unwrap();
    assert_run_ok(&summary);
    // The writer consumes everything even after its limit.
    assert_eq!(summary.by_name("writer").unwrap().records_in, vec![10]);
    assert_eq!(first.to_string_lossy(), "3,item-3\n4,item-4\n");
    assert_eq!(second.to_string_lossy(), "5,item-5\n6,item-6\n");
}
