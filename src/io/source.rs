//! Multi-source record window.
//!
//! [`SourceWindow`] presents an ordered list of sources as one record stream.
//! It owns the parser, moves to the next source when one is exhausted, and
//! applies the skip/limit windows:
//!
//! - global `skip` and `limit` count across all sources
//! - `source_skip` and `source_limit` apply again to every source
//!
//! Per-source skipping happens first, then whatever remains of the global
//! skip, then the per-source limit, then the global limit.

use crate::config::ReaderSettings;
use crate::error::{FlowError, Result, ResultExt};
use crate::io::codec::RecordParser;
use crate::io::policy::FaultPolicy;
use crate::io::wildcard;
use crate::record::Record;
use bytes::Bytes;
use std::collections::VecDeque;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;

/// One input of a window.
#[derive(Clone, PartialEq)]
pub enum SourceSpec {
    File(PathBuf),
    Stdin,
    Memory { name: String, data: Bytes },
}

impl SourceSpec {
    pub fn memory(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        SourceSpec::Memory {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Name used in logs and error messages.
    pub fn name(&self) -> String {
        match self {
            SourceSpec::File(path) => path.display().to_string(),
            SourceSpec::Stdin => "-".to_string(),
            SourceSpec::Memory { name, .. } => name.clone(),
        }
    }

    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match self {
            SourceSpec::File(path) => std::fs::File::open(path)
                .map(|f| Box::new(f) as Box<dyn Read + Send>)
                .map_err(|e| FlowError::source(self.name(), e)),
            SourceSpec::Stdin => Ok(Box::new(std::io::stdin())),
            SourceSpec::Memory { data, .. } => Ok(Box::new(std::io::Cursor::new(data.clone()))),
        }
    }
}

impl fmt::Debug for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::File(path) => write!(f, "File({})", path.display()),
            SourceSpec::Stdin => write!(f, "Stdin"),
            SourceSpec::Memory { name, data } => write!(f, "Memory({}, {} bytes)", name, data.len()),
        }
    }
}

/// Skip/limit windows and fault handling of a [`SourceWindow`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowSettings {
    pub skip: u64,
    pub limit: Option<u64>,
    pub source_skip: u64,
    pub source_limit: Option<u64>,
    pub policy: FaultPolicy,
}

impl WindowSettings {
    /// Window of a reader, falling back to `default_policy` when the reader
    /// sets none.
    pub fn from_reader(settings: &ReaderSettings, default_policy: FaultPolicy) -> Self {
        Self {
            skip: settings.skip,
            limit: settings.limit,
            source_skip: settings.source_skip,
            source_limit: settings.source_limit,
            policy: settings.policy.unwrap_or(default_policy),
        }
    }
}

/// A record that was rejected under [`FaultPolicy::Controlled`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    /// Position of the bad record among all records read from its source.
    pub record_number: u64,
    pub source: String,
    pub message: String,
}

pub struct SourceWindow {
    parser: Box<dyn RecordParser>,
    settings: WindowSettings,
    pending: VecDeque<SourceSpec>,
    current: Option<String>,
    opened: usize,
    skip_remaining: u64,
    returned: u64,
    source_returned: u64,
    source_position: u64,
    failures: Vec<ParseFailure>,
}

impl SourceWindow {
    pub fn new(mut parser: Box<dyn RecordParser>, settings: WindowSettings) -> Self {
        parser.set_policy(settings.policy);
        Self {
            parser,
            settings,
            pending: VecDeque::new(),
            current: None,
            opened: 0,
            skip_remaining: settings.skip,
            returned: 0,
            source_returned: 0,
            source_position: 0,
            failures: Vec::new(),
        }
    }

    /// Window over every source named by a `;`-separated specification.
    pub fn from_spec(
        spec: &str,
        parser: Box<dyn RecordParser>,
        settings: WindowSettings,
    ) -> Result<Self> {
        let mut window = Self::new(parser, settings);
        window.add_spec(spec)?;
        Ok(window)
    }

    pub fn add_source(&mut self, source: SourceSpec) {
        self.pending.push_back(source);
    }

    pub fn add_spec(&mut self, spec: &str) -> Result<()> {
        self.pending.extend(wildcard::resolve_sources(spec)?);
        Ok(())
    }

    pub fn settings(&self) -> &WindowSettings {
        &self.settings
    }

    /// Records handed out so far.
    pub fn returned(&self) -> u64 {
        self.returned
    }

    /// Number of sources opened so far.
    pub fn sources_opened(&self) -> usize {
        self.opened
    }

    pub fn current_source(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn has_pending_sources(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_limit_reached(&self) -> bool {
        self.settings.limit.is_some_and(|l| self.returned >= l)
    }

    /// Rejected records collected since the last call.
    pub fn take_failures(&mut self) -> Vec<ParseFailure> {
        std::mem::take(&mut self.failures)
    }

    /// Read the next record into `record`. `Ok(false)` once every source is
    /// exhausted or the global limit is reached.
    pub fn next(&mut self, record: &mut Record) -> Result<bool> {
        loop {
            if self.is_limit_reached() {
                return Ok(false);
            }
            let Some(source) = self.current.clone() else {
                if !self.open_next()? {
                    return Ok(false);
                }
                continue;
            };
            if self
                .settings
                .source_limit
                .is_some_and(|l| self.source_returned >= l)
            {
                self.close_current()?;
                continue;
            }

            match self.parser.next_record(record) {
                Ok(true) => {
                    self.source_position += 1;
                    self.returned += 1;
                    self.source_returned += 1;
                    return Ok(true);
                }
                Ok(false) => self.close_current()?,
                Err(e) if e.is_malformed() && self.settings.policy == FaultPolicy::Lenient => {
                    tracing::warn!("Substituting defaults for bad record in '{}': {}", source, e);
                    record.reset();
                    self.source_position += 1;
                    self.returned += 1;
                    self.source_returned += 1;
                    return Ok(true);
                }
                Err(e) if e.is_malformed() && self.settings.policy == FaultPolicy::Controlled => {
                    self.source_position += 1;
                    tracing::warn!("Skipping bad record in '{}': {}", source, e);
                    self.failures.push(ParseFailure {
                        record_number: self.source_position,
                        source,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read source '{}'", source))
                }
            }
        }
    }

    fn open_next(&mut self) -> Result<bool> {
        let Some(spec) = self.pending.pop_front() else {
            return Ok(false);
        };
        let name = spec.name();
        let input = spec.open()?;
        self.parser.open(input, &name)?;
        self.opened += 1;
        self.source_returned = 0;
        self.source_position = 0;
        tracing::debug!("Opened source '{}'", name);

        if self.settings.source_skip > 0 {
            self.source_position += self.parser.skip(self.settings.source_skip)?;
        }
        if self.skip_remaining > 0 {
            let skipped = self.parser.skip(self.skip_remaining)?;
            self.skip_remaining -= skipped;
            self.source_position += skipped;
        }
        self.current = Some(name);
        Ok(true)
    }

    fn close_current(&mut self) -> Result<()> {
        if let Some(name) = self.current.take() {
            self.parser.close()?;
            tracing::debug!(
                "Closed source '{}' after {} records",
                name,
                self.source_returned
            );
        }
        Ok(())
    }

    /// Close the current source and drop the pending ones.
    pub fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.close_current()
    }

    /// Give the parser back, e.g. to build a window for the next run.
    pub fn into_parser(self) -> Box<dyn RecordParser> {
        self.parser
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::codec::{DelimitedParser, MockRecordParser};
    use crate::record::{FieldDef, FieldType, Schema, Value};
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new("n", vec![FieldDef::new("n", FieldType::Integer)]).unwrap())
    }

    fn numbers(range: std::ops::Range<i32>) -> Bytes {
        range.map(|n| format!("{}\n", n)).collect::<String>().into()
    }

    fn collect(window: &mut SourceWindow) -> Vec<i32> {
        let mut record = Record::new(schema());
        let mut out = Vec::new();
        while window.next(&mut record).unwrap() {
            out.push(record.get(0).and_then(Value::as_i64).unwrap() as i32);
        }
        out
    }

    fn window(settings: WindowSettings) -> SourceWindow {
        let mut w = SourceWindow::new(Box::new(DelimitedParser::new(schema(), ',')), settings);
        w.add_source(SourceSpec::memory("a", numbers(1..11)));
        w.add_source(SourceSpec::memory("b", numbers(11..21)));
        w.add_source(SourceSpec::memory("c", numbers(21..31)));
        w
    }

    #[test]
    fn test_global_skip_and_limit_span_sources() {
        let mut w = window(WindowSettings {
            skip: 15,
            limit: Some(5),
            ..Default::default()
        });
        assert_eq!(collect(&mut w), vec![16, 17, 18, 19, 20]);
        assert_eq!(w.returned(), 5);
    }

    #[test]
    fn test_per_source_windows() {
        let mut w = window(WindowSettings {
            source_skip: 2,
            source_limit: Some(2),
            ..Default::default()
        });
        assert_eq!(collect(&mut w), vec![3, 4, 13, 14, 23, 24]);
        assert_eq!(w.sources_opened(), 3);
    }

    #[test]
    fn test_missing_file_names_source() {
        let mut w = SourceWindow::new(
            Box::new(DelimitedParser::new(schema(), ',')),
            WindowSettings::default(),
        );
        w.add_source(SourceSpec::File(PathBuf::from("/nonexistent/input-7.csv")));
        let err = w.next(&mut Record::new(schema())).unwrap_err();
        assert!(matches!(err, FlowError::Source { .. }));
        assert!(err.to_string().contains("input-7.csv"));
    }

    #[test]
    fn test_controlled_collects_failures() {
        let mut parser = MockRecordParser::new();
        parser.expect_set_policy().return_const(());
        parser.expect_open().returning(|_, _| Ok(()));
        parser.expect_close().returning(|| Ok(()));
        let mut calls = 0;
        parser.expect_next_record().returning(move |r| {
            calls += 1;
            match calls {
                1 | 3 => {
                    r.set(0, calls)?;
                    Ok(true)
                }
                2 => Err(FlowError::malformed("m:2", "bad digit")),
                _ => Ok(false),
            }
        });

        let mut w = SourceWindow::new(
            Box::new(parser),
            WindowSettings {
                policy: FaultPolicy::Controlled,
                ..Default::default()
            },
        );
        w.add_source(SourceSpec::memory("m", Bytes::new()));
        assert_eq!(collect(&mut w), vec![1, 3]);

        let failures = w.take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].record_number, 2);
        assert_eq!(failures[0].source, "m");
        assert!(w.take_failures().is_empty());
    }

    #[test]
    fn test_lenient_keeps_malformed_records() {
        let mut parser = MockRecordParser::new();
        parser.expect_set_policy().return_const(());
        parser.expect_open().returning(|_, _| Ok(()));
        parser.expect_close().returning(|| Ok(()));
        let mut calls = 0;
        parser.expect_next_record().returning(move |r| {
            calls += 1;
            match calls {
                1 | 3 => {
                    r.set(0, calls)?;
                    Ok(true)
                }
                2 => Err(FlowError::malformed("m:2", "bad digit")),
                _ => Ok(false),
            }
        });

        let mut w = SourceWindow::new(
            Box::new(parser),
            WindowSettings {
                policy: FaultPolicy::Lenient,
                ..Default::default()
            },
        );
        w.add_source(SourceSpec::memory("m", Bytes::new()));
        let mut record = Record::new(schema());
        let mut seen = Vec::new();
        while w.next(&mut record).unwrap() {
            seen.push(record.get(0).and_then(Value::as_i64));
        }
        assert_eq!(seen, vec![Some(1), None, Some(3)]);
        assert_eq!(w.returned(), 3);
        assert!(w.take_failures().is_empty());
    }

    #[test]
    fn test_lenient_counts_undecodable_lines() {
        let pair = Arc::new(
            Schema::new(
                "pair",
                vec![
                    FieldDef::new("id", FieldType::Integer).not_null(),
                    FieldDef::new("name", FieldType::String),
                ],
            )
            .unwrap(),
        );
        let mut w = SourceWindow::new(
            Box::new(DelimitedParser::new(pair.clone(), ',')),
            WindowSettings {
                policy: FaultPolicy::Lenient,
                ..Default::default()
            },
        );
        w.add_source(SourceSpec::memory(
            "raw",
            Bytes::from_static(b"1,a\n2,\xff\xfe\n3,c\n"),
        ));
        let mut record = Record::new(pair);
        let mut ids = Vec::new();
        while w.next(&mut record).unwrap() {
            ids.push(record.get(0).and_then(Value::as_i64));
        }
        assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(w.returned(), 3);
    }

    #[test]
    fn test_strict_propagates() {
        let mut parser = MockRecordParser::new();
        parser.expect_set_policy().return_const(());
        parser.expect_open().returning(|_, _| Ok(()));
        parser
            .expect_next_record()
            .returning(|_| Err(FlowError::malformed("m:1", "bad")));

        let mut w = SourceWindow::new(Box::new(parser), WindowSettings::default());
        w.add_source(SourceSpec::memory("m", Bytes::new()));
        let err = w.next(&mut Record::new(schema())).unwrap_err();
        assert!(err.is_malformed());
    }
}
