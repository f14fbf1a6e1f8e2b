//! Multi-target record window.
//!
//! [`TargetWindow`] spreads formatted records over a sequence of outputs.
//! Outputs come either from a file pattern, where a run of `#` characters is
//! replaced by the zero-padded file number starting at 0, or from an
//! explicit list of sinks.
//!
//! # Rotation
//!
//! Before a record is written the window checks the open output: if it
//! already holds at least one record and either `records_per_file` is
//! reached or the record would push it past `bytes_per_file`, the output is
//! closed and the next one opened. A record is never split across outputs,
//! so a single record larger than `bytes_per_file` still gets its own file.

use crate::config::WriterSettings;
use crate::error::{FlowError, Result};
use crate::io::codec::RecordFormatter;
use crate::record::Record;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Output path with an optional run of `#` for the file number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    prefix: String,
    width: usize,
    suffix: String,
}

impl FilePattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.rfind('#') {
            Some(end) => {
                let start = pattern[..end]
                    .rfind(|c: char| c != '#')
                    .map(|i| i + 1)
                    .unwrap_or(0);
                Self {
                    prefix: pattern[..start].to_string(),
                    width: end + 1 - start,
                    suffix: pattern[end + 1..].to_string(),
                }
            }
            None => Self {
                prefix: pattern.to_string(),
                width: 0,
                suffix: String::new(),
            },
        }
    }

    pub fn is_numbered(&self) -> bool {
        self.width > 0
    }

    pub fn path(&self, number: u64) -> PathBuf {
        if self.width == 0 {
            return PathBuf::from(&self.prefix);
        }
        PathBuf::from(format!(
            "{}{:0width$}{}",
            self.prefix,
            number,
            self.suffix,
            width = self.width
        ))
    }
}

/// Writer-side windows and file handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetSettings {
    pub records_per_file: Option<u64>,
    pub bytes_per_file: Option<u64>,
    pub skip: u64,
    pub limit: Option<u64>,
    pub append: bool,
    pub make_dirs: bool,
}

impl From<&WriterSettings> for TargetSettings {
    fn from(s: &WriterSettings) -> Self {
        Self {
            records_per_file: s.records_per_file,
            bytes_per_file: s.bytes_per_file,
            skip: s.skip,
            limit: s.limit,
            append: s.append,
            make_dirs: s.make_dirs,
        }
    }
}

impl TargetSettings {
    fn rotates(&self) -> bool {
        self.records_per_file.is_some() || self.bytes_per_file.is_some()
    }
}

/// Named writable output.
pub struct Sink {
    pub name: String,
    pub writer: Box<dyn Write + Send>,
}

impl Sink {
    pub fn new(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            writer: Box::new(writer),
        }
    }
}

/// In-memory output whose contents stay readable after the window drops it.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget(Arc<Mutex<Vec<u8>>>);

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for MemoryTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

enum Targets {
    Files(FilePattern),
    Sinks(VecDeque<Sink>),
}

struct OpenTarget {
    name: String,
    writer: Box<dyn Write + Send>,
    records: u64,
    bytes: u64,
}

pub struct TargetWindow {
    targets: Targets,
    formatter: Box<dyn RecordFormatter>,
    settings: TargetSettings,
    current: Option<OpenTarget>,
    next_number: u64,
    scratch: Vec<u8>,
    skipped: u64,
    written: u64,
    outputs: Vec<String>,
}

impl TargetWindow {
    /// Window writing to files named by `pattern`.
    ///
    /// Rotation needs a `#` run in the pattern; without one the settings are
    /// rejected.
    pub fn files(
        pattern: &str,
        settings: TargetSettings,
        formatter: Box<dyn RecordFormatter>,
    ) -> Result<Self> {
        if pattern.is_empty() {
            return Err(FlowError::Configuration("Empty output target".to_string()));
        }
        let pattern = FilePattern::parse(pattern);
        if settings.rotates() && !pattern.is_numbered() {
            return Err(FlowError::Configuration(format!(
                "Output '{}' rotates but has no '#' placeholder for the file number",
                pattern.path(0).display()
            )));
        }
        Ok(Self::with_targets(Targets::Files(pattern), settings, formatter))
    }

    /// Window writing to the given sinks in order.
    pub fn sinks(
        sinks: impl IntoIterator<Item = Sink>,
        settings: TargetSettings,
        formatter: Box<dyn RecordFormatter>,
    ) -> Result<Self> {
        let sinks: VecDeque<Sink> = sinks.into_iter().collect();
        if sinks.is_empty() {
            return Err(FlowError::Configuration("No output sinks given".to_string()));
        }
        Ok(Self::with_targets(Targets::Sinks(sinks), settings, formatter))
    }

    fn with_targets(
        targets: Targets,
        settings: TargetSettings,
        formatter: Box<dyn RecordFormatter>,
    ) -> Self {
        Self {
            targets,
            formatter,
            settings,
            current: None,
            next_number: 0,
            scratch: Vec::new(),
            skipped: 0,
            written: 0,
            outputs: Vec::new(),
        }
    }

    /// Records written so far, excluding skipped ones.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Names of every output opened so far, in order.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn is_limit_reached(&self) -> bool {
        self.settings.limit.is_some_and(|l| self.written >= l)
    }

    /// Write one record. Returns `false` when the record falls outside the
    /// skip/limit window and was dropped.
    pub fn write(&mut self, record: &Record) -> Result<bool> {
        if self.skipped < self.settings.skip {
            self.skipped += 1;
            return Ok(false);
        }
        if self.is_limit_reached() {
            return Ok(false);
        }

        self.scratch.clear();
        self.formatter.format(record, &mut self.scratch)?;
        let len = self.scratch.len() as u64;

        let rotate = match &self.current {
            None => true,
            Some(t) => {
                t.records > 0
                    && (self.settings.records_per_file.is_some_and(|r| t.records >= r)
                        || self.settings.bytes_per_file.is_some_and(|b| t.bytes + len > b))
            }
        };
        if rotate {
            self.close_current()?;
            self.open_next()?;
        }

        let Some(target) = self.current.as_mut() else {
            return Err(FlowError::Configuration("No open output".to_string()));
        };
        target
            .writer
            .write_all(&self.scratch)
            .map_err(|e| FlowError::source(&target.name, e))?;
        target.records += 1;
        target.bytes += len;
        self.written += 1;
        Ok(true)
    }

    fn open_next(&mut self) -> Result<()> {
        let (name, writer, existing) = match &mut self.targets {
            Targets::Files(pattern) => {
                if self.next_number > 0 && !pattern.is_numbered() {
                    return Err(FlowError::Configuration(format!(
                        "Output '{}' cannot be reopened",
                        pattern.path(0).display()
                    )));
                }
                let path = pattern.path(self.next_number);
                let name = path.display().to_string();
                if self.settings.make_dirs {
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| FlowError::source(&name, e))?;
                    }
                }
                let mut options = OpenOptions::new();
                options.create(true);
                if self.settings.append {
                    options.append(true);
                } else {
                    options.write(true).truncate(true);
                }
                let file = options
                    .open(&path)
                    .map_err(|e| FlowError::source(&name, e))?;
                let existing = if self.settings.append {
                    file.metadata().map(|m| m.len()).unwrap_or(0)
                } else {
                    0
                };
                let writer: Box<dyn Write + Send> = Box::new(BufWriter::new(file));
                (name, writer, existing)
            }
            Targets::Sinks(sinks) => {
                let Some(sink) = sinks.pop_front() else {
                    return Err(FlowError::Configuration(format!(
                        "Ran out of output sinks after {} records",
                        self.written
                    )));
                };
                (sink.name, sink.writer, 0)
            }
        };
        self.next_number += 1;

        let mut target = OpenTarget {
            name,
            writer,
            records: 0,
            bytes: existing,
        };
        if existing == 0 {
            self.write_header(&mut target)?;
        }
        tracing::debug!("Opened output '{}'", target.name);
        self.outputs.push(target.name.clone());
        self.current = Some(target);
        Ok(())
    }

    fn write_header(&mut self, target: &mut OpenTarget) -> Result<()> {
        let mut header = Vec::new();
        self.formatter.header(&mut header)?;
        if !header.is_empty() {
            target
                .writer
                .write_all(&header)
                .map_err(|e| FlowError::source(&target.name, e))?;
            target.bytes += header.len() as u64;
        }
        Ok(())
    }

    fn close_current(&mut self) -> Result<()> {
        let Some(mut target) = self.current.take() else {
            return Ok(());
        };
        let mut footer = Vec::new();
        self.formatter.footer(&mut footer)?;
        target
            .writer
            .write_all(&footer)
            .and_then(|_| target.writer.flush())
            .map_err(|e| FlowError::source(&target.name, e))?;
        tracing::debug!(
            "Closed output '{}' ({} records, {} bytes)",
            target.name,
            target.records,
            target.bytes + footer.len() as u64
        );
        Ok(())
    }

    /// Close any open output and start numbering from 0 again, so a file
    /// pattern is rewritten on the next run. Sink lists are consumed and
    /// cannot be restarted.
    pub fn restart(&mut self) -> Result<()> {
        self.close_current()?;
        if let Targets::Sinks(_) = self.targets {
            if !self.outputs.is_empty() {
                return Err(FlowError::Configuration(
                    "Output sinks cannot be rewritten".to_string(),
                ));
            }
        }
        self.next_number = 0;
        self.skipped = 0;
        self.written = 0;
        self.outputs.clear();
        Ok(())
    }

    /// Flush and close the open output. A window that never received a
    /// record still produces one (possibly empty) output.
    pub fn finish(&mut self) -> Result<()> {
        if self.outputs.is_empty() {
            self.open_next()?;
        }
        self.close_current()
    }
}

impl Drop for TargetWindow {
    fn drop(&mut self) {
        if let Err(e) = self.close_current() {
            tracing::warn!("Failed to close output: {}", e);
        }
    }
}
