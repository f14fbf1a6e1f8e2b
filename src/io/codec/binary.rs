//! Binary codec: each record is a varint length prefix followed by the
//! record's own serialized form.

use crate::config::DEFAULT_RECORD_LIMIT;
use crate::error::{FlowError, Result};
use crate::io::codec::{RecordFormatter, RecordParser};
use crate::io::policy::FaultPolicy;
use crate::record::varint;
use crate::record::{Record, Schema};
use std::io::{self, BufReader, Read};
use std::sync::Arc;

pub struct BinaryParser {
    schema: Arc<Schema>,
    policy: FaultPolicy,
    max_frame: usize,
    reader: Option<BufReader<Box<dyn Read + Send>>>,
    source: String,
    frame: Vec<u8>,
    index: u64,
}

impl BinaryParser {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            policy: FaultPolicy::Strict,
            max_frame: DEFAULT_RECORD_LIMIT,
            reader: None,
            source: String::new(),
            frame: Vec::new(),
            index: 0,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Reject frames longer than `limit` bytes.
    pub fn with_max_frame(mut self, limit: usize) -> Self {
        self.max_frame = limit;
        self
    }

    /// Load the next frame into `self.frame`. `false` at a clean end of source.
    fn read_frame(&mut self) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        let source = &self.source;
        let truncated = |index: u64| FlowError::malformed(format!("{}#{}", source, index), "truncated frame");

        let len = match varint::read_varint(reader) {
            Ok(Some(len)) => len as usize,
            Ok(None) => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.reader = None;
                return Err(truncated(self.index + 1));
            }
            Err(e) => return Err(FlowError::source(source, e)),
        };
        self.index += 1;

        if len > self.max_frame {
            // The stream cannot be resynchronised past an oversized prefix.
            self.reader = None;
            return Err(FlowError::malformed(
                format!("{}#{}", self.source, self.index),
                format!("frame of {} bytes exceeds the {} byte limit", len, self.max_frame),
            ));
        }

        self.frame.resize(len, 0);
        match reader.read_exact(&mut self.frame) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.reader = None;
                Err(truncated(self.index))
            }
            Err(e) => Err(FlowError::source(source, e)),
        }
    }
}

impl RecordParser for BinaryParser {
    fn open(&mut self, input: Box<dyn Read + Send>, source_name: &str) -> Result<()> {
        self.reader = Some(BufReader::new(input));
        self.source = source_name.to_string();
        self.index = 0;
        Ok(())
    }

    fn next_record(&mut self, record: &mut Record) -> Result<bool> {
        match self.read_frame() {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            // A cut-off frame still stands for one record.
            Err(e) if e.is_malformed() && self.policy == FaultPolicy::Lenient => {
                tracing::warn!("{}", e);
                record.reset();
                return Ok(true);
            }
            Err(e) => return Err(e),
        }
        let mut buf = &self.frame[..];
        match record.deserialize(&mut buf) {
            Ok(()) => Ok(true),
            Err(_) if self.policy == FaultPolicy::Lenient => {
                record.reset();
                Ok(true)
            }
            Err(e) => Err(FlowError::malformed(
                format!("{}#{}", self.source, self.index),
                e.to_string(),
            )),
        }
    }

    fn skip(&mut self, count: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < count {
            match self.read_frame() {
                Ok(true) => skipped += 1,
                Ok(false) => break,
                // The reader is gone after a bad frame, so this ends the loop.
                Err(e) if e.is_malformed() && self.policy != FaultPolicy::Strict => {
                    tracing::warn!("Skipped {}", e);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(skipped)
    }

    fn set_policy(&mut self, policy: FaultPolicy) {
        self.policy = policy;
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct BinaryFormatter;

impl BinaryFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormatter for BinaryFormatter {
    fn format(&mut self, record: &Record, out: &mut Vec<u8>) -> Result<()> {
        varint::put_varint(out, record.serialized_size() as u64);
        record.serialize(out)
    }
}
