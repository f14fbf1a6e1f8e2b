//! Delimited text codec: one record per line, fields split by a single
//! delimiter character. Empty fields are NULL for nullable fields.

use crate::error::{FlowError, Result};
use crate::io::codec::{RecordFormatter, RecordParser};
use crate::io::policy::FaultPolicy;
use crate::record::{Record, Schema, Value};
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;

pub struct DelimitedParser {
    schema: Arc<Schema>,
    delimiter: char,
    skip_header: bool,
    policy: FaultPolicy,
    reader: Option<BufReader<Box<dyn Read + Send>>>,
    source: String,
    raw: Vec<u8>,
    line: String,
    line_no: u64,
}

impl DelimitedParser {
    pub fn new(schema: Arc<Schema>, delimiter: char) -> Self {
        Self {
            schema,
            delimiter,
            skip_header: false,
            policy: FaultPolicy::Strict,
            reader: None,
            source: String::new(),
            raw: Vec::new(),
            line: String::new(),
            line_no: 0,
        }
    }

    /// Ignore the first line of every source.
    pub fn with_header(mut self) -> Self {
        self.skip_header = true;
        self
    }

    /// Read the next non-empty line into `self.line`. `false` at end of source.
    ///
    /// Under [`FaultPolicy::Lenient`] undecodable bytes become U+FFFD.
    fn read_line(&mut self) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        loop {
            self.raw.clear();
            let n = reader
                .read_until(b'\n', &mut self.raw)
                .map_err(|e| FlowError::source(&self.source, e))?;
            if n == 0 {
                return Ok(false);
            }
            self.line_no += 1;
            self.line.clear();
            match std::str::from_utf8(&self.raw) {
                Ok(text) => self.line.push_str(text),
                Err(_) if self.policy == FaultPolicy::Lenient => {
                    self.line.push_str(&String::from_utf8_lossy(&self.raw))
                }
                Err(_) => {
                    return Err(FlowError::malformed(
                        format!("{}:{}", self.source, self.line_no),
                        "line is not valid UTF-8",
                    ))
                }
            }
            if !self.line.trim_end_matches(['\n', '\r']).is_empty() {
                return Ok(true);
            }
        }
    }

    fn parse_line(&self, record: &mut Record) -> Result<()> {
        let location = || format!("{}:{}", self.source, self.line_no);
        let text = self.line.trim_end_matches(['\n', '\r']);
        let raw: Vec<&str> = text.split(self.delimiter).collect();
        let lenient = self.policy == FaultPolicy::Lenient;

        if raw.len() != self.schema.len() && !lenient {
            return Err(FlowError::malformed(
                location(),
                format!("expected {} fields, found {}", self.schema.len(), raw.len()),
            ));
        }

        for (i, field) in self.schema.fields().iter().enumerate() {
            let Some(&value) = raw.get(i) else {
                record.reset_field(i);
                continue;
            };

            let parsed = if value.is_empty() && field.nullable {
                Ok(Value::Null)
            } else {
                field.field_type.parse_text(value, field.format.as_deref())
            };

            match parsed.map_err(|m| FlowError::malformed(location(), format!("field '{}': {}", field.name, m)))
                .and_then(|v| record.set(i, v))
            {
                Ok(()) => {}
                Err(_) if lenient => record.reset_field(i),
                Err(FlowError::TypeMismatch { field, found, .. }) => {
                    return Err(FlowError::malformed(
                        location(),
                        format!("field '{}' cannot hold {}", field, found),
                    ))
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl RecordParser for DelimitedParser {
    fn open(&mut self, input: Box<dyn Read + Send>, source_name: &str) -> Result<()> {
        self.reader = Some(BufReader::new(input));
        self.source = source_name.to_string();
        self.line_no = 0;
        if self.skip_header {
            self.read_line()?;
        }
        Ok(())
    }

    fn next_record(&mut self, record: &mut Record) -> Result<bool> {
        if !self.read_line()? {
            return Ok(false);
        }
        self.parse_line(record)?;
        Ok(true)
    }

    fn skip(&mut self, count: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < count {
            match self.read_line() {
                Ok(true) => skipped += 1,
                Ok(false) => break,
                Err(e) if e.is_malformed() => skipped += 1,
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

pub struct DelimitedFormatter {
    delimiter: char,
    header: Option<Arc<Schema>>,
}

impl DelimitedFormatter {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            header: None,
        }
    }

    /// Start every target with a line of field names.
    pub fn with_header(mut self, schema: Arc<Schema>) -> Self {
        self.header = Some(schema);
        self
    }
}

impl RecordFormatter for DelimitedFormatter {
    fn header(&mut self, out: &mut Vec<u8>) -> Result<()> {
        if let Some(schema) = &self.header {
            let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
            out.extend_from_slice(names.join(&self.delimiter.to_string()).as_bytes());
            out.push(b'\n');
        }
        Ok(())
    }

    fn format(&mut self, record: &Record, out: &mut Vec<u8>) -> Result<()> {
        let mut delim = [0u8; 4];
        let delim = self.delimiter.encode_utf8(&mut delim).as_bytes();
        for (i, (field, value)) in record.schema().fields().iter().zip(record.values()).enumerate() {
            if i > 0 {
                out.extend_from_slice(delim);
            }
            out.extend_from_slice(value.to_text(field.format.as_deref()).as_bytes());
        }
        out.push(b'\n');
        Ok(())
    }
}
