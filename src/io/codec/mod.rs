//! Record codecs.
//!
//! Format-specific readers and writers plug into the file windows through two
//! traits: [`RecordParser`] decodes records from a byte stream and
//! [`RecordFormatter`] encodes them. Two reference codecs ship with the crate:
//! delimited text lines and the engine's own length-prefixed binary framing.

pub mod binary;
pub mod delimited;

pub use binary::{BinaryFormatter, BinaryParser};
pub use delimited::{DelimitedFormatter, DelimitedParser};

use crate::error::Result;
use crate::io::policy::FaultPolicy;
use crate::record::Record;
use std::io::Read;

/// Decodes records from one source at a time.
#[cfg_attr(test, mockall::automock)]
pub trait RecordParser: Send {
    /// Start reading a new source, replacing any previous one.
    fn open(&mut self, input: Box<dyn Read + Send>, source_name: &str) -> Result<()>;

    /// Decode the next record into `record`. `Ok(false)` at end of source.
    ///
    /// A `Malformed` error leaves the parser positioned after the offending
    /// record, so the caller may continue with the next one.
    fn next_record(&mut self, record: &mut Record) -> Result<bool>;

    /// Skip up to `count` records; returns how many were skipped.
    fn skip(&mut self, count: u64) -> Result<u64>;

    /// How malformed input is handled inside the parser. Under
    /// [`FaultPolicy::Lenient`] unparsable fields take their defaults.
    fn set_policy(&mut self, policy: FaultPolicy);

    /// Release the current source.
    fn close(&mut self) -> Result<()>;
}

/// Encodes records for one target at a time.
pub trait RecordFormatter: Send {
    /// Bytes written at the start of every physical target.
    fn header(&mut self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }

    /// Append the encoding of one record.
    fn format(&mut self, record: &Record, out: &mut Vec<u8>) -> Result<()>;

    /// Bytes written at the end of every physical target.
    fn footer(&mut self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}
