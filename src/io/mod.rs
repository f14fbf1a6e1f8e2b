//! File-side I/O: fault policies, record codecs and the multi-file windows
//! readers and writers are built on.

pub mod codec;
pub mod policy;
pub mod source;
pub mod target;
pub mod wildcard;

pub use codec::{RecordFormatter, RecordParser};
pub use policy::FaultPolicy;
pub use source::{ParseFailure, SourceSpec, SourceWindow, WindowSettings};
pub use target::{FilePattern, MemoryTarget, Sink, TargetSettings, TargetWindow};
