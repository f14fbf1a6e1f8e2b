//! Per-component settings
//!
//! These are plain serde types so a graph description can carry them as
//! JSON or TOML tables. Every field has a default, so only the attributes a
//! component actually needs have to be written out.
//!
//! # Main Types
//!
//! - [`ReaderSettings`] - Source list, skip/limit windows, fault policy
//! - [`WriterSettings`] - Target pattern, rotation, writer-side skip/limit
//! - [`SortSettings`] - Sort key and striped pool sizing
//! - [`DedupSettings`] - Dedup key and keep policy
//! - [`SequenceCheckSettings`] - Key order and uniqueness checks

use crate::io::policy::FaultPolicy;
use serde::{Deserialize, Serialize};

/// How a reader obtains sources from its input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortSourceMode {
    /// The field content is the data of one source
    #[default]
    Discrete,
    /// The field content is a source list (paths, wildcards)
    Source,
}

/// Port-fed reading: each input record contributes sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSourceSettings {
    /// Name of the string or bytes field read from the input record
    pub field: String,
    #[serde(default)]
    pub mode: PortSourceMode,
}

/// Reader settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// `;`-separated list of paths, wildcard patterns or `-` for stdin
    pub source: String,
    /// Records skipped once across the concatenated sources
    pub skip: u64,
    /// Records returned in total
    pub limit: Option<u64>,
    /// Records skipped at the start of every source
    pub source_skip: u64,
    /// Records returned from every source
    pub source_limit: Option<u64>,
    /// Overrides the engine default fault policy
    pub policy: Option<FaultPolicy>,
    /// Read sources named by (or carried in) input records
    pub port_source: Option<PortSourceSettings>,
}

/// Writer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    /// Output path; a run of `#` is replaced by the zero-padded file number
    pub target: String,
    /// Start a new file after this many records
    pub records_per_file: Option<u64>,
    /// Start a new file before this many bytes would be exceeded
    pub bytes_per_file: Option<u64>,
    /// Records dropped before writing starts
    pub skip: u64,
    /// Records written in total
    pub limit: Option<u64>,
    /// Append to existing files instead of truncating them
    pub append: bool,
    /// Create missing parent directories
    pub make_dirs: bool,
}

/// Parallel sort settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSettings {
    /// Sort key spec, e.g. `"customer;amount(d)"`
    pub key: String,
    /// Overrides `pool.stripes`
    pub stripes: Option<usize>,
    /// Overrides `pool.stripe_capacity`
    pub stripe_capacity: Option<usize>,
    /// Overrides `pool.workers`
    pub workers: Option<usize>,
}

/// Which records of a duplicate group survive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keep {
    #[default]
    First,
    Last,
    /// Only groups of exactly one record
    Unique,
}

fn default_true() -> bool {
    true
}

fn default_one() -> usize {
    1
}

/// Dedup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupSettings {
    /// Key spec; records with equal keys form a group
    pub key: String,
    #[serde(default)]
    pub keep: Keep,
    /// Records kept per group for `first`/`last`
    #[serde(default = "default_one")]
    pub no_dup_record: usize,
    #[serde(default = "default_true")]
    pub equal_nulls: bool,
    /// Input arrives grouped by key; otherwise groups are hashed
    #[serde(default = "default_true")]
    pub sorted: bool,
}

impl DedupSettings {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            keep: Keep::First,
            no_dup_record: 1,
            equal_nulls: true,
            sorted: true,
        }
    }
}

/// Sequence check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceCheckSettings {
    /// Key spec; `(d)` parts must be non-increasing
    pub key: String,
    /// Equal consecutive keys are a violation
    #[serde(default)]
    pub unique_keys: bool,
    #[serde(default = "default_true")]
    pub equal_nulls: bool,
}

impl SequenceCheckSettings {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            unique_keys: false,
            equal_nulls: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_settings_from_toml() {
        let settings: ReaderSettings = toml::from_str(
            r#"
source = "in/*.csv;extra.csv"
skip = 15
limit = 5
policy = "controlled"
"#,
        )
        .unwrap();
        assert_eq!(settings.skip, 15);
        assert_eq!(settings.limit, Some(5));
        assert_eq!(settings.source_limit, None);
        assert_eq!(settings.policy, Some(FaultPolicy::Controlled));
    }

    #[test]
    fn test_dedup_defaults() {
        let settings: DedupSettings = serde_json::from_str(r#"{"key": "id", "keep": "last"}"#).unwrap();
        assert_eq!(settings.keep, Keep::Last);
        assert_eq!(settings.no_dup_record, 1);
        assert!(settings.equal_nulls);
        assert!(settings.sorted);
    }

    #[test]
    fn test_port_source_settings() {
        let settings: ReaderSettings =
            serde_json::from_str(r#"{"port_source": {"field": "payload"}}"#).unwrap();
        let port = settings.port_source.unwrap();
        assert_eq!(port.field, "payload");
        assert_eq!(port.mode, PortSourceMode::Discrete);
    }
}
