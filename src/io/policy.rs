//! Handling of malformed input records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a reader does with a record it cannot decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Stop at the first malformed record; the component fails fatally
    #[default]
    Strict,
    /// Log the malformed record, skip it and continue
    Controlled,
    /// Replace unparsable fields with their defaults and continue
    Lenient,
}

impl FromStr for FaultPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(FaultPolicy::Strict),
            "controlled" => Ok(FaultPolicy::Controlled),
            "lenient" => Ok(FaultPolicy::Lenient),
            other => Err(format!("Unknown fault policy '{}'", other)),
        }
    }
}

impl fmt::Display for FaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultPolicy::Strict => "strict",
            FaultPolicy::Controlled => "controlled",
            FaultPolicy::Lenient => "lenient",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("STRICT".parse::<FaultPolicy>(), Ok(FaultPolicy::Strict));
        assert_eq!(" lenient ".parse::<FaultPolicy>(), Ok(FaultPolicy::Lenient));
        assert!("ignore".parse::<FaultPolicy>().is_err());
        assert_eq!(FaultPolicy::Controlled.to_string(), "controlled");
    }
}
