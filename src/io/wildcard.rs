//! Source list expansion.
//!
//! A source specification is a `;`-separated list. Each entry is a path, `-`
//! for standard input, or a path whose file name contains `*` or `?`.
//! Wildcard entries expand to the matching files of the directory in sorted
//! order.

use crate::error::{FlowError, Result};
use crate::io::source::SourceSpec;
use regex::Regex;
use std::path::{Path, PathBuf};

pub fn has_wildcard(text: &str) -> bool {
    text.contains(['*', '?'])
}

/// Anchored regex equivalent of a file name pattern.
pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
        .map_err(|e| FlowError::Configuration(format!("Invalid wildcard '{}': {}", pattern, e)))
}

/// Expand a `;`-separated source specification.
pub fn resolve_sources(spec: &str) -> Result<Vec<SourceSpec>> {
    let mut sources = Vec::new();
    for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        if entry == "-" {
            sources.push(SourceSpec::Stdin);
            continue;
        }
        if !has_wildcard(entry) {
            sources.push(SourceSpec::File(PathBuf::from(entry)));
            continue;
        }

        let matches = expand(Path::new(entry))?;
        if matches.is_empty() {
            tracing::warn!("Wildcard '{}' matched no files", entry);
        }
        sources.extend(matches.into_iter().map(SourceSpec::File));
    }
    Ok(sources)
}

fn expand(path: &Path) -> Result<Vec<PathBuf>> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if has_wildcard(&dir.to_string_lossy()) {
        return Err(FlowError::Configuration(format!(
            "Wildcards are only supported in file names: '{}'",
            path.display()
        )));
    }
    let pattern = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let re = wildcard_regex(&pattern)?;

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(FlowError::source(dir.display().to_string(), e)),
    };

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FlowError::source(dir.display().to_string(), e))?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && re.is_match(&entry.file_name().to_string_lossy()) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches)
}
