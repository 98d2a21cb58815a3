//! Version marker parsing and the update decision.
//!
//! Markers are read by scanning source text line by line, so unrelated edits
//! to the file that carries the marker never require a supervisor change.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Integer release marker embedded in the source tree.
///
/// Ordered numerically: `9 < 10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct VersionMarker(pub u64);

impl fmt::Display for VersionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure to extract a marker from source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerParseError {
    /// No line declares the marker.
    #[error("no `{name}` declaration found")]
    Missing { name: String },
    /// The declared value is not a non-negative integer.
    #[error("`{name}` value '{value}' is not an integer")]
    NotInteger { name: String, value: String },
}

/// Extract the marker named `name` from `source`.
///
/// The first line that starts with `name` followed by whitespace, `=`, or a
/// `: <type>` annotation wins. The value is everything after the first `=`, up
/// to a trailing `#` comment, with surrounding whitespace and quote characters
/// removed.
pub fn parse_marker(source: &str, name: &str) -> Result<VersionMarker, MarkerParseError> {
    for line in source.lines() {
        let Some(rest) = line.strip_prefix(name) else {
            continue;
        };
        let Some(value) = declared_value(rest) else {
            continue;
        };
        let value = strip_comment(value)
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim();
        return value
            .parse::<u64>()
            .map(VersionMarker)
            .map_err(|_| MarkerParseError::NotInteger {
                name: name.to_string(),
                value: value.to_string(),
            });
    }
    Err(MarkerParseError::Missing {
        name: name.to_string(),
    })
}

/// Text after `=` when `rest` continues a declaration, skipping a type annotation.
fn declared_value(rest: &str) -> Option<&str> {
    let rest = rest.trim_start();
    if let Some(value) = rest.strip_prefix('=') {
        return Some(value);
    }
    let (_annotation, value) = rest.strip_prefix(':')?.split_once('=')?;
    Some(value)
}

fn strip_comment(value: &str) -> &str {
    match value.split_once('#') {
        Some((before, _)) => before,
        None => value,
    }
}

/// Outcome of comparing the local marker against the remote one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    UpToDate {
        version: VersionMarker,
    },
    /// Any mismatch, whether the local tree is behind or ahead.
    UpdateRequired {
        local: VersionMarker,
        remote: VersionMarker,
    },
}

impl UpdateDecision {
    pub fn is_update_required(&self) -> bool {
        matches!(self, UpdateDecision::UpdateRequired { .. })
    }
}

pub fn decide(local: VersionMarker, remote: VersionMarker) -> UpdateDecision {
    if local == remote {
        UpdateDecision::UpToDate { version: local }
    } else {
        UpdateDecision::UpdateRequired { local, remote }
    }
}
