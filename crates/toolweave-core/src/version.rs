//! Semantic version parsing and range matching.
//!
//! Built on the `semver` crate, with a normalization pass so range strings
//! read the way tool authors write them:
//!
//! - a bare version (`1.2.3`) means exact equality, not Cargo's caret default
//! - `x` / `X` are wildcards like `*`
//! - comparators may be separated by commas or whitespace (AND)
//! - an operator may be split from its version by a space (`>= 1.2.0`)
//! - `||` separates alternatives (OR)

use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("invalid version range '{input}': {reason}")]
    InvalidRange { input: String, reason: String },
}

const OPERATORS: &[&str] = &[">=", "<=", ">", "<", "=", "^", "~"];

/// Parse a strict `MAJOR.MINOR.PATCH[-pre][+build]` version.
pub fn parse_version(input: &str) -> Result<Version, VersionError> {
    Version::parse(input.trim()).map_err(|e| VersionError::InvalidVersion {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// VersionRange
// ---------------------------------------------------------------------------

/// A parsed range expression: a union of comparator sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = |reason: String| VersionError::InvalidRange {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::any());
        }
        if trimmed.contains(" - ") {
            return Err(invalid("hyphen ranges are not supported".to_string()));
        }

        let mut alternatives = Vec::new();
        for part in trimmed.split("||") {
            let normalized = normalize_comparator_set(part).map_err(invalid)?;
            let req = VersionReq::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
            alternatives.push(req);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            alternatives,
        })
    }

    /// The range that matches every release version.
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            alternatives: vec![VersionReq::STAR],
        }
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Rewrite one `||` alternative into the comma-separated form `semver` parses.
fn normalize_comparator_set(part: &str) -> Result<String, String> {
    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in part.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        if OPERATORS.contains(&token) {
            if let Some(op) = pending_op {
                return Err(format!("operator '{op}' is missing a version"));
            }
            pending_op = Some(token);
            continue;
        }
        let token = normalize_wildcards(token);
        let comparator = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            None if starts_with_operator(&token) || is_wildcard(&token) => token,
            // Bare versions are exact matches.
            None => format!("={token}"),
        };
        comparators.push(comparator);
    }

    if let Some(op) = pending_op {
        return Err(format!("operator '{op}' is missing a version"));
    }
    if comparators.is_empty() {
        return Err("empty alternative".to_string());
    }
    Ok(comparators.join(", "))
}

fn normalize_wildcards(token: &str) -> String {
    token
        .split('.')
        .map(|segment| match segment {
            "x" | "X" => "*",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn starts_with_operator(token: &str) -> bool {
    token.starts_with(['>', '<', '=', '^', '~'])
}

fn is_wildcard(token: &str) -> bool {
    token.split('.').any(|segment| segment == "*")
}

// ---------------------------------------------------------------------------
// Convenience queries
// ---------------------------------------------------------------------------

/// Does `version` satisfy `range`? Both are parsed first.
pub fn satisfies(version: &str, range: &str) -> Result<bool, VersionError> {
    let version = parse_version(version)?;
    let range = VersionRange::parse(range)?;
    Ok(range.matches(&version))
}

/// Highest candidate matching `range`.
pub fn max_satisfying<'a, I>(candidates: I, range: &VersionRange) -> Option<&'a Version>
where
    I: IntoIterator<Item = &'a Version>,
{
    candidates.into_iter().filter(|v| range.matches(v)).max()
}

/// Whether `host` lies within the inclusive `[min, max]` bounds.
pub fn host_compatible(
    host: &Version,
    min: Option<&str>,
    max: Option<&str>,
) -> Result<bool, VersionError> {
    if let Some(min) = min {
        if *host < parse_version(min)? {
            return Ok(false);
        }
    }
    if let Some(max) = max {
        if *host > parse_version(max)? {
            return Ok(false);
        }
    }
    Ok(true)
}
