//! Path matching rules.
//!
//! # Responsibilities
//! - Normalize bound paths
//! - Decide whether a request path falls under a prefix binding
//!
//! # Design Decisions
//! - Prefix matching is segment-aware: `/api` matches `/api` and `/api/v1`,
//!   never `/apix`
//! - Matching is case-sensitive
//! - No regex, so matching stays O(path length)

use serde::{Deserialize, Serialize};

/// How a bound path is compared with request paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Only the identical path matches.
    #[serde(alias = "EXACT")]
    Exact,
    /// The path and everything below it match.
    #[serde(alias = "PREFIX")]
    Prefix,
}

impl std::fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Prefix => write!(f, "prefix"),
        }
    }
}

/// Normalizes a bound path: leading slash, no duplicate or trailing slashes.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Returns true if `path` lies under the (normalized) `prefix`.
pub fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
