//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse path patterns: exact (`/users`) or trailing wildcard (`/api/*`)
//! - Match a request path, reporting how specific the match is
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Wildcard prefixes match whole segments: `/api/*` matches `/api`,
//!   `/api/` and `/api/v1` but not `/apix`
//! - `/*` matches every path
//! - No regex to guarantee O(n) matching

use std::fmt;

/// Error for a pattern that cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches one path exactly.
    Exact(String),
    /// Matches the prefix and everything below it. Stored without the
    /// trailing `/*`; the root wildcard is stored as an empty string.
    Prefix(String),
}

/// How a pattern matched, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    /// Wildcard match; the payload is the matched prefix length.
    Prefix(usize),
    Exact,
}

impl PathPattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let invalid = |reason| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        match pattern.find('*') {
            None => Ok(PathPattern::Exact(pattern.to_string())),
            Some(idx) if idx == pattern.len() - 1 && pattern.ends_with("/*") => {
                Ok(PathPattern::Prefix(pattern[..idx - 1].to_string()))
            }
            Some(_) => Err(invalid("'*' is only allowed as a trailing '/*' segment")),
        }
    }

    /// Match `path`, returning the match strength.
    pub fn matches(&self, path: &str) -> Option<MatchKind> {
        match self {
            PathPattern::Exact(exact) => (exact == path).then_some(MatchKind::Exact),
            PathPattern::Prefix(prefix) => {
                let hit = match path.strip_prefix(prefix.as_str()) {
                    Some(rest) => rest.is_empty() || rest.starts_with('/'),
                    None => false,
                };
                hit.then_some(MatchKind::Prefix(prefix.len()))
            }
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Exact(p) => f.write_str(p),
            PathPattern::Prefix(p) => write!(f, "{p}/*"),
        }
    }
}
