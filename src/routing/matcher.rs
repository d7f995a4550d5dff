//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix (literal, case-sensitive)
//! - Compare leading path segments for the proxy guard
//! - Strip a matched prefix
//! - Clean request paths before dispatch
//!
//! # Design Decisions
//! - Path matching is a literal left-anchored string comparison
//! - No trailing-slash normalization: `/a` and `/a/` are distinct prefixes
//! - No regex to guarantee O(n) matching

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if `path` starts with the prefix.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// The segment between the first and second `/`, empty when absent.
pub fn first_segment(path: &str) -> &str {
    path.split('/').nth(1).unwrap_or("")
}

/// Remainder of `path` after `prefix`; `path` itself when it does not match.
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or(path)
}

/// Canonical form of a URL path.
///
/// Collapses repeated slashes, drops `.` segments and resolves `..`
/// lexically without climbing above the root. A trailing slash survives.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut cleaned = String::with_capacity(path.len() + 1);
    cleaned.push('/');
    cleaned.push_str(&segments.join("/"));
    if path.ends_with('/') && cleaned != "/" {
        cleaned.push('/');
    }
    cleaned
}
