//! Minimal URI type for host-side document addressing.
//!
//! The bridge only ever deals with two shapes: plain file paths coming from
//! the active editor, and synthetic `mcshader:` URIs for virtual merged
//! documents. A scheme + path pair covers both without pulling in a full
//! URI parser.

use std::fmt;

/// A scheme + path pair, rendered as `scheme:path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    scheme: String,
    path: String,
}

impl Uri {
    /// Creates a URI from a scheme and a path.
    pub fn new(scheme: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            path: path.into(),
        }
    }

    /// Creates a `file:` URI for a plain path.
    pub fn file(path: impl Into<String>) -> Self {
        Self::new("file", path)
    }

    /// Parses a `scheme:path` string. Returns `None` when no scheme
    /// separator is present.
    pub fn parse(s: &str) -> Option<Self> {
        let (scheme, path) = s.split_once(':')?;
        if scheme.is_empty() {
            return None;
        }
        Some(Self::new(scheme, path))
    }

    /// The URI scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The path component.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.path)
    }
}
