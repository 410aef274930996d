//! Validated logical paths into the remote tree store.
//!
//! A `TreePath` addresses a whole subtree (e.g. `entities/42`,
//! `userTasks/42`, `settings/vip`). Validation happens once, at parse
//! time: code holding a `TreePath` never has to re-check for the
//! stringified-garbage segments (`"undefined"`, `"null"`,
//! `"[object Object]"`) that corrupt remote records when they leak into
//! an address.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Segment values that only ever appear when a caller interpolated a
/// missing variable into a path string. Always a programming error.
const POISON_SEGMENTS: [&str; 3] = ["undefined", "null", "[object Object]"];

/// Characters the remote store reserves; never valid inside a segment.
const RESERVED_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

/// A validated logical path in the remote tree store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath {
    joined: String,
}

impl TreePath {
    /// Parses and validates a logical path.
    ///
    /// Rejects empty paths, empty segments (leading/trailing/double
    /// slashes), poison segments, and reserved characters.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.is_empty() {
            return Err(Error::InvalidPath("empty path".to_string()));
        }
        for segment in s.split('/') {
            if segment.is_empty() {
                return Err(Error::InvalidPath(format!("empty segment in {s:?}")));
            }
            if POISON_SEGMENTS.contains(&segment) {
                return Err(Error::InvalidPath(format!(
                    "poison segment {segment:?} in {s:?}"
                )));
            }
            if let Some(c) = segment.chars().find(|c| RESERVED_CHARS.contains(c)) {
                return Err(Error::InvalidPath(format!(
                    "reserved character {c:?} in {s:?}"
                )));
            }
        }
        Ok(Self {
            joined: s.to_string(),
        })
    }

    /// Returns the full path as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.joined
    }

    /// Iterates over the path's segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.joined.split('/')
    }

    /// Returns the first segment (the collection root).
    #[must_use]
    pub fn root(&self) -> &str {
        self.joined.split('/').next().unwrap_or(&self.joined)
    }

    /// Appends a segment, validating it the same way `parse` does.
    pub fn child(&self, segment: &str) -> Result<Self, Error> {
        Self::parse(&format!("{}/{segment}", self.joined))
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joined)
    }
}

impl FromStr for TreePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TreePath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TreePath> for String {
    fn from(path: TreePath) -> Self {
        path.joined
    }
}
