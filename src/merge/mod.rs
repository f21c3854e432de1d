//! Config merge engine
//!
//! Config sources are folded into one tree in priority order. Each source may
//! declare, per dotted key path, how its value combines with what has been
//! accumulated so far:
//!
//! - `replace` - the incoming value replaces the accumulated one outright
//! - `insert` - the incoming list is placed before the accumulated list
//!
//! Paths without a declared mode use the default rules implemented in
//! [`yaml`]: maps merge key by key, lists append and scalars overwrite.
//!
//! ## Common Types
//!
//! Merge-mode keys are parsed into [`PathSegment`]s with [`parse_path`], the
//! same notation used to report the key a merge failed at.

pub mod yaml;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents a segment in a path expression for navigating nested structures
///
/// Path expressions like "servers[0].host" or "database.connection.timeout"
/// are parsed into a sequence of PathSegments for navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// A named key for accessing object/map members
    Key(String),
    /// A numeric index for accessing array/sequence elements
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(idx) => write!(f, "[{}]", idx),
        }
    }
}

/// Render segments back into dotted notation.
pub fn format_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(_) => out.push_str(&segment.to_string()),
        }
    }
    out
}

/// Parse a path string into segments
///
/// Supports:
/// - Dot notation: `foo.bar.baz`
/// - Bracket notation: `foo["bar"]` or `foo['bar']`
/// - Array indices: `foo[0]` or `items[1].name`
/// - Escaped characters: `foo\.bar` (literal dot)
///
/// # Examples
///
/// ```
/// use bundlekit::merge::parse_path;
///
/// let segments = parse_path("deploy.targets[0]");
/// assert_eq!(segments.len(), 3);
/// ```
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    if path.trim().is_empty() || path == "/" {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' => escaped = true,
            '.' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }

                match chars.peek().copied() {
                    Some(quote) if quote == '"' || quote == '\'' => {
                        chars.next();
                        let mut key = String::new();
                        let mut bracket_escaped = false;
                        while let Some(ch) = chars.next() {
                            if bracket_escaped {
                                key.push(ch);
                                bracket_escaped = false;
                            } else if ch == '\\' {
                                bracket_escaped = true;
                            } else if ch == quote && chars.peek() == Some(&']') {
                                chars.next();
                                break;
                            } else {
                                key.push(ch);
                            }
                        }
                        segments.push(PathSegment::Key(key));
                    }
                    _ => {
                        let mut content = String::new();
                        for next in chars.by_ref() {
                            if next == ']' {
                                break;
                            }
                            content.push(next);
                        }
                        let content = content.trim();
                        if let Ok(idx) = content.parse::<usize>() {
                            segments.push(PathSegment::Index(idx));
                        } else if !content.is_empty() {
                            segments.push(PathSegment::Key(content.to_string()));
                        }
                    }
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }

    segments
}

/// How a source's value at one path combines with the accumulated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    Replace,
    Insert,
}

/// The merge modes one config source declares, keyed by parsed path.
#[derive(Debug, Clone, Default)]
pub struct MergeModes {
    modes: Vec<(Vec<PathSegment>, MergeMode)>,
}

impl MergeModes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `merges` table of a config source.
    pub fn from_declared(declared: &BTreeMap<String, MergeMode>) -> Self {
        let mut modes = Self::new();
        for (path, mode) in declared {
            modes.set(path, *mode);
        }
        modes
    }

    pub fn set(&mut self, path: &str, mode: MergeMode) {
        let segments = parse_path(path);
        self.modes.retain(|(existing, _)| existing != &segments);
        self.modes.push((segments, mode));
    }

    /// The mode declared for exactly `path`, if any.
    pub fn get(&self, path: &[PathSegment]) -> Option<MergeMode> {
        self.modes
            .iter()
            .find(|(segments, _)| segments.as_slice() == path)
            .map(|(_, mode)| *mode)
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}
