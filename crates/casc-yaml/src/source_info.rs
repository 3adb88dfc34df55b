//! Source location information for YAML nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a YAML node came from.
///
/// Carries the provenance label of the source (a path, a URL, a stream name)
/// together with the position of the node inside that source. Merged trees
/// keep the `SourceInfo` of whichever source contributed each node, so errors
/// raised after merging still point at the right document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Provenance label of the source document
    pub source: Option<String>,

    /// Byte offset from start of source (0-based)
    pub offset: usize,

    /// Line number (1-based)
    pub line: usize,

    /// Column number (1-based, in characters not bytes)
    pub col: usize,

    /// Length in bytes
    pub len: usize,
}

impl SourceInfo {
    pub fn new(source: Option<String>, offset: usize, line: usize, col: usize, len: usize) -> Self {
        Self {
            source,
            offset,
            line,
            col,
            len,
        }
    }

    /// Create a SourceInfo from a yaml-rust2 marker.
    ///
    /// yaml-rust2 lines are already 1-based, columns are 0-based.
    pub fn from_marker(marker: &yaml_rust2::scanner::Marker, len: usize) -> Self {
        Self {
            source: None,
            offset: marker.index(),
            line: marker.line(),
            col: marker.col() + 1,
            len,
        }
    }

    /// Set the provenance label for this location.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get the end offset (exclusive) of this location.
    pub fn end_offset(&self) -> usize {
        self.offset + self.len
    }

    /// The provenance label, or `<unknown>` when the node was built in memory.
    pub fn label(&self) -> &str {
        self.source.as_deref().unwrap_or("<unknown>")
    }
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self {
            source: None,
            offset: 0,
            line: 1,
            col: 1,
            len: 0,
        }
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, line {}, column {}", self.label(), self.line, self.col)
    }
}
