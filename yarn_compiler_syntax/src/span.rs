//! Source locations attached to tree elements.
//!
//! The front end fills these in; the compiler only reads them to position
//! diagnostics, string table entries and debug info. Lines and columns are
//! 1-based, and a zero line means the element has no position.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Span {
    /// Byte range in the file.
    pub start: usize,
    pub end: usize,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    /// Span used for synthesized or position-less elements.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A zero-width position.
    pub fn point(line: usize, column: usize) -> Self {
        Self {
            start_line: line,
            start_column: column,
            end_line: line,
            end_column: column,
            ..Self::default()
        }
    }

    /// The start of `line`.
    pub fn at_line(line: usize) -> Self {
        Self::point(line, 1)
    }

    /// Set the byte range the front end measured.
    pub fn with_bytes(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn is_known(&self) -> bool {
        self.start_line > 0 || self.end > 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == 0 {
            write!(f, "?")
        } else {
            write!(f, "{}:{}", self.start_line, self.start_column)
        }
    }
}
