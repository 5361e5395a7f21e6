//! Source locations of nondeterministic input sites.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a call site that produces a nondeterministic value.
///
/// Compared structurally: two locations are the same site iff all four
/// fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NondetLocation {
    pub file_name: String,
    pub line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

impl NondetLocation {
    pub fn new(file_name: impl Into<String>, line: u32, start_column: u32, end_column: u32) -> Self {
        Self {
            file_name: file_name.into(),
            line,
            start_column,
            end_column,
        }
    }
}

impl fmt::Display for NondetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}-{}",
            self.file_name, self.line, self.start_column, self.end_column
        )
    }
}
