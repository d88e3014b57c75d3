use std::fmt;

use serde::Serialize;

use crate::source_map::Pos;

/// One reported finding. Line and column are 1-based; 0 means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filepath: String,
    pub line: u32,
    pub column: u32,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, filepath: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            filepath: filepath.into(),
            line: pos.line,
            column: pos.col,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.filepath, self.line, self.column, self.message
        )
    }
}
