use std::fmt;

/// The location of a token or a diagnostic within a source file.
///
/// Line 0 is reserved for diagnostics that don't originate from a specific source position
/// (command-line / attribute-level errors, ICEs raised deep in a later pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub file: Option<&'static str>,
    pub line: u32,
    pub col: u32,
}

impl Location {
    pub fn new(file: &'static str, line: u32, col: u32) -> Self {
        Self {
            file: Some(file),
            line,
            col,
        }
    }

    pub const fn unknown() -> Self {
        Self {
            file: None,
            line: 0,
            col: 0,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file {
            Some(file) => write!(f, "{file}:{}:{}", self.line, self.col),
            None => write!(f, "<unknown location>"),
        }
    }
}
