use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum LexError {
    UnterminatedString { line: usize, column: usize },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LexError::UnterminatedString { line, column } => {
                write!(f, "Unterminated string literal at {}:{}.", line, column)
            }
        }
    }
}

impl std::error::Error for LexError {}
