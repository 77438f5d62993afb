use std::fmt;

/// Fatal errors raised while lowering an AST into textual assembly.
#[derive(Clone, Debug, PartialEq)]
pub enum GenError {
    /// A variable was read before it was ever assigned, or a call named a
    /// function that was never defined (and is not a builtin).
    UnknownName(String),
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenError::UnknownName(name) => write!(f, "Unknown name '{}'.", name),
        }
    }
}

impl std::error::Error for GenError {}
