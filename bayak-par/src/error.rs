use bayak_lex::TokenKind;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum ParseError {
    /// An unexpected token was found; `expected` names the token kinds that
    /// would have been accepted there.
    Unexpected {
        expected: Vec<TokenKind>,
        found: TokenKind,
        text: String,
        line: usize,
        column: usize,
    },
    /// A block mixed indentation widths among its `INDENT` tokens.
    MixedIndent { line: usize, column: usize },
    /// A `value_stmt` was expected but no value-shaped token followed.
    ExpectedValue { line: usize, column: usize },
    /// A function declared the same parameter name twice.
    DuplicateParam {
        name: String,
        line: usize,
        column: usize,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Unexpected {
                expected,
                found,
                text,
                line,
                column,
            } => write!(
                f,
                "Unexpected {:?} ({:?}) at {}:{}. Expected one of {:?}.",
                found, text, line, column, expected
            ),
            ParseError::MixedIndent { line, column } => {
                write!(f, "Mixed indentation in block at {}:{}.", line, column)
            }
            ParseError::ExpectedValue { line, column } => {
                write!(f, "Expected a value at {}:{}.", line, column)
            }
            ParseError::DuplicateParam { name, line, column } => {
                write!(f, "Duplicate parameter '{}' at {}:{}.", name, line, column)
            }
        }
    }
}

impl std::error::Error for ParseError {}
