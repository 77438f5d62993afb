use crate::error::LexError;
use crate::token::{Token, TokenKind};

/// Tokenizes `src` into a flat token vector.
///
/// A single-pass cursor over the characters of `src`, carrying just enough
/// lookahead to disambiguate two-character operators and number literals. The
/// only fatal condition is an unterminated string; unknown characters are
/// emitted as [`TokenKind::Unknown`] tokens rather than aborting the scan, so a
/// later stage can report their position (see §4.1 of the format notes).
pub fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(src).run()
}

fn reserved_kind(word: &str) -> Option<TokenKind> {
    Some(match word {
        "def" => TokenKind::R_Def,
        "return" => TokenKind::R_Return,
        "if" => TokenKind::R_If,
        "elif" => TokenKind::R_Elif,
        "else" => TokenKind::R_Else,
        "pass" => TokenKind::R_Pass,
        "for" => TokenKind::R_For,
        "in" => TokenKind::R_In,
        "is" => TokenKind::R_Is,
        _ => return None,
    })
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    /// True immediately after a `NEWLINE`, until the leading whitespace run (if
    /// any) has been consumed into an `INDENT` token.
    at_line_start: bool,
}

impl Lexer {
    fn new(src: &str) -> Lexer {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            at_line_start: false,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.pos];
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn push(&mut self, kind: TokenKind, text: String, line: usize, column: usize) {
        self.tokens.push(Token::new(kind, text, line, column));
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            let (line, column) = (self.line, self.column);

            if c.is_alphabetic() || c == '_' {
                self.lex_name(line, column);
            } else if c.is_ascii_digit() {
                self.lex_number(line, column);
            } else if c == '"' || c == '\'' {
                self.lex_string(c, line, column)?;
            } else if c == '\n' {
                self.advance();
                if !self.tokens.is_empty() {
                    self.push(TokenKind::Newline, "\n".to_owned(), line, column);
                    self.at_line_start = true;
                }
            } else if c == ' ' || c == '\t' {
                self.lex_whitespace(line, column);
            } else if let Some(kind) = self.lex_two_char_operator() {
                let text: String = self.chars[self.pos - 2..self.pos].iter().collect();
                self.push(kind, text, line, column);
                self.at_line_start = false;
            } else if let Some(kind) = self.lex_one_char_operator(c) {
                self.advance();
                self.push(kind, c.to_string(), line, column);
                self.at_line_start = false;
            } else {
                self.advance();
                self.push(TokenKind::Unknown, c.to_string(), line, column);
                self.at_line_start = false;
            }
        }

        Ok(self.tokens)
    }

    fn lex_name(&mut self, line: usize, column: usize) {
        let start = self.pos;
        while self
            .peek(0)
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let kind = reserved_kind(&text).unwrap_or(TokenKind::Name);
        self.push(kind, text, line, column);
        self.at_line_start = false;
    }

    fn lex_number(&mut self, line: usize, column: usize) {
        let start = self.pos;
        let prefixed = self.peek(0) == Some('0')
            && matches!(self.peek(1), Some('x') | Some('h') | Some('b'));

        if prefixed {
            self.advance();
            self.advance();
            while self.peek(0).map_or(false, |c| c.is_alphanumeric()) {
                self.advance();
            }
        } else {
            while self.peek(0).map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
            if self.peek(0) == Some('.') && self.peek(1).map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
                while self.peek(0).map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::Number, text, line, column);
        self.at_line_start = false;
    }

    fn lex_string(&mut self, quote: char, line: usize, column: usize) -> Result<(), LexError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.peek(0) {
                None => return Err(LexError::UnterminatedString { line, column }),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') if self.peek(1) == Some(quote) => {
                    self.advance();
                    text.push(self.advance());
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
        self.push(TokenKind::Literal, text, line, column);
        self.at_line_start = false;
        Ok(())
    }

    fn lex_whitespace(&mut self, line: usize, column: usize) {
        if self.at_line_start {
            let start = self.pos;
            while matches!(self.peek(0), Some(' ') | Some('\t')) {
                self.advance();
            }
            let text: String = self.chars[start..self.pos].iter().collect();
            self.push(TokenKind::Indent, text, line, column);
            self.at_line_start = false;
        } else {
            while matches!(self.peek(0), Some(' ') | Some('\t')) {
                self.advance();
            }
        }
    }

    fn lex_two_char_operator(&mut self) -> Option<TokenKind> {
        let (a, b) = (self.peek(0)?, self.peek(1)?);
        let kind = match (a, b) {
            ('=', '=') => TokenKind::IsEqual,
            ('!', '=') => TokenKind::NotEqual,
            ('>', '=') => TokenKind::Gte,
            ('<', '=') => TokenKind::Lte,
            ('+', '=') => TokenKind::PlusAssign,
            ('-', '=') => TokenKind::MinusAssign,
            ('*', '=') => TokenKind::TimesAssign,
            ('/', '=') => TokenKind::SlashAssign,
            _ => return None,
        };
        self.advance();
        self.advance();
        Some(kind)
    }

    fn lex_one_char_operator(&self, c: char) -> Option<TokenKind> {
        Some(match c {
            '=' => TokenKind::Assign,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Times,
            '/' => TokenKind::Slash,
            '>' => TokenKind::Gt,
            '<' => TokenKind::Lt,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            ',' => TokenKind::Comma,
            ':' => TokenKind::BlockBegin,
            '.' => TokenKind::Dot,
            ';' => TokenKind::EndStatement,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn identifiers_and_reserved_words() {
        assert_eq!(kinds("foo def"), vec![TokenKind::Name, TokenKind::R_Def]);
    }

    #[test]
    fn number_forms() {
        let texts: Vec<String> = lex("10 0x1F 0b101 3.5").unwrap().into_iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["10", "0x1F", "0b101", "3.5"]);
    }

    #[test]
    fn compound_assign_before_single_char() {
        assert_eq!(kinds("x += 1"), vec![TokenKind::Name, TokenKind::PlusAssign, TokenKind::Number]);
    }

    #[test]
    fn string_with_escaped_quote() {
        let tokens = lex(r#""a\"b""#).unwrap();
        assert_eq!(tokens[0].text, "a\"b");
    }

    #[test]
    fn unterminated_string_is_fatal() {
        assert!(matches!(
            lex("\"abc"),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn indent_recognized_after_block_begin() {
        let tokens = lex("if 1:\n    pass\n").unwrap();
        let indent = tokens.iter().find(|t| t.kind == TokenKind::Indent).unwrap();
        assert_eq!(indent.text, "    ");
    }

    #[test]
    fn unknown_character_flows_through_as_a_token() {
        assert_eq!(kinds("@"), vec![TokenKind::Unknown]);
    }

    #[test]
    fn leading_blank_lines_are_suppressed() {
        assert_eq!(kinds("\n\nfoo"), vec![TokenKind::Name]);
    }
}
