use crate::ast::*;
use crate::error::ParseError;
use bayak_lex::{Token, TokenKind};
use std::collections::HashSet;

/// Parses a token stream into a [`Script`].
pub fn parse(tokens: Vec<Token>) -> Result<Script, ParseError> {
    Parser::new(tokens).parse_script()
}

/// Recursive-descent parser with a single-token lookahead, method-bound cursor.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Parser {
        Parser { tokens, pos: 0 }
    }

    fn peek_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek_at(0)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        match self.peek_kind() {
            Some(k) if k == kind => Ok(self.advance()),
            _ => Err(self.unexpected(&[kind])),
        }
    }

    fn unexpected(&self, expected: &[TokenKind]) -> ParseError {
        match self.peek_token() {
            Some(tok) => ParseError::Unexpected {
                expected: expected.to_vec(),
                found: tok.kind,
                text: tok.text.clone(),
                line: tok.line,
                column: tok.column,
            },
            None => ParseError::Unexpected {
                expected: expected.to_vec(),
                found: TokenKind::Unknown,
                text: String::new(),
                line: 0,
                column: 0,
            },
        }
    }

    fn eat_newline_if_present(&mut self) {
        if self.peek_kind() == Some(TokenKind::Newline) {
            self.advance();
        }
    }

    fn parse_script(&mut self) -> Result<Script, ParseError> {
        let mut items = Vec::new();
        while !self.at_end() {
            if self.peek_kind() == Some(TokenKind::Newline) {
                self.advance();
                continue;
            }
            if self.peek_kind() == Some(TokenKind::R_Def) {
                items.push(TopLevel::Fdef(self.parse_fdef()?));
            } else {
                let stmt = self.parse_stmt()?;
                self.eat_newline_if_present();
                items.push(TopLevel::Stmt(stmt));
            }
        }
        Ok(Script { items })
    }

    fn parse_fdef(&mut self) -> Result<Fdef, ParseError> {
        self.eat(TokenKind::R_Def)?;
        let name_tok = self.eat(TokenKind::Name)?;
        self.eat(TokenKind::OpenParen)?;
        let params = self.parse_params()?;
        self.eat(TokenKind::CloseParen)?;
        self.eat(TokenKind::BlockBegin)?;
        self.eat(TokenKind::Newline)?;
        let block = self.parse_block()?;
        Ok(Fdef {
            name: name_tok.text,
            params,
            block,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<String>, ParseError> {
        let mut params = Vec::new();
        let mut seen = HashSet::new();
        if self.peek_kind() == Some(TokenKind::CloseParen) {
            return Ok(params);
        }
        loop {
            let tok = self.eat(TokenKind::Name)?;
            if !seen.insert(tok.text.clone()) {
                return Err(ParseError::DuplicateParam {
                    name: tok.text,
                    line: tok.line,
                    column: tok.column,
                });
            }
            params.push(tok.text);
            if self.peek_kind() == Some(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(params)
    }

    /// Consumes the `(INDENT (NEWLINE | stmt))+` sequence that forms one block.
    /// All `INDENT`s in the block must share the same width; a narrower
    /// `INDENT` ends the block (a dedent) without being consumed, so the
    /// enclosing block or top-level loop can see it next.
    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let mut stmts = Vec::new();
        let mut width: Option<usize> = None;

        loop {
            let indent_tok = match self.peek_token() {
                Some(tok) if tok.kind == TokenKind::Indent => tok.clone(),
                _ => break,
            };
            let w = indent_tok.text.len();
            match width {
                None => {
                    width = Some(w);
                    self.advance();
                }
                Some(cur) if w < cur => break,
                Some(cur) if w > cur => {
                    return Err(ParseError::MixedIndent {
                        line: indent_tok.line,
                        column: indent_tok.column,
                    })
                }
                Some(_) => {
                    self.advance();
                }
            }

            if self.peek_kind() == Some(TokenKind::Newline) {
                self.advance();
                continue;
            }

            let stmt = self.parse_stmt()?;
            stmts.push(stmt);
            self.eat_newline_if_present();
        }

        Ok(Block { stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::R_Return) => {
                self.advance();
                let value = match self.peek_kind() {
                    None | Some(TokenKind::Newline) => None,
                    _ => Some(self.parse_value_expr()?),
                };
                Ok(Stmt::Return(ReturnStmt { value }))
            }
            Some(TokenKind::R_Pass) => {
                self.advance();
                Ok(Stmt::Pass)
            }
            Some(TokenKind::R_If) => Ok(Stmt::IfChain(self.parse_if_chain()?)),
            Some(TokenKind::Name) if self.peek_at(1) == Some(TokenKind::OpenParen) => {
                Ok(Stmt::Fcall(self.parse_fcall()?))
            }
            Some(TokenKind::Name) if is_assign_kind(self.peek_at(1)) => {
                Ok(Stmt::Assign(self.parse_assign()?))
            }
            _ => Ok(Stmt::ValueExpr(self.parse_value_expr()?)),
        }
    }

    fn parse_assign(&mut self) -> Result<Assign, ParseError> {
        let name_tok = self.eat(TokenKind::Name)?;
        let op_tok = self.advance();
        let rhs = self.parse_value_expr()?;

        let value = match op_tok.kind {
            TokenKind::Assign => rhs,
            TokenKind::PlusAssign => compound_assign(name_tok.clone(), Operator::Plus, rhs),
            TokenKind::MinusAssign => compound_assign(name_tok.clone(), Operator::Minus, rhs),
            TokenKind::TimesAssign => compound_assign(name_tok.clone(), Operator::Times, rhs),
            TokenKind::SlashAssign => compound_assign(name_tok.clone(), Operator::Slash, rhs),
            _ => {
                return Err(ParseError::Unexpected {
                    expected: vec![
                        TokenKind::Assign,
                        TokenKind::PlusAssign,
                        TokenKind::MinusAssign,
                        TokenKind::TimesAssign,
                        TokenKind::SlashAssign,
                    ],
                    found: op_tok.kind,
                    text: op_tok.text,
                    line: op_tok.line,
                    column: op_tok.column,
                })
            }
        };

        Ok(Assign {
            var: name_tok.text,
            value,
        })
    }

    fn parse_fcall(&mut self) -> Result<Fcall, ParseError> {
        let name_tok = self.eat(TokenKind::Name)?;
        self.eat(TokenKind::OpenParen)?;
        let mut args = Vec::new();
        if self.peek_kind() != Some(TokenKind::CloseParen) {
            args.push(self.parse_value_expr()?);
            while self.peek_kind() == Some(TokenKind::Comma) {
                self.advance();
                args.push(self.parse_value_expr()?);
            }
        }
        self.eat(TokenKind::CloseParen)?;
        Ok(Fcall {
            name: name_tok.text,
            args,
        })
    }

    fn parse_if_chain(&mut self) -> Result<IfChain, ParseError> {
        let mut branches = Vec::new();

        self.eat(TokenKind::R_If)?;
        branches.push(self.parse_if_branch()?);

        while self.peek_kind() == Some(TokenKind::R_Elif) {
            self.advance();
            branches.push(self.parse_if_branch()?);
        }

        let else_branch = if self.peek_kind() == Some(TokenKind::R_Else) {
            self.advance();
            self.eat(TokenKind::BlockBegin)?;
            self.eat(TokenKind::Newline)?;
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(IfChain {
            branches,
            else_branch,
        })
    }

    fn parse_if_branch(&mut self) -> Result<IfBranch, ParseError> {
        let cond = self.parse_value_expr()?;
        self.eat(TokenKind::BlockBegin)?;
        self.eat(TokenKind::Newline)?;
        let block = self.parse_block()?;
        Ok(IfBranch { cond, block })
    }

    fn parse_value_expr(&mut self) -> Result<ValueExpr, ParseError> {
        let left = self.parse_expr()?;
        if let Some(op) = peek_cmp_op(self.peek_kind()) {
            self.advance();
            let right = self.parse_expr()?;
            Ok(ValueExpr::Cmp(CmpStmt { left, op, right }))
        } else {
            Ok(ValueExpr::Value(left))
        }
    }

    fn parse_expr(&mut self) -> Result<ValueStmt, ParseError> {
        let mut items = vec![ValueItem::Operand(self.parse_term_operand()?)];
        while let Some(op) = peek_additive_op(self.peek_kind()) {
            self.advance();
            items.push(ValueItem::Operator(op));
            items.push(ValueItem::Operand(self.parse_term_operand()?));
        }
        Ok(ValueStmt { items })
    }

    fn parse_term_operand(&mut self) -> Result<Operand, ParseError> {
        let first = self.parse_factor()?;
        if peek_mult_op(self.peek_kind()).is_none() {
            return Ok(first);
        }

        let mut items = vec![ValueItem::Operand(first)];
        while let Some(op) = peek_mult_op(self.peek_kind()) {
            self.advance();
            items.push(ValueItem::Operator(op));
            items.push(ValueItem::Operand(self.parse_factor()?));
        }
        Ok(Operand::Nested(Box::new(ValueStmt { items })))
    }

    fn parse_factor(&mut self) -> Result<Operand, ParseError> {
        if self.peek_kind() == Some(TokenKind::OpenParen) {
            self.advance();
            let inner = self.parse_value_expr()?;
            self.eat(TokenKind::CloseParen)?;
            return Ok(match inner {
                ValueExpr::Value(vs) => Operand::Nested(Box::new(vs)),
                ValueExpr::Cmp(cmp) => Operand::Cmp(Box::new(cmp)),
            });
        }
        Ok(Operand::Value(self.parse_value()?))
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Number) => {
                let tok = self.advance();
                Ok(Value::Number(parse_number(&tok)?))
            }
            Some(TokenKind::Literal) => {
                let tok = self.advance();
                Ok(Value::Literal(Literal { text: tok.text }))
            }
            Some(TokenKind::Name) if self.peek_at(1) == Some(TokenKind::OpenParen) => {
                Ok(Value::Fcall(Box::new(self.parse_fcall()?)))
            }
            Some(TokenKind::Name) => {
                let tok = self.advance();
                Ok(Value::Var(Var { name: tok.text }))
            }
            _ => {
                let (line, column) = match self.peek_token() {
                    Some(tok) => (tok.line, tok.column),
                    None => (0, 0),
                };
                Err(ParseError::ExpectedValue { line, column })
            }
        }
    }
}

fn is_assign_kind(kind: Option<TokenKind>) -> bool {
    matches!(
        kind,
        Some(TokenKind::Assign)
            | Some(TokenKind::PlusAssign)
            | Some(TokenKind::MinusAssign)
            | Some(TokenKind::TimesAssign)
            | Some(TokenKind::SlashAssign)
    )
}

fn peek_cmp_op(kind: Option<TokenKind>) -> Option<CmpOp> {
    Some(match kind? {
        TokenKind::IsEqual => CmpOp::IsEqual,
        TokenKind::NotEqual => CmpOp::NotEqual,
        TokenKind::Gt => CmpOp::Gt,
        TokenKind::Gte => CmpOp::Gte,
        TokenKind::Lt => CmpOp::Lt,
        TokenKind::Lte => CmpOp::Lte,
        _ => return None,
    })
}

fn peek_additive_op(kind: Option<TokenKind>) -> Option<Operator> {
    match kind? {
        TokenKind::Plus => Some(Operator::Plus),
        TokenKind::Minus => Some(Operator::Minus),
        _ => None,
    }
}

fn peek_mult_op(kind: Option<TokenKind>) -> Option<Operator> {
    match kind? {
        TokenKind::Times => Some(Operator::Times),
        TokenKind::Slash => Some(Operator::Slash),
        _ => None,
    }
}

/// Rewrites `x op= e` into the flat `ValueStmt(Var(x), op, e)`.
fn compound_assign(name_tok: Token, op: Operator, rhs: ValueExpr) -> ValueExpr {
    let rhs_operand = match rhs {
        ValueExpr::Value(vs) => Operand::Nested(Box::new(vs)),
        ValueExpr::Cmp(cmp) => Operand::Cmp(Box::new(cmp)),
    };
    ValueExpr::Value(ValueStmt {
        items: vec![
            ValueItem::Operand(Operand::Value(Value::Var(Var {
                name: name_tok.text,
            }))),
            ValueItem::Operator(op),
            ValueItem::Operand(rhs_operand),
        ],
    })
}

fn parse_number(tok: &Token) -> Result<Number, ParseError> {
    let text = &tok.text;
    let err = || ParseError::ExpectedValue {
        line: tok.line,
        column: tok.column,
    };

    if text.starts_with("0x") || text.starts_with("0h") {
        let v = i32::from_str_radix(&text[2..], 16).map_err(|_| err())?;
        Ok(Number {
            kind: NumberKind::Hex,
            value: NumberValue::Int(v),
        })
    } else if let Some(rest) = text.strip_prefix("0b") {
        let v = i32::from_str_radix(rest, 2).map_err(|_| err())?;
        Ok(Number {
            kind: NumberKind::Bin,
            value: NumberValue::Int(v),
        })
    } else if text.contains('.') {
        let v: f32 = text.parse().map_err(|_| err())?;
        Ok(Number {
            kind: NumberKind::Float,
            value: NumberValue::Float(v),
        })
    } else {
        let v: i32 = text.parse().map_err(|_| err())?;
        Ok(Number {
            kind: NumberKind::Int,
            value: NumberValue::Int(v),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bayak_lex::lex;

    fn parse_src(src: &str) -> Script {
        parse(lex(src).unwrap()).unwrap()
    }

    #[test]
    fn parses_simple_fcall() {
        let script = parse_src("print(1 + 1)\n");
        assert_eq!(script.items.len(), 1);
        match &script.items[0] {
            TopLevel::Stmt(Stmt::Fcall(fcall)) => assert_eq!(fcall.name, "print"),
            other => panic!("unexpected top-level item: {:?}", other),
        }
    }

    #[test]
    fn precedence_nests_mult_inside_plus() {
        let script = parse_src("print(8 + 6 * 3)\n");
        let fcall = match &script.items[0] {
            TopLevel::Stmt(Stmt::Fcall(fcall)) => fcall,
            other => panic!("expected fcall, got {:?}", other),
        };
        let vs = match &fcall.args[0] {
            ValueExpr::Value(vs) => vs,
            other => panic!("expected plain value, got {:?}", other),
        };
        assert_eq!(vs.items.len(), 3);
        assert!(matches!(vs.items[2], ValueItem::Operand(Operand::Nested(_))));
    }

    #[test]
    fn fdef_with_params_and_return() {
        let script = parse_src("def f(a,b,c):\n    return a + b * c\n");
        match &script.items[0] {
            TopLevel::Fdef(fdef) => {
                assert_eq!(fdef.name, "f");
                assert_eq!(fdef.params, vec!["a", "b", "c"]);
                assert_eq!(fdef.block.stmts.len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn duplicate_params_are_rejected() {
        let err = parse(lex("def f(a,a):\n    pass\n").unwrap()).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateParam { .. }));
    }

    #[test]
    fn if_elif_else_chain() {
        let script =
            parse_src("if a == 1:\n    pass\nelif a == 2:\n    pass\nelse:\n    pass\n");
        match &script.items[0] {
            TopLevel::Stmt(Stmt::IfChain(chain)) => {
                assert_eq!(chain.branches.len(), 2);
                assert!(chain.else_branch.is_some());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn compound_assign_rewrites_to_binary_op() {
        let script = parse_src("x += 1\n");
        match &script.items[0] {
            TopLevel::Stmt(Stmt::Assign(assign)) => {
                assert_eq!(assign.var, "x");
                let vs = match &assign.value {
                    ValueExpr::Value(vs) => vs,
                    other => panic!("expected plain value, got {:?}", other),
                };
                assert_eq!(vs.items.len(), 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn mixed_indent_is_fatal() {
        let tokens = lex("if 1:\n    pass\n        pass\n").unwrap();
        let err = parse(tokens).unwrap_err();
        assert!(matches!(err, ParseError::MixedIndent { .. }));
    }
}
