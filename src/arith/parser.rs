use std::fmt;

use crate::arith::{
    ast::{Arg, Expr, Op},
    lexer::Lexer,
    precedence::{Precedence, infix_info, rhs_precedence, token_precedence},
    token::{Token, TokenType},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<text>:{}:{}: {}", self.line, self.column, self.message)
    }
}

fn unexpected(token: &Token) -> ParseError {
    ParseError {
        message: format!("unexpected {}", token.token_type.describe()),
        line: token.line,
        column: token.column,
    }
}

/// Pratt parser over a [`Lexer`]. Newlines end an expression except inside
/// parentheses and after a binary operator.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    peek_token: Token,
    paren_depth: usize,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let mut lexer = Lexer::new(source);
        let current_token = lexer.next_token();
        let peek_token = lexer.next_token();
        Self {
            lexer,
            current_token,
            peek_token,
            paren_depth: 0,
        }
    }

    fn next_token(&mut self) {
        let next = self.lexer.next_token();
        self.current_token = std::mem::replace(&mut self.peek_token, next);
        self.skip_peek_newlines();
    }

    fn skip_peek_newlines(&mut self) {
        while self.paren_depth > 0 && self.peek_token.token_type == TokenType::Newline {
            self.peek_token = self.lexer.next_token();
        }
    }

    fn open_paren(&mut self) {
        self.paren_depth += 1;
        self.skip_peek_newlines();
    }

    /// Consumes the `)` in peek position.
    fn close_paren(&mut self) -> Result<(), ParseError> {
        if self.peek_token.token_type != TokenType::RParen {
            return Err(unexpected(&self.peek_token));
        }
        self.paren_depth -= 1;
        self.next_token();
        Ok(())
    }

    /// Parses `;`- or newline-separated expressions up to end of input.
    pub fn parse_program(mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = Vec::new();
        loop {
            while matches!(
                self.current_token.token_type,
                TokenType::Newline | TokenType::Semicolon
            ) {
                self.next_token();
            }
            if self.current_token.token_type == TokenType::Eof {
                return Ok(exprs);
            }
            exprs.push(self.parse_expression(Precedence::Lowest)?);
            self.next_token();
            match self.current_token.token_type {
                TokenType::Newline | TokenType::Semicolon | TokenType::Eof => {}
                _ => return Err(unexpected(&self.current_token)),
            }
        }
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expr, ParseError> {
        let mut left = self.parse_prefix()?;
        while precedence < token_precedence(self.peek_token.token_type) {
            self.next_token();
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let token = &self.current_token;
        match token.token_type {
            TokenType::Num => token
                .literal
                .parse()
                .map(Expr::Num)
                .map_err(|_| unexpected(token)),
            TokenType::Int => Ok(match token.literal.parse::<i32>() {
                Ok(value) => Expr::Int(value),
                // Too large for an integer: the guest falls back to a double.
                Err(_) => Expr::Num(token.literal.parse().map_err(|_| unexpected(token))?),
            }),
            TokenType::String => Ok(Expr::Str(token.literal.clone())),
            TokenType::True => Ok(Expr::Bool(true)),
            TokenType::False => Ok(Expr::Bool(false)),
            TokenType::Na => Ok(Expr::Na),
            TokenType::Null => Ok(Expr::Null),
            TokenType::Ident => Ok(Expr::Ident(token.literal.clone())),
            TokenType::Minus | TokenType::Plus => {
                let op = if token.token_type == TokenType::Minus {
                    Op::Sub
                } else {
                    Op::Add
                };
                self.next_token();
                let operand = self.parse_expression(Precedence::Prefix)?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            TokenType::LParen => {
                self.open_paren();
                self.next_token();
                let inner = self.parse_expression(Precedence::Lowest)?;
                self.close_paren()?;
                Ok(inner)
            }
            _ => Err(unexpected(token)),
        }
    }

    fn parse_infix(&mut self, left: Expr) -> Result<Expr, ParseError> {
        if self.current_token.token_type == TokenType::LParen {
            return self.parse_call(left);
        }
        let Some(info) = infix_info(self.current_token.token_type) else {
            return Err(unexpected(&self.current_token));
        };
        self.next_token();
        while self.current_token.token_type == TokenType::Newline {
            self.next_token();
        }
        let right = self.parse_expression(rhs_precedence(info))?;
        Ok(Expr::Binary {
            op: info.op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        self.open_paren();
        let mut args = Vec::new();
        if self.peek_token.token_type == TokenType::RParen {
            self.close_paren()?;
            return Ok(Expr::Call {
                callee: Box::new(callee),
                args,
            });
        }
        loop {
            self.next_token();
            let named = matches!(
                self.current_token.token_type,
                TokenType::Ident | TokenType::String
            ) && self.peek_token.token_type == TokenType::Assign;
            let name = if named {
                let name = self.current_token.literal.clone();
                self.next_token();
                self.next_token();
                Some(name)
            } else {
                None
            };
            let value = self.parse_expression(Precedence::Lowest)?;
            args.push(Arg { name, value });

            match self.peek_token.token_type {
                TokenType::Comma => self.next_token(),
                TokenType::RParen => {
                    self.close_paren()?;
                    return Ok(Expr::Call {
                        callee: Box::new(callee),
                        args,
                    });
                }
                _ => return Err(unexpected(&self.peek_token)),
            }
        }
    }
}
