//! Tokenizer for guest expression text.
//!
//! Supports:
//! - Doubles: 2, 2.5, .5, 1e3, 1.5e-3
//! - Integers: 3L
//! - Strings in single or double quotes with `\n`, `\t`, `\\` and quote escapes
//! - Identifiers with letters, digits, `.` and `_`
//! - `#` comments to end of line

use crate::arith::token::{Token, TokenType, lookup_ident};

#[derive(Debug, Clone)]
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_ignorable(&mut self) {
        while let Some(ch) = self.current() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.read_char();
                }
                '#' => {
                    while self.current().is_some_and(|c| c != '\n') {
                        self.read_char();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_ignorable();
        let (line, column) = (self.line, self.column);
        let Some(ch) = self.current() else {
            return Token::new(TokenType::Eof, "", line, column);
        };

        let single = |token_type| Token::new(token_type, ch.to_string(), line, column);
        let token = match ch {
            '\n' => single(TokenType::Newline),
            '+' => single(TokenType::Plus),
            '-' => single(TokenType::Minus),
            '*' => single(TokenType::Asterisk),
            '/' => single(TokenType::Slash),
            '^' => single(TokenType::Caret),
            '(' => single(TokenType::LParen),
            ')' => single(TokenType::RParen),
            ',' => single(TokenType::Comma),
            '=' => single(TokenType::Assign),
            ';' => single(TokenType::Semicolon),
            '"' | '\'' => return self.read_string(ch, line, column),
            c if c.is_ascii_digit() || (c == '.' && self.peek().is_some_and(|p| p.is_ascii_digit())) => {
                return self.read_number(line, column);
            }
            c if is_ident_start(c) => {
                let ident = self.read_while(is_ident_continue);
                return Token::new(lookup_ident(&ident), ident, line, column);
            }
            _ => single(TokenType::Illegal),
        };
        self.read_char();
        token
    }

    fn read_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(ch) = self.current().filter(|c| accept(*c)) {
            out.push(ch);
            self.read_char();
        }
        out
    }

    fn read_number(&mut self, line: usize, column: usize) -> Token {
        let mut literal = self.read_while(|c| c.is_ascii_digit());
        if self.current() == Some('.') {
            self.read_char();
            literal.push('.');
            literal.push_str(&self.read_while(|c| c.is_ascii_digit()));
        }
        if matches!(self.current(), Some('e' | 'E')) {
            let sign = self.peek().filter(|c| *c == '+' || *c == '-');
            let digit_at = if sign.is_some() { 2 } else { 1 };
            if self
                .input
                .get(self.position + digit_at)
                .is_some_and(|c| c.is_ascii_digit())
            {
                literal.push('e');
                self.read_char();
                if let Some(sign) = sign {
                    literal.push(sign);
                    self.read_char();
                }
                literal.push_str(&self.read_while(|c| c.is_ascii_digit()));
            }
        }
        if self.current() == Some('L') {
            self.read_char();
            return Token::new(TokenType::Int, literal, line, column);
        }
        Token::new(TokenType::Num, literal, line, column)
    }

    fn read_string(&mut self, quote: char, line: usize, column: usize) -> Token {
        self.read_char();
        let mut out = String::new();
        loop {
            match self.read_char() {
                None => return Token::new(TokenType::Illegal, out, line, column),
                Some(c) if c == quote => break,
                Some('\\') => match self.read_char() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                    None => return Token::new(TokenType::Illegal, out, line, column),
                },
                Some(c) => out.push(c),
            }
        }
        Token::new(TokenType::String, out, line, column)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '.'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '.' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenType> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            out.push(token.token_type);
            if token.token_type == TokenType::Eof {
                return out;
            }
        }
    }

    #[test]
    fn arithmetic_and_calls() {
        assert_eq!(
            kinds("f(x, n = 2) ^ -1"),
            vec![
                TokenType::Ident,
                TokenType::LParen,
                TokenType::Ident,
                TokenType::Comma,
                TokenType::Ident,
                TokenType::Assign,
                TokenType::Num,
                TokenType::RParen,
                TokenType::Caret,
                TokenType::Minus,
                TokenType::Num,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn number_forms() {
        let mut lexer = Lexer::new("1.5e-3 3L .5 2e");
        assert_eq!(lexer.next_token().literal, "1.5e-3");
        let int = lexer.next_token();
        assert_eq!((int.token_type, int.literal.as_str()), (TokenType::Int, "3"));
        assert_eq!(lexer.next_token().literal, ".5");
        assert_eq!(lexer.next_token().literal, "2");
        assert_eq!(lexer.next_token().token_type, TokenType::Ident);
    }

    #[test]
    fn strings_and_constants() {
        let mut lexer = Lexer::new("'a\\'b' TRUE NA NULL # trailing");
        assert_eq!(lexer.next_token().literal, "a'b");
        assert_eq!(lexer.next_token().token_type, TokenType::True);
        assert_eq!(lexer.next_token().token_type, TokenType::Na);
        assert_eq!(lexer.next_token().token_type, TokenType::Null);
        assert_eq!(lexer.next_token().token_type, TokenType::Eof);
    }

    #[test]
    fn tracks_lines() {
        let mut lexer = Lexer::new("1\n  x");
        lexer.next_token();
        assert_eq!(lexer.next_token().token_type, TokenType::Newline);
        let x = lexer.next_token();
        assert_eq!((x.line, x.column), (2, 3));
    }
}
