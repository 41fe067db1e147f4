use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Special
    Illegal,
    Eof,
    Newline,

    // Identifiers and literals
    Ident,
    Num,
    Int,
    String,

    // Constants
    True,
    False,
    Na,
    Null,

    // Arithmetic operators
    Plus,
    Minus,
    Asterisk,
    Slash,
    Caret,

    // Delimiters
    LParen,
    RParen,
    Comma,
    Assign,
    Semicolon,
}

impl TokenType {
    /// Phrase used in "unexpected ..." parse errors.
    pub fn describe(self) -> &'static str {
        match self {
            TokenType::Illegal => "input",
            TokenType::Eof => "end of input",
            TokenType::Newline => "end of line",
            TokenType::Ident => "symbol",
            TokenType::Num | TokenType::Int => "numeric constant",
            TokenType::String => "string constant",
            TokenType::True | TokenType::False | TokenType::Na | TokenType::Null => "constant",
            TokenType::Plus => "'+'",
            TokenType::Minus => "'-'",
            TokenType::Asterisk => "'*'",
            TokenType::Slash => "'/'",
            TokenType::Caret => "'^'",
            TokenType::LParen => "'('",
            TokenType::RParen => "')'",
            TokenType::Comma => "','",
            TokenType::Assign => "'='",
            TokenType::Semicolon => "';'",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenType::Illegal => "ILLEGAL",
            TokenType::Eof => "EOF",
            TokenType::Newline => "NEWLINE",
            TokenType::Ident => "IDENT",
            TokenType::Num => "NUM",
            TokenType::Int => "INT",
            TokenType::String => "STRING",
            TokenType::True => "TRUE",
            TokenType::False => "FALSE",
            TokenType::Na => "NA",
            TokenType::Null => "NULL",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Asterisk => "*",
            TokenType::Slash => "/",
            TokenType::Caret => "^",
            TokenType::LParen => "(",
            TokenType::RParen => ")",
            TokenType::Comma => ",",
            TokenType::Assign => "=",
            TokenType::Semicolon => ";",
        };
        f.write_str(s)
    }
}

pub fn lookup_ident(ident: &str) -> TokenType {
    match ident {
        "TRUE" => TokenType::True,
        "FALSE" => TokenType::False,
        "NA" => TokenType::Na,
        "NULL" => TokenType::Null,
        _ => TokenType::Ident,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub literal: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(token_type: TokenType, literal: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            token_type,
            literal: literal.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token({}, {:?}, {}:{})",
            self.token_type, self.literal, self.line, self.column
        )
    }
}
