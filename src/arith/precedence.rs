use crate::arith::{ast::Op, token::TokenType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Sum,     // +, -
    Product, // *, /
    Prefix,  // -x, +x
    Power,   // ^ (right associative, binds tighter than unary minus)
    Call,    // f(x)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfixInfo {
    pub op: Op,
    pub precedence: Precedence,
    pub associativity: Assoc,
}

pub fn infix_info(token_type: TokenType) -> Option<InfixInfo> {
    let (op, precedence, associativity) = match token_type {
        TokenType::Plus => (Op::Add, Precedence::Sum, Assoc::Left),
        TokenType::Minus => (Op::Sub, Precedence::Sum, Assoc::Left),
        TokenType::Asterisk => (Op::Mul, Precedence::Product, Assoc::Left),
        TokenType::Slash => (Op::Div, Precedence::Product, Assoc::Left),
        TokenType::Caret => (Op::Pow, Precedence::Power, Assoc::Right),
        _ => return None,
    };
    Some(InfixInfo {
        op,
        precedence,
        associativity,
    })
}

pub fn token_precedence(token_type: TokenType) -> Precedence {
    match token_type {
        TokenType::LParen => Precedence::Call,
        other => infix_info(other).map_or(Precedence::Lowest, |info| info.precedence),
    }
}

/// Precedence used when a binary operator appears as an operand, for
/// deparsing.
pub fn op_precedence(op: Op) -> Precedence {
    match op {
        Op::Add | Op::Sub => Precedence::Sum,
        Op::Mul | Op::Div => Precedence::Product,
        Op::Pow => Precedence::Power,
    }
}

/// Precedence the right operand is parsed at. `^` is the only
/// right-associative operator; parsing its operand one level lower lets
/// `2 ^ 3 ^ 2` nest to the right.
pub fn rhs_precedence(info: InfixInfo) -> Precedence {
    match info.associativity {
        Assoc::Right => Precedence::Prefix,
        Assoc::Left => info.precedence,
    }
}
