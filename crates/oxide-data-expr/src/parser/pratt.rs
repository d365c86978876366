//! Operator precedence for the Pratt expression parser.

use crate::ast::{BinaryOp, UnaryOp};
use crate::lexer::{Keyword, TokenKind};

/// Precedence levels, loosest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Or = 1,
    And,
    Not,
    Comparison,
    Sum,
    Product,
    Negation,
}

impl Precedence {
    /// Binding power on the left of an operator at this level.
    #[must_use]
    pub const fn left(self) -> u8 {
        self as u8 * 2
    }

    /// Binding power handed to the right operand. One above `left`, so that
    /// operators of the same level group to the left.
    #[must_use]
    pub const fn right(self) -> u8 {
        self as u8 * 2 + 1
    }
}

/// What follows the left operand of an infix construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Infix {
    Binary(BinaryOp),
    Is,
    In,
    Between,
}

impl Infix {
    /// Whether the construct accepts a leading `NOT`.
    #[must_use]
    pub const fn negatable(self) -> bool {
        matches!(self, Self::In | Self::Between | Self::Binary(BinaryOp::Like))
    }
}

/// Level of a token in infix position. A `NOT` there is the start of
/// `NOT IN`, `NOT LIKE` or `NOT BETWEEN` and shares their level.
#[must_use]
pub const fn infix_level(kind: &TokenKind) -> Option<Precedence> {
    Some(match kind {
        TokenKind::Keyword(Keyword::Or) => Precedence::Or,
        TokenKind::Keyword(Keyword::And) => Precedence::And,
        TokenKind::Keyword(Keyword::Is | Keyword::In | Keyword::Between | Keyword::Like | Keyword::Not)
        | TokenKind::Eq
        | TokenKind::NotEq
        | TokenKind::Lt
        | TokenKind::LtEq
        | TokenKind::Gt
        | TokenKind::GtEq => Precedence::Comparison,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
        _ => return None,
    })
}

/// The infix construct a token starts, other than a leading `NOT`.
#[must_use]
pub const fn infix_op(kind: &TokenKind) -> Option<Infix> {
    let op = match kind {
        TokenKind::Keyword(Keyword::Is) => return Some(Infix::Is),
        TokenKind::Keyword(Keyword::In) => return Some(Infix::In),
        TokenKind::Keyword(Keyword::Between) => return Some(Infix::Between),
        TokenKind::Keyword(Keyword::Or) => BinaryOp::Or,
        TokenKind::Keyword(Keyword::And) => BinaryOp::And,
        TokenKind::Keyword(Keyword::Like) => BinaryOp::Like,
        TokenKind::Eq => BinaryOp::Eq,
        TokenKind::NotEq => BinaryOp::NotEq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::LtEq => BinaryOp::LtEq,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::GtEq => BinaryOp::GtEq,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        _ => return None,
    };
    Some(Infix::Binary(op))
}

/// Prefix operator of a token with the level its operand is parsed at.
#[must_use]
pub const fn prefix_op(kind: &TokenKind) -> Option<(UnaryOp, Precedence)> {
    match kind {
        TokenKind::Minus => Some((UnaryOp::Neg, Precedence::Negation)),
        TokenKind::Keyword(Keyword::Not) => Some((UnaryOp::Not, Precedence::Not)),
        _ => None,
    }
}
