//! Token types for the expression lexer.

use super::Span;

/// Reserved words of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    // Logical operators
    And,
    Or,
    Not,

    // Predicates
    In,
    Like,
    Is,
    Between,

    // Literals
    Null,
    True,
    False,

    // Sort directions
    Asc,
    Desc,
}

impl Keyword {
    /// Attempts to parse a keyword from a string (case-insensitive).
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            "NOT" => Some(Self::Not),
            "IN" => Some(Self::In),
            "LIKE" => Some(Self::Like),
            "IS" => Some(Self::Is),
            "BETWEEN" => Some(Self::Between),
            "NULL" => Some(Self::Null),
            "TRUE" => Some(Self::True),
            "FALSE" => Some(Self::False),
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }

    /// Returns the keyword as upper-case text.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::In => "IN",
            Self::Like => "LIKE",
            Self::Is => "IS",
            Self::Between => "BETWEEN",
            Self::Null => "NULL",
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Float literal (e.g., 3.14)
    Float(f64),
    /// String literal (e.g., 'hello')
    String(String),
    /// Date literal body (e.g., `#2024-01-31#` yields `2024-01-31`)
    Date(String),

    // Identifiers and keywords
    /// Column or function name, bare or delimited by `[]` or backquotes
    Identifier(String),
    /// Reserved word
    Keyword(Keyword),

    // Operators
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// =
    Eq,
    /// != or <>
    NotEq,
    /// <
    Lt,
    /// <=
    LtEq,
    /// >
    Gt,
    /// >=
    GtEq,

    // Delimiters
    /// (
    LeftParen,
    /// )
    RightParen,
    /// ,
    Comma,

    // Special
    /// End of input
    Eof,
    /// Invalid or unterminated input
    Error(String),
}

/// A token with its span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The location in the source text.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if this is an EOF token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns the keyword if this is a keyword token.
    #[must_use]
    pub const fn as_keyword(&self) -> Option<Keyword> {
        match &self.kind {
            TokenKind::Keyword(kw) => Some(*kw),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_from_str_ignores_case() {
        assert_eq!(Keyword::from_str("and"), Some(Keyword::And));
        assert_eq!(Keyword::from_str("Like"), Some(Keyword::Like));
        assert_eq!(Keyword::from_str("BeTwEeN"), Some(Keyword::Between));
        assert_eq!(Keyword::from_str("select"), None);
    }

    #[test]
    fn test_keyword_round_trip() {
        for kw in [Keyword::Is, Keyword::Null, Keyword::Desc] {
            assert_eq!(Keyword::from_str(kw.as_str()), Some(kw));
        }
    }

    #[test]
    fn test_token_as_keyword() {
        let not = Token::new(TokenKind::Keyword(Keyword::Not), Span::new(0, 3));
        let plus = Token::new(TokenKind::Plus, Span::new(0, 1));
        assert_eq!(not.as_keyword(), Some(Keyword::Not));
        assert_eq!(plus.as_keyword(), None);
        assert!(Token::new(TokenKind::Eof, Span::default()).is_eof());
    }
}
