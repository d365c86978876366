//! Expression and sort-list parser implementation.

use super::error::ParseError;
use super::pratt::{infix_level, infix_op, prefix_op, Infix};
use crate::ast::{Expr, FunctionCall, Literal, SortDirection, SortItem, UnaryOp};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};

/// Expression parser.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given input.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self { lexer, current }
    }

    /// Parses one expression and requires the input to end after it.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is empty, malformed, or has
    /// trailing tokens.
    pub fn parse_complete_expression(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression(0)?;
        if !self.current.is_eof() {
            return Err(ParseError::unexpected(
                "end of expression",
                self.current.kind.clone(),
                self.current.span,
            ));
        }
        Ok(expr)
    }

    /// Parses `column [ASC|DESC] {, column [ASC|DESC]}`.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if a key is not a column name or the keys are
    /// not separated by commas.
    pub fn parse_sort_list(&mut self) -> Result<Vec<SortItem>, ParseError> {
        let mut items = vec![];
        if self.current.is_eof() {
            return Ok(items);
        }
        loop {
            let column = self.expect_identifier()?;
            let direction = if self.check_keyword(Keyword::Desc) {
                self.advance();
                SortDirection::Desc
            } else {
                if self.check_keyword(Keyword::Asc) {
                    self.advance();
                }
                SortDirection::Asc
            };
            items.push(SortItem { column, direction });

            if self.current.is_eof() {
                break;
            }
            self.expect(&TokenKind::Comma)?;
        }
        Ok(items)
    }

    /// Parses an expression whose operators bind at least as tightly as
    /// `min_bp`.
    fn parse_expression(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        while let Some(level) = infix_level(&self.current.kind) {
            if level.left() < min_bp {
                break;
            }
            let r_bp = level.right();

            let negated = self.check_keyword(Keyword::Not);
            if negated {
                self.advance();
            }
            let Some(op) = infix_op(&self.current.kind).filter(|op| !negated || op.negatable()) else {
                return Err(ParseError::unexpected(
                    "IN, LIKE or BETWEEN after NOT",
                    self.current.kind.clone(),
                    self.current.span,
                ));
            };
            self.advance();

            lhs = match op {
                Infix::Is => {
                    let negated = self.check_keyword(Keyword::Not);
                    if negated {
                        self.advance();
                    }
                    self.expect_keyword(Keyword::Null)?;
                    Expr::IsNull {
                        expr: Box::new(lhs),
                        negated,
                    }
                }
                Infix::In => {
                    self.expect(&TokenKind::LeftParen)?;
                    let list = self.parse_expression_list()?;
                    self.expect(&TokenKind::RightParen)?;
                    Expr::In {
                        expr: Box::new(lhs),
                        list,
                        negated,
                    }
                }
                Infix::Between => {
                    let low = self.parse_expression(r_bp)?;
                    self.expect_keyword(Keyword::And)?;
                    let high = self.parse_expression(r_bp)?;
                    Expr::Between {
                        expr: Box::new(lhs),
                        low: Box::new(low),
                        high: Box::new(high),
                        negated,
                    }
                }
                Infix::Binary(op) => {
                    let rhs = self.parse_expression(r_bp)?;
                    let expr = Expr::binary(lhs, op, rhs);
                    if negated {
                        Expr::Unary {
                            op: UnaryOp::Not,
                            operand: Box::new(expr),
                        }
                    } else {
                        expr
                    }
                }
            };
        }

        Ok(lhs)
    }

    /// Parses a prefix expression. A negated numeric literal folds into the
    /// literal itself.
    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        if let Some((op, level)) = prefix_op(&self.current.kind) {
            self.advance();
            let operand = self.parse_expression(level.left())?;
            return Ok(match (op, operand) {
                (UnaryOp::Neg, Expr::Literal(Literal::Integer(n))) => {
                    Expr::Literal(Literal::Integer(-n))
                }
                (UnaryOp::Neg, Expr::Literal(Literal::Float(x))) => {
                    Expr::Literal(Literal::Float(-x))
                }
                (op, operand) => Expr::Unary {
                    op,
                    operand: Box::new(operand),
                },
            });
        }

        self.parse_primary()
    }

    /// Parses a primary expression.
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current.clone();

        match token.kind {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Integer(n)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(f)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::Date(d) => {
                self.advance();
                Ok(Expr::Literal(Literal::Date(d)))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }

            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression(0)?;
                self.expect(&TokenKind::RightParen)?;
                Ok(Expr::Paren(Box::new(expr)))
            }

            // Column reference or function call
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LeftParen) {
                    return self.parse_function_call(name);
                }
                Ok(Expr::Column {
                    name,
                    span: token.span,
                })
            }

            kind => Err(ParseError::unexpected("expression", kind, token.span)),
        }
    }

    /// Parses a function call.
    fn parse_function_call(&mut self, name: String) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LeftParen)?;

        let args = if self.check(&TokenKind::RightParen) {
            vec![]
        } else {
            self.parse_expression_list()?
        };

        self.expect(&TokenKind::RightParen)?;

        Ok(Expr::Function(FunctionCall { name, args }))
    }

    /// Parses a comma-separated list of expressions.
    fn parse_expression_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![];
        loop {
            exprs.push(self.parse_expression(0)?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(exprs)
    }

    // --- Helper methods ---

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    /// Checks if the current token matches the given kind.
    fn check(&self, kind: &TokenKind) -> bool {
        core::mem::discriminant(&self.current.kind) == core::mem::discriminant(kind)
    }

    /// Checks if the current token is the given keyword.
    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.current.kind, TokenKind::Keyword(kw) if *kw == keyword)
    }

    /// Expects the current token to be the given kind.
    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                format!("{kind:?}"),
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    /// Expects the current token to be the given keyword.
    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.check_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                keyword.as_str(),
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    /// Expects and returns an identifier.
    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(ParseError::unexpected(
                "column name",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    fn parse(input: &str) -> Result<Expr, ParseError> {
        Parser::new(input).parse_complete_expression()
    }

    #[test]
    fn test_expression_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        let Expr::Binary { left, op, right } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::Add);
        assert_eq!(*left, Expr::Literal(Literal::Integer(1)));
        assert!(matches!(
            *right,
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_not_binds_looser_than_comparison() {
        let expr = parse("NOT a = 1 AND b = 2").unwrap();
        let Expr::Binary { left, op, .. } = expr else {
            panic!("expected AND");
        };
        assert_eq!(op, BinaryOp::And);
        assert!(matches!(
            *left,
            Expr::Unary {
                op: UnaryOp::Not,
                ..
            }
        ));
    }

    #[test]
    fn test_negated_predicates() {
        assert!(matches!(
            parse("a NOT IN (1, 2)").unwrap(),
            Expr::In { negated: true, .. }
        ));
        assert!(matches!(
            parse("a NOT BETWEEN 1 AND 5").unwrap(),
            Expr::Between { negated: true, .. }
        ));
        assert!(matches!(
            parse("a IS NOT NULL").unwrap(),
            Expr::IsNull { negated: true, .. }
        ));
        let Expr::Unary { op, operand } = parse("a NOT LIKE 'x*'").unwrap() else {
            panic!("expected NOT LIKE");
        };
        assert_eq!(op, UnaryOp::Not);
        assert!(matches!(
            *operand,
            Expr::Binary {
                op: BinaryOp::Like,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_literal_folds() {
        assert_eq!(parse("-5").unwrap(), Expr::Literal(Literal::Integer(-5)));
        assert!(matches!(
            parse("-a").unwrap(),
            Expr::Unary {
                op: UnaryOp::Neg,
                ..
            }
        ));
    }

    #[test]
    fn test_function_call() {
        let Expr::Function(call) = parse("Iif(a > 1, 'big', 'small')").unwrap() else {
            panic!("expected function");
        };
        assert_eq!(call.name, "Iif");
        assert_eq!(call.args.len(), 3);
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse("a = 1 b").is_err());
        assert!(parse("").is_err());
        assert!(parse("a NOT = 1").is_err());
    }

    #[test]
    fn test_sort_list() {
        let items = Parser::new("Name DESC, [Order Id] asc, Total")
            .parse_sort_list()
            .unwrap();
        assert_eq!(
            items,
            vec![
                SortItem::desc("Name"),
                SortItem::asc("Order Id"),
                SortItem::asc("Total"),
            ]
        );
        assert!(Parser::new("   ").parse_sort_list().unwrap().is_empty());
        assert!(Parser::new("Name Id").parse_sort_list().is_err());
        assert!(Parser::new("Name,").parse_sort_list().is_err());
    }
}
