//! Types and expressions.
//!
//! Binary operators use precedence climbing; all of them are left
//! associative.

use tek_diagnostic::ErrorKind;
use tek_ir::{SynNodeKind, TokenKind};

use crate::parser::{Chain, PResult, Parser};
use crate::stack::ensure_sufficient_stack;
use crate::ImportResolver;

/// Binding power of a binary operator; higher binds tighter.
fn binary_precedence(kind: TokenKind) -> Option<u8> {
    Some(match kind {
        TokenKind::OrOr => 1,
        TokenKind::AndAnd => 2,
        TokenKind::EqEq
        | TokenKind::NotEq
        | TokenKind::Less
        | TokenKind::Greater
        | TokenKind::LessEq
        | TokenKind::GreaterEq => 3,
        TokenKind::Pipe => 4,
        TokenKind::Caret => 5,
        TokenKind::Ampersand => 6,
        TokenKind::Shl | TokenKind::Shr => 7,
        TokenKind::Plus | TokenKind::Minus => 8,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 9,
        _ => return None,
    })
}

impl<R: ImportResolver + ?Sized> Parser<'_, R> {
    pub(crate) fn type_expr(&mut self) -> PResult<u32> {
        ensure_sufficient_stack(|| match self.peek() {
            TokenKind::Ident => {
                let name = self.bump();
                Ok(self.node(SynNodeKind::TypeName, name, 0, 0))
            }
            TokenKind::Star => {
                let star = self.bump();
                let pointee = self.type_expr()?;
                Ok(self.node(SynNodeKind::TypePtr, star, pointee, 0))
            }
            TokenKind::BracketOpen => {
                let open = self.bump();
                let len = if self.at(TokenKind::BracketClose) {
                    0
                } else {
                    self.expr()?
                };
                self.expect(
                    TokenKind::BracketClose,
                    ErrorKind::GenSynTypeArrayExpectedCloseBracket,
                )?;
                let element = self.type_expr()?;
                Ok(self.node(SynNodeKind::TypeArray, open, len, element))
            }
            _ => Err(self.error(ErrorKind::GenSynTypeUnexpectedToken)),
        })
    }

    pub(crate) fn expr(&mut self) -> PResult<u32> {
        self.binary(0)
    }

    fn binary(&mut self, min_precedence: u8) -> PResult<u32> {
        ensure_sufficient_stack(|| {
            let mut lhs = self.unary()?;
            while let Some(precedence) = binary_precedence(self.peek()) {
                if precedence <= min_precedence {
                    break;
                }
                let op = self.bump();
                let rhs = self.binary(precedence)?;
                lhs = self.node(SynNodeKind::Binary, op, lhs, rhs);
            }
            Ok(lhs)
        })
    }

    fn unary(&mut self) -> PResult<u32> {
        match self.peek() {
            TokenKind::Minus
            | TokenKind::Bang
            | TokenKind::Tilde
            | TokenKind::Ampersand
            | TokenKind::Star => {
                let op = self.bump();
                let operand = ensure_sufficient_stack(|| self.unary())?;
                Ok(self.node(SynNodeKind::Unary, op, operand, 0))
            }
            _ => {
                let primary = self.primary()?;
                self.postfix(primary)
            }
        }
    }

    fn postfix(&mut self, mut base: u32) -> PResult<u32> {
        loop {
            base = match self.peek() {
                TokenKind::ParenOpen => {
                    let open = self.bump();
                    let args = self.list(
                        TokenKind::ParenClose,
                        ErrorKind::GenSynExprCallExpectedCloseParentheses,
                    )?;
                    self.node(SynNodeKind::Call, open, base, args)
                }
                TokenKind::BracketOpen => {
                    let open = self.bump();
                    let index = self.expr()?;
                    self.expect(
                        TokenKind::BracketClose,
                        ErrorKind::GenSynExprIndexExpectedCloseBracket,
                    )?;
                    self.node(SynNodeKind::Index, open, base, index)
                }
                TokenKind::Dot => {
                    self.bump();
                    let field =
                        self.expect(TokenKind::Ident, ErrorKind::GenSynExprFieldExpectedIdent)?;
                    self.node(SynNodeKind::Field, field, base, 0)
                }
                _ => return Ok(base),
            };
        }
    }

    fn primary(&mut self) -> PResult<u32> {
        match self.peek() {
            TokenKind::Ident | TokenKind::IdentAbstract => {
                let name = self.bump();
                Ok(self.node(SynNodeKind::Ident, name, 0, 0))
            }
            TokenKind::LitUint
            | TokenKind::LitFloat
            | TokenKind::LitBool
            | TokenKind::LitString => {
                let literal = self.bump();
                Ok(self.node(SynNodeKind::Literal, literal, 0, 0))
            }
            TokenKind::ParenOpen => {
                self.bump();
                let inner = self.expr()?;
                self.expect(
                    TokenKind::ParenClose,
                    ErrorKind::GenSynExprExpectedCloseParentheses,
                )?;
                Ok(inner)
            }
            TokenKind::BracketOpen => {
                let open = self.bump();
                let elements = self.list(
                    TokenKind::BracketClose,
                    ErrorKind::GenSynExprArrayExpectedCloseBracket,
                )?;
                Ok(self.node(SynNodeKind::Array, open, elements, 0))
            }
            TokenKind::KwLoop => {
                let keyword = self.bump();
                let body = self.block()?;
                Ok(self.node(SynNodeKind::Loop, keyword, body, 0))
            }
            TokenKind::KwIf => self.if_expr(),
            _ => Err(self.error(ErrorKind::GenSynExprExpected)),
        }
    }

    /// Comma separated expressions through `close`; a trailing comma is
    /// allowed. Returns the first element.
    fn list(&mut self, close: TokenKind, error: ErrorKind) -> PResult<u32> {
        let mut chain = Chain::default();
        while self.eat(close).is_none() {
            let element = self.expr()?;
            self.link(&mut chain, element);
            if self.eat(TokenKind::Comma).is_none() && !self.at(close) {
                return Err(self.error(error));
            }
        }
        Ok(chain.first)
    }

    fn if_expr(&mut self) -> PResult<u32> {
        let keyword = self.bump();
        let condition = self.expr()?;
        let then = self.block()?;
        let otherwise = if self.eat(TokenKind::KwElse).is_some() {
            match self.peek() {
                TokenKind::KwIf => ensure_sufficient_stack(|| self.if_expr())?,
                TokenKind::BraceOpen => self.block()?,
                _ => return Err(self.error(ErrorKind::GenSynExprIfElseUnexpectedToken)),
            }
        } else {
            0
        };
        let arms = self.node(SynNodeKind::IfArms, keyword, then, otherwise);
        Ok(self.node(SynNodeKind::If, keyword, condition, arms))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
