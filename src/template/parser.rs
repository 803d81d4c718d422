// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recursive-descent parser for interpolation expressions.
//!
//! The grammar is deliberately small: literals, context lookups with `.` and
//! `[...]`, named helper calls, arithmetic/comparison/logic operators and
//! trailing `| filter(args)` chains. Only bare names are callable; a member
//! expression can never be invoked, which closes off method-style escapes at
//! the grammar level.

use crate::template::lexer::{split_blocks, tokenize, Block, Token};
use crate::value::Value;

use anyhow::{anyhow, bail, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// A name resolved against the evaluation context.
    Var(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    /// A whitelisted helper call; the name is resolved at evaluation time.
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `value | name(args)`.
    Filter(Box<Expr>, String, Vec<Expr>),
}

/// One compiled segment of a template.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Output(Expr),
}

/// A compiled template, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub segments: Vec<Segment>,
}

pub fn parse_template(src: &str) -> Result<Template> {
    let mut segments = vec![];
    for block in split_blocks(src)? {
        match block {
            Block::Text(text) => segments.push(Segment::Text(text)),
            Block::Expr(expr, offset) => {
                let parsed = parse_expression(&expr)
                    .map_err(|e| anyhow!("in interpolation at byte {offset}: {e}"))?;
                segments.push(Segment::Output(parsed));
            }
        }
    }
    Ok(Template { segments })
}

pub fn parse_expression(src: &str) -> Result<Expr> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_filtered()?;
    if parser.pos != parser.tokens.len() {
        bail!("unexpected trailing tokens in expression `{}`", src.trim());
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            Some(t) => bail!("expected {expected:?}, found {t:?}"),
            None => bail!("expected {expected:?}, found end of expression"),
        }
    }

    fn parse_filtered(&mut self) -> Result<Expr> {
        let mut expr = self.parse_or()?;
        while self.eat(&Token::Pipe) {
            let name = match self.next() {
                Some(Token::Ident(name)) => name,
                other => bail!("expected filter name after `|`, found {other:?}"),
            };
            let mut args = vec![];
            if self.eat(&Token::LParen) {
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RParen)?;
                        break;
                    }
                }
            }
            expr = Expr::Filter(Box::new(expr), name, args);
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut expr = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            expr = Expr::Binary(BinOp::Or, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut expr = self.parse_comparison()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_comparison()?;
            expr = Expr::Binary(BinOp::And, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Le) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Ge) => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        if self.eat(&Token::Minus) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.next() {
                    Some(Token::Ident(name)) => {
                        expr = Expr::Member(Box::new(expr), name);
                    }
                    other => bail!("expected member name after `.`, found {other:?}"),
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_or()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.peek() == Some(&Token::LParen) {
                // Only a bare name is callable.
                match expr {
                    Expr::Var(name) => {
                        self.pos += 1;
                        let mut args = vec![];
                        if !self.eat(&Token::RParen) {
                            loop {
                                args.push(self.parse_or()?);
                                if self.eat(&Token::Comma) {
                                    continue;
                                }
                                self.expect(Token::RParen)?;
                                break;
                            }
                        }
                        expr = Expr::Call(name, args);
                    }
                    _ => bail!("only named helpers can be called"),
                }
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::from(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let expr = self.parse_filtered()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            other => bail!("expected a value, found {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_member_chain() {
        let e = parse_expression("data.user.name").unwrap();
        assert_eq!(
            e,
            Expr::Member(
                Box::new(Expr::Member(
                    Box::new(Expr::Var("data".into())),
                    "user".into()
                )),
                "name".into()
            )
        );
    }

    #[test]
    fn test_parse_filter_chain() {
        let e = parse_expression("name | upper | default('n/a')").unwrap();
        match e {
            Expr::Filter(inner, name, args) => {
                assert_eq!(name, "default");
                assert_eq!(args.len(), 1);
                assert!(matches!(*inner, Expr::Filter(_, _, _)));
            }
            other => panic!("unexpected expr {other:?}"),
        }
    }

    #[test]
    fn test_member_call_rejected() {
        assert!(parse_expression("data.toString()").is_err());
    }

    #[test]
    fn test_precedence() {
        let e = parse_expression("1 + 2 * 3 == 7").unwrap();
        match e {
            Expr::Binary(BinOp::Eq, lhs, _) => match *lhs {
                Expr::Binary(BinOp::Add, _, rhs) => {
                    assert!(matches!(*rhs, Expr::Binary(BinOp::Mul, _, _)))
                }
                other => panic!("unexpected lhs {other:?}"),
            },
            other => panic!("unexpected expr {other:?}"),
        }
    }

    #[test]
    fn test_parse_template_segments() {
        let t = parse_template("Hi {{ name }}, bye").unwrap();
        assert_eq!(t.segments.len(), 3);
        assert!(matches!(t.segments[1], Segment::Output(_)));
    }
}
