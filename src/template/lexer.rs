// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tokenization of template text.
//!
//! A template is plain text interleaved with `{{ expression }}` blocks.
//! [`split_blocks`] separates the two; [`tokenize`] turns one expression
//! into a token stream for the parser.

use anyhow::{bail, Result};

/// A top-level slice of template source.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text(String),
    /// The inside of a `{{ ... }}` interpolation and its byte offset in the
    /// template, for error messages.
    Expr(String, usize),
}

pub fn split_blocks(src: &str) -> Result<Vec<Block>> {
    let mut blocks = vec![];
    let mut rest = src;
    let mut offset = 0usize;
    while let Some(open) = rest.find("{{") {
        if open > 0 {
            blocks.push(Block::Text(rest[..open].to_string()));
        }
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            bail!("unterminated `{{{{` at byte {}", offset + open);
        };
        blocks.push(Block::Expr(
            after_open[..close].to_string(),
            offset + open,
        ));
        let consumed = open + 2 + close + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    if !rest.is_empty() {
        blocks.push(Block::Text(rest.to_string()));
    }
    Ok(blocks)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    True,
    False,
    Null,
    Dot,
    Comma,
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Not,
}

pub fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let mut tokens = vec![];
    let mut chars = expr.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '|' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '|'))) {
                    chars.next();
                    tokens.push(Token::OrOr);
                } else {
                    tokens.push(Token::Pipe);
                }
            }
            '&' => {
                chars.next();
                match chars.peek() {
                    Some((_, '&')) => {
                        chars.next();
                        tokens.push(Token::AndAnd);
                    }
                    _ => bail!("unexpected `&` at byte {pos}"),
                }
            }
            '=' => {
                chars.next();
                match chars.peek() {
                    Some((_, '=')) => {
                        chars.next();
                        tokens.push(Token::EqEq);
                    }
                    _ => bail!("assignment is not supported (byte {pos})"),
                }
            }
            '!' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '<' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '\'' | '"' => {
                let quote = ch;
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    if c == '\\' {
                        match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, other)) => s.push(other),
                            None => break,
                        }
                    } else {
                        s.push(c);
                    }
                }
                if !closed {
                    bail!("unterminated string literal at byte {pos}");
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let mut num = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        // A trailing member access like `1.x` is not a number;
                        // only consume the dot when a digit follows.
                        if c == '.' {
                            let mut ahead = chars.clone();
                            ahead.next();
                            if !matches!(ahead.peek(), Some((_, d)) if d.is_ascii_digit()) {
                                break;
                            }
                        }
                        num.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match num.parse::<f64>() {
                    Ok(n) => tokens.push(Token::Num(n)),
                    Err(_) => bail!("invalid number `{num}` at byte {pos}"),
                }
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '$' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(ident),
                });
            }
            other => bail!("unexpected character `{other}` at byte {pos}"),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_blocks() {
        let blocks = split_blocks("Hello {{ name }}!").unwrap();
        assert_eq!(
            blocks,
            vec![
                Block::Text("Hello ".to_string()),
                Block::Expr(" name ".to_string(), 6),
                Block::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_unterminated() {
        assert!(split_blocks("oops {{ name").is_err());
    }

    #[test]
    fn test_tokenize_expression() {
        let tokens = tokenize("data.items[0] | join(', ')").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("data".into()),
                Token::Dot,
                Token::Ident("items".into()),
                Token::LBracket,
                Token::Num(0.0),
                Token::RBracket,
                Token::Pipe,
                Token::Ident("join".into()),
                Token::LParen,
                Token::Str(", ".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize("a >= 2 && !b || c != 'x'").unwrap();
        assert!(tokens.contains(&Token::Ge));
        assert!(tokens.contains(&Token::AndAnd));
        assert!(tokens.contains(&Token::Not));
        assert!(tokens.contains(&Token::OrOr));
        assert!(tokens.contains(&Token::NotEq));
    }

    #[test]
    fn test_assignment_rejected() {
        assert!(tokenize("a = 1").is_err());
    }
}
