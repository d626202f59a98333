//! Recursive-descent parser for filter rule lines.
//!
//! ```text
//! Or      := And ("OR" And)*
//! And     := Primary ("AND" Primary)*
//! Primary := Term | "(" Or ")"
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::app::{BridgeError, Result};
use crate::filter::rule::FilterRule;

static OPERATOR_OR_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:AND|OR)\b|[()]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    LParen,
    RParen,
    And,
    Or,
    Term(String),
}

/// Parse one rule line into an expression tree.
pub fn parse_expression(expression: &str) -> Result<FilterRule> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(BridgeError::validation("Filter expressions cannot be empty."));
    }
    if !OPERATOR_OR_GROUP.is_match(expression) {
        return FilterRule::term(expression);
    }

    let tokens = tokenize(expression);
    let mut parser = Parser { tokens, position: 0 };
    let tree = parser.parse_or()?;
    if parser.peek().is_some() {
        return Err(BridgeError::validation(
            "Unexpected token in filter expression.",
        ));
    }
    Ok(tree)
}

pub(crate) fn tokenize(expression: &str) -> Vec<Token> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        match ch {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' | '\'' => {
                match chars[i + 1..].iter().position(|&c| c == ch) {
                    Some(len) => {
                        let literal: String = chars[i + 1..i + 1 + len].iter().collect();
                        tokens.push(Token::Term(literal));
                        i += len + 2;
                    }
                    // An unterminated quote is just part of a bare word.
                    None => {
                        let (word, next) = read_word(&chars, i);
                        tokens.push(Token::Term(word));
                        i = next;
                    }
                }
            }
            _ => {
                let (word, next) = read_word(&chars, i);
                let token = if word.eq_ignore_ascii_case("and") {
                    Token::And
                } else if word.eq_ignore_ascii_case("or") {
                    Token::Or
                } else {
                    Token::Term(word)
                };
                tokens.push(token);
                i = next;
            }
        }
    }

    tokens
}

fn read_word(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && !chars[end].is_whitespace() && !matches!(chars[end], '(' | ')') {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<FilterRule> {
        let mut node = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            node = FilterRule::or(node, self.parse_and()?);
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<FilterRule> {
        let mut node = self.parse_primary()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            node = FilterRule::and(node, self.parse_primary()?);
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<FilterRule> {
        match self.advance() {
            Some(Token::Term(text)) => FilterRule::term(text),
            Some(Token::LParen) => {
                let node = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(node),
                    Some(_) => Err(BridgeError::validation(
                        "Expected ')' in filter expression.",
                    )),
                    None => Err(BridgeError::validation("Incomplete filter expression.")),
                }
            }
            Some(_) => Err(BridgeError::validation(
                "Expected a filter term or parenthesized group.",
            )),
            None => Err(BridgeError::validation("Incomplete filter expression.")),
        }
    }
}
