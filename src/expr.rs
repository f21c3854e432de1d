//! # Expression Evaluation
//!
//! Match expressions (on imports, sources, registry entries and redirects),
//! verify expressions and assign mappings are all evaluated through the
//! [`Evaluator`] trait, so the resolution engine does not depend on any
//! particular expression language.
//!
//! [`BasicEvaluator`] is the implementation the binary uses:
//!
//! - boolean expressions support `||`, `&&`, `!`, parentheses and the
//!   comparisons `==`, `!=` and `=~` (regex match). Operands are identifiers
//!   looked up in the environment, quoted strings, bare numbers and the
//!   literals `true`/`false`. A lone operand is true when its value is
//!   `"true"`, and an empty expression is always true.
//! - string expressions interpolate `${name}` from the environment.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{Error, Result};

/// Variables visible to an expression, by name.
pub type Env = BTreeMap<String, String>;

/// The expression language used by the resolution engine.
pub trait Evaluator {
    /// Evaluate a boolean expression.
    fn eval_bool(&self, expr: &str, env: &Env) -> Result<bool>;

    /// Evaluate a string-producing expression.
    fn eval_string(&self, expr: &str, env: &Env) -> Result<String>;
}

/// Evaluates a match expression, treating a missing expression as "always".
pub fn matches(evaluator: &dyn Evaluator, expr: Option<&str>, env: &Env) -> Result<bool> {
    match expr {
        Some(expr) if !expr.trim().is_empty() => evaluator.eval_bool(expr, env),
        _ => Ok(true),
    }
}

/// The built-in comparison and interpolation language.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicEvaluator;

impl BasicEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for BasicEvaluator {
    fn eval_bool(&self, expr: &str, env: &Env) -> Result<bool> {
        let tokens = tokenize(expr)?;
        if tokens.is_empty() {
            return Ok(true);
        }
        let mut parser = Parser {
            expr,
            tokens,
            pos: 0,
            env,
        };
        let value = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(value)
    }

    fn eval_string(&self, expr: &str, env: &Env) -> Result<String> {
        interpolate(expr, env)
    }
}

/// Replace every `${name}` in `template` with its value from `env`.
pub fn interpolate(template: &str, env: &Env) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| Error::Expression {
            expression: template.to_string(),
            message: "unterminated '${'".to_string(),
        })?;
        let name = after[..end].trim();
        let value = env.get(name).ok_or_else(|| Error::Expression {
            expression: template.to_string(),
            message: format!("unknown variable '{}'", name),
        })?;
        result.push_str(value);
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(String),
    And,
    Or,
    Not,
    Eq,
    Ne,
    Match,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let err = |message: String| Error::Expression {
        expression: expr.to_string(),
        message,
    };
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(ch) {
                    return Err(err(format!("expected '{}{}'", ch, ch)));
                }
                tokens.push(if ch == '&' { Token::And } else { Token::Or });
            }
            '=' => {
                chars.next();
                match chars.next() {
                    Some('=') => tokens.push(Token::Eq),
                    Some('~') => tokens.push(Token::Match),
                    _ => return Err(err("expected '==' or '=~'".to_string())),
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    } else if c == ch {
                        closed = true;
                        break;
                    } else {
                        value.push(c);
                    }
                }
                if !closed {
                    return Err(err("unterminated string literal".to_string()));
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' || c == '-' {
                        value.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' {
                        value.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(value));
            }
            other => return Err(err(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    env: &'a Env,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> Error {
        Error::Expression {
            expression: self.expr.to_string(),
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or_expr(&mut self) -> Result<bool> {
        let mut value = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool> {
        let mut value = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<bool> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let value = self.or_expr()?;
                if self.next() != Some(Token::RParen) {
                    return Err(self.error("expected ')'"));
                }
                Ok(value)
            }
            _ => self.comparison(),
        }
    }

    fn comparison(&mut self) -> Result<bool> {
        let lhs = self.operand()?;
        match self.peek() {
            Some(Token::Eq) => {
                self.pos += 1;
                Ok(lhs == self.operand()?)
            }
            Some(Token::Ne) => {
                self.pos += 1;
                Ok(lhs != self.operand()?)
            }
            Some(Token::Match) => {
                self.pos += 1;
                let pattern = self.operand()?;
                let regex = Regex::new(&pattern).map_err(|e| self.error(&e.to_string()))?;
                Ok(regex.is_match(&lhs))
            }
            _ => Ok(lhs == "true"),
        }
    }

    fn operand(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Str(value)) | Some(Token::Num(value)) => Ok(value),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" | "false" => Ok(name),
                _ => self
                    .env
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| self.error(&format!("unknown variable '{}'", name))),
            },
            _ => Err(self.error("expected a value")),
        }
    }
}
