// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Calculator tool handler.
//!
//! Evaluates arithmetic expressions with a small recursive-descent parser;
//! nothing is ever executed. Supports `+ - * /`, `**` for powers (right
//! associative), `^` for bitwise xor of integers, unary minus and
//! parentheses. `^` binds looser than `+` and `-`, so `1 + 2 ^ 3` is
//! `(1 + 2) ^ 3`.
//!
//! Integer literals stay integers until an operation needs a float: `/`
//! always yields a float, as does a negative exponent or an integer result
//! that no longer fits in an `i64`. Results that are not finite are refused.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::tools::definition::{InputSchema, ToolDefinition};
use crate::tools::parse_arguments;
use crate::tools::registry::ToolHandler;

/// Deepest nesting of parentheses, signs and exponents accepted.
pub const MAX_NESTING: usize = 128;

/// Handler for the `calculate` tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct CalculatorTool;

#[derive(Debug, Deserialize)]
struct CalculateArgs {
    expression: String,
}

#[async_trait]
impl ToolHandler for CalculatorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("calculate", "Safely evaluate a mathematical expression").with_schema(
            InputSchema::new()
                .with_property(
                    "expression",
                    json!({
                        "type": "string",
                        "description": "Expression to evaluate, e.g. '(2 + 3) * 4'"
                    }),
                )
                .with_required(vec!["expression".to_string()]),
        )
    }

    /// Evaluation problems are reported in the output (`status: "error"`),
    /// not as a `ToolError`; only malformed arguments fail the call.
    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let args: CalculateArgs = parse_arguments(&input)?;
        Ok(match evaluate(&args.expression) {
            Ok(result) => json!({"result": result, "status": "success"}),
            Err(message) => json!({"error": message, "status": "error"}),
        })
    }
}

/// Result of an evaluation. Serializes as a plain JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Float(x) => x,
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
        }
    }

    fn float(value: f64) -> Result<Self, String> {
        if value.is_finite() {
            Ok(Self::Float(value))
        } else {
            Err("Result is not a finite number".to_string())
        }
    }

    fn neg(self) -> Result<Self, String> {
        match self {
            Self::Int(n) => Ok(n.checked_neg().map_or(Self::Float(-(n as f64)), Self::Int)),
            Self::Float(x) => Self::float(-x),
        }
    }

    fn add(self, rhs: Self) -> Result<Self, String> {
        self.integer_op(rhs, i64::checked_add, |a, b| a + b)
    }

    fn sub(self, rhs: Self) -> Result<Self, String> {
        self.integer_op(rhs, i64::checked_sub, |a, b| a - b)
    }

    fn mul(self, rhs: Self) -> Result<Self, String> {
        self.integer_op(rhs, i64::checked_mul, |a, b| a * b)
    }

    fn div(self, rhs: Self) -> Result<Self, String> {
        if rhs.as_f64() == 0.0 {
            return Err("division by zero".to_string());
        }
        Self::float(self.as_f64() / rhs.as_f64())
    }

    fn pow(self, rhs: Self) -> Result<Self, String> {
        if self.as_f64() == 0.0 && rhs.as_f64() < 0.0 {
            return Err("zero cannot be raised to a negative power".to_string());
        }
        if let (Self::Int(base), Self::Int(exponent)) = (self, rhs) {
            if let Some(value) = u32::try_from(exponent)
                .ok()
                .and_then(|e| base.checked_pow(e))
            {
                return Ok(Self::Int(value));
            }
        }
        Self::float(self.as_f64().powf(rhs.as_f64()))
    }

    fn xor(self, rhs: Self) -> Result<Self, String> {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => Ok(Self::Int(a ^ b)),
            _ => Err(format!(
                "Unsupported operand types for ^: {} and {}",
                self.type_name(),
                rhs.type_name()
            )),
        }
    }

    /// Integer arithmetic while both sides are integers and the result fits.
    fn integer_op(
        self,
        rhs: Self,
        checked: fn(i64, i64) -> Option<i64>,
        float: fn(f64, f64) -> f64,
    ) -> Result<Self, String> {
        if let (Self::Int(a), Self::Int(b)) = (self, rhs) {
            if let Some(value) = checked(a, b) {
                return Ok(Self::Int(value));
            }
        }
        Self::float(float(self.as_f64(), rhs.as_f64()))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) if x.fract() == 0.0 && x.abs() < 1e16 => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<Number, String> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expression()?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(format!("Unexpected token: {token}")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(Number),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    Caret,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Pow => f.write_str("**"),
            Self::Caret => f.write_str("^"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
        }
    }
}

fn parse_number(literal: &str) -> Result<Number, String> {
    let invalid = || format!("Invalid number: {literal}");
    if literal.contains('.') {
        return literal.parse::<f64>().map(Number::Float).map_err(|_| invalid());
    }
    match literal.parse::<i64>() {
        Ok(n) => Ok(Number::Int(n)),
        Err(_) => literal
            .parse::<f64>()
            .map_err(|_| invalid())
            .and_then(Number::float),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(parse_number(&literal)?));
            }
            '+' | '-' | '/' | '^' | '(' | ')' => {
                chars.next();
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '/' => Token::Slash,
                    '^' => Token::Caret,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
            }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::Pow);
                } else {
                    tokens.push(Token::Star);
                }
            }
            other => return Err(format!("Unsupported character: {other}")),
        }
    }

    if tokens.is_empty() {
        return Err("Empty expression".to_string());
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    // expression := sum ('^' sum)*
    fn expression(&mut self) -> Result<Number, String> {
        let mut value = self.sum()?;
        while self.peek() == Some(Token::Caret) {
            self.advance();
            let rhs = self.sum()?;
            value = value.xor(rhs)?;
        }
        Ok(value)
    }

    // sum := term (('+' | '-') term)*
    fn sum(&mut self) -> Result<Number, String> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.advance();
            let rhs = self.term()?;
            value = if op == Token::Plus {
                value.add(rhs)?
            } else {
                value.sub(rhs)?
            };
        }
        Ok(value)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Number, String> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.advance();
            let rhs = self.unary()?;
            value = if op == Token::Star {
                value.mul(rhs)?
            } else {
                value.div(rhs)?
            };
        }
        Ok(value)
    }

    // Every recursive path (parentheses, signs, exponents) passes through here.
    fn unary(&mut self) -> Result<Number, String> {
        if self.depth >= MAX_NESTING {
            return Err("Expression too deeply nested".to_string());
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    // signed := '-' unary | power
    fn signed(&mut self) -> Result<Number, String> {
        if self.peek() == Some(Token::Minus) {
            self.advance();
            return self.unary()?.neg();
        }
        self.power()
    }

    // power := atom ('**' unary)?
    fn power(&mut self) -> Result<Number, String> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Pow) {
            self.advance();
            let exponent = self.unary()?;
            return base.pow(exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Number, String> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("Missing closing parenthesis".to_string()),
                }
            }
            Some(token) => Err(format!("Unexpected token: {token}")),
            None => Err("Unexpected end of expression".to_string()),
        }
    }
}
