//! Calculator tool broker adapter
//!
//! Evaluates integer arithmetic expressions exactly, providing the
//! authoritative value the Verifier compares model answers against.
//! Supports + - * / with precedence, parentheses, and unary minus.

use async_trait::async_trait;
use conclave_application::ports::tool_broker::{ToolBroker, ToolError, ToolOutput};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(i128),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, ToolError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '0'..='9' => {
                let mut value: i128 = 0;
                while let Some(&d) = chars.peek() {
                    match d.to_digit(10) {
                        Some(digit) => {
                            value = value
                                .checked_mul(10)
                                .and_then(|v| v.checked_add(i128::from(digit)))
                                .ok_or_else(|| {
                                    ToolError::ExecutionFailed("number too large".to_string())
                                })?;
                            chars.next();
                        }
                        None => break,
                    }
                }
                tokens.push(Token::Number(value));
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' | 'x' | '×' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            other => {
                return Err(ToolError::InvalidArgs(format!(
                    "unexpected character '{}' in expression",
                    other
                )));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<i128, ToolError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.next();
                    let rhs = self.term()?;
                    value = value.checked_add(rhs).ok_or_else(overflow)?;
                }
                Token::Minus => {
                    self.next();
                    let rhs = self.term()?;
                    value = value.checked_sub(rhs).ok_or_else(overflow)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<i128, ToolError> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.next();
                    let rhs = self.factor()?;
                    value = value.checked_mul(rhs).ok_or_else(overflow)?;
                }
                Token::Slash => {
                    self.next();
                    let rhs = self.factor()?;
                    if rhs == 0 {
                        return Err(ToolError::ExecutionFailed("division by zero".to_string()));
                    }
                    value = value.checked_div(rhs).ok_or_else(overflow)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // factor := '-' factor | number | '(' expr ')'
    fn factor(&mut self) -> Result<i128, ToolError> {
        match self.next() {
            Some(Token::Minus) => {
                let value = self.factor()?;
                value.checked_neg().ok_or_else(overflow)
            }
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(ToolError::InvalidArgs(
                        "unbalanced parentheses".to_string(),
                    )),
                }
            }
            other => Err(ToolError::InvalidArgs(format!(
                "unexpected token: {:?}",
                other
            ))),
        }
    }
}

fn overflow() -> ToolError {
    ToolError::ExecutionFailed("arithmetic overflow".to_string())
}

/// Evaluate an integer arithmetic expression
pub fn evaluate(expression: &str) -> Result<i128, ToolError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ToolError::InvalidArgs("empty expression".to_string()));
    }
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let value = parser.expr()?;
    if parser.position != parser.tokens.len() {
        return Err(ToolError::InvalidArgs(
            "trailing input after expression".to_string(),
        ));
    }
    Ok(value)
}

/// Tool broker exposing the exact integer calculator
pub struct CalculatorBroker;

impl Default for CalculatorBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl CalculatorBroker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolBroker for CalculatorBroker {
    async fn invoke(&self, tool: &str, args: &serde_json::Value) -> Result<ToolOutput, ToolError> {
        if tool != "calculator" {
            return Err(ToolError::UnknownTool(tool.to_string()));
        }

        let expression = args
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ToolError::InvalidArgs("expected an 'expression' string argument".to_string())
            })?;

        let value = evaluate(expression)?;
        debug!(expression, value, "Calculator evaluated");
        Ok(ToolOutput::new("calculator", value.to_string()))
    }
}
