//! Expression buffer and evaluator
//!
//! The buffer is the text built from committed tokens (digit strings and the
//! four operator symbols); adjacent digit tokens concatenate into one number.
//! Evaluation uses a dedicated tokenizer and a two-level precedence parser,
//! so nothing outside `0-9 + - * /` is ever accepted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Text shown in place of a result when evaluation fails
pub const ERROR_SENTINEL: &str = "Error";

/// Reasons an expression cannot be evaluated
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Expression is empty")]
    Empty,

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),

    #[error("Expected a number at position {0}")]
    ExpectedNumber(usize),

    #[error("Unexpected operator '{0}' at position {1}")]
    UnexpectedOperator(Operator, usize),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Result is not a finite number")]
    NonFinite,
}

/// Binary operators accepted by the grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl Operator {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }

    fn binds_tightly(&self) -> bool {
        matches!(self, Operator::Mul | Operator::Div)
    }

    fn apply(&self, lhs: f64, rhs: f64) -> Result<f64, ExpressionError> {
        match self {
            Operator::Add => Ok(lhs + rhs),
            Operator::Sub => Ok(lhs - rhs),
            Operator::Mul => Ok(lhs * rhs),
            Operator::Div if rhs == 0.0 => Err(ExpressionError::DivisionByZero),
            Operator::Div => Ok(lhs / rhs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Op(Operator),
}

/// Whether `c` may appear in an expression
pub fn is_expression_char(c: char) -> bool {
    c.is_ascii_digit() || Operator::from_symbol(c).is_some()
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c.is_ascii_digit() {
            let mut end = pos + c.len_utf8();
            while let Some(&(next_pos, next)) = chars.peek() {
                if !next.is_ascii_digit() {
                    break;
                }
                end = next_pos + next.len_utf8();
                chars.next();
            }
            let value: f64 = text[pos..end]
                .parse()
                .map_err(|_| ExpressionError::ExpectedNumber(pos))?;
            tokens.push((pos, Token::Number(value)));
        } else if let Some(op) = Operator::from_symbol(c) {
            tokens.push((pos, Token::Op(op)));
        } else {
            return Err(ExpressionError::UnexpectedCharacter(c, pos));
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    end: usize,
}

impl Parser {
    fn number(&mut self) -> Result<f64, ExpressionError> {
        match self.tokens.get(self.cursor) {
            Some((_, Token::Number(value))) => {
                self.cursor += 1;
                Ok(*value)
            }
            Some((pos, Token::Op(op))) => Err(ExpressionError::UnexpectedOperator(*op, *pos)),
            None => Err(ExpressionError::ExpectedNumber(self.end)),
        }
    }

    fn peek_op(&self) -> Option<Operator> {
        match self.tokens.get(self.cursor) {
            Some((_, Token::Op(op))) => Some(*op),
            _ => None,
        }
    }

    fn term(&mut self) -> Result<f64, ExpressionError> {
        let mut value = self.number()?;
        while let Some(op) = self.peek_op().filter(Operator::binds_tightly) {
            self.cursor += 1;
            let rhs = self.number()?;
            value = op.apply(value, rhs)?;
        }
        Ok(value)
    }

    fn expression(&mut self) -> Result<f64, ExpressionError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek_op() {
            self.cursor += 1;
            let rhs = self.term()?;
            value = op.apply(value, rhs)?;
        }
        Ok(value)
    }
}

/// Evaluate an expression over digits and `+ - * /` with usual precedence
pub fn evaluate(text: &str) -> Result<f64, ExpressionError> {
    if text.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        end: text.len(),
    };
    let value = parser.expression()?;

    if let Some((pos, _)) = parser.tokens.get(parser.cursor) {
        return Err(ExpressionError::ExpectedNumber(*pos));
    }

    if !value.is_finite() {
        return Err(ExpressionError::NonFinite);
    }

    Ok(value)
}

/// Outcome of the last evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Evaluation {
    Value(f64),
    Error,
}

impl Evaluation {
    pub fn from_result(result: Result<f64, ExpressionError>) -> Self {
        match result {
            Ok(value) => Evaluation::Value(value),
            Err(_) => Evaluation::Error,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Evaluation::Value(value) => Some(*value),
            Evaluation::Error => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Evaluation::Error)
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Value(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Evaluation::Value(value) => write!(f, "{}", value),
            Evaluation::Error => f.write_str(ERROR_SENTINEL),
        }
    }
}

/// The committed expression text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionBuffer {
    text: String,
}

impl ExpressionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token; rejects anything outside the grammar's alphabet
    pub fn push_token(&mut self, token: &str) -> Result<(), ExpressionError> {
        if let Some((pos, c)) = token.char_indices().find(|&(_, c)| !is_expression_char(c)) {
            return Err(ExpressionError::UnexpectedCharacter(c, self.text.len() + pos));
        }
        self.text.push_str(token);
        Ok(())
    }

    /// Remove the last character, returning it
    pub fn pop_char(&mut self) -> Option<char> {
        self.text.pop()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn evaluate(&self) -> Evaluation {
        Evaluation::from_result(evaluate(&self.text))
    }
}

impl fmt::Display for ExpressionBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
