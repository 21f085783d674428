//! Badge criteria expressions.
//!
//! Criteria are stored as strings like `"user.streak >= 7"` or
//! `"quiz_score == 100"` and parsed into a small typed AST: boolean
//! connectives (`and`, `or`, `not`), comparisons, integer arithmetic,
//! parentheses, and dotted variable names. Evaluation looks variables up in
//! a strict environment; an unknown name or a type mismatch is an error, and
//! there is no escape hatch into a general-purpose interpreter.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | compare
//! compare := sum (("==" | "!=" | "<=" | ">=" | "<" | ">") sum)?
//! sum     := term (("+" | "-") term)*
//! term    := atom (("*" | "/" | "%") atom)*
//! atom    := INT | "true" | "false" | VAR | "(" expr ")" | "-" atom
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TrailheadError};

/// A value a criteria variable or expression can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
        }
    }
}

/// The variable environment an expression is evaluated against.
pub type Env = BTreeMap<String, Value>;

/// Build an environment from name/value pairs.
pub fn env(pairs: &[(&str, Value)]) -> Env {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

/// A parsed criteria expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Var(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Expr {
    /// Evaluate the expression against an environment.
    pub fn eval(&self, env: &Env) -> Result<Value> {
        match self {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Var(name) => env
                .get(name)
                .copied()
                .ok_or_else(|| TrailheadError::criteria(format!("unknown variable: {name}"))),
            Expr::Not(inner) => match inner.eval(env)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(type_error("not", &other)),
            },
            Expr::Neg(inner) => match inner.eval(env)? {
                Value::Int(n) => Ok(Value::Int(-n)),
                other => Err(type_error("-", &other)),
            },
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.eval(env)?;
                let rhs = rhs.eval(env)?;
                apply_binary(*op, lhs, rhs)
            }
        }
    }

    /// Evaluate as a predicate: the result must be a boolean.
    pub fn eval_predicate(&self, env: &Env) -> Result<bool> {
        match self.eval(env)? {
            Value::Bool(b) => Ok(b),
            Value::Int(n) => Err(TrailheadError::criteria(format!(
                "criteria must evaluate to a boolean, got {n}"
            ))),
        }
    }
}

fn type_error(op: &str, value: &Value) -> TrailheadError {
    TrailheadError::criteria(format!(
        "operator '{op}' not defined for {} value {value}",
        value.type_name()
    ))
}

fn apply_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    use BinaryOp::*;
    use Value::*;
    match (op, lhs, rhs) {
        (Or, Bool(a), Bool(b)) => Ok(Bool(a || b)),
        (And, Bool(a), Bool(b)) => Ok(Bool(a && b)),
        (Eq, Bool(a), Bool(b)) => Ok(Bool(a == b)),
        (Ne, Bool(a), Bool(b)) => Ok(Bool(a != b)),
        (Eq, Int(a), Int(b)) => Ok(Bool(a == b)),
        (Ne, Int(a), Int(b)) => Ok(Bool(a != b)),
        (Lt, Int(a), Int(b)) => Ok(Bool(a < b)),
        (Le, Int(a), Int(b)) => Ok(Bool(a <= b)),
        (Gt, Int(a), Int(b)) => Ok(Bool(a > b)),
        (Ge, Int(a), Int(b)) => Ok(Bool(a >= b)),
        (Add, Int(a), Int(b)) => Ok(Int(a.wrapping_add(b))),
        (Sub, Int(a), Int(b)) => Ok(Int(a.wrapping_sub(b))),
        (Mul, Int(a), Int(b)) => Ok(Int(a.wrapping_mul(b))),
        (Div, Int(_), Int(0)) => Err(TrailheadError::criteria("division by zero")),
        (Rem, Int(_), Int(0)) => Err(TrailheadError::criteria("division by zero")),
        (Div, Int(a), Int(b)) => Ok(Int(a.wrapping_div(b))),
        (Rem, Int(a), Int(b)) => Ok(Int(a.wrapping_rem(b))),
        (op, lhs, rhs) => Err(TrailheadError::criteria(format!(
            "operator {op:?} not defined for {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Ident(String),
    True,
    False,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
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
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Eq);
                } else {
                    return Err(TrailheadError::criteria("expected '==', found '='"));
                }
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ne);
                } else {
                    return Err(TrailheadError::criteria("expected '!=', found '!'"));
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
                    digits.push(d);
                }
                let value = digits
                    .parse::<i64>()
                    .map_err(|_| TrailheadError::criteria(format!("integer too large: {digits}")))?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(d) =
                    chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
                {
                    ident.push(d);
                }
                tokens.push(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(ident),
                });
            }
            other => {
                return Err(TrailheadError::criteria(format!(
                    "unexpected character: '{other}'"
                )));
            }
        }
    }

    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr> {
        let lhs = self.parse_sum()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_sum()?;
        // Comparisons do not chain; `a < b < c` is rejected by the caller
        // noticing the leftover token.
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_sum(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_atom()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_atom()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Expr::Int(n)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::Minus) => {
                let inner = self.parse_atom()?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                if !self.eat(&Token::RParen) {
                    return Err(TrailheadError::criteria("expected ')'"));
                }
                Ok(inner)
            }
            Some(other) => Err(TrailheadError::criteria(format!(
                "unexpected token: {other:?}"
            ))),
            None => Err(TrailheadError::criteria("unexpected end of expression")),
        }
    }
}

/// Parse a criteria expression.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(TrailheadError::criteria("empty expression"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if let Some(leftover) = parser.peek() {
        return Err(TrailheadError::criteria(format!(
            "unexpected trailing token: {leftover:?}"
        )));
    }
    Ok(expr)
}

/// Parse and evaluate a criteria expression in one step.
pub fn evaluate(input: &str, env: &Env) -> Result<bool> {
    parse(input)?.eval_predicate(env)
}
