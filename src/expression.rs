//! Guards and deltas.
//!
//! Nodes carry guards (`<=c`, `>=c`, `=c`) restricting the counter on arrival,
//! edges carry deltas (`+c`, `-c`) applied on traversal. Both are an
//! [`Operator`] paired with an integer constant. Deltas store the magnitude
//! and take their sign from the operator.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseExpressionError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Operator {
    Ge,
    Le,
    Eq,
    Add,
    Sub,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "=",
            Operator::Add => "+",
            Operator::Sub => "-",
        }
    }

    pub fn is_guard(self) -> bool {
        matches!(self, Operator::Ge | Operator::Le | Operator::Eq)
    }

    pub fn is_delta(self) -> bool {
        !self.is_guard()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Operator {
    type Err = ParseExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">=" => Ok(Operator::Ge),
            "<=" => Ok(Operator::Le),
            "=" => Ok(Operator::Eq),
            "+" => Ok(Operator::Add),
            "-" => Ok(Operator::Sub),
            other => Err(ParseExpressionError::UnsupportedOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Expression {
    op: Operator,
    constant: i64,
}

impl Expression {
    pub fn new(op: Operator, constant: i64) -> Self {
        Self { op, constant }
    }

    pub fn le(constant: i64) -> Self {
        Self::new(Operator::Le, constant)
    }

    pub fn ge(constant: i64) -> Self {
        Self::new(Operator::Ge, constant)
    }

    pub fn eq(constant: i64) -> Self {
        Self::new(Operator::Eq, constant)
    }

    /// Delta `+constant`.
    pub fn add(constant: i64) -> Self {
        Self::new(Operator::Add, constant)
    }

    /// Delta `-constant`.
    pub fn sub(constant: i64) -> Self {
        Self::new(Operator::Sub, constant)
    }

    pub fn op(&self) -> Operator {
        self.op
    }

    pub fn constant(&self) -> i64 {
        self.constant
    }

    pub fn is_guard(&self) -> bool {
        self.op.is_guard()
    }

    /// Signed counter change of a delta, `None` for guards.
    pub fn delta(&self) -> Option<i64> {
        match self.op {
            Operator::Add => Some(self.constant),
            Operator::Sub => Some(-self.constant),
            _ => None,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.delta().is_some_and(|d| d > 0)
    }

    pub fn is_negative(&self) -> bool {
        self.delta().is_some_and(|d| d < 0)
    }

    /// Applies a delta to `value`. Guards leave the value unchanged.
    pub fn apply(&self, value: i64) -> i64 {
        value.saturating_add(self.delta().unwrap_or(0))
    }

    /// Evaluates a guard on `value`. Deltas accept every value.
    pub fn holds(&self, value: i64) -> bool {
        match self.op {
            Operator::Ge => value >= self.constant,
            Operator::Le => value <= self.constant,
            Operator::Eq => value == self.constant,
            Operator::Add | Operator::Sub => true,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.constant)
    }
}

impl FromStr for Expression {
    type Err = ParseExpressionError;

    /// Parses `<=200`, `>=-5`, `=4`, `+2` or `-1` (surrounding whitespace allowed).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseExpressionError::Empty);
        }

        // The operator is everything up to the constant; a sign directly
        // after a comparison belongs to the constant.
        let split = s
            .char_indices()
            .find(|&(i, c)| c.is_ascii_digit() || (i > 0 && (c == '+' || c == '-')))
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        let (op, constant) = s.split_at(split);

        let op: Operator = op.trim().parse()?;
        let constant = constant.trim();
        let constant: i64 = constant
            .parse()
            .map_err(|_| ParseExpressionError::InvalidConstant(constant.to_string()))?;
        if op.is_delta() && constant < 0 {
            return Err(ParseExpressionError::InvalidConstant(constant.to_string()));
        }

        Ok(Expression::new(op, constant))
    }
}
