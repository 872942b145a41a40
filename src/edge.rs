use std::fmt;

use crate::expression::Expression;

/// Transition between two nodes, optionally changing the counter.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Edge {
    start: String,
    end: String,
    label: Option<String>,
    operation: Option<Expression>,
}

impl Edge {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            label: None,
            operation: None,
        }
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn operation(&self) -> Option<&Expression> {
        self.operation.as_ref()
    }

    pub fn set_operation(&mut self, operation: Option<Expression>) {
        self.operation = operation;
    }

    /// Signed counter change along this edge; an edge without a delta changes nothing.
    pub fn delta(&self) -> i64 {
        self.operation.and_then(|op| op.delta()).unwrap_or(0)
    }

    /// Copy of this edge leaving from `start` instead.
    pub(crate) fn with_start(&self, start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.operation, &self.label) {
            (Some(op), _) => write!(f, "{} -> {} -> {}", self.start, op, self.end),
            (None, Some(label)) => write!(f, "{} -> {} -> {}", self.start, label, self.end),
            (None, None) => write!(f, "{} -> {}", self.start, self.end),
        }
    }
}
