use std::fmt;

use crate::expression::Expression;

/// Automaton state, identified by its unique name.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Node {
    name: String,
    label: Option<String>,
    condition: Option<Expression>,
    invisible: bool,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            condition: None,
            invisible: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// Guard on the counter when entering this node, `None` if unconstrained.
    pub fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    pub fn set_condition(&mut self, condition: Option<Expression>) {
        self.condition = condition;
    }

    /// Invisible nodes only mark entry points and take no part in the analysis.
    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    pub fn set_invisible(&mut self) {
        self.invisible = true;
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            Some(condition) => write!(f, "{} [{}]", self.name, condition),
            None => write!(f, "{}", self.name),
        }
    }
}
