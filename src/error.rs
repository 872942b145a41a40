//! Error types.

use std::io;

use thiserror::Error;

/// Structural problems with an [`Automaton`][crate::automaton::Automaton].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AutomatonError {
    /// No invisible node with an outgoing edge exists, so there is nowhere to start.
    #[error(
        "no initial node was found, make sure that there is a node with an \
         incoming edge originating from an invisible node"
    )]
    NoInitialNode,

    #[error("unknown node `{0}`")]
    UnknownNode(String),

    #[error("unknown edge `{0} -> {1}`")]
    UnknownEdge(String, String),
}

/// Failure to parse a guard or delta such as `<=200` or `+1`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseExpressionError {
    #[error("empty expression")]
    Empty,

    #[error("unsupported operator `{0}`")]
    UnsupportedOperator(String),

    #[error("invalid constant `{0}`")]
    InvalidConstant(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid bound `{0}`, expected an integer, `inf` or `-inf`")]
pub struct ParseBoundError(pub String);

/// Errors produced while reading an automaton from its textual description.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: usize },

    #[error("line {line}: unexpected token `{token}`")]
    UnexpectedToken { line: usize, token: String },

    #[error("line {line}: statement outside of a `digraph` block")]
    MissingHeader { line: usize },

    #[error(transparent)]
    Automaton(#[from] AutomatonError),
}
