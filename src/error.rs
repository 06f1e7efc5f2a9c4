//! Error types.
//!
//! Three classes of failure are kept apart because callers treat them
//! differently: a [`CompileError`] aborts graph construction, a
//! [`RuntimeError`] only disables the edge being evaluated, and an
//! [`AnalysisError`] means the graph or the input handed to an analysis is
//! ill-formed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{NodeId, Target};

/// Malformed program: the tree cannot be turned into a program graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("variable '{name}' is not declared")]
    UnboundVariable { name: String },

    #[error("array '{name}' is not declared")]
    UnboundArray { name: String },

    /// The same name is used both as a scalar and as an array.
    #[error("'{name}' is used both as a variable and as an array")]
    ArityMismatch { name: String },

    /// An `if` or `do` without any guarded command.
    #[error("'{construct}' has no guarded commands")]
    EmptyChoice { construct: &'static str },
}

/// Fault raised while evaluating an expression in a concrete memory.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("negative exponent")]
    NegativeExponent,

    #[error("an arithmetic operation overflowed")]
    ArithmeticOverflow,

    #[error("index {index} in '{array}' is out-of-bounds")]
    IndexOutOfBounds { array: String, index: i64 },

    #[error("variable '{name}' not found")]
    VariableNotFound { name: String },

    #[error("array '{name}' not found")]
    ArrayNotFound { name: String },
}

/// Invariant violation detected by one of the analyses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A graph run in deterministic mode enabled several edges at once.
    #[error("{enabled} edges are enabled at {node} in deterministic mode")]
    NondeterministicStep { node: NodeId, enabled: usize },

    #[error("initial memory has no value for '{target}'")]
    IncompleteMemory { target: Target },

    #[error("initial sign assignment has no sign for '{target}'")]
    IncompleteAssignment { target: Target },

    #[error("'{target}' has no security classification")]
    Unclassified { target: Target },

    #[error("node {node} does not belong to the program graph")]
    UnknownNode { node: NodeId },

    #[error("exploration exceeded the limit of {limit} simultaneous states")]
    ExplorationLimit { limit: usize },

    #[error("fixpoint did not converge after {iterations} iterations")]
    FixpointDiverged { iterations: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
