//! Type-safe names for program variables, arrays and graph nodes.
//!
//! This module provides newtype wrappers that enforce compile-time distinction
//! between scalar variables, arrays and node identifiers, preventing common
//! mistakes such as looking up an array name in the variable store.
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar program variable.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(String);

impl Variable {
    /// Creates a new variable with the given name.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "Variable names must be non-empty");
        Variable(name)
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Variable {
    fn from(name: &str) -> Self {
        Variable::new(name)
    }
}

/// An integer array.
///
/// Arrays live in their own namespace: `A` the array and `A` the variable are
/// different targets, although the compiler rejects programs that use one name
/// in both roles.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Array(String);

impl Array {
    /// Creates a new array with the given name.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "Array names must be non-empty");
        Array(name)
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Array {
    fn from(name: &str) -> Self {
        Array::new(name)
    }
}

/// Anything a program can read or write: a variable or a whole array.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Target {
    Variable(Variable),
    Array(Array),
}

impl Target {
    pub fn name(&self) -> &str {
        match self {
            Target::Variable(v) => v.name(),
            Target::Array(a) => a.name(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Variable(v) => write!(f, "{}", v),
            Target::Array(a) => write!(f, "{}", a),
        }
    }
}

impl From<Variable> for Target {
    fn from(var: Variable) -> Self {
        Target::Variable(var)
    }
}

impl From<Array> for Target {
    fn from(arr: Array) -> Self {
        Target::Array(arr)
    }
}

/// A node in a program graph (0-indexed).
///
/// Identifiers are dense offsets into the graph's node table. They carry no
/// meaning across graphs: two graphs may number the same control point
/// differently.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates a node identifier with the given index.
    pub fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index as a `usize`.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<NodeId> for usize {
    fn from(node: NodeId) -> Self {
        node.0
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}
