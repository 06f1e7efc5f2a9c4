//! Variable and array stores.
//!
//! [`Memory`] is generic over what is stored per variable and per array, so
//! the same type describes concrete memories (`i64`, `Vec<i64>`) and sign
//! assignments (`Sign`, `SignSet`).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{Array, Target, Variable};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>, A: Deserialize<'de>"))]
pub struct Memory<T, A = T> {
    #[serde(default)]
    pub variables: BTreeMap<Variable, T>,
    #[serde(default)]
    pub arrays: BTreeMap<Array, A>,
}

/// Concrete memory: integers for variables, fixed-length integer sequences for arrays.
pub type InterpreterMemory = Memory<i64, Vec<i64>>;

impl<T, A> Default for Memory<T, A> {
    fn default() -> Self {
        Self {
            variables: BTreeMap::new(),
            arrays: BTreeMap::new(),
        }
    }
}

impl<T, A> Memory<T, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a memory holding one entry per target.
    pub fn from_targets<'a>(
        targets: impl IntoIterator<Item = &'a Target>,
        mut var: impl FnMut(&Variable) -> T,
        mut arr: impl FnMut(&Array) -> A,
    ) -> Self {
        let mut memory = Self::new();
        for target in targets {
            match target {
                Target::Variable(v) => {
                    memory.variables.insert(v.clone(), var(v));
                }
                Target::Array(a) => {
                    memory.arrays.insert(a.clone(), arr(a));
                }
            }
        }
        memory
    }

    pub fn with_var(mut self, var: &str, value: T) -> Self {
        self.variables.insert(Variable::new(var), value);
        self
    }

    pub fn with_array(mut self, arr: &str, value: A) -> Self {
        self.arrays.insert(Array::new(arr), value);
        self
    }

    pub fn get_var(&self, var: &Variable) -> Option<&T> {
        self.variables.get(var)
    }

    pub fn get_arr(&self, arr: &Array) -> Option<&A> {
        self.arrays.get(arr)
    }

    pub fn contains(&self, target: &Target) -> bool {
        match target {
            Target::Variable(v) => self.variables.contains_key(v),
            Target::Array(a) => self.arrays.contains_key(a),
        }
    }

    /// Returns the first target (in order) that has no entry in this memory.
    pub fn first_missing<'a>(&self, targets: impl IntoIterator<Item = &'a Target>) -> Option<Target> {
        targets.into_iter().find(|t| !self.contains(t)).cloned()
    }

    /// All targets with an entry in this memory.
    pub fn targets(&self) -> BTreeSet<Target> {
        self.variables
            .keys()
            .cloned()
            .map(Target::Variable)
            .chain(self.arrays.keys().cloned().map(Target::Array))
            .collect()
    }
}

impl InterpreterMemory {
    /// Memory in which every variable is `0` and every array is empty.
    pub fn zeroed<'a>(targets: impl IntoIterator<Item = &'a Target>) -> Self {
        Memory::from_targets(targets, |_| 0, |_| Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_zeroed() {
        let targets: BTreeSet<Target> = [
            Target::Variable(Variable::new("x")),
            Target::Array(Array::new("A")),
        ]
        .into_iter()
        .collect();
        let mem = InterpreterMemory::zeroed(&targets);
        assert_eq!(mem.get_var(&Variable::new("x")), Some(&0));
        assert_eq!(mem.get_arr(&Array::new("A")), Some(&vec![]));
        assert_eq!(mem.targets(), targets);
    }

    #[test]
    fn test_first_missing() {
        let mem = InterpreterMemory::new().with_var("x", 1);
        let targets = [
            Target::Variable(Variable::new("x")),
            Target::Variable(Variable::new("y")),
        ];
        assert_eq!(mem.first_missing(&targets), Some(Target::Variable(Variable::new("y"))));
        assert_eq!(mem.first_missing(&targets[..1]), None);
    }

    #[test]
    fn test_json_shape() {
        let mem = InterpreterMemory::new().with_var("x", 3).with_array("A", vec![1, 2]);
        let json = serde_json::to_value(&mem).unwrap();
        assert_eq!(json, serde_json::json!({"variables": {"x": 3}, "arrays": {"A": [1, 2]}}));

        let parsed: InterpreterMemory = serde_json::from_str(r#"{"variables": {"x": 3}}"#).unwrap();
        assert_eq!(parsed, InterpreterMemory::new().with_var("x", 3));
    }

    #[test]
    fn test_deserialize_without_default_values() {
        #[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
        enum Mark {
            Seen,
        }

        let parsed: Memory<Mark> = serde_json::from_str(r#"{"arrays": {"A": "Seen"}}"#).unwrap();
        assert_eq!(parsed, Memory::new().with_array("A", Mark::Seen));
        assert!(parsed.variables.is_empty());
    }
}
