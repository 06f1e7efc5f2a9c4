//! Information-flow analysis.
//!
//! The program's flows are collected in one pass over the guarded-command tree:
//!
//! - `x := e` makes every name in `e` flow into `x`;
//! - `A[i] := e` makes every name in `i` and `e` flow into `A`;
//! - inside `if`/`do`, every name read by the guard of the branch, and by the
//!   guards declared before it, flows into everything the branch writes.
//!
//! A flow is allowed when the class of its source may flow to the class of its
//! sink under the reflexive-transitive closure of the lattice.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::ast::{Guard, Stmt};
use crate::error::AnalysisError;
use crate::types::Target;

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityClass(String);

impl SecurityClass {
    pub fn new(name: impl Into<String>) -> Self {
        SecurityClass(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecurityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SecurityClass {
    fn from(name: &str) -> Self {
        SecurityClass::new(name)
    }
}

/// `Flow(from, into)`: information may pass from the first component to the second.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Flow<T>(pub T, pub T);

impl<T> Flow<T> {
    pub fn new(from: T, into: T) -> Self {
        Flow(from, into)
    }

    pub fn source(&self) -> &T {
        &self.0
    }

    pub fn sink(&self) -> &T {
        &self.1
    }
}

impl<T: fmt::Display> fmt::Display for Flow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.0, self.1)
    }
}

/// Generating pairs of the flow relation between classes.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityLattice {
    pub rules: Vec<Flow<SecurityClass>>,
}

impl SecurityLattice {
    pub fn new(rules: impl IntoIterator<Item = (SecurityClass, SecurityClass)>) -> Self {
        Self {
            rules: rules.into_iter().map(|(a, b)| Flow(a, b)).collect(),
        }
    }

    /// Lattice in which every class of `classes` may flow to every other.
    pub fn universal<'a>(classes: impl IntoIterator<Item = &'a SecurityClass> + Clone) -> Self {
        let mut rules = Vec::new();
        for a in classes.clone() {
            for b in classes.clone() {
                rules.push(Flow(a.clone(), b.clone()));
            }
        }
        Self { rules }
    }

    /// Transitive closure of the rules (reflexive pairs are implicit).
    pub fn closure(&self) -> BTreeSet<(SecurityClass, SecurityClass)> {
        let mut closure: BTreeSet<(SecurityClass, SecurityClass)> =
            self.rules.iter().map(|Flow(a, b)| (a.clone(), b.clone())).collect();
        loop {
            let mut added = Vec::new();
            for (a, b) in &closure {
                for (c, d) in closure.range((b.clone(), SecurityClass::new(""))..) {
                    if c != b {
                        break;
                    }
                    if !closure.contains(&(a.clone(), d.clone())) {
                        added.push((a.clone(), d.clone()));
                    }
                }
            }
            if added.is_empty() {
                return closure;
            }
            closure.extend(added);
        }
    }
}

pub type Classification = BTreeMap<String, SecurityClass>;

/// Input of the analysis.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SecurityAnalysis {
    pub lattice: SecurityLattice,
    pub classification: Classification,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub actual: Vec<Flow<String>>,
    pub allowed: Vec<Flow<String>>,
    pub violations: Vec<Flow<String>>,
}

impl SecurityReport {
    pub fn is_secure(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Flows of `stmt`, without duplicates, in order of first discovery.
pub fn flows(stmt: &Stmt) -> Vec<Flow<Target>> {
    let mut acc = Vec::new();
    collect_flows(stmt, &BTreeSet::new(), &mut acc);
    acc
}

fn collect_flows(stmt: &Stmt, implicit: &BTreeSet<Target>, acc: &mut Vec<Flow<Target>>) {
    let mut add = |sources: BTreeSet<Target>, sink: Target| {
        for source in sources.into_iter().chain(implicit.iter().cloned()) {
            let flow = Flow(source, sink.clone());
            if !acc.contains(&flow) {
                acc.push(flow);
            }
        }
    };
    match stmt {
        Stmt::Skip => {}
        Stmt::Assign(x, e) => add(e.targets(), Target::Variable(x.clone())),
        Stmt::ArrayAssign(a, idx, e) => {
            let mut sources = idx.targets();
            sources.extend(e.targets());
            add(sources, Target::Array(a.clone()));
        }
        Stmt::Seq(s1, s2) => {
            collect_flows(s1, implicit, acc);
            collect_flows(s2, implicit, acc);
        }
        Stmt::If(guards) | Stmt::Do(guards) => {
            let mut implicit = implicit.clone();
            for Guard(b, s) in guards {
                implicit.extend(b.targets());
                collect_flows(s, &implicit, acc);
            }
        }
    }
}

impl SecurityAnalysis {
    pub fn new(lattice: SecurityLattice, classification: Classification) -> Self {
        Self { lattice, classification }
    }

    fn class_of(&self, target: &Target) -> Result<&SecurityClass, AnalysisError> {
        self.classification
            .get(target.name())
            .ok_or_else(|| AnalysisError::Unclassified { target: target.clone() })
    }

    pub fn run(&self, stmt: &Stmt) -> Result<SecurityReport, AnalysisError> {
        debug!("security analysis of {}", stmt);
        let closure = self.lattice.closure();
        let allows = |a: &SecurityClass, b: &SecurityClass| a == b || closure.contains(&(a.clone(), b.clone()));

        let mut actual = Vec::new();
        let mut violations = Vec::new();
        for Flow(from, into) in flows(stmt) {
            let (cf, ci) = (self.class_of(&from)?, self.class_of(&into)?);
            let flow = Flow(from.name().to_string(), into.name().to_string());
            if !allows(cf, ci) {
                violations.push(flow.clone());
            }
            actual.push(flow);
        }

        let mut allowed = Vec::new();
        for (a, ca) in &self.classification {
            for (b, cb) in &self.classification {
                if allows(ca, cb) {
                    allowed.push(Flow(a.clone(), b.clone()));
                }
            }
        }

        debug!("{} flows, {} violations", actual.len(), violations.len());
        Ok(SecurityReport {
            actual,
            allowed,
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::ast::{AExpr, BExpr, RelOp};
    use crate::types::{Array, Variable};

    fn class(name: &str) -> SecurityClass {
        SecurityClass::new(name)
    }

    fn classification(pairs: &[(&str, &str)]) -> Classification {
        pairs.iter().map(|&(v, c)| (v.to_string(), class(c))).collect()
    }

    fn names(flows: &[Flow<String>]) -> Vec<(&str, &str)> {
        flows.iter().map(|Flow(a, b)| (a.as_str(), b.as_str())).collect()
    }

    #[test]
    fn test_no_flows() {
        let s = Stmt::if_([Guard::new(BExpr::Bool(true), Stmt::assign("x", AExpr::num(2)))]);
        let analysis = SecurityAnalysis::new(
            SecurityLattice::new([(class("A"), class("B")), (class("C"), class("D"))]),
            classification(&[("a", "A"), ("b", "B")]),
        );
        let report = analysis.run(&s).unwrap();
        assert!(report.actual.is_empty());
        assert!(report.violations.is_empty());
        assert_eq!(names(&report.allowed), vec![("a", "a"), ("a", "b"), ("b", "b")]);
    }

    #[test]
    fn test_explicit_and_implicit_flows() {
        // if h > 0 -> l := 1 [] z = 0 -> A[i] := y fi
        let s = Stmt::if_([
            Guard::new(
                BExpr::rel(AExpr::var("h"), RelOp::Gt, AExpr::num(0)),
                Stmt::assign("l", AExpr::num(1)),
            ),
            Guard::new(
                BExpr::rel(AExpr::var("z"), RelOp::Eq, AExpr::num(0)),
                Stmt::array_assign("A", AExpr::var("i"), AExpr::var("y")),
            ),
        ]);
        let v = |n: &str| Target::Variable(Variable::new(n));
        let a = Target::Array(Array::new("A"));
        assert_eq!(
            flows(&s),
            vec![
                Flow(v("h"), v("l")),
                Flow(v("i"), a.clone()),
                Flow(v("y"), a.clone()),
                Flow(v("h"), a.clone()),
                Flow(v("z"), a),
            ]
        );
    }

    #[test]
    fn test_violations() {
        // l := h ; h := l
        let s = Stmt::seq(Stmt::assign("l", AExpr::var("h")), Stmt::assign("h", AExpr::var("l")));
        let analysis = SecurityAnalysis::new(
            SecurityLattice::new([(class("low"), class("high"))]),
            classification(&[("h", "high"), ("l", "low")]),
        );
        let report = analysis.run(&s).unwrap();
        assert_eq!(names(&report.actual), vec![("h", "l"), ("l", "h")]);
        assert_eq!(names(&report.violations), vec![("h", "l")]);
        assert!(!report.is_secure());
    }

    #[test]
    fn test_empty_lattice() {
        // x := y ; x := z
        let s = Stmt::seq(Stmt::assign("x", AExpr::var("y")), Stmt::assign("x", AExpr::var("z")));
        let analysis = SecurityAnalysis::new(
            SecurityLattice::default(),
            classification(&[("x", "A"), ("y", "B"), ("z", "A")]),
        );
        let report = analysis.run(&s).unwrap();
        assert_eq!(names(&report.actual), vec![("y", "x"), ("z", "x")]);
        assert_eq!(names(&report.violations), vec![("y", "x")]);
        assert_eq!(
            names(&report.allowed),
            vec![("x", "x"), ("x", "z"), ("y", "y"), ("z", "x"), ("z", "z")]
        );
    }

    #[test]
    fn test_transitive_closure() {
        let lattice = SecurityLattice::new([
            (class("public"), class("internal")),
            (class("internal"), class("secret")),
            (class("secret"), class("top")),
        ]);
        let closure = lattice.closure();
        assert!(closure.contains(&(class("public"), class("top"))));
        assert!(!closure.contains(&(class("top"), class("public"))));
        assert_eq!(closure.len(), 6);
    }

    #[test]
    fn test_unclassified() {
        let s = Stmt::assign("x", AExpr::var("y"));
        let analysis = SecurityAnalysis::new(SecurityLattice::default(), classification(&[("x", "A")]));
        assert_eq!(
            analysis.run(&s),
            Err(AnalysisError::Unclassified {
                target: Target::Variable(Variable::new("y"))
            })
        );
    }

    #[test]
    fn test_json_shape() {
        let input = r#"{"lattice": [["A", "B"]], "classification": {"x": "A", "y": "B"}}"#;
        let analysis: SecurityAnalysis = serde_json::from_str(input).unwrap();
        let report = analysis.run(&Stmt::assign("x", AExpr::var("y"))).unwrap();
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "actual": [["y", "x"]],
                "allowed": [["x", "x"], ["x", "y"], ["y", "y"]],
                "violations": [["y", "x"]],
            })
        );
    }
}
