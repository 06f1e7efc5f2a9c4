//! Compilation of guarded commands into program graphs.
//!
//! The translation is the standard structural one:
//!
//! - `skip`, `x := a` and `A[i] := a` become a single edge;
//! - `C1 ; C2` threads a fresh node between the two sub-graphs;
//! - `if GC fi` lets every guarded command leave the current node through a
//!   [`BoolCheck`][Action::BoolCheck] edge into its own sub-graph;
//! - `do GC od` does the same but routes every branch back to the current node,
//!   and adds one exit edge guarded by "no guard holds".
//!
//! In [`Determinism::Deterministic`] mode the guard of branch `i` is
//! `b_i & !(b_1 | ... | b_{i-1})`, so at most one branch is ever enabled and the
//! first true guard wins.

use std::collections::BTreeSet;

use log::debug;

use crate::ast::{BExpr, Guard, Stmt};
use crate::error::CompileError;
use crate::pg::{Action, Determinism, Edge, ProgramGraph};
use crate::types::{Array, NodeId, Target, Variable};

/// Names a program is allowed to reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub variables: BTreeSet<Variable>,
    pub arrays: BTreeSet<Array>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares exactly the targets the program mentions.
    pub fn infer(stmt: &Stmt) -> Self {
        Self::from_targets(&stmt.targets())
    }

    pub fn from_targets<'a>(targets: impl IntoIterator<Item = &'a Target>) -> Self {
        let mut decls = Self::new();
        for target in targets {
            match target {
                Target::Variable(v) => {
                    decls.variables.insert(v.clone());
                }
                Target::Array(a) => {
                    decls.arrays.insert(a.clone());
                }
            }
        }
        decls
    }

    pub fn with_var(mut self, name: &str) -> Self {
        self.variables.insert(Variable::new(name));
        self
    }

    pub fn with_array(mut self, name: &str) -> Self {
        self.arrays.insert(Array::new(name));
        self
    }

    fn check(&self, target: &Target) -> Result<(), CompileError> {
        match target {
            Target::Variable(v) if !self.variables.contains(v) => Err(CompileError::UnboundVariable {
                name: v.name().to_string(),
            }),
            Target::Array(a) if !self.arrays.contains(a) => Err(CompileError::UnboundArray {
                name: a.name().to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Compiles `stmt`, declaring every name it mentions.
///
/// Fails if a name is used both as a variable and as an array, or if an
/// `if`/`do` has no guarded commands.
pub fn compile(stmt: &Stmt, det: Determinism) -> Result<ProgramGraph, CompileError> {
    compile_with(stmt, det, &Declarations::infer(stmt))
}

/// Compiles `stmt`, rejecting references to names missing from `decls`.
pub fn compile_with(stmt: &Stmt, det: Determinism, decls: &Declarations) -> Result<ProgramGraph, CompileError> {
    debug!("compile({:?}): {}", det, stmt);

    let targets = stmt.targets();
    let arrays: BTreeSet<&str> = targets
        .iter()
        .filter_map(|t| match t {
            Target::Array(a) => Some(a.name()),
            Target::Variable(_) => None,
        })
        .collect();
    for target in &targets {
        if let Target::Variable(v) = target {
            if arrays.contains(v.name()) {
                return Err(CompileError::ArityMismatch {
                    name: v.name().to_string(),
                });
            }
        }
    }
    for target in &targets {
        decls.check(target)?;
    }
    check_choices(stmt)?;

    let mut builder = Builder::new(det);
    let (start, end) = (builder.fresh(), builder.fresh());
    builder.stmt(stmt, start, end);

    let Builder { next_node, edges, .. } = builder;
    let pg = ProgramGraph::assemble(next_node, start, end, edges).canonicalize();
    debug!("compile: {} nodes, {} edges", pg.node_count(), pg.edges().len());
    Ok(pg)
}

fn check_choices(stmt: &Stmt) -> Result<(), CompileError> {
    match stmt {
        Stmt::Skip | Stmt::Assign(..) | Stmt::ArrayAssign(..) => Ok(()),
        Stmt::Seq(first, second) => {
            check_choices(first)?;
            check_choices(second)
        }
        Stmt::If(guards) | Stmt::Do(guards) => {
            if guards.is_empty() {
                let construct = if matches!(stmt, Stmt::If(_)) { "if" } else { "do" };
                return Err(CompileError::EmptyChoice { construct });
            }
            guards.iter().try_for_each(|Guard(_, body)| check_choices(body))
        }
    }
}

struct Builder {
    det: Determinism,
    next_node: usize,
    edges: Vec<Edge>,
}

impl Builder {
    fn new(det: Determinism) -> Self {
        Self {
            det,
            next_node: 0,
            edges: Vec::new(),
        }
    }

    fn fresh(&mut self) -> NodeId {
        let node = NodeId::new(self.next_node);
        self.next_node += 1;
        node
    }

    fn edge(&mut self, from: NodeId, action: Action, to: NodeId) {
        self.edges.push(Edge::new(from, action, to));
    }

    fn stmt(&mut self, stmt: &Stmt, s: NodeId, t: NodeId) {
        match stmt {
            Stmt::Skip => self.edge(s, Action::Skip, t),
            Stmt::Assign(v, e) => self.edge(s, Action::Assign(v.clone(), e.clone()), t),
            Stmt::ArrayAssign(a, idx, e) => self.edge(s, Action::ArrayAssign(a.clone(), idx.clone(), e.clone()), t),
            Stmt::Seq(first, second) => {
                let q = self.fresh();
                self.stmt(first, s, q);
                self.stmt(second, q, t);
            }
            Stmt::If(guards) => {
                self.guards(guards, s, t);
            }
            Stmt::Do(guards) => {
                let done = self.guards(guards, s, s);
                self.edge(s, Action::BoolCheck(done), t);
            }
        }
    }

    /// Emits one branch per guarded command, all leaving `s` and ending in `t`.
    ///
    /// Returns the condition under which no branch is enabled.
    fn guards(&mut self, guards: &[Guard], s: NodeId, t: NodeId) -> BExpr {
        match self.det {
            Determinism::Deterministic => {
                // Disjunction of all guards seen so far.
                let mut prev: Option<BExpr> = None;
                for Guard(b, body) in guards {
                    let q = self.fresh();
                    let cond = match &prev {
                        None => b.clone(),
                        Some(p) => BExpr::land(b.clone(), BExpr::not(p.clone())),
                    };
                    self.edge(s, Action::BoolCheck(cond), q);
                    self.stmt(body, q, t);
                    prev = Some(match prev {
                        None => b.clone(),
                        Some(p) => BExpr::lor(p, b.clone()),
                    });
                }
                match prev {
                    Some(p) => BExpr::not(p),
                    None => BExpr::Bool(true),
                }
            }
            Determinism::NonDeterministic => {
                for Guard(b, body) in guards {
                    let q = self.fresh();
                    self.edge(s, Action::BoolCheck(b.clone()), q);
                    self.stmt(body, q, t);
                }
                guards
                    .iter()
                    .map(|Guard(b, _)| BExpr::not(b.clone()))
                    .reduce(BExpr::land)
                    .unwrap_or(BExpr::Bool(true))
            }
        }
    }
}
