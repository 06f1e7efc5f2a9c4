//! # gcl-rs: Program Graphs for the Guarded Commands Language
//!
//! **`gcl-rs`** compiles programs of the Guarded Commands Language (GCL) into
//! **program graphs** and runs a family of analyses over them: concrete
//! interpretation, sign analysis, information-flow analysis and behavioural
//! comparison of two graphs.
//!
//! ## What is a Program Graph?
//!
//! A program graph is a control-flow automaton. Its nodes are control points,
//! and every edge carries an action: an assignment, a guard that must hold for
//! the edge to be taken, or `skip`. One node is the start node and one is the
//! end node. Node numbers are not meaningful: two graphs that differ by a
//! renaming of their nodes describe the same program.
//!
//! ## Key Features
//!
//! - **Deterministic and non-deterministic compilation**: in
//!   [`Deterministic`][crate::pg::Determinism::Deterministic] mode the first true
//!   guard of an `if`/`do` wins, so at most one edge is ever enabled.
//! - **Checked arithmetic**: faults such as division by zero disable the edge
//!   being evaluated instead of aborting the run.
//! - **Bounded exploration**: runs, fixpoints and comparisons all take explicit
//!   limits and report a timeout instead of hanging.
//!
//! ## Basic Usage
//!
//! ```rust
//! use gcl_rs::ast::{AExpr, BExpr, Guard, RelOp, Stmt};
//! use gcl_rs::compiler::compile;
//! use gcl_rs::interpreter::{Interpreter, Outcome};
//! use gcl_rs::memory::InterpreterMemory;
//! use gcl_rs::pg::Determinism;
//!
//! // 1. Build a program: do n > 0 -> n := n - 1 od
//! let program = Stmt::do_([Guard::new(
//!     BExpr::rel(AExpr::var("n"), RelOp::Gt, AExpr::num(0)),
//!     Stmt::assign("n", AExpr::sub(AExpr::var("n"), AExpr::num(1))),
//! )]);
//!
//! // 2. Compile it
//! let pg = compile(&program, Determinism::Deterministic).unwrap();
//!
//! // 3. Run it
//! let memory = InterpreterMemory::new().with_var("n", 3);
//! let exec = Interpreter::default().run(&pg, memory, Determinism::Deterministic).unwrap();
//! assert_eq!(exec.outcome(), Outcome::Terminated);
//! assert_eq!(exec.trace.len(), 7);
//! ```
//!
//! ## Core Components
//!
//! - **[`compiler`]**: translation of [`ast::Stmt`] into [`pg::ProgramGraph`].
//! - **[`interpreter`]**: concrete runs and exhaustive exploration.
//! - **[`sign_analysis`]**: sign abstract interpretation on top of the [`fixpoint`] engine.
//! - **[`security`]**: information-flow analysis against a security lattice.
//! - **[`equivalence`]**: comparison of two graphs, or of a graph and a trace.
//! - **[`dot`]**: Graphviz export.

pub mod ast;
pub mod compiler;
pub mod dot;
pub mod equivalence;
pub mod error;
pub mod eval;
pub mod fixpoint;
pub mod interpreter;
pub mod memory;
pub mod pg;
pub mod security;
pub mod sign;
pub mod sign_analysis;
pub mod types;
