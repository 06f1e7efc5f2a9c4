//! Abstract syntax of the Guarded Commands Language.
//!
//! The tree is produced by an external front-end (or built by hand with the
//! helper constructors below) and is immutable afterwards. `Display` prints
//! the usual GCL surface syntax, which is also how actions are labelled in
//! program graphs.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Array, Target, Variable};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum AOp {
    Plus,
    Minus,
    Times,
    /// Integer division, truncating towards zero.
    Divide,
    Pow,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum RelOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum LogicOp {
    /// Short-circuit conjunction (`&&`).
    And,
    /// Strict conjunction (`&`): both operands are always evaluated.
    Land,
    /// Short-circuit disjunction (`||`).
    Or,
    /// Strict disjunction (`|`): both operands are always evaluated.
    Lor,
}

/// Arithmetic expression.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum AExpr {
    Number(i64),
    Variable(Variable),
    /// Array read `A[e]`.
    Array(Array, Box<AExpr>),
    Binary(Box<AExpr>, AOp, Box<AExpr>),
    /// Unary negation `-e`.
    Minus(Box<AExpr>),
}

/// Boolean expression.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum BExpr {
    Bool(bool),
    Rel(AExpr, RelOp, AExpr),
    Logic(Box<BExpr>, LogicOp, Box<BExpr>),
    Not(Box<BExpr>),
}

/// A guarded command `b -> s`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Guard(pub BExpr, pub Stmt);

/// Statement.
///
/// `If` and `Do` hold the guarded commands of a choice `b1 -> s1 [] ... [] bn -> sn`
/// in declaration order.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Stmt {
    Skip,
    Assign(Variable, AExpr),
    ArrayAssign(Array, AExpr, AExpr),
    Seq(Box<Stmt>, Box<Stmt>),
    If(Vec<Guard>),
    Do(Vec<Guard>),
}

#[allow(clippy::should_implement_trait)]
impl AExpr {
    pub fn num(n: i64) -> Self {
        AExpr::Number(n)
    }

    pub fn var(name: &str) -> Self {
        AExpr::Variable(Variable::new(name))
    }

    pub fn index(arr: &str, idx: AExpr) -> Self {
        AExpr::Array(Array::new(arr), Box::new(idx))
    }

    pub fn binary(lhs: AExpr, op: AOp, rhs: AExpr) -> Self {
        AExpr::Binary(Box::new(lhs), op, Box::new(rhs))
    }

    pub fn add(lhs: AExpr, rhs: AExpr) -> Self {
        AExpr::binary(lhs, AOp::Plus, rhs)
    }

    pub fn sub(lhs: AExpr, rhs: AExpr) -> Self {
        AExpr::binary(lhs, AOp::Minus, rhs)
    }

    pub fn mul(lhs: AExpr, rhs: AExpr) -> Self {
        AExpr::binary(lhs, AOp::Times, rhs)
    }

    pub fn div(lhs: AExpr, rhs: AExpr) -> Self {
        AExpr::binary(lhs, AOp::Divide, rhs)
    }

    pub fn pow(lhs: AExpr, rhs: AExpr) -> Self {
        AExpr::binary(lhs, AOp::Pow, rhs)
    }

    pub fn neg(value: AExpr) -> Self {
        AExpr::Minus(Box::new(value))
    }

    /// Collects every variable and array read by this expression.
    pub fn targets(&self) -> BTreeSet<Target> {
        let mut targets = BTreeSet::new();
        self.collect_targets(&mut targets);
        targets
    }

    fn collect_targets(&self, acc: &mut BTreeSet<Target>) {
        match self {
            AExpr::Number(_) => {}
            AExpr::Variable(v) => {
                acc.insert(Target::Variable(v.clone()));
            }
            AExpr::Array(a, idx) => {
                acc.insert(Target::Array(a.clone()));
                idx.collect_targets(acc);
            }
            AExpr::Binary(l, _, r) => {
                l.collect_targets(acc);
                r.collect_targets(acc);
            }
            AExpr::Minus(e) => e.collect_targets(acc),
        }
    }
}

#[allow(clippy::should_implement_trait)]
impl BExpr {
    pub fn rel(lhs: AExpr, op: RelOp, rhs: AExpr) -> Self {
        BExpr::Rel(lhs, op, rhs)
    }

    pub fn logic(lhs: BExpr, op: LogicOp, rhs: BExpr) -> Self {
        BExpr::Logic(Box::new(lhs), op, Box::new(rhs))
    }

    pub fn and(lhs: BExpr, rhs: BExpr) -> Self {
        BExpr::logic(lhs, LogicOp::And, rhs)
    }

    pub fn land(lhs: BExpr, rhs: BExpr) -> Self {
        BExpr::logic(lhs, LogicOp::Land, rhs)
    }

    pub fn or(lhs: BExpr, rhs: BExpr) -> Self {
        BExpr::logic(lhs, LogicOp::Or, rhs)
    }

    pub fn lor(lhs: BExpr, rhs: BExpr) -> Self {
        BExpr::logic(lhs, LogicOp::Lor, rhs)
    }

    pub fn not(value: BExpr) -> Self {
        BExpr::Not(Box::new(value))
    }

    /// Collects every variable and array read by this expression.
    pub fn targets(&self) -> BTreeSet<Target> {
        let mut targets = BTreeSet::new();
        self.collect_targets(&mut targets);
        targets
    }

    fn collect_targets(&self, acc: &mut BTreeSet<Target>) {
        match self {
            BExpr::Bool(_) => {}
            BExpr::Rel(l, _, r) => {
                l.collect_targets(acc);
                r.collect_targets(acc);
            }
            BExpr::Logic(l, _, r) => {
                l.collect_targets(acc);
                r.collect_targets(acc);
            }
            BExpr::Not(b) => b.collect_targets(acc),
        }
    }
}

impl Guard {
    pub fn new(guard: BExpr, body: Stmt) -> Self {
        Guard(guard, body)
    }

    pub fn condition(&self) -> &BExpr {
        &self.0
    }

    pub fn body(&self) -> &Stmt {
        &self.1
    }
}

impl Stmt {
    pub fn assign(var: &str, value: AExpr) -> Self {
        Stmt::Assign(Variable::new(var), value)
    }

    pub fn array_assign(arr: &str, idx: AExpr, value: AExpr) -> Self {
        Stmt::ArrayAssign(Array::new(arr), idx, value)
    }

    pub fn seq(first: Stmt, second: Stmt) -> Self {
        Stmt::Seq(Box::new(first), Box::new(second))
    }

    /// Right-nested sequence of all statements, or `skip` if there are none.
    pub fn seq_all(stmts: impl IntoIterator<Item = Stmt>) -> Self {
        let mut stmts: Vec<Stmt> = stmts.into_iter().collect();
        let Some(mut acc) = stmts.pop() else {
            return Stmt::Skip;
        };
        while let Some(prev) = stmts.pop() {
            acc = Stmt::seq(prev, acc);
        }
        acc
    }

    pub fn if_(guards: impl IntoIterator<Item = Guard>) -> Self {
        Stmt::If(guards.into_iter().collect())
    }

    pub fn do_(guards: impl IntoIterator<Item = Guard>) -> Self {
        Stmt::Do(guards.into_iter().collect())
    }

    /// Collects every variable and array read or written by this statement.
    pub fn targets(&self) -> BTreeSet<Target> {
        let mut targets = BTreeSet::new();
        self.collect_targets(&mut targets);
        targets
    }

    fn collect_targets(&self, acc: &mut BTreeSet<Target>) {
        match self {
            Stmt::Skip => {}
            Stmt::Assign(v, e) => {
                acc.insert(Target::Variable(v.clone()));
                e.collect_targets(acc);
            }
            Stmt::ArrayAssign(a, idx, e) => {
                acc.insert(Target::Array(a.clone()));
                idx.collect_targets(acc);
                e.collect_targets(acc);
            }
            Stmt::Seq(s1, s2) => {
                s1.collect_targets(acc);
                s2.collect_targets(acc);
            }
            Stmt::If(guards) | Stmt::Do(guards) => {
                for Guard(b, s) in guards {
                    b.collect_targets(acc);
                    s.collect_targets(acc);
                }
            }
        }
    }
}

impl fmt::Display for AOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AOp::Plus => write!(f, "+"),
            AOp::Minus => write!(f, "-"),
            AOp::Times => write!(f, "*"),
            AOp::Divide => write!(f, "/"),
            AOp::Pow => write!(f, "^"),
        }
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelOp::Eq => write!(f, "="),
            RelOp::Ne => write!(f, "!="),
            RelOp::Gt => write!(f, ">"),
            RelOp::Ge => write!(f, ">="),
            RelOp::Lt => write!(f, "<"),
            RelOp::Le => write!(f, "<="),
        }
    }
}

impl fmt::Display for LogicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicOp::And => write!(f, "&&"),
            LogicOp::Land => write!(f, "&"),
            LogicOp::Or => write!(f, "||"),
            LogicOp::Lor => write!(f, "|"),
        }
    }
}

impl fmt::Display for AExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AExpr::Number(n) => write!(f, "{}", n),
            AExpr::Variable(v) => write!(f, "{}", v),
            AExpr::Array(a, idx) => write!(f, "{}[{}]", a, idx),
            AExpr::Binary(l, op, r) => {
                write_operand(f, l)?;
                write!(f, " {} ", op)?;
                write_operand(f, r)
            }
            AExpr::Minus(e) => {
                write!(f, "-")?;
                write_operand(f, e)
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, e: &AExpr) -> fmt::Result {
    match e {
        AExpr::Binary(..) => write!(f, "({})", e),
        // Keep `- -1` from printing as `--1`.
        AExpr::Number(n) if *n < 0 => write!(f, "({})", n),
        _ => write!(f, "{}", e),
    }
}

impl fmt::Display for BExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BExpr::Bool(b) => write!(f, "{}", b),
            BExpr::Rel(l, op, r) => write!(f, "{} {} {}", l, op, r),
            BExpr::Logic(l, op, r) => {
                write_condition(f, l)?;
                write!(f, " {} ", op)?;
                write_condition(f, r)
            }
            BExpr::Not(b) => {
                write!(f, "!")?;
                match b.as_ref() {
                    BExpr::Bool(_) => write!(f, "{}", b),
                    _ => write!(f, "({})", b),
                }
            }
        }
    }
}

fn write_condition(f: &mut fmt::Formatter<'_>, b: &BExpr) -> fmt::Result {
    match b {
        BExpr::Logic(..) => write!(f, "({})", b),
        _ => write!(f, "{}", b),
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.0, self.1)
    }
}

fn write_guards(f: &mut fmt::Formatter<'_>, guards: &[Guard]) -> fmt::Result {
    for (i, guard) in guards.iter().enumerate() {
        if i > 0 {
            write!(f, " [] ")?;
        }
        write!(f, "{}", guard)?;
    }
    Ok(())
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Skip => write!(f, "skip"),
            Stmt::Assign(v, e) => write!(f, "{} := {}", v, e),
            Stmt::ArrayAssign(a, idx, e) => write!(f, "{}[{}] := {}", a, idx, e),
            Stmt::Seq(s1, s2) => write!(f, "{} ; {}", s1, s2),
            Stmt::If(guards) => {
                write!(f, "if ")?;
                write_guards(f, guards)?;
                write!(f, " fi")
            }
            Stmt::Do(guards) => {
                write!(f, "do ")?;
                write_guards(f, guards)?;
                write!(f, " od")
            }
        }
    }
}
