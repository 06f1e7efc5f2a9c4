//! Concrete semantics of expressions and actions.
//!
//! Arithmetic is on `i64` and every operation is checked: instead of wrapping
//! or panicking, a faulty operation yields a [`RuntimeError`]. The interpreter
//! treats an edge whose action faults as disabled.

use crate::ast::{AExpr, AOp, BExpr, LogicOp, RelOp};
use crate::error::RuntimeError;
use crate::memory::InterpreterMemory;
use crate::pg::Action;

pub trait Eval {
    type Output;

    fn eval(&self, mem: &InterpreterMemory) -> Result<Self::Output, RuntimeError>;
}

impl InterpreterMemory {
    pub fn eval<E: Eval>(&self, value: &E) -> Result<E::Output, RuntimeError> {
        value.eval(self)
    }
}

impl AOp {
    pub fn apply(self, lhs: i64, rhs: i64) -> Result<i64, RuntimeError> {
        let res = match self {
            AOp::Plus => lhs.checked_add(rhs),
            AOp::Minus => lhs.checked_sub(rhs),
            AOp::Times => lhs.checked_mul(rhs),
            AOp::Divide => {
                if rhs == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                lhs.checked_div(rhs)
            }
            AOp::Pow => return pow(lhs, rhs),
        };
        res.ok_or(RuntimeError::ArithmeticOverflow)
    }
}

fn pow(base: i64, exp: i64) -> Result<i64, RuntimeError> {
    if exp < 0 {
        return Err(RuntimeError::NegativeExponent);
    }
    match u32::try_from(exp) {
        Ok(exp) => base.checked_pow(exp).ok_or(RuntimeError::ArithmeticOverflow),
        // Huge exponents only fit for these bases.
        Err(_) => match base {
            0 | 1 => Ok(base),
            -1 => Ok(if exp % 2 == 0 { 1 } else { -1 }),
            _ => Err(RuntimeError::ArithmeticOverflow),
        },
    }
}

impl RelOp {
    pub fn holds<T: Ord>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            RelOp::Eq => lhs == rhs,
            RelOp::Ne => lhs != rhs,
            RelOp::Gt => lhs > rhs,
            RelOp::Ge => lhs >= rhs,
            RelOp::Lt => lhs < rhs,
            RelOp::Le => lhs <= rhs,
        }
    }
}

impl LogicOp {
    /// Whether the right operand is skipped when the left one already decides the result.
    pub fn is_short_circuit(self) -> bool {
        matches!(self, LogicOp::And | LogicOp::Or)
    }

    pub fn is_conjunction(self) -> bool {
        matches!(self, LogicOp::And | LogicOp::Land)
    }
}

fn index(arr: &[i64], name: &str, idx: i64) -> Result<usize, RuntimeError> {
    usize::try_from(idx)
        .ok()
        .filter(|&i| i < arr.len())
        .ok_or_else(|| RuntimeError::IndexOutOfBounds {
            array: name.to_string(),
            index: idx,
        })
}

impl Eval for AExpr {
    type Output = i64;

    fn eval(&self, mem: &InterpreterMemory) -> Result<i64, RuntimeError> {
        match self {
            AExpr::Number(n) => Ok(*n),
            AExpr::Variable(v) => mem.get_var(v).copied().ok_or_else(|| RuntimeError::VariableNotFound {
                name: v.name().to_string(),
            }),
            AExpr::Array(a, idx) => {
                let arr = mem.get_arr(a).ok_or_else(|| RuntimeError::ArrayNotFound {
                    name: a.name().to_string(),
                })?;
                let i = index(arr, a.name(), idx.eval(mem)?)?;
                Ok(arr[i])
            }
            AExpr::Binary(l, op, r) => op.apply(l.eval(mem)?, r.eval(mem)?),
            AExpr::Minus(e) => e.eval(mem)?.checked_neg().ok_or(RuntimeError::ArithmeticOverflow),
        }
    }
}

impl Eval for BExpr {
    type Output = bool;

    fn eval(&self, mem: &InterpreterMemory) -> Result<bool, RuntimeError> {
        match self {
            BExpr::Bool(b) => Ok(*b),
            BExpr::Rel(l, op, r) => Ok(op.holds(&l.eval(mem)?, &r.eval(mem)?)),
            BExpr::Logic(l, op, r) => {
                let lhs = l.eval(mem)?;
                // `false && _` and `true || _` never look at the right operand.
                if op.is_short_circuit() && lhs != op.is_conjunction() {
                    return Ok(lhs);
                }
                let rhs = r.eval(mem)?;
                Ok(if op.is_conjunction() { lhs && rhs } else { lhs || rhs })
            }
            BExpr::Not(b) => Ok(!b.eval(mem)?),
        }
    }
}

impl Action {
    /// Executes the action in `mem`.
    ///
    /// Returns `Ok(None)` for a [`BoolCheck`][Action::BoolCheck] whose
    /// condition is false, and the updated memory otherwise.
    pub fn execute(&self, mem: &InterpreterMemory) -> Result<Option<InterpreterMemory>, RuntimeError> {
        match self {
            Action::Skip => Ok(Some(mem.clone())),
            Action::BoolCheck(b) => Ok(if b.eval(mem)? { Some(mem.clone()) } else { None }),
            Action::Assign(v, e) => {
                let value = e.eval(mem)?;
                if mem.get_var(v).is_none() {
                    return Err(RuntimeError::VariableNotFound {
                        name: v.name().to_string(),
                    });
                }
                let mut next = mem.clone();
                next.variables.insert(v.clone(), value);
                Ok(Some(next))
            }
            Action::ArrayAssign(a, idx, e) => {
                let arr = mem.get_arr(a).ok_or_else(|| RuntimeError::ArrayNotFound {
                    name: a.name().to_string(),
                })?;
                let i = index(arr, a.name(), idx.eval(mem)?)?;
                let value = e.eval(mem)?;
                let mut next = mem.clone();
                if let Some(arr) = next.arrays.get_mut(a) {
                    arr[i] = value;
                }
                Ok(Some(next))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::types::{Array, Variable};

    fn mem() -> InterpreterMemory {
        InterpreterMemory::new()
            .with_var("x", 7)
            .with_var("y", -2)
            .with_array("A", vec![10, 20, 30])
    }

    #[test]
    fn test_arithmetic() {
        let m = mem();
        let e = AExpr::add(AExpr::mul(AExpr::var("x"), AExpr::var("y")), AExpr::index("A", AExpr::num(2)));
        assert_eq!(m.eval(&e), Ok(16));
        assert_eq!(m.eval(&AExpr::div(AExpr::var("x"), AExpr::var("y"))), Ok(-3));
        assert_eq!(m.eval(&AExpr::pow(AExpr::var("y"), AExpr::num(3))), Ok(-8));
        assert_eq!(m.eval(&AExpr::pow(AExpr::num(0), AExpr::num(0))), Ok(1));
        assert_eq!(m.eval(&AExpr::neg(AExpr::var("y"))), Ok(2));
    }

    #[test]
    fn test_faults() {
        let m = mem();
        assert_eq!(
            m.eval(&AExpr::div(AExpr::var("x"), AExpr::num(0))),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            m.eval(&AExpr::pow(AExpr::var("x"), AExpr::var("y"))),
            Err(RuntimeError::NegativeExponent)
        );
        assert_eq!(
            m.eval(&AExpr::mul(AExpr::num(i64::MAX), AExpr::num(2))),
            Err(RuntimeError::ArithmeticOverflow)
        );
        assert_eq!(
            m.eval(&AExpr::div(AExpr::num(i64::MIN), AExpr::num(-1))),
            Err(RuntimeError::ArithmeticOverflow)
        );
        assert_eq!(
            m.eval(&AExpr::index("A", AExpr::num(3))),
            Err(RuntimeError::IndexOutOfBounds {
                array: "A".to_string(),
                index: 3
            })
        );
        assert_eq!(
            m.eval(&AExpr::var("z")),
            Err(RuntimeError::VariableNotFound { name: "z".to_string() })
        );
    }

    #[test]
    fn test_huge_exponent() {
        let m = mem();
        let huge = AExpr::num(i64::MAX);
        assert_eq!(m.eval(&AExpr::pow(AExpr::num(1), huge.clone())), Ok(1));
        assert_eq!(m.eval(&AExpr::pow(AExpr::num(-1), huge.clone())), Ok(-1));
        assert_eq!(
            m.eval(&AExpr::pow(AExpr::num(2), huge)),
            Err(RuntimeError::ArithmeticOverflow)
        );
    }

    #[test]
    fn test_short_circuit() {
        let m = mem();
        let fault = BExpr::rel(AExpr::div(AExpr::num(1), AExpr::num(0)), RelOp::Eq, AExpr::num(0));
        let f = BExpr::Bool(false);
        let t = BExpr::Bool(true);
        assert_eq!(m.eval(&BExpr::and(f.clone(), fault.clone())), Ok(false));
        assert_eq!(m.eval(&BExpr::or(t.clone(), fault.clone())), Ok(true));
        assert_eq!(m.eval(&BExpr::land(f, fault.clone())), Err(RuntimeError::DivisionByZero));
        assert_eq!(m.eval(&BExpr::lor(t, fault)), Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn test_execute() {
        let m = mem();

        let next = Action::Assign(Variable::new("x"), AExpr::num(1)).execute(&m).unwrap().unwrap();
        assert_eq!(next.get_var(&Variable::new("x")), Some(&1));

        let next = Action::ArrayAssign(Array::new("A"), AExpr::num(1), AExpr::var("x"))
            .execute(&m)
            .unwrap()
            .unwrap();
        assert_eq!(next.get_arr(&Array::new("A")), Some(&vec![10, 7, 30]));

        let guard = BExpr::rel(AExpr::var("x"), RelOp::Lt, AExpr::num(0));
        assert_eq!(Action::BoolCheck(guard).execute(&m), Ok(None));
        assert_eq!(Action::Skip.execute(&m), Ok(Some(m.clone())));

        let oob = Action::ArrayAssign(Array::new("A"), AExpr::num(-1), AExpr::num(0));
        assert!(matches!(oob.execute(&m), Err(RuntimeError::IndexOutOfBounds { index: -1, .. })));
    }
}
