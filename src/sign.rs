//! Sign abstract domain.
//!
//! An integer is abstracted by its [`Sign`]; an array by the [`SignSet`] of
//! signs its elements may have. Abstract evaluation of an expression yields
//! the set of signs its concrete value may have, and abstract evaluation of a
//! condition yields the set of truth values it may take ([`Truth`]).
//!
//! Operand combinations that always fault concretely (division by a zero
//! divisor, a negative exponent, indexing with a negative index) contribute
//! nothing, matching the interpreter, which disables faulting edges.
//! Overflow is not tracked: results keep their mathematical sign.
//!
//! # Lattice
//!
//! ```text
//!        {-, 0, +}
//!     /      |      \
//!  {-, 0}  {-, +}  {0, +}
//!    |   \ /    \ /   |
//!   {-}  {0}     {+}
//!      \  |     /
//!         {}
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Neg;

use serde::{Deserialize, Serialize};

use crate::ast::{AExpr, AOp, BExpr};
use crate::memory::Memory;
use crate::pg::Action;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Sign {
    Negative,
    Zero,
    Positive,
}

impl Sign {
    pub const ALL: [Sign; 3] = [Sign::Negative, Sign::Zero, Sign::Positive];

    pub fn of(value: i64) -> Self {
        match value.cmp(&0) {
            std::cmp::Ordering::Less => Sign::Negative,
            std::cmp::Ordering::Equal => Sign::Zero,
            std::cmp::Ordering::Greater => Sign::Positive,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Sign::Negative => 0b001,
            Sign::Zero => 0b010,
            Sign::Positive => 0b100,
        }
    }
}

impl Neg for Sign {
    type Output = Sign;

    fn neg(self) -> Sign {
        match self {
            Sign::Negative => Sign::Positive,
            Sign::Zero => Sign::Zero,
            Sign::Positive => Sign::Negative,
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sign::Negative => write!(f, "-"),
            Sign::Zero => write!(f, "0"),
            Sign::Positive => write!(f, "+"),
        }
    }
}

/// Set of signs, stored as a 3-bit mask.
///
/// Serialized as the list of its members. Deserialization rejects the empty
/// set, since an array always has at least one possible element sign.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Vec<Sign>", try_from = "Vec<Sign>")]
pub struct SignSet(u8);

impl SignSet {
    pub const EMPTY: SignSet = SignSet(0);
    pub const ALL: SignSet = SignSet(0b111);

    pub fn singleton(sign: Sign) -> Self {
        SignSet(sign.bit())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, sign: Sign) -> bool {
        self.0 & sign.bit() != 0
    }

    pub fn insert(&mut self, sign: Sign) {
        self.0 |= sign.bit();
    }

    pub fn with(self, sign: Sign) -> Self {
        SignSet(self.0 | sign.bit())
    }

    pub fn without(self, sign: Sign) -> Self {
        SignSet(self.0 & !sign.bit())
    }

    pub fn union(self, other: SignSet) -> Self {
        SignSet(self.0 | other.0)
    }

    pub fn intersection(self, other: SignSet) -> Self {
        SignSet(self.0 & other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Sign> {
        Sign::ALL.into_iter().filter(move |&s| self.contains(s))
    }

    pub fn map(self, f: impl Fn(Sign) -> Sign) -> Self {
        self.iter().map(f).collect()
    }
}

impl FromIterator<Sign> for SignSet {
    fn from_iter<I: IntoIterator<Item = Sign>>(iter: I) -> Self {
        let mut set = SignSet::EMPTY;
        for s in iter {
            set.insert(s);
        }
        set
    }
}

impl From<Sign> for SignSet {
    fn from(sign: Sign) -> Self {
        SignSet::singleton(sign)
    }
}

impl From<SignSet> for Vec<Sign> {
    fn from(set: SignSet) -> Self {
        set.iter().collect()
    }
}

impl TryFrom<Vec<Sign>> for SignSet {
    type Error = String;

    fn try_from(signs: Vec<Sign>) -> Result<Self, Self::Error> {
        let set: SignSet = signs.into_iter().collect();
        if set.is_empty() {
            return Err("a sign set must contain at least one sign".to_string());
        }
        Ok(set)
    }
}

impl fmt::Debug for SignSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for SignSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, s) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "}}")
    }
}

/// Sign assignment: one sign per variable, one sign set per array.
pub type SignMemory = Memory<Sign, SignSet>;

impl fmt::Display for SignMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vars = self.variables.iter().map(|(v, s)| format!("{} = {}", v, s));
        let arrs = self.arrays.iter().map(|(a, s)| format!("{} = {}", a, s));
        write!(f, "[{}]", vars.chain(arrs).collect::<Vec<_>>().join(", "))
    }
}

/// Possible truth values of a condition.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Truth {
    pub can_be_true: bool,
    pub can_be_false: bool,
}

impl Truth {
    pub const NONE: Truth = Truth {
        can_be_true: false,
        can_be_false: false,
    };

    pub fn of(value: bool) -> Self {
        Truth {
            can_be_true: value,
            can_be_false: !value,
        }
    }

    pub fn contains(self, value: bool) -> bool {
        if value {
            self.can_be_true
        } else {
            self.can_be_false
        }
    }

    pub fn insert(&mut self, value: bool) {
        if value {
            self.can_be_true = true;
        } else {
            self.can_be_false = true;
        }
    }

    pub fn iter(self) -> impl Iterator<Item = bool> {
        [true, false].into_iter().filter(move |&b| self.contains(b))
    }
}

impl AOp {
    /// Signs of `lhs op rhs` for operands of the given signs.
    pub fn signs(self, lhs: Sign, rhs: Sign) -> SignSet {
        use Sign::*;
        match self {
            AOp::Plus => match (lhs, rhs) {
                (Zero, s) | (s, Zero) => s.into(),
                (Positive, Positive) => Positive.into(),
                (Negative, Negative) => Negative.into(),
                _ => SignSet::ALL,
            },
            AOp::Minus => AOp::Plus.signs(lhs, -rhs),
            AOp::Times => match (lhs, rhs) {
                (Zero, _) | (_, Zero) => Zero.into(),
                _ if lhs == rhs => Positive.into(),
                _ => Negative.into(),
            },
            AOp::Divide => match (lhs, rhs) {
                (_, Zero) => SignSet::EMPTY,
                (Zero, _) => Zero.into(),
                // Truncation sends small quotients to zero.
                _ if lhs == rhs => SignSet::singleton(Zero).with(Positive),
                _ => SignSet::singleton(Zero).with(Negative),
            },
            AOp::Pow => match (lhs, rhs) {
                (_, Negative) => SignSet::EMPTY,
                (_, Zero) => Positive.into(),
                (Negative, Positive) => SignSet::singleton(Negative).with(Positive),
                (s, Positive) => s.into(),
            },
        }
    }
}

impl AExpr {
    /// Signs this expression may evaluate to in `mem`.
    ///
    /// The empty set means every evaluation faults.
    pub fn signs(&self, mem: &SignMemory) -> SignSet {
        match self {
            AExpr::Number(n) => Sign::of(*n).into(),
            AExpr::Variable(v) => mem.get_var(v).map_or(SignSet::ALL, |&s| s.into()),
            AExpr::Array(a, idx) => {
                if idx.signs(mem).without(Sign::Negative).is_empty() {
                    SignSet::EMPTY
                } else {
                    mem.get_arr(a).copied().unwrap_or(SignSet::ALL)
                }
            }
            AExpr::Binary(l, op, r) => {
                let (ls, rs) = (l.signs(mem), r.signs(mem));
                let mut res = SignSet::EMPTY;
                for s1 in ls.iter() {
                    for s2 in rs.iter() {
                        res = res.union(op.signs(s1, s2));
                    }
                }
                res
            }
            AExpr::Minus(e) => e.signs(mem).map(Neg::neg),
        }
    }
}

impl BExpr {
    /// Truth values this condition may take in `mem`.
    pub fn truth(&self, mem: &SignMemory) -> Truth {
        match self {
            BExpr::Bool(b) => Truth::of(*b),
            BExpr::Rel(l, op, r) => {
                let (ls, rs) = (l.signs(mem), r.signs(mem));
                let mut res = Truth::NONE;
                for s1 in ls.iter() {
                    for s2 in rs.iter() {
                        for ord in orderings(s1, s2) {
                            res.insert(op.holds(&ord, &std::cmp::Ordering::Equal));
                        }
                    }
                }
                res
            }
            BExpr::Logic(l, op, r) => {
                let lt = l.truth(mem);
                let mut rt = None;
                let mut res = Truth::NONE;
                for lv in lt.iter() {
                    if op.is_short_circuit() && lv != op.is_conjunction() {
                        res.insert(lv);
                        continue;
                    }
                    for rv in rt.get_or_insert_with(|| r.truth(mem)).iter() {
                        res.insert(if op.is_conjunction() { lv && rv } else { lv || rv });
                    }
                }
                res
            }
            BExpr::Not(b) => {
                let t = b.truth(mem);
                Truth {
                    can_be_true: t.can_be_false,
                    can_be_false: t.can_be_true,
                }
            }
        }
    }
}

/// Possible outcomes of comparing a value of sign `lhs` with one of sign `rhs`.
fn orderings(lhs: Sign, rhs: Sign) -> Vec<std::cmp::Ordering> {
    use std::cmp::Ordering::*;
    match lhs.cmp(&rhs) {
        Equal if lhs != Sign::Zero => vec![Less, Equal, Greater],
        ord => vec![ord],
    }
}

impl Action {
    /// Sign assignments that may hold after taking this edge from `mem`.
    pub fn sign_transfer(&self, mem: &SignMemory) -> BTreeSet<SignMemory> {
        let mut res = BTreeSet::new();
        match self {
            Action::Skip => {
                res.insert(mem.clone());
            }
            Action::BoolCheck(b) => {
                if b.truth(mem).can_be_true {
                    res.insert(mem.clone());
                }
            }
            Action::Assign(v, e) => {
                for s in e.signs(mem).iter() {
                    let mut next = mem.clone();
                    next.variables.insert(v.clone(), s);
                    res.insert(next);
                }
            }
            Action::ArrayAssign(a, idx, e) => {
                if idx.signs(mem).without(Sign::Negative).is_empty() {
                    return res;
                }
                let old = mem.get_arr(a).copied().unwrap_or(SignSet::ALL);
                for v in e.signs(mem).iter() {
                    // The written element may or may not have been the only one with sign `s`.
                    let mut candidates = vec![old.with(v)];
                    candidates.extend(old.iter().map(|s| old.without(s).with(v)));
                    for set in candidates {
                        let mut next = mem.clone();
                        next.arrays.insert(a.clone(), set);
                        res.insert(next);
                    }
                }
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::ast::RelOp;
    use crate::types::{Array, Variable};

    use super::Sign::*;

    fn set(signs: &[Sign]) -> SignSet {
        signs.iter().copied().collect()
    }

    #[test]
    fn test_sign_of() {
        assert_eq!(Sign::of(-5), Negative);
        assert_eq!(Sign::of(0), Zero);
        assert_eq!(Sign::of(3), Positive);
        assert_eq!(-Negative, Positive);
    }

    #[test]
    fn test_sign_set() {
        let s = set(&[Positive, Negative]);
        assert_eq!(s.len(), 2);
        assert!(s.contains(Negative));
        assert!(!s.contains(Zero));
        assert_eq!(s.to_string(), "{-, +}");
        assert_eq!(s.without(Negative), Positive.into());
        assert_eq!(s.union(Zero.into()), SignSet::ALL);
        assert!(SignSet::EMPTY.is_empty());
    }

    #[test]
    fn test_sign_set_serde() {
        let json = serde_json::to_string(&set(&[Zero, Positive])).unwrap();
        assert_eq!(json, r#"["Zero","Positive"]"#);
        let parsed: SignSet = serde_json::from_str(r#"["Negative"]"#).unwrap();
        assert_eq!(parsed, Negative.into());
        assert!(serde_json::from_str::<SignSet>("[]").is_err());
    }

    #[test]
    fn test_arithmetic_tables() {
        assert_eq!(AOp::Plus.signs(Positive, Positive), Positive.into());
        assert_eq!(AOp::Plus.signs(Positive, Negative), SignSet::ALL);
        assert_eq!(AOp::Minus.signs(Positive, Negative), Positive.into());
        assert_eq!(AOp::Times.signs(Negative, Negative), Positive.into());
        assert_eq!(AOp::Divide.signs(Positive, Negative), set(&[Negative, Zero]));
        assert_eq!(AOp::Divide.signs(Positive, Zero), SignSet::EMPTY);
        assert_eq!(AOp::Pow.signs(Negative, Positive), set(&[Negative, Positive]));
        assert_eq!(AOp::Pow.signs(Zero, Zero), Positive.into());
        assert_eq!(AOp::Pow.signs(Positive, Negative), SignSet::EMPTY);
    }

    #[test]
    fn test_expression_signs() {
        let mem = SignMemory::new()
            .with_var("x", Positive)
            .with_var("y", Negative)
            .with_array("A", set(&[Zero, Positive]));
        assert_eq!(AExpr::mul(AExpr::var("x"), AExpr::var("y")).signs(&mem), Negative.into());
        assert_eq!(AExpr::neg(AExpr::var("y")).signs(&mem), Positive.into());
        assert_eq!(AExpr::index("A", AExpr::var("x")).signs(&mem), set(&[Zero, Positive]));
        assert_eq!(AExpr::index("A", AExpr::var("y")).signs(&mem), SignSet::EMPTY);
    }

    #[test]
    fn test_condition_truth() {
        let mem = SignMemory::new().with_var("x", Positive).with_var("y", Positive);
        let gt0 = BExpr::rel(AExpr::var("x"), RelOp::Gt, AExpr::num(0));
        assert_eq!(gt0.truth(&mem), Truth::of(true));
        let le0 = BExpr::rel(AExpr::var("x"), RelOp::Le, AExpr::num(0));
        assert_eq!(le0.truth(&mem), Truth::of(false));
        let xy = BExpr::rel(AExpr::var("x"), RelOp::Lt, AExpr::var("y"));
        assert_eq!(
            xy.truth(&mem),
            Truth {
                can_be_true: true,
                can_be_false: true
            }
        );
        assert_eq!(BExpr::land(gt0.clone(), BExpr::not(gt0.clone())).truth(&mem), Truth::of(false));
    }

    #[test]
    fn test_faulting_right_operand() {
        let mem = SignMemory::new().with_var("x", Zero);
        let fault = BExpr::rel(AExpr::div(AExpr::num(1), AExpr::var("x")), RelOp::Eq, AExpr::num(0));
        assert_eq!(fault.truth(&mem), Truth::NONE);
        assert_eq!(BExpr::and(BExpr::Bool(false), fault.clone()).truth(&mem), Truth::of(false));
        assert_eq!(BExpr::land(BExpr::Bool(false), fault).truth(&mem), Truth::NONE);
    }

    #[test]
    fn test_assign_transfer() {
        let mem = SignMemory::new().with_var("x", Positive).with_var("y", Negative);
        let action = Action::Assign(Variable::new("x"), AExpr::add(AExpr::var("x"), AExpr::var("y")));
        let out = action.sign_transfer(&mem);
        assert_eq!(out.len(), 3);
        let xs: SignSet = out.iter().map(|m| m.variables[&Variable::new("x")]).collect();
        assert_eq!(xs, SignSet::ALL);
    }

    #[test]
    fn test_array_assign_transfer() {
        let mem = SignMemory::new().with_var("i", Zero).with_array("A", set(&[Negative, Zero]));
        let action = Action::ArrayAssign(Array::new("A"), AExpr::var("i"), AExpr::num(1));
        let out: BTreeSet<SignSet> = action.sign_transfer(&mem).iter().map(|m| m.arrays[&Array::new("A")]).collect();
        let expected: BTreeSet<SignSet> = [
            set(&[Negative, Zero, Positive]),
            set(&[Zero, Positive]),
            set(&[Negative, Positive]),
        ]
        .into_iter()
        .collect();
        assert_eq!(out, expected);

        let negative = SignMemory::new().with_var("i", Negative).with_array("A", Zero.into());
        assert!(action.sign_transfer(&negative).is_empty());
    }
}
