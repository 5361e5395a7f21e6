//! Symbolic terms and predicates over nondeterministic inputs.
//!
//! Terms are integer expressions built from constants and named symbols.
//! Arithmetic is evaluated over `i128` with overflow checks; a term whose
//! evaluation overflows has no value under that assignment.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An integer-valued symbolic expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Const(i128),
    Symbol(String),
    Add(Box<Term>, Box<Term>),
    Sub(Box<Term>, Box<Term>),
    Mul(Box<Term>, Box<Term>),
    Neg(Box<Term>),
}

impl Term {
    pub fn symbol(name: impl Into<String>) -> Self {
        Term::Symbol(name.into())
    }

    /// Whether the term mentions any symbol.
    pub fn is_symbolic(&self) -> bool {
        match self {
            Term::Const(_) => false,
            Term::Symbol(_) => true,
            Term::Add(a, b) | Term::Sub(a, b) | Term::Mul(a, b) => {
                a.is_symbolic() || b.is_symbolic()
            }
            Term::Neg(a) => a.is_symbolic(),
        }
    }

    /// Collect every symbol name mentioned by this term.
    pub fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Term::Const(_) => {}
            Term::Symbol(name) => {
                out.insert(name.clone());
            }
            Term::Add(a, b) | Term::Sub(a, b) | Term::Mul(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
            Term::Neg(a) => a.collect_symbols(out),
        }
    }

    /// Collect every constant literal mentioned by this term.
    pub fn collect_constants(&self, out: &mut BTreeSet<i128>) {
        match self {
            Term::Const(c) => {
                out.insert(*c);
            }
            Term::Symbol(_) => {}
            Term::Add(a, b) | Term::Sub(a, b) | Term::Mul(a, b) => {
                a.collect_constants(out);
                b.collect_constants(out);
            }
            Term::Neg(a) => a.collect_constants(out),
        }
    }

    /// Evaluate under an assignment. Returns `None` when a symbol is
    /// unassigned or the arithmetic overflows.
    pub fn eval(&self, assignment: &BTreeMap<String, i128>) -> Option<i128> {
        match self {
            Term::Const(c) => Some(*c),
            Term::Symbol(name) => assignment.get(name).copied(),
            Term::Add(a, b) => a.eval(assignment)?.checked_add(b.eval(assignment)?),
            Term::Sub(a, b) => a.eval(assignment)?.checked_sub(b.eval(assignment)?),
            Term::Mul(a, b) => a.eval(assignment)?.checked_mul(b.eval(assignment)?),
            Term::Neg(a) => a.eval(assignment)?.checked_neg(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Const(c) => write!(f, "{}", c),
            Term::Symbol(name) => write!(f, "{}", name),
            Term::Add(a, b) => write!(f, "({} + {})", a, b),
            Term::Sub(a, b) => write!(f, "({} - {})", a, b),
            Term::Mul(a, b) => write!(f, "({} * {})", a, b),
            Term::Neg(a) => write!(f, "-{}", a),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// The operator whose result is the logical negation of this one.
    pub fn negated(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }

    pub fn apply(self, lhs: i128, rhs: i128) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// A boolean constraint over symbolic terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    True,
    False,
    Cmp { op: CmpOp, lhs: Term, rhs: Term },
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn cmp(op: CmpOp, lhs: Term, rhs: Term) -> Self {
        Predicate::Cmp { op, lhs, rhs }
    }

    /// Logical negation, pushed through comparisons and constants.
    pub fn negate(&self) -> Predicate {
        match self {
            Predicate::True => Predicate::False,
            Predicate::False => Predicate::True,
            Predicate::Cmp { op, lhs, rhs } => Predicate::Cmp {
                op: op.negated(),
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            },
            Predicate::Not(inner) => (**inner).clone(),
            other => Predicate::Not(Box::new(other.clone())),
        }
    }

    pub fn is_symbolic(&self) -> bool {
        match self {
            Predicate::True | Predicate::False => false,
            Predicate::Cmp { lhs, rhs, .. } => lhs.is_symbolic() || rhs.is_symbolic(),
            Predicate::Not(p) => p.is_symbolic(),
            Predicate::And(a, b) | Predicate::Or(a, b) => a.is_symbolic() || b.is_symbolic(),
        }
    }

    pub fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Predicate::True | Predicate::False => {}
            Predicate::Cmp { lhs, rhs, .. } => {
                lhs.collect_symbols(out);
                rhs.collect_symbols(out);
            }
            Predicate::Not(p) => p.collect_symbols(out),
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    pub fn collect_constants(&self, out: &mut BTreeSet<i128>) {
        match self {
            Predicate::True | Predicate::False => {}
            Predicate::Cmp { lhs, rhs, .. } => {
                lhs.collect_constants(out);
                rhs.collect_constants(out);
            }
            Predicate::Not(p) => p.collect_constants(out),
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_constants(out);
                b.collect_constants(out);
            }
        }
    }

    /// Evaluate under an assignment. `None` if any needed term has no value.
    pub fn eval(&self, assignment: &BTreeMap<String, i128>) -> Option<bool> {
        match self {
            Predicate::True => Some(true),
            Predicate::False => Some(false),
            Predicate::Cmp { op, lhs, rhs } => {
                Some(op.apply(lhs.eval(assignment)?, rhs.eval(assignment)?))
            }
            Predicate::Not(p) => p.eval(assignment).map(|b| !b),
            Predicate::And(a, b) => Some(a.eval(assignment)? && b.eval(assignment)?),
            Predicate::Or(a, b) => Some(a.eval(assignment)? || b.eval(assignment)?),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::True => f.write_str("true"),
            Predicate::False => f.write_str("false"),
            Predicate::Cmp { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Predicate::Not(p) => write!(f, "!({})", p),
            Predicate::And(a, b) => write!(f, "({} && {})", a, b),
            Predicate::Or(a, b) => write!(f, "({} || {})", a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Term {
        Term::symbol("x")
    }

    #[test]
    fn test_negate_comparison_flips_operator() {
        let p = Predicate::cmp(CmpOp::Gt, x(), Term::Const(0));
        assert_eq!(p.negate(), Predicate::cmp(CmpOp::Le, x(), Term::Const(0)));
        assert_eq!(p.negate().negate(), p);
    }

    #[test]
    fn test_negate_not_unwraps() {
        let p = Predicate::And(
            Box::new(Predicate::True),
            Box::new(Predicate::cmp(CmpOp::Eq, x(), Term::Const(1))),
        );
        let negated = p.negate();
        assert!(matches!(negated, Predicate::Not(_)));
        assert_eq!(negated.negate(), p);
    }

    #[test]
    fn test_eval_unassigned_symbol() {
        let p = Predicate::cmp(CmpOp::Eq, x(), Term::Const(1));
        assert_eq!(p.eval(&BTreeMap::new()), None);
    }

    #[test]
    fn test_eval_overflow_has_no_value() {
        let t = Term::Mul(Box::new(x()), Box::new(Term::Const(i128::MAX)));
        let mut assignment = BTreeMap::new();
        assignment.insert("x".to_string(), 2);
        assert_eq!(t.eval(&assignment), None);
    }

    #[test]
    fn test_collect_symbols_and_constants() {
        let p = Predicate::cmp(
            CmpOp::Lt,
            Term::Add(Box::new(x()), Box::new(Term::symbol("y"))),
            Term::Const(7),
        );
        let mut symbols = BTreeSet::new();
        p.collect_symbols(&mut symbols);
        assert_eq!(symbols.len(), 2);

        let mut constants = BTreeSet::new();
        p.collect_constants(&mut constants);
        assert!(constants.contains(&7));
        assert!(p.is_symbolic());
    }

    #[test]
    fn test_display() {
        let p = Predicate::cmp(CmpOp::Ge, Term::Neg(Box::new(x())), Term::Const(3));
        assert_eq!(p.to_string(), "-x >= 3");
    }
}
