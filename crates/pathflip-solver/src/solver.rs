//! Solver interface and the candidate-search reference solver.
//!
//! [`CandidateSolver`] is not a decision procedure. It searches a finite
//! set of promising values per symbol with backtracking:
//!
//! - the hint for the symbol (the value the current path used)
//! - `0`, `1`, `-1` and the bounds of the symbol's sort
//! - every constant in the constraints, and its neighbours `c - 1`, `c + 1`
//! - roots of constraints that are linear in the last unassigned symbol
//! - every value of the sort, when the sort has at most 256 values
//!
//! Running out of candidates only proves UNSAT when every symbol's whole
//! domain was enumerated. Otherwise it is [`SolverError::Incomplete`].
//! Running out of the evaluation budget is [`SolverError::Budget`].

use crate::constraint::{ConstraintSet, SolverModel};
use crate::sort::IntType;
use crate::term::Predicate;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors from a solver backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("solver budget of {0} evaluations exhausted")]
    Budget(u64),

    /// The backend gave up without a verdict.
    #[error("solver gave no verdict: {0}")]
    Incomplete(String),

    #[error("solver backend failure: {0}")]
    Backend(String),
}

/// Answer to a satisfiability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverVerdict {
    Unsat,
    Sat(SolverModel),
}

impl SolverVerdict {
    pub fn is_unsat(&self) -> bool {
        matches!(self, SolverVerdict::Unsat)
    }

    pub fn model(&self) -> Option<&SolverModel> {
        match self {
            SolverVerdict::Sat(model) => Some(model),
            SolverVerdict::Unsat => None,
        }
    }
}

/// A constraint solver.
///
/// `scope` names the caller for diagnostics only.
pub trait Solver {
    fn check_unsat(
        &mut self,
        constraints: &ConstraintSet,
        scope: &str,
    ) -> Result<SolverVerdict, SolverError>;
}

impl SolverError {
    /// Whether the query simply went unanswered, as opposed to the backend
    /// failing.
    pub fn is_unknown(&self) -> bool {
        matches!(self, SolverError::Budget(_) | SolverError::Incomplete(_))
    }
}

impl<T: Solver + ?Sized> Solver for Box<T> {
    fn check_unsat(
        &mut self,
        constraints: &ConstraintSet,
        scope: &str,
    ) -> Result<SolverVerdict, SolverError> {
        (**self).check_unsat(constraints, scope)
    }
}

/// Default number of predicate evaluations per query.
pub const DEFAULT_BUDGET: u64 = 200_000;

/// Sorts with at most this many values are enumerated completely.
const SMALL_DOMAIN: i128 = 256;

fn is_small(ty: IntType) -> bool {
    ty.max_value() - ty.min_value() < SMALL_DOMAIN
}

/// Backtracking search over candidate values.
#[derive(Debug, Clone)]
pub struct CandidateSolver {
    budget: u64,
    queries: u64,
}

impl CandidateSolver {
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_BUDGET)
    }

    pub fn with_budget(budget: u64) -> Self {
        Self { budget, queries: 0 }
    }

    /// Number of queries answered so far.
    pub fn queries(&self) -> u64 {
        self.queries
    }
}

impl Default for CandidateSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for CandidateSolver {
    fn check_unsat(
        &mut self,
        constraints: &ConstraintSet,
        scope: &str,
    ) -> Result<SolverVerdict, SolverError> {
        self.queries += 1;

        let symbols: Vec<String> = constraints.used_symbols().into_iter().collect();
        let mut search = Search::new(constraints, &symbols, self.budget);

        let mut assignment = BTreeMap::new();
        let found = search.assign(0, &mut assignment)?;

        debug!(
            "[{}] {} constraints over {} symbols: {} after {} evaluations",
            scope,
            constraints.len(),
            symbols.len(),
            if found { "sat" } else { "unsat" },
            search.evaluations
        );

        if !found {
            if symbols.iter().all(|name| is_small(constraints.sort_of(name))) {
                return Ok(SolverVerdict::Unsat);
            }
            return Err(SolverError::Incomplete(format!(
                "no candidate satisfies {} constraints over {} symbols",
                constraints.len(),
                symbols.len()
            )));
        }

        let model = assignment
            .into_iter()
            .map(|(name, value)| {
                let ty = constraints.sort_of(&name);
                (name, ty.encode(value))
            })
            .collect();
        Ok(SolverVerdict::Sat(model))
    }
}

struct Search<'a> {
    set: &'a ConstraintSet,
    order: &'a [String],
    /// Constraint indices that become fully assigned once `order[i]` is set.
    ready_at: Vec<Vec<usize>>,
    /// Constraint symbols, per constraint.
    constraint_symbols: Vec<BTreeSet<String>>,
    constants: BTreeSet<i128>,
    budget: u64,
    evaluations: u64,
}

impl<'a> Search<'a> {
    fn new(set: &'a ConstraintSet, order: &'a [String], budget: u64) -> Self {
        let constraint_symbols: Vec<BTreeSet<String>> = set
            .constraints
            .iter()
            .map(|c| {
                let mut s = BTreeSet::new();
                c.collect_symbols(&mut s);
                s
            })
            .collect();

        let mut ready_at = vec![Vec::new(); order.len()];
        for (ci, syms) in constraint_symbols.iter().enumerate() {
            let last = order
                .iter()
                .enumerate()
                .filter(|(_, name)| syms.contains(*name))
                .map(|(i, _)| i)
                .max();
            if let Some(i) = last {
                ready_at[i].push(ci);
            }
        }

        let mut constants = BTreeSet::new();
        for c in &set.constraints {
            c.collect_constants(&mut constants);
        }

        Self {
            set,
            order,
            ready_at,
            constraint_symbols,
            constants,
            budget,
            evaluations: 0,
        }
    }

    /// Assign `order[depth..]`. Returns whether a full model was found.
    fn assign(
        &mut self,
        depth: usize,
        assignment: &mut BTreeMap<String, i128>,
    ) -> Result<bool, SolverError> {
        if depth == self.order.len() {
            // Ground constraints (no symbols) are checked once at the leaf.
            return Ok(self.ground_constraints_hold(assignment));
        }

        let name = self.order[depth].clone();
        let ty = self.set.sort_of(&name);

        for value in self.candidates(&name, ty, depth, assignment) {
            assignment.insert(name.clone(), value);
            if self.check_ready(depth, assignment)? && self.assign(depth + 1, assignment)? {
                return Ok(true);
            }
        }
        assignment.remove(&name);
        Ok(false)
    }

    fn check_ready(
        &mut self,
        depth: usize,
        assignment: &BTreeMap<String, i128>,
    ) -> Result<bool, SolverError> {
        for &ci in &self.ready_at[depth] {
            self.evaluations += 1;
            if self.evaluations > self.budget {
                return Err(SolverError::Budget(self.budget));
            }
            if self.set.constraints[ci].eval(assignment) != Some(true) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn ground_constraints_hold(&self, assignment: &BTreeMap<String, i128>) -> bool {
        self.set
            .constraints
            .iter()
            .zip(&self.constraint_symbols)
            .filter(|(_, syms)| syms.is_empty())
            .all(|(c, _)| c.eval(assignment) == Some(true))
    }

    fn candidates(
        &self,
        name: &str,
        ty: IntType,
        depth: usize,
        assignment: &BTreeMap<String, i128>,
    ) -> Vec<i128> {
        let mut out: Vec<i128> = Vec::new();
        let push = |v: i128, out: &mut Vec<i128>| {
            if ty.contains(v) && !out.contains(&v) {
                out.push(v);
            }
        };

        if let Some(&hint) = self.set.hints.get(name) {
            push(hint, &mut out);
        }

        // Roots of constraints where this symbol is the last free one.
        for &ci in &self.ready_at[depth] {
            for root in linear_roots(&self.set.constraints[ci], name, assignment) {
                for delta in [0, -1, 1] {
                    if let Some(v) = root.checked_add(delta) {
                        push(v, &mut out);
                    }
                }
            }
        }

        for v in [0, 1, -1] {
            push(v, &mut out);
        }
        for &c in &self.constants {
            for delta in [0, -1, 1] {
                if let Some(v) = c.checked_add(delta) {
                    push(v, &mut out);
                }
            }
        }
        push(ty.min_value(), &mut out);
        push(ty.max_value(), &mut out);
        if is_small(ty) {
            for v in ty.min_value()..=ty.max_value() {
                push(v, &mut out);
            }
        }
        out
    }
}

/// Roots of every comparison inside `pred` that is linear in `name` once
/// the other symbols are fixed by `assignment`.
fn linear_roots(pred: &Predicate, name: &str, assignment: &BTreeMap<String, i128>) -> Vec<i128> {
    let mut roots = Vec::new();
    collect_roots(pred, name, assignment, &mut roots);
    roots
}

fn collect_roots(
    pred: &Predicate,
    name: &str,
    assignment: &BTreeMap<String, i128>,
    roots: &mut Vec<i128>,
) {
    match pred {
        Predicate::True | Predicate::False => {}
        Predicate::Cmp { lhs, rhs, .. } => {
            let mut trial = assignment.clone();
            let mut diff_at = |x: i128| {
                trial.insert(name.to_string(), x);
                lhs.eval(&trial)?.checked_sub(rhs.eval(&trial)?)
            };
            let (Some(f0), Some(f1), Some(f2)) = (diff_at(0), diff_at(1), diff_at(2)) else {
                return;
            };
            let (Some(slope), Some(next)) = (f1.checked_sub(f0), f2.checked_sub(f1)) else {
                return;
            };
            if slope == 0 || next != slope {
                return;
            }
            // slope * x + f0 == 0
            if let Some(root) = f0.checked_neg().and_then(|n| n.checked_div(slope)) {
                roots.push(root);
            }
        }
        Predicate::Not(p) => collect_roots(p, name, assignment, roots),
        Predicate::And(a, b) | Predicate::Or(a, b) => {
            collect_roots(a, name, assignment, roots);
            collect_roots(b, name, assignment, roots);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{CmpOp, Term};

    fn sym(name: &str) -> Term {
        Term::symbol(name)
    }

    fn check(set: &ConstraintSet) -> SolverVerdict {
        CandidateSolver::new().check_unsat(set, "test").unwrap()
    }

    fn decoded(set: &ConstraintSet, verdict: &SolverVerdict, name: &str) -> i128 {
        let raw = verdict.model().unwrap().get(name).unwrap();
        set.sort_of(name).decode(raw)
    }

    #[test]
    fn test_empty_set_is_sat() {
        let verdict = check(&ConstraintSet::default());
        assert!(!verdict.is_unsat());
        assert!(verdict.model().unwrap().is_empty());
    }

    #[test]
    fn test_single_equality() {
        let set = ConstraintSet::new(vec![Predicate::cmp(CmpOp::Eq, sym("x"), Term::Const(42))]);
        let verdict = check(&set);
        assert_eq!(decoded(&set, &verdict, "x"), 42);
    }

    #[test]
    fn test_contradiction_over_small_sort_is_unsat() {
        let mut set = ConstraintSet::new(vec![
            Predicate::cmp(CmpOp::Gt, sym("x"), Term::Const(5)),
            Predicate::cmp(CmpOp::Lt, sym("x"), Term::Const(3)),
        ]);
        set.declare("x", IntType::CHAR);
        assert!(check(&set).is_unsat());
    }

    #[test]
    fn test_contradiction_over_wide_sort_is_incomplete() {
        let set = ConstraintSet::new(vec![
            Predicate::cmp(CmpOp::Gt, sym("x"), Term::Const(5)),
            Predicate::cmp(CmpOp::Lt, sym("x"), Term::Const(3)),
        ]);
        let result = CandidateSolver::new().check_unsat(&set, "test");
        assert!(matches!(result, Err(SolverError::Incomplete(_))));
        assert!(result.unwrap_err().is_unknown());
    }

    #[test]
    fn test_missed_nonlinear_model_is_not_unsat() {
        // x * x == 49 has the models 7 and -7, neither among the candidates
        let x = sym("x");
        let set = ConstraintSet::new(vec![Predicate::cmp(
            CmpOp::Eq,
            Term::Mul(Box::new(x.clone()), Box::new(x)),
            Term::Const(49),
        )]);
        let result = CandidateSolver::new().check_unsat(&set, "test");
        match result {
            Ok(SolverVerdict::Sat(model)) => {
                let v = set.sort_of("x").decode(model.get("x").unwrap());
                assert_eq!(v * v, 49);
            }
            Ok(SolverVerdict::Unsat) => panic!("satisfiable query reported unsat"),
            Err(e) => assert!(e.is_unknown()),
        }
    }

    #[test]
    fn test_nonlinear_over_small_sort_is_solved() {
        let x = sym("x");
        let mut set = ConstraintSet::new(vec![Predicate::cmp(
            CmpOp::Eq,
            Term::Mul(Box::new(x.clone()), Box::new(x)),
            Term::Const(49),
        )]);
        set.declare("x", IntType::CHAR);
        let verdict = check(&set);
        let v = decoded(&set, &verdict, "x");
        assert_eq!(v * v, 49);
    }

    #[test]
    fn test_ground_false_is_unsat() {
        let set = ConstraintSet::new(vec![Predicate::False]);
        assert!(check(&set).is_unsat());
    }

    #[test]
    fn test_linear_two_symbols() {
        // x + y == 100 && x > 60
        let set = ConstraintSet::new(vec![
            Predicate::cmp(CmpOp::Gt, sym("x"), Term::Const(60)),
            Predicate::cmp(
                CmpOp::Eq,
                Term::Add(Box::new(sym("x")), Box::new(sym("y"))),
                Term::Const(100),
            ),
        ]);
        let verdict = check(&set);
        let x = decoded(&set, &verdict, "x");
        let y = decoded(&set, &verdict, "y");
        assert!(x > 60);
        assert_eq!(x + y, 100);
    }

    #[test]
    fn test_scaled_linear_root() {
        // 3 * x == 21
        let set = ConstraintSet::new(vec![Predicate::cmp(
            CmpOp::Eq,
            Term::Mul(Box::new(Term::Const(3)), Box::new(sym("x"))),
            Term::Const(21),
        )]);
        let verdict = check(&set);
        assert_eq!(decoded(&set, &verdict, "x"), 7);
    }

    #[test]
    fn test_negative_value_is_bitvector_encoded() {
        let set = ConstraintSet::new(vec![Predicate::cmp(CmpOp::Eq, sym("x"), Term::Const(-1))]);
        let verdict = check(&set);
        assert_eq!(verdict.model().unwrap().get("x"), Some(4_294_967_295));
    }

    #[test]
    fn test_hint_preferred() {
        let mut set = ConstraintSet::new(vec![Predicate::cmp(CmpOp::Gt, sym("x"), Term::Const(0))]);
        set.hint("x", 17);
        let verdict = check(&set);
        assert_eq!(decoded(&set, &verdict, "x"), 17);
    }

    #[test]
    fn test_respects_unsigned_sort() {
        let mut set = ConstraintSet::new(vec![Predicate::cmp(CmpOp::Lt, sym("u"), Term::Const(0))]);
        set.declare("u", IntType::new(8, false));
        assert!(check(&set).is_unsat());

        set.declare("u", IntType::UINT);
        let result = CandidateSolver::new().check_unsat(&set, "test");
        assert!(matches!(result, Err(SolverError::Incomplete(_))));
    }

    #[test]
    fn test_sort_bounds_are_candidates() {
        let mut set =
            ConstraintSet::new(vec![Predicate::cmp(CmpOp::Ge, sym("x"), Term::Const(2_147_483_000))]);
        set.declare("x", IntType::INT);
        set.hint("x", 0);
        let verdict = check(&set);
        assert!(decoded(&set, &verdict, "x") >= 2_147_483_000);
    }

    #[test]
    fn test_budget_exhaustion() {
        let set = ConstraintSet::new(vec![
            Predicate::cmp(CmpOp::Gt, sym("x"), Term::Const(5)),
            Predicate::cmp(CmpOp::Lt, sym("x"), Term::Const(3)),
        ]);
        let result = CandidateSolver::with_budget(1).check_unsat(&set, "test");
        assert_eq!(result, Err(SolverError::Budget(1)));
    }

    #[test]
    fn test_query_counter() {
        let mut solver = CandidateSolver::new();
        let set = ConstraintSet::default();
        solver.check_unsat(&set, "a").unwrap();
        solver.check_unsat(&set, "b").unwrap();
        assert_eq!(solver.queries(), 2);
    }
}
