//! Constraint flipper: negate one branch constraint and solve.
//!
//! For a path with constraints `C = [c_0 .. c_{n-1}]`, flipping index `i`
//! asks the solver for `C[0..i) + [!c_i]`. A model is mapped back to nondet
//! call sites, merged into the parent's values and executed from the root
//! state; the result is packaged as a child record with `bound = i`.

use crate::coverage::CoverageTracker;
use crate::error::ExploreError;
use crate::executor::PathExecutor;
use crate::input::ConcolicInput;
use crate::testcase::TestCaseWriter;
use crate::values::{merge, values_from_model};
use log::debug;
use pathflip_solver::{Predicate, Solver, SolverVerdict};

/// Scope name passed to the solver.
const SOLVER_SCOPE: &str = "concolic-flip";

/// Result of flipping one constraint.
#[derive(Debug)]
pub enum FlipOutcome {
    /// The negated prefix is infeasible.
    Unsatisfiable,
    /// The solver gave no verdict. Nothing is learned.
    Unknown,
    Child(Box<ConcolicInput>),
}

/// Solver query counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlipStats {
    pub sat: u64,
    pub unsat: u64,
    pub unknown: u64,
}

impl FlipStats {
    pub fn queries(&self) -> u64 {
        self.sat + self.unsat + self.unknown
    }
}

pub struct ConstraintFlipper<S> {
    solver: S,
    stats: FlipStats,
}

impl<S: Solver> ConstraintFlipper<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            stats: FlipStats::default(),
        }
    }

    pub fn stats(&self) -> FlipStats {
        self.stats
    }

    /// Flip constraint `index` of `parent`'s path.
    ///
    /// The child is executed (with concrete confirmation when `confirm`),
    /// and its values are exported if its path is new.
    pub fn flip(
        &mut self,
        parent: &ConcolicInput,
        index: usize,
        confirm: bool,
        executor: &mut PathExecutor,
        tracker: &mut CoverageTracker,
        writer: &mut TestCaseWriter,
    ) -> Result<FlipOutcome, ExploreError> {
        let path = parent.executed_path().ok_or_else(|| {
            ExploreError::ContractViolation("flipping a record that was never executed".to_string())
        })?;
        let constraints = path.constraints();
        let flipped = constraints.flipped(index).ok_or_else(|| {
            ExploreError::ContractViolation(format!(
                "constraint index {} out of range for {} constraints",
                index,
                constraints.len()
            ))
        })?;

        let query = constraints.to_constraint_set(flipped);
        let model = match self.solver.check_unsat(&query, SOLVER_SCOPE) {
            Ok(SolverVerdict::Unsat) => {
                self.stats.unsat += 1;
                debug!("Flip {}: unsat", index);
                return Ok(FlipOutcome::Unsatisfiable);
            }
            Ok(SolverVerdict::Sat(model)) => model,
            Err(e) if e.is_unknown() => {
                self.stats.unknown += 1;
                debug!("Flip {}: unknown ({})", index, e);
                return Ok(FlipOutcome::Unknown);
            }
            Err(e) => return Err(ExploreError::Solver(e)),
        };
        self.stats.sat += 1;

        let values = merge(&values_from_model(&model, constraints), parent.values());
        let attempt = executor.execute(&values, confirm)?;
        let is_new_path = attempt.register(tracker, writer)?;
        let score = tracker.score(&attempt.path);
        debug!(
            "Flip {}: sat, child path of {} edges (new: {}, score: {})",
            index,
            attempt.path.len(),
            is_new_path,
            score
        );

        Ok(FlipOutcome::Child(Box::new(ConcolicInput::child(
            values,
            model,
            attempt.path,
            index,
            score,
            is_new_path,
        ))))
    }
}

/// Constraint sequences already submitted to the solver.
///
/// A candidate sequence counts as checked when some stored sequence
/// starts with it: the subtree it leads into was already entered. This
/// prunes repeated work but is a heuristic; it can skip a subtree whose
/// earlier visit did not exhaust it.
#[derive(Debug, Clone, Default)]
pub struct CheckedConstraints {
    sequences: Vec<Vec<Predicate>>,
}

impl CheckedConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sequence: Vec<Predicate>) {
        if !self.sequences.contains(&sequence) {
            self.sequences.push(sequence);
        }
    }

    pub fn is_checked(&self, candidate: &[Predicate]) -> bool {
        self.sequences.iter().any(|s| s.starts_with(candidate))
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}
