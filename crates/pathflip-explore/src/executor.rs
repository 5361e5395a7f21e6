//! Path executor: runs one attempt and optionally confirms it concretely.
//!
//! Each attempt:
//!
//! 1. resets the reused symbolic frontier to its root state
//! 2. gives the symbolic algorithm a fresh [`NondetContext`] seeded with
//!    the attempt's values
//! 3. runs it; a step limit marks the attempt truncated instead of failing
//! 4. takes the constraints from the last state reached
//! 5. when asked, replays the same values with the concrete algorithm on
//!    reduced states to harvest the consumed value history
//!
//! If the replay diverges, the concrete edges are kept for coverage and the
//! symbolic constraints are dropped: they describe a different path, so
//! the attempt is truncated and offers nothing to flip.
//!
//! A CPU-time-limit interruption is not fatal here: the attempt is
//! returned as truncated and flagged so the caller can still export the
//! values consumed so far. Any other interruption aborts.

use crate::coverage::CoverageTracker;
use crate::error::ExploreError;
use crate::path::Path;
use crate::testcase::TestCaseWriter;
use log::warn;
use pathflip_program::{
    AlgorithmStatus, ConstraintState, ExecError, ExecutionAlgorithm, Frontier, NondetContext, Program,
    ShutdownReason, Value, ValuesMap,
};
use std::sync::Arc;

/// Whether an attempt ran to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Complete,
    /// Stopped early or diverged; the path is not claimed to be the full
    /// feasible path.
    Truncated,
}

/// Result of one attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub path: Path,
    /// Values consumed, in call order.
    pub history: Vec<Value>,
    pub outcome: AttemptOutcome,
    /// Whether the concrete replay confirmed the attempt.
    pub confirmed: bool,
    /// Stopped by the CPU-time limit.
    pub cpu_limited: bool,
}

impl Attempt {
    /// Note the attempt's path and export its values if the path is new.
    ///
    /// A CPU-limited attempt is exported even when its path is known.
    /// Returns whether the path is new.
    pub fn register(
        &self,
        tracker: &mut CoverageTracker,
        writer: &mut TestCaseWriter,
    ) -> Result<bool, ExploreError> {
        let is_new = tracker.note_produced(&self.path);
        if is_new || self.cpu_limited {
            writer.write(&self.history)?;
        }
        Ok(is_new)
    }
}

/// What one algorithm run produced.
struct RunResult {
    status: AlgorithmStatus,
    cpu_limited: bool,
}

/// Drives the symbolic and concrete algorithms over reused frontiers.
pub struct PathExecutor {
    program: Arc<Program>,
    symbolic: Box<dyn ExecutionAlgorithm>,
    concrete: Box<dyn ExecutionAlgorithm>,
    symbolic_frontier: Frontier,
    concrete_frontier: Frontier,
    attempts: u64,
    truncated: u64,
    divergences: u64,
}

impl PathExecutor {
    pub fn new(
        program: Arc<Program>,
        symbolic: Box<dyn ExecutionAlgorithm>,
        concrete: Box<dyn ExecutionAlgorithm>,
    ) -> Self {
        let symbolic_frontier = Frontier::new(symbolic.initial_state());
        let concrete_frontier = Frontier::new(concrete.initial_state());
        Self {
            program,
            symbolic,
            concrete,
            symbolic_frontier,
            concrete_frontier,
            attempts: 0,
            truncated: 0,
            divergences: 0,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Run one attempt with `values`, confirming concretely if `confirm`.
    pub fn execute(&mut self, values: &ValuesMap, confirm: bool) -> Result<Attempt, ExploreError> {
        self.attempts += 1;

        self.symbolic_frontier.reset();
        let mut ctx = NondetContext::seeded(values.clone());
        let run = Self::run_algorithm(
            self.symbolic.as_mut(),
            &mut self.symbolic_frontier,
            &mut ctx,
        )?;

        let mut constraints = self
            .symbolic_frontier
            .last()
            .constraint_state()
            .cloned()
            .ok_or_else(|| {
                ExploreError::ContractViolation(
                    "terminal state has no symbolic component".to_string(),
                )
            })?;

        let mut edges = self.symbolic_frontier.edges().to_vec();
        let mut history = ctx.returned_value_history();
        let mut status = run.status;
        let mut cpu_limited = run.cpu_limited;
        let mut confirmed = false;
        let mut diverged = false;

        if confirm && !cpu_limited {
            self.concrete_frontier.reset();
            let mut concrete_ctx = NondetContext::seeded(values.clone());
            let concrete_run = Self::run_algorithm(
                self.concrete.as_mut(),
                &mut self.concrete_frontier,
                &mut concrete_ctx,
            )?;

            if self.concrete_frontier.edges() != edges.as_slice() {
                self.divergences += 1;
                warn!(
                    "Concrete replay diverged from the symbolic path ({} vs {} edges), keeping the concrete path without constraints",
                    self.concrete_frontier.edges().len(),
                    edges.len()
                );
                edges = self.concrete_frontier.edges().to_vec();
                constraints = ConstraintState::new();
                diverged = true;
            }
            history = concrete_ctx.returned_value_history();
            if concrete_run.status == AlgorithmStatus::NoPropertyChecked {
                status = AlgorithmStatus::NoPropertyChecked;
            }
            cpu_limited = concrete_run.cpu_limited;
            confirmed = !cpu_limited;
        }

        let outcome = match status {
            _ if diverged => AttemptOutcome::Truncated,
            AlgorithmStatus::SoundAndPrecise => AttemptOutcome::Complete,
            AlgorithmStatus::NoPropertyChecked => {
                self.truncated += 1;
                warn!(
                    "Attempt {} truncated after {} edges; path is not claimed complete",
                    self.attempts,
                    edges.len()
                );
                AttemptOutcome::Truncated
            }
        };

        let path = Path::new(
            &self.program,
            &edges,
            constraints,
            outcome == AttemptOutcome::Complete,
        );
        Ok(Attempt {
            path,
            history,
            outcome,
            confirmed,
            cpu_limited,
        })
    }

    fn run_algorithm(
        algorithm: &mut dyn ExecutionAlgorithm,
        frontier: &mut Frontier,
        ctx: &mut NondetContext,
    ) -> Result<RunResult, ExploreError> {
        match algorithm.run(frontier, ctx) {
            Ok(status) => Ok(RunResult {
                status,
                cpu_limited: false,
            }),
            Err(ExecError::Interrupted(ShutdownReason::CpuTimeLimit)) => {
                warn!("CPU-time limit reached during execution, keeping the partial path");
                Ok(RunResult {
                    status: AlgorithmStatus::NoPropertyChecked,
                    cpu_limited: true,
                })
            }
            Err(ExecError::Interrupted(reason)) => Err(ExploreError::Interrupted(reason)),
            Err(ExecError::UnexpectedState(what)) => Err(ExploreError::ContractViolation(what)),
            Err(other) => Err(ExploreError::Exec(other)),
        }
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn truncated(&self) -> u64 {
        self.truncated
    }

    pub fn divergences(&self) -> u64 {
        self.divergences
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathflip_program::program::{BinOp, EdgeKind, Expr};
    use pathflip_program::{
        ConcreteExecutor, EdgeId, ExecState, NodeId, NondetLocation, ProgramBuilder,
        ShutdownNotifier, SymbolicExecutor,
    };
    use pathflip_solver::IntType;
    use std::collections::BTreeMap;

    fn site() -> NondetLocation {
        NondetLocation::new("p.c", 2, 9, 24)
    }

    fn program() -> Arc<Program> {
        let cond = Expr::binary(BinOp::Gt, Expr::var("x"), Expr::int(0));
        Arc::new(
            ProgramBuilder::new("p")
                .variable("x", IntType::INT)
                .function("main", 0)
                .nondet(0, 1, "x", IntType::INT, site())
                .branch(1, cond, 2, 3)
                .build()
                .unwrap(),
        )
    }

    fn executor(program: Arc<Program>, notifier: ShutdownNotifier, max_steps: usize) -> PathExecutor {
        let symbolic = SymbolicExecutor::new(program.clone(), max_steps, notifier.clone()).unwrap();
        let concrete = ConcreteExecutor::new(program.clone(), max_steps, notifier).unwrap();
        PathExecutor::new(program, Box::new(symbolic), Box::new(concrete))
    }

    #[test]
    fn test_execute_confirms_and_collects_history() {
        let mut exec = executor(program(), ShutdownNotifier::new(), 100);
        let mut values = ValuesMap::new();
        values.insert(site(), vec![Value(3)]);

        let attempt = exec.execute(&values, true).unwrap();
        assert_eq!(attempt.outcome, AttemptOutcome::Complete);
        assert!(attempt.confirmed);
        assert_eq!(attempt.history, vec![Value(3)]);
        assert_eq!(attempt.path.fingerprint(), vec![EdgeId(0), EdgeId(1)]);
        assert_eq!(attempt.path.constraints().len(), 1);
    }

    #[test]
    fn test_frontier_reused_between_attempts() {
        let mut exec = executor(program(), ShutdownNotifier::new(), 100);
        let first = exec.execute(&ValuesMap::new(), false).unwrap();
        let second = exec.execute(&ValuesMap::new(), false).unwrap();
        assert_eq!(first.path.fingerprint(), second.path.fingerprint());
        assert_eq!(exec.attempts(), 2);
    }

    #[test]
    fn test_step_limit_truncates() {
        let program = Arc::new(
            ProgramBuilder::new("spin")
                .function("main", 0)
                .edge(0, 1, EdgeKind::Skip)
                .edge(1, 0, EdgeKind::Skip)
                .build()
                .unwrap(),
        );
        let mut exec = executor(program, ShutdownNotifier::new(), 5);
        let attempt = exec.execute(&ValuesMap::new(), true).unwrap();
        assert_eq!(attempt.outcome, AttemptOutcome::Truncated);
        assert!(!attempt.path.is_sound());
        assert_eq!(exec.truncated(), 1);
    }

    #[test]
    fn test_cpu_limit_is_recoverable() {
        let notifier = ShutdownNotifier::new();
        notifier.request(ShutdownReason::CpuTimeLimit);
        let mut exec = executor(program(), notifier, 100);
        let attempt = exec.execute(&ValuesMap::new(), true).unwrap();
        assert!(attempt.cpu_limited);
        assert!(!attempt.confirmed);
        assert_eq!(attempt.outcome, AttemptOutcome::Truncated);
    }

    #[test]
    fn test_other_interruption_is_fatal() {
        let notifier = ShutdownNotifier::new();
        notifier.request(ShutdownReason::Requested("operator".into()));
        let mut exec = executor(program(), notifier, 100);
        assert!(matches!(
            exec.execute(&ValuesMap::new(), true),
            Err(ExploreError::Interrupted(ShutdownReason::Requested(_)))
        ));
    }

    /// Concrete stand-in that always takes the opposite branch.
    struct Contrarian;

    impl ExecutionAlgorithm for Contrarian {
        fn initial_state(&self) -> ExecState {
            ExecState::concrete(NodeId(0), BTreeMap::new())
        }

        fn run(
            &mut self,
            frontier: &mut Frontier,
            _ctx: &mut NondetContext,
        ) -> Result<AlgorithmStatus, ExecError> {
            frontier.push(EdgeId(0), ExecState::concrete(NodeId(1), BTreeMap::new()));
            frontier.push(EdgeId(2), ExecState::concrete(NodeId(3), BTreeMap::new()));
            Ok(AlgorithmStatus::SoundAndPrecise)
        }
    }

    #[test]
    fn test_divergence_keeps_concrete_path_without_constraints() {
        let program = program();
        let symbolic = SymbolicExecutor::new(program.clone(), 100, ShutdownNotifier::new()).unwrap();
        let mut exec = PathExecutor::new(program, Box::new(symbolic), Box::new(Contrarian));
        let mut values = ValuesMap::new();
        values.insert(site(), vec![Value(3)]);

        let attempt = exec.execute(&values, true).unwrap();
        assert_eq!(attempt.path.fingerprint(), vec![EdgeId(0), EdgeId(2)]);
        // the symbolic run took the `x > 0` edge; its constraint is not kept
        assert!(attempt.path.constraints().is_empty());
        assert_eq!(attempt.outcome, AttemptOutcome::Truncated);
        assert!(!attempt.path.is_sound());
        assert_eq!(exec.divergences(), 1);
        assert_eq!(exec.truncated(), 0);
    }

    /// Symbolic stand-in that hands back reduced states.
    struct Broken;

    impl ExecutionAlgorithm for Broken {
        fn initial_state(&self) -> ExecState {
            ExecState::concrete(NodeId(0), BTreeMap::new())
        }

        fn run(
            &mut self,
            _frontier: &mut Frontier,
            _ctx: &mut NondetContext,
        ) -> Result<AlgorithmStatus, ExecError> {
            Ok(AlgorithmStatus::SoundAndPrecise)
        }
    }

    #[test]
    fn test_missing_symbolic_component_is_contract_violation() {
        let program = program();
        let concrete = ConcreteExecutor::new(program.clone(), 100, ShutdownNotifier::new()).unwrap();
        let mut exec = PathExecutor::new(program, Box::new(Broken), Box::new(concrete));
        assert!(matches!(
            exec.execute(&ValuesMap::new(), false),
            Err(ExploreError::ContractViolation(_))
        ));
    }
}
