//! Seed scheduling strategies.
//!
//! A [`Scheduler`] owns the worklist of path records and runs one
//! scheduling round at a time against an [`Engine`], which bundles the
//! components every strategy needs: the path executor, the flipper, the
//! coverage tracker and the test-case writer.
//!
//! - [`generational`] — expand the best record completely, keep all new children
//! - [`guided`] — one active record, flip one branch at a time (random or DFS)

pub mod generational;
pub mod guided;

pub use generational::GenerationalScheduler;
pub use guided::{GuidedMode, GuidedScheduler};

use crate::coverage::{CoverageCriterion, CoverageTracker};
use crate::error::ExploreError;
use crate::executor::PathExecutor;
use crate::flipper::{ConstraintFlipper, FlipOutcome};
use crate::input::ConcolicInput;
use crate::testcase::TestCaseWriter;
use pathflip_program::ShutdownNotifier;
use pathflip_solver::Solver;

/// How a scheduling round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// More work may remain.
    Continue,
    /// Nothing left to expand.
    Exhausted,
    /// The error criterion is met.
    ErrorReached,
}

/// Everything a scheduling round works with.
pub struct Engine {
    pub executor: PathExecutor,
    pub flipper: ConstraintFlipper<Box<dyn Solver>>,
    pub tracker: CoverageTracker,
    pub writer: TestCaseWriter,
    pub notifier: ShutdownNotifier,
    /// Confirm flipped children with a concrete replay.
    pub confirm_children: bool,
}

impl Engine {
    pub fn criterion(&self) -> CoverageCriterion {
        self.tracker.criterion()
    }

    /// Execute a record that has no path yet, with concrete confirmation.
    pub fn execute_initial(&mut self, input: ConcolicInput) -> Result<ConcolicInput, ExploreError> {
        let attempt = self.executor.execute(input.values(), true)?;
        let is_new = attempt.register(&mut self.tracker, &mut self.writer)?;
        let score = self.tracker.score(&attempt.path);
        Ok(input.executed(attempt.path, score, is_new))
    }

    pub fn flip(&mut self, parent: &ConcolicInput, index: usize) -> Result<FlipOutcome, ExploreError> {
        self.flipper.flip(
            parent,
            index,
            self.confirm_children,
            &mut self.executor,
            &mut self.tracker,
            &mut self.writer,
        )
    }

    /// Mark the record's path covered. Returns newly covered edges.
    pub fn accept(&mut self, input: &ConcolicInput) -> usize {
        input
            .executed_path()
            .map(|path| self.tracker.accept(path))
            .unwrap_or(0)
    }

    /// Whether the error criterion is met.
    pub fn error_goal_met(&self) -> bool {
        self.criterion() == CoverageCriterion::Error && self.tracker.error_reached()
    }

    /// Whether a shutdown was requested; expansion stops early if so.
    pub fn interrupted(&self) -> bool {
        self.notifier.should_shutdown()
    }
}

/// A worklist policy.
pub trait Scheduler {
    fn name(&self) -> &'static str;

    /// Install the root record.
    fn seed(&mut self, root: ConcolicInput);

    /// Select a record and expand it.
    fn round(&mut self, engine: &mut Engine) -> Result<RoundOutcome, ExploreError>;

    /// Records waiting for expansion.
    fn pending(&self) -> usize;

    /// Drop all pending records.
    fn clear(&mut self);

    /// Records dropped because their path was already covered.
    fn stale_discarded(&self) -> u64 {
        0
    }

    /// Children dropped because another attempt already produced their path.
    fn duplicates_dropped(&self) -> u64 {
        0
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Engine fixtures shared by the scheduler tests.

    use super::*;
    use crate::testcase::MemoryExporter;
    use pathflip_program::program::{BinOp, Expr};
    use pathflip_program::{
        ConcreteExecutor, NondetLocation, Program, ProgramBuilder, SymbolicExecutor,
    };
    use pathflip_solver::{CandidateSolver, IntType};
    use std::sync::Arc;

    pub fn engine(program: Arc<Program>, criterion: CoverageCriterion) -> (Engine, MemoryExporter) {
        let notifier = ShutdownNotifier::new();
        let symbolic = SymbolicExecutor::new(program.clone(), 1_000, notifier.clone()).unwrap();
        let concrete = ConcreteExecutor::new(program.clone(), 1_000, notifier.clone()).unwrap();
        let exporter = MemoryExporter::new();
        let engine = Engine {
            executor: PathExecutor::new(program, Box::new(symbolic), Box::new(concrete)),
            flipper: ConstraintFlipper::new(Box::new(CandidateSolver::new())),
            tracker: CoverageTracker::new(criterion),
            writer: TestCaseWriter::new(Box::new(exporter.clone()), 1_000),
            notifier,
            confirm_children: true,
        };
        (engine, exporter)
    }

    fn site(line: u32) -> NondetLocation {
        NondetLocation::new("s.c", line, 13, 28)
    }

    /// `if (nondet() > 0) {} else {}`
    pub fn single_branch() -> Arc<Program> {
        Arc::new(
            ProgramBuilder::new("single")
                .variable("x", IntType::INT)
                .function("main", 0)
                .nondet(0, 1, "x", IntType::INT, site(2))
                .branch(1, Expr::binary(BinOp::Gt, Expr::var("x"), Expr::int(0)), 2, 3)
                .build()
                .unwrap(),
        )
    }

    /// `if (nondet() == 42) reach_error();`
    pub fn error_at_42() -> Arc<Program> {
        Arc::new(
            ProgramBuilder::new("err42")
                .variable("x", IntType::INT)
                .function("main", 0)
                .nondet(0, 1, "x", IntType::INT, site(2))
                .branch(1, Expr::binary(BinOp::Eq, Expr::var("x"), Expr::int(42)), 2, 3)
                .call(2, 3, "reach_error")
                .build()
                .unwrap(),
        )
    }

    /// Three independent branches: `a > 10`, `b < -5`, `c == 7`.
    pub fn three_branches() -> Arc<Program> {
        let cmp = |op, var: &str, c| Expr::binary(op, Expr::var(var), Expr::int(c));
        Arc::new(
            ProgramBuilder::new("three")
                .variable("a", IntType::INT)
                .variable("b", IntType::INT)
                .variable("c", IntType::INT)
                .function("main", 0)
                .nondet(0, 1, "a", IntType::INT, site(2))
                .branch(1, cmp(BinOp::Gt, "a", 10), 2, 2)
                .nondet(2, 3, "b", IntType::INT, site(3))
                .branch(3, cmp(BinOp::Lt, "b", -5), 4, 4)
                .nondet(4, 5, "c", IntType::INT, site(4))
                .branch(5, cmp(BinOp::Eq, "c", 7), 6, 6)
                .build()
                .unwrap(),
        )
    }
}
