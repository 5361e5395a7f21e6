//! The top-level exploration driver.
//!
//! ```text
//! SEEDING ──▶ SCHEDULING ──▶ EXPANDING ──┬──▶ SCHEDULING
//!                                        └──▶ DONE
//! ```
//!
//! The run ends when the worklist empties, when the error criterion is
//! met, or when the CPU-time limit fires. Pending records are cleared on
//! every exit from the loop.

use crate::coverage::{CoverageCriterion, CoverageTracker};
use crate::error::ExploreError;
use crate::executor::PathExecutor;
use crate::flipper::{ConstraintFlipper, FlipStats};
use crate::input::ConcolicInput;
use crate::scheduler::{
    Engine, GenerationalScheduler, GuidedMode, GuidedScheduler, RoundOutcome, Scheduler,
};
use crate::testcase::{
    DirectoryExporter, MemoryExporter, TestCaseExporter, TestCaseWriter, TestMetadata,
    DEFAULT_MAX_TEST_CASES,
};
use log::{debug, info, warn};
use pathflip_program::{
    ConcreteExecutor, Program, ShutdownNotifier, ShutdownReason, SymbolicExecutor,
    DEFAULT_MAX_STEPS,
};
use pathflip_solver::solver::DEFAULT_BUDGET;
use pathflip_solver::{CandidateSolver, Solver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Option key selecting the coverage criterion.
pub const COVERAGE_CRITERION_OPTION: &str = "coverageCriterion";

/// Which scheduler to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Generational,
    Random,
    Dfs,
}

impl FromStr for StrategyKind {
    type Err = ExploreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generational" => Ok(StrategyKind::Generational),
            "random" => Ok(StrategyKind::Random),
            "dfs" => Ok(StrategyKind::Dfs),
            other => Err(ExploreError::Config(format!(
                "unknown strategy `{}` (expected `generational`, `random` or `dfs`)",
                other
            ))),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Generational => f.write_str("generational"),
            StrategyKind::Random => f.write_str("random"),
            StrategyKind::Dfs => f.write_str("dfs"),
        }
    }
}

/// Which constraint solver answers flip queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Built-in candidate search.
    #[default]
    Candidate,
    /// Z3, when built with the `z3` feature.
    Z3,
}

impl FromStr for SolverKind {
    type Err = ExploreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candidate" => Ok(SolverKind::Candidate),
            "z3" => Ok(SolverKind::Z3),
            other => Err(ExploreError::Config(format!(
                "unknown solver `{}` (expected `candidate` or `z3`)",
                other
            ))),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::Candidate => f.write_str("candidate"),
            SolverKind::Z3 => f.write_str("z3"),
        }
    }
}

impl SolverKind {
    /// Instantiate the backend. `budget` bounds candidate evaluations.
    pub fn build(self, budget: u64) -> Result<Box<dyn Solver>, ExploreError> {
        match self {
            SolverKind::Candidate => Ok(Box::new(CandidateSolver::with_budget(budget))),
            #[cfg(feature = "z3")]
            SolverKind::Z3 => Ok(Box::new(pathflip_solver::Z3Solver::new())),
            #[cfg(not(feature = "z3"))]
            SolverKind::Z3 => Err(ExploreError::Config(
                "this build has no Z3 support (rebuild with --features z3)".to_string(),
            )),
        }
    }
}

/// Configuration for an exploration run.
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    pub criterion: CoverageCriterion,
    pub strategy: StrategyKind,
    pub solver: SolverKind,
    /// Seed for the random guided strategy.
    pub seed: u64,
    /// Step limit per execution attempt.
    pub max_steps: usize,
    /// Cap on written test cases.
    pub max_test_cases: usize,
    /// Evaluation budget per solver query.
    pub solver_budget: u64,
    /// Confirm flipped children with a concrete replay.
    pub confirm_children: bool,
    /// Directory for test cases and `report.json`.
    pub output_dir: Option<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            criterion: CoverageCriterion::Branch,
            strategy: StrategyKind::Generational,
            solver: SolverKind::Candidate,
            seed: 42,
            max_steps: DEFAULT_MAX_STEPS,
            max_test_cases: DEFAULT_MAX_TEST_CASES,
            solver_budget: DEFAULT_BUDGET,
            confirm_children: true,
            output_dir: None,
        }
    }
}

impl ExplorerConfig {
    /// Build a config from string options.
    ///
    /// `coverageCriterion` must be `branch` or `error`. Other keys are
    /// ignored with a warning.
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self, ExploreError> {
        let mut config = Self::default();
        for (key, value) in options {
            if key == COVERAGE_CRITERION_OPTION {
                config.criterion = value.parse()?;
            } else {
                warn!("Ignoring unknown option {}={}", key, value);
            }
        }
        Ok(config)
    }
}

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Seeding,
    Scheduling,
    Expanding,
    Done,
}

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No pending record left.
    Exhausted,
    /// A path reached the error function under the error criterion.
    ErrorReached,
    CpuTimeLimit,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exhausted => f.write_str("worklist exhausted"),
            Termination::ErrorReached => f.write_str("error location reached"),
            Termination::CpuTimeLimit => f.write_str("CPU-time limit reached"),
        }
    }
}

/// Status of a completed run. Fatal conditions are errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    SoundAndPrecise,
}

/// Result of an exploration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub program: String,
    pub strategy: StrategyKind,
    pub criterion: CoverageCriterion,
    pub status: RunStatus,
    pub termination: Termination,
    pub rounds: u64,
    pub attempts: u64,
    pub truncated_attempts: u64,
    pub divergences: u64,
    pub solver_sat: u64,
    pub solver_unsat: u64,
    pub solver_unknown: u64,
    pub test_cases: usize,
    pub visited_edges: usize,
    /// Assume edges in the program, for branch coverage ratios.
    pub total_branch_edges: usize,
    pub visited_paths: usize,
    pub stale_discarded: u64,
    pub duplicates_dropped: u64,
    pub error_reached: bool,
}

/// Current exploration statistics.
#[derive(Debug, Clone)]
pub struct ExplorationStats {
    pub rounds: u64,
    pub attempts: u64,
    pub visited_edges: usize,
    pub pending: usize,
    pub test_cases: usize,
    pub solver: FlipStats,
}

/// The exploration engine.
pub struct Explorer {
    config: ExplorerConfig,
    program: Arc<Program>,
    engine: Engine,
    scheduler: Box<dyn Scheduler>,
    phase: Phase,
    rounds_completed: u64,
}

impl Explorer {
    /// Create an explorer using the candidate solver. Test cases go to
    /// `config.output_dir` when set, and are kept in memory otherwise.
    pub fn new(
        program: Arc<Program>,
        config: ExplorerConfig,
        notifier: ShutdownNotifier,
    ) -> Result<Self, ExploreError> {
        let exporter: Box<dyn TestCaseExporter> = match &config.output_dir {
            Some(dir) => {
                let metadata = TestMetadata {
                    program_name: program.name().to_string(),
                    entry_function: program.entry_function().to_string(),
                    error_function: program.error_function().to_string(),
                    criterion: config.criterion,
                };
                Box::new(DirectoryExporter::create(dir, &metadata)?)
            }
            None => Box::new(MemoryExporter::new()),
        };
        let solver = config.solver.build(config.solver_budget)?;
        Self::with_parts(program, config, notifier, exporter, solver)
    }

    /// Create an explorer with an explicit exporter and solver.
    pub fn with_parts(
        program: Arc<Program>,
        config: ExplorerConfig,
        notifier: ShutdownNotifier,
        exporter: Box<dyn TestCaseExporter>,
        solver: Box<dyn Solver>,
    ) -> Result<Self, ExploreError> {
        let symbolic = SymbolicExecutor::new(program.clone(), config.max_steps, notifier.clone())?;
        let concrete = ConcreteExecutor::new(program.clone(), config.max_steps, notifier.clone())?;

        let engine = Engine {
            executor: PathExecutor::new(program.clone(), Box::new(symbolic), Box::new(concrete)),
            flipper: ConstraintFlipper::new(solver),
            tracker: CoverageTracker::new(config.criterion),
            writer: TestCaseWriter::new(exporter, config.max_test_cases),
            notifier,
            confirm_children: config.confirm_children,
        };

        let scheduler: Box<dyn Scheduler> = match config.strategy {
            StrategyKind::Generational => Box::new(GenerationalScheduler::new()),
            StrategyKind::Random => Box::new(GuidedScheduler::new(GuidedMode::Random, config.seed)),
            StrategyKind::Dfs => {
                Box::new(GuidedScheduler::new(GuidedMode::DepthFirst, config.seed))
            }
        };

        Ok(Self {
            config,
            program,
            engine,
            scheduler,
            phase: Phase::Seeding,
            rounds_completed: 0,
        })
    }

    /// Run the exploration to completion.
    pub fn run(&mut self) -> Result<ExplorationReport, ExploreError> {
        info!(
            "Starting exploration of {}: strategy {}, criterion {}",
            self.program.name(),
            self.scheduler.name(),
            self.config.criterion
        );

        let result = self.drive();
        self.scheduler.clear();
        let termination = result?;
        self.phase = Phase::Done;

        info!(
            "Exploration finished after {} rounds: {}",
            self.rounds_completed, termination
        );

        let report = self.generate_report(termination);
        if let Some(ref output_dir) = self.config.output_dir {
            if let Err(e) = save_report(Path::new(output_dir).join("report.json"), &report) {
                warn!("Failed to save report: {}", e);
            }
        }
        Ok(report)
    }

    fn drive(&mut self) -> Result<Termination, ExploreError> {
        loop {
            match self.phase {
                Phase::Seeding => {
                    self.scheduler.seed(ConcolicInput::initial());
                    self.phase = Phase::Scheduling;
                }
                Phase::Scheduling => match self.engine.notifier.reason() {
                    Some(ShutdownReason::CpuTimeLimit) => {
                        warn!("CPU-time limit reached, stopping exploration");
                        return Ok(Termination::CpuTimeLimit);
                    }
                    Some(other) => return Err(ExploreError::Interrupted(other)),
                    None => self.phase = Phase::Expanding,
                },
                Phase::Expanding => {
                    self.rounds_completed += 1;
                    info!(
                        "Round {}: {} pending, {} edges covered",
                        self.rounds_completed,
                        self.scheduler.pending(),
                        self.engine.tracker.visited_edge_count()
                    );
                    match self.scheduler.round(&mut self.engine)? {
                        RoundOutcome::Continue => self.phase = Phase::Scheduling,
                        RoundOutcome::Exhausted => return Ok(Termination::Exhausted),
                        RoundOutcome::ErrorReached => return Ok(Termination::ErrorReached),
                    }
                }
                Phase::Done => {
                    debug!("Explorer already finished");
                    return Ok(Termination::Exhausted);
                }
            }
        }
    }

    fn generate_report(&self, termination: Termination) -> ExplorationReport {
        let solver = self.engine.flipper.stats();
        let tracker = &self.engine.tracker;
        ExplorationReport {
            program: self.program.name().to_string(),
            strategy: self.config.strategy,
            criterion: self.config.criterion,
            status: RunStatus::SoundAndPrecise,
            termination,
            rounds: self.rounds_completed,
            attempts: self.engine.executor.attempts(),
            truncated_attempts: self.engine.executor.truncated(),
            divergences: self.engine.executor.divergences(),
            solver_sat: solver.sat,
            solver_unsat: solver.unsat,
            solver_unknown: solver.unknown,
            test_cases: self.engine.writer.written(),
            visited_edges: tracker.visited_edge_count(),
            total_branch_edges: self.program.assume_edges().count(),
            visited_paths: tracker.visited_path_count(),
            stale_discarded: self.scheduler.stale_discarded(),
            duplicates_dropped: self.scheduler.duplicates_dropped(),
            error_reached: tracker.error_reached(),
        }
    }

    /// Get current exploration stats.
    pub fn stats(&self) -> ExplorationStats {
        ExplorationStats {
            rounds: self.rounds_completed,
            attempts: self.engine.executor.attempts(),
            visited_edges: self.engine.tracker.visited_edge_count(),
            pending: self.scheduler.pending(),
            test_cases: self.engine.writer.written(),
            solver: self.engine.flipper.stats(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }
}

/// Save a report as pretty JSON.
pub fn save_report<P: AsRef<Path>>(
    path: P,
    report: &ExplorationReport,
) -> Result<(), crate::testcase::ExportError> {
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::from)?;
    std::fs::write(path, json)?;
    Ok(())
}
