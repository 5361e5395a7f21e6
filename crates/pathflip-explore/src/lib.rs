//! Concolic test generation for programs with nondeterministic inputs.
//!
//! Each execution records the branch constraints the input values drove it
//! through. Negating one constraint and solving yields values for a sibling
//! path; replaying those values explores it. Every new path becomes a test
//! case.
//!
//! # Architecture
//!
//! ```text
//! 1. Execute the root (all nondet values default) → path + constraints
//! 2. Select a pending record (generational, random or DFS)
//! 3. Skip it if its path is already covered, else mark it covered
//! 4. Flip constraints from its bound onwards → solver query per index
//! 5. Merge each model into the parent values, execute, replay concretely
//! 6. Write a test case for every new path, keep new children
//! 7. Repeat until the worklist is empty, the error call is reached, or
//!    the CPU-time limit fires
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use pathflip_explore::explorer::{Explorer, ExplorerConfig};
//! use pathflip_explore::report::format_report;
//! use pathflip_program::{Program, ShutdownNotifier};
//! use std::sync::Arc;
//!
//! let program = Arc::new(Program::load("program.json".as_ref()).unwrap());
//! let config = ExplorerConfig {
//!     output_dir: Some("test-suite".to_string()),
//!     ..Default::default()
//! };
//!
//! let mut explorer = Explorer::new(program, config, ShutdownNotifier::new()).unwrap();
//! let report = explorer.run().unwrap();
//!
//! println!("{}", format_report(&report));
//! ```
//!
//! # Module Structure
//!
//! - [`path`] — executed paths and their fingerprints
//! - [`input`] — path records with values, bound and score
//! - [`values`] — mapping solver models back to nondet call sites
//! - [`coverage`] — covered edges and paths, record scoring
//! - [`executor`] — symbolic execution plus concrete replay
//! - [`flipper`] — negate one constraint, solve, build the child
//! - [`scheduler`] — generational and guided worklist policies
//! - [`testcase`] — Test-Comp XML export and the test-case cap
//! - [`explorer`] — the driver
//! - [`report`] — human-readable summaries
//!
//! # Determinism
//!
//! Runs are deterministic for a given seed: the random strategy draws from
//! a seeded ChaCha RNG and covered edges are kept in ordered sets.

pub mod coverage;
pub mod error;
pub mod executor;
pub mod explorer;
pub mod flipper;
pub mod input;
pub mod path;
pub mod report;
pub mod scheduler;
pub mod testcase;
pub mod values;

pub use coverage::{CoverageCriterion, CoverageTracker};
pub use error::ExploreError;
pub use executor::{Attempt, AttemptOutcome, PathExecutor};
pub use explorer::{
    ExplorationReport, ExplorationStats, Explorer, ExplorerConfig, Phase, RunStatus,
    SolverKind, StrategyKind, Termination,
};
pub use flipper::{CheckedConstraints, ConstraintFlipper, FlipOutcome, FlipStats};
pub use input::ConcolicInput;
pub use path::{Path, PathStep, StepClass};
pub use scheduler::{
    Engine, GenerationalScheduler, GuidedMode, GuidedScheduler, RoundOutcome, Scheduler,
};
pub use testcase::{
    DirectoryExporter, ExportError, MemoryExporter, TestCaseExporter, TestCaseWriter,
    TestMetadata,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        let _ = CoverageTracker::new(CoverageCriterion::Branch);
        let _ = GenerationalScheduler::new();
        let _ = GuidedScheduler::new(GuidedMode::DepthFirst, 42);
        let _ = MemoryExporter::new();
        let _ = ExplorerConfig::default();
        let _ = ConcolicInput::initial();
    }
}
