//! Guided single-path search.
//!
//! Only one record is active at a time. Each round flips branches of the
//! active record, one index per attempt, until a flip yields a new path;
//! that child replaces the active record. When no untried index is left
//! the active record is abandoned and the search ends.
//!
//! Index selection:
//!
//! - **Random**: uniformly among the indices not yet tried on this record.
//! - **Depth-first**: the deepest untried index whose flipped prefix is not
//!   already covered by a checked sequence (see [`CheckedConstraints`]).

use super::{Engine, RoundOutcome, Scheduler};
use crate::error::ExploreError;
use crate::flipper::{CheckedConstraints, FlipOutcome};
use crate::input::ConcolicInput;
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidedMode {
    Random,
    DepthFirst,
}

impl fmt::Display for GuidedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuidedMode::Random => f.write_str("random"),
            GuidedMode::DepthFirst => f.write_str("dfs"),
        }
    }
}

/// The active record plus the indices already flipped on it.
#[derive(Debug)]
struct ActiveRecord {
    input: ConcolicInput,
    attempted: BTreeSet<usize>,
}

impl ActiveRecord {
    fn new(input: ConcolicInput) -> Self {
        Self {
            input,
            attempted: BTreeSet::new(),
        }
    }

    fn constraint_count(&self) -> usize {
        self.input
            .executed_path()
            .map(|p| p.constraints().len())
            .unwrap_or(0)
    }
}

pub struct GuidedScheduler {
    mode: GuidedMode,
    rng: ChaCha8Rng,
    active: Option<ActiveRecord>,
    checked: CheckedConstraints,
    abandoned: u64,
    duplicates_dropped: u64,
}

impl GuidedScheduler {
    pub fn new(mode: GuidedMode, seed: u64) -> Self {
        Self {
            mode,
            rng: ChaCha8Rng::seed_from_u64(seed),
            active: None,
            checked: CheckedConstraints::new(),
            abandoned: 0,
            duplicates_dropped: 0,
        }
    }

    pub fn mode(&self) -> GuidedMode {
        self.mode
    }

    /// Records given up on because no untried index remained.
    pub fn abandoned(&self) -> u64 {
        self.abandoned
    }

    /// Make `input` the active record and mark its path covered.
    fn activate(&mut self, input: ConcolicInput, engine: &mut Engine) -> ActiveRecord {
        engine.accept(&input);
        if self.mode == GuidedMode::DepthFirst {
            if let Some(path) = input.executed_path() {
                self.checked.insert(path.constraints().constraints().to_vec());
            }
        }
        ActiveRecord::new(input)
    }

    fn pick(&mut self, active: &ActiveRecord) -> Option<usize> {
        let count = active.constraint_count();
        match self.mode {
            GuidedMode::Random => {
                let untried: Vec<usize> = (0..count)
                    .filter(|i| !active.attempted.contains(i))
                    .collect();
                if untried.is_empty() {
                    return None;
                }
                Some(untried[self.rng.gen_range(0..untried.len())])
            }
            GuidedMode::DepthFirst => {
                let constraints = active.input.executed_path()?.constraints();
                (0..count).rev().find(|i| {
                    !active.attempted.contains(i)
                        && constraints
                            .flipped(*i)
                            .map_or(false, |seq| !self.checked.is_checked(&seq))
                })
            }
        }
    }
}

impl Scheduler for GuidedScheduler {
    fn name(&self) -> &'static str {
        match self.mode {
            GuidedMode::Random => "guided-random",
            GuidedMode::DepthFirst => "guided-dfs",
        }
    }

    fn seed(&mut self, root: ConcolicInput) {
        self.active = Some(ActiveRecord::new(root));
    }

    fn round(&mut self, engine: &mut Engine) -> Result<RoundOutcome, ExploreError> {
        if engine.error_goal_met() {
            return Ok(RoundOutcome::ErrorReached);
        }
        let Some(mut active) = self.active.take() else {
            return Ok(RoundOutcome::Exhausted);
        };

        if active.input.executed_path().is_none() {
            let input = engine.execute_initial(active.input)?;
            active = self.activate(input, engine);
            if engine.error_goal_met() {
                self.active = Some(active);
                return Ok(RoundOutcome::Continue);
            }
        }

        loop {
            if engine.interrupted() {
                self.active = Some(active);
                return Ok(RoundOutcome::Continue);
            }
            let Some(index) = self.pick(&active) else {
                self.abandoned += 1;
                info!(
                    "No untried branch left on the active path ({} tried), search finished",
                    active.attempted.len()
                );
                return Ok(RoundOutcome::Exhausted);
            };
            active.attempted.insert(index);

            let flipped = active
                .input
                .executed_path()
                .and_then(|p| p.constraints().flipped(index));
            let outcome = engine.flip(&active.input, index)?;

            if self.mode == GuidedMode::DepthFirst
                && !matches!(outcome, FlipOutcome::Unknown)
            {
                if let Some(seq) = flipped {
                    self.checked.insert(seq);
                }
            }

            match outcome {
                FlipOutcome::Child(child) if child.is_new_path() => {
                    debug!("Index {} yields a new path, switching to it", index);
                    self.active = Some(self.activate(*child, engine));
                    return Ok(RoundOutcome::Continue);
                }
                FlipOutcome::Child(_) => self.duplicates_dropped += 1,
                FlipOutcome::Unsatisfiable | FlipOutcome::Unknown => {}
            }
        }
    }

    fn pending(&self) -> usize {
        usize::from(self.active.is_some())
    }

    fn clear(&mut self) {
        self.active = None;
    }

    fn duplicates_dropped(&self) -> u64 {
        self.duplicates_dropped
    }
}
