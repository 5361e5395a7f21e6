//! Coverage tracking across one exploration run.
//!
//! The tracker owns the set of covered edges and the set of full-path
//! fingerprints. Both only grow. Which edges count depends on the
//! [`CoverageCriterion`]: assume edges for branch coverage, error call
//! edges for error coverage.

use crate::error::ExploreError;
use crate::path::{Path, StepClass};
use log::info;
use pathflip_program::EdgeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// What the run is trying to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageCriterion {
    /// Maximize the number of distinct assume edges exercised.
    #[default]
    Branch,
    /// Reach a call to the error function.
    Error,
}

impl CoverageCriterion {
    fn step_class(self) -> StepClass {
        match self {
            CoverageCriterion::Branch => StepClass::Assume,
            CoverageCriterion::Error => StepClass::ErrorCall,
        }
    }
}

impl FromStr for CoverageCriterion {
    type Err = ExploreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "branch" => Ok(CoverageCriterion::Branch),
            "error" => Ok(CoverageCriterion::Error),
            other => Err(ExploreError::Config(format!(
                "unknown coverage criterion `{}` (expected `branch` or `error`)",
                other
            ))),
        }
    }
}

impl fmt::Display for CoverageCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageCriterion::Branch => f.write_str("branch"),
            CoverageCriterion::Error => f.write_str("error"),
        }
    }
}

/// Covered edges and path fingerprints for one run.
#[derive(Debug, Clone)]
pub struct CoverageTracker {
    criterion: CoverageCriterion,
    visited_edges: BTreeSet<EdgeId>,
    visited_paths: HashSet<Vec<EdgeId>>,
    /// Fingerprints of every path any attempt produced, accepted or not.
    produced_paths: HashSet<Vec<EdgeId>>,
    /// Error call edges seen on accepted paths, whatever the criterion.
    error_edges: BTreeSet<EdgeId>,
}

impl CoverageTracker {
    pub fn new(criterion: CoverageCriterion) -> Self {
        Self {
            criterion,
            visited_edges: BTreeSet::new(),
            visited_paths: HashSet::new(),
            produced_paths: HashSet::new(),
            error_edges: BTreeSet::new(),
        }
    }

    pub fn criterion(&self) -> CoverageCriterion {
        self.criterion
    }

    /// Distinct counted edges on `path` that are not yet covered.
    pub fn score(&self, path: &Path) -> usize {
        path.edges_of(self.criterion.step_class())
            .filter(|e| !self.visited_edges.contains(e))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Record `path` as produced. Returns whether no earlier attempt
    /// produced the same path.
    pub fn note_produced(&mut self, path: &Path) -> bool {
        self.produced_paths.insert(path.fingerprint())
    }

    pub fn is_visited(&self, path: &Path) -> bool {
        self.visited_paths.contains(&path.fingerprint())
    }

    /// Mark every counted edge of `path` covered and remember the path.
    /// Returns the number of newly covered edges.
    pub fn accept(&mut self, path: &Path) -> usize {
        let before = self.visited_edges.len();
        self.visited_edges
            .extend(path.edges_of(self.criterion.step_class()));
        self.error_edges.extend(path.edges_of(StepClass::ErrorCall));
        self.visited_paths.insert(path.fingerprint());
        self.produced_paths.insert(path.fingerprint());

        let new_edges = self.visited_edges.len() - before;
        if new_edges > 0 {
            info!(
                "New coverage: {} new edges (total: {})",
                new_edges,
                self.visited_edges.len()
            );
        }
        new_edges
    }

    /// Whether any accepted path called the error function.
    pub fn error_reached(&self) -> bool {
        !self.error_edges.is_empty()
    }

    pub fn visited_edges(&self) -> &BTreeSet<EdgeId> {
        &self.visited_edges
    }

    pub fn visited_edge_count(&self) -> usize {
        self.visited_edges.len()
    }

    pub fn visited_path_count(&self) -> usize {
        self.visited_paths.len()
    }

    pub fn produced_path_count(&self) -> usize {
        self.produced_paths.len()
    }

    /// Forget everything. Used between independent runs.
    pub fn clear(&mut self) {
        self.visited_edges.clear();
        self.visited_paths.clear();
        self.produced_paths.clear();
        self.error_edges.clear();
    }
}
