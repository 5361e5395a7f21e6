//! Path records: the unit of work in the worklist.

use crate::path::Path;
use pathflip_program::ValuesMap;
use pathflip_solver::SolverModel;

/// A snapshot of one exploration attempt.
///
/// Records do not change once built. A new score is a new record
/// ([`ConcolicInput::rescored`]), and expansion produces children.
#[derive(Debug, Clone)]
pub struct ConcolicInput {
    values: ValuesMap,
    model: Option<SolverModel>,
    executed_path: Option<Path>,
    bound: usize,
    score: usize,
    is_new_path: bool,
    is_initial: bool,
}

impl ConcolicInput {
    /// The root record: no values, no model, not yet executed.
    pub fn initial() -> Self {
        Self {
            values: ValuesMap::new(),
            model: None,
            executed_path: None,
            bound: 0,
            score: 0,
            is_new_path: true,
            is_initial: true,
        }
    }

    /// A record produced by flipping constraint `bound` of a parent path.
    pub fn child(
        values: ValuesMap,
        model: SolverModel,
        path: Path,
        bound: usize,
        score: usize,
        is_new_path: bool,
    ) -> Self {
        Self {
            values,
            model: Some(model),
            executed_path: Some(path),
            bound,
            score,
            is_new_path,
            is_initial: false,
        }
    }

    /// Same record with its path attached (used for the root).
    pub fn executed(self, path: Path, score: usize, is_new_path: bool) -> Self {
        Self {
            executed_path: Some(path),
            score,
            is_new_path,
            ..self
        }
    }

    pub fn rescored(self, score: usize) -> Self {
        Self { score, ..self }
    }

    pub fn values(&self) -> &ValuesMap {
        &self.values
    }

    pub fn model(&self) -> Option<&SolverModel> {
        self.model.as_ref()
    }

    pub fn executed_path(&self) -> Option<&Path> {
        self.executed_path.as_ref()
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn is_new_path(&self) -> bool {
        self.is_new_path
    }

    pub fn is_initial(&self) -> bool {
        self.is_initial
    }

    /// Selection key: higher score first, then deeper bound.
    pub fn priority(&self) -> (usize, usize) {
        (self.score, self.bound)
    }
}
