//! Execution paths as seen by the coverage tracker and the flipper.

use pathflip_program::{ConstraintState, EdgeId, Program};

/// What kind of edge a step took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepClass {
    Assume,
    ErrorCall,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub edge: EdgeId,
    pub class: StepClass,
}

/// One full execution trace plus the constraints collected along it.
#[derive(Debug, Clone)]
pub struct Path {
    steps: Vec<PathStep>,
    constraints: ConstraintState,
    /// `false` when the run stopped before reaching a decision, so the
    /// trace is not claimed to be the full feasible path.
    sound: bool,
}

impl Path {
    pub fn new(program: &Program, edges: &[EdgeId], constraints: ConstraintState, sound: bool) -> Self {
        let steps = edges
            .iter()
            .map(|&edge| PathStep {
                edge,
                class: if program.is_assume(edge) {
                    StepClass::Assume
                } else if program.is_error_call(edge) {
                    StepClass::ErrorCall
                } else {
                    StepClass::Other
                },
            })
            .collect();
        Self {
            steps,
            constraints,
            sound,
        }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Full edge sequence; two paths are duplicates iff these are equal.
    pub fn fingerprint(&self) -> Vec<EdgeId> {
        self.steps.iter().map(|s| s.edge).collect()
    }

    pub fn edges_of(&self, class: StepClass) -> impl Iterator<Item = EdgeId> + '_ {
        self.steps
            .iter()
            .filter(move |s| s.class == class)
            .map(|s| s.edge)
    }

    pub fn constraints(&self) -> &ConstraintState {
        &self.constraints
    }

    pub fn is_sound(&self) -> bool {
        self.sound
    }

    pub fn reaches_error(&self) -> bool {
        self.steps.iter().any(|s| s.class == StepClass::ErrorCall)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
