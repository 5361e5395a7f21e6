//! The states reached by one run, starting from a single root.
//!
//! The frontier is reused across attempts: [`Frontier::reset`] drops every
//! state attached after the root instead of rebuilding it.

use crate::program::EdgeId;
use crate::state::ExecState;

#[derive(Debug, Clone)]
pub struct Frontier {
    states: Vec<ExecState>,
    edges: Vec<EdgeId>,
}

impl Frontier {
    pub fn new(root: ExecState) -> Self {
        Self {
            states: vec![root],
            edges: Vec::new(),
        }
    }

    /// Discard everything but the root state.
    pub fn reset(&mut self) {
        self.states.truncate(1);
        self.edges.clear();
    }

    /// Attach `state`, reached from the last state over `edge`.
    pub fn push(&mut self, edge: EdgeId, state: ExecState) {
        self.edges.push(edge);
        self.states.push(state);
    }

    pub fn root(&self) -> &ExecState {
        &self.states[0]
    }

    /// Last state reached.
    pub fn last(&self) -> &ExecState {
        // states always holds at least the root
        &self.states[self.states.len() - 1]
    }

    pub fn states(&self) -> &[ExecState] {
        &self.states
    }

    /// Edges taken, in order.
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Whether nothing was attached after the root.
    pub fn is_fresh(&self) -> bool {
        self.edges.is_empty()
    }
}
