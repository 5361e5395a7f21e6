//! The contract between the exploration engine and an execution algorithm.

use crate::frontier::Frontier;
use crate::nondet::NondetContext;
use crate::program::{EdgeId, NodeId};
use crate::shutdown::ShutdownReason;
use crate::state::ExecState;
use thiserror::Error;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmStatus {
    /// The path ran to an exit, an error call, or a blocked branch.
    SoundAndPrecise,
    /// The run stopped before reaching a decision (step limit).
    NoPropertyChecked,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("interrupted: {0}")]
    Interrupted(ShutdownReason),

    #[error("unexpected state: {0}")]
    UnexpectedState(String),

    #[error("edge {0} does not exist")]
    UnknownEdge(EdgeId),

    #[error("variable `{name}` has no value at {node}")]
    UnknownVariable { name: String, node: NodeId },
}

/// An analysis that extends a frontier from its root state.
pub trait ExecutionAlgorithm {
    /// Root state suitable for [`ExecutionAlgorithm::run`].
    fn initial_state(&self) -> ExecState;

    /// Run from the last state of `frontier`, drawing nondet values from `ctx`.
    fn run(
        &mut self,
        frontier: &mut Frontier,
        ctx: &mut NondetContext,
    ) -> Result<AlgorithmStatus, ExecError>;
}
