//! Fatal errors. Anything recoverable is a value, not an error.

use crate::testcase::ExportError;
use pathflip_program::{ExecError, ProgramError, ShutdownReason};
use pathflip_solver::SolverError;
use thiserror::Error;

/// Errors that abort an exploration run.
#[derive(Error, Debug)]
pub enum ExploreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Program error: {0}")]
    Program(#[from] ProgramError),

    #[error("Execution error: {0}")]
    Exec(ExecError),

    #[error("Interrupted: {0}")]
    Interrupted(ShutdownReason),

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Test-case limit of {0} exceeded")]
    TestCaseLimit(usize),

    #[error("Test-case export failed: {0}")]
    Export(#[from] ExportError),
}
