//! Programs under test and the analyses that run them.
//!
//! - [`program`] — control-flow graph with assume, assign, nondet and call edges
//! - [`location`] — source locations of nondet call sites
//! - [`nondet`] — per-attempt value context and value history
//! - [`state`] / [`frontier`] — execution states and the reached-state list
//! - [`interpreter`] — [`SymbolicExecutor`] and [`ConcreteExecutor`]
//! - [`shutdown`] — cooperative cancellation

pub mod algorithm;
pub mod frontier;
pub mod interpreter;
pub mod location;
pub mod nondet;
pub mod program;
pub mod shutdown;
pub mod state;

pub use algorithm::{AlgorithmStatus, ExecError, ExecutionAlgorithm};
pub use frontier::Frontier;
pub use interpreter::{ConcreteExecutor, SymbolicExecutor, DEFAULT_MAX_STEPS};
pub use location::NondetLocation;
pub use nondet::{NondetContext, Value, ValuesMap};
pub use program::{EdgeId, NodeId, Program, ProgramBuilder, ProgramError};
pub use shutdown::{ShutdownNotifier, ShutdownReason};
pub use state::{ConstraintState, ExecState, SymbolInfo};
