//! Constraint solving for pathflip.
//!
//! This crate defines the symbolic vocabulary shared by the interpreters
//! and the exploration engine:
//!
//! - [`term`] — integer terms and boolean predicates over named symbols
//! - [`sort`] — fixed-width integer types and their bit-vector encoding
//! - [`constraint`] — constraint sets and solver models
//! - [`solver`] — the [`Solver`] trait and [`CandidateSolver`]
//! - `z3_solver` — `Z3Solver`, behind the `z3` feature
//!
//! Models report bit-vector encodings, the way SMT solvers report
//! `(_ BitVec 32)` values; decoding into a signed range is the caller's job.

pub mod constraint;
pub mod solver;
pub mod sort;
pub mod term;
#[cfg(feature = "z3")]
pub mod z3_solver;

pub use constraint::{ConstraintSet, SolverModel};
pub use solver::{CandidateSolver, Solver, SolverError, SolverVerdict};
pub use sort::IntType;
pub use term::{CmpOp, Predicate, Term};
#[cfg(feature = "z3")]
pub use z3_solver::Z3Solver;
