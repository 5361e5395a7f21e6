//! Constraint sets submitted to a solver and the models it returns.

use crate::sort::IntType;
use crate::term::Predicate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A conjunction of predicates plus the sorts of the symbols they use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet {
    /// Conjuncts, in path order.
    pub constraints: Vec<Predicate>,
    /// Declared sort of every symbol that may appear.
    pub symbols: BTreeMap<String, IntType>,
    /// Preferred values (usually the ones the current path used).
    pub hints: BTreeMap<String, i128>,
}

impl ConstraintSet {
    pub fn new(constraints: Vec<Predicate>) -> Self {
        Self {
            constraints,
            ..Default::default()
        }
    }

    pub fn declare(&mut self, name: impl Into<String>, ty: IntType) {
        self.symbols.insert(name.into(), ty);
    }

    pub fn hint(&mut self, name: impl Into<String>, value: i128) {
        self.hints.insert(name.into(), value);
    }

    /// Symbols actually mentioned by the constraints.
    pub fn used_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for c in &self.constraints {
            c.collect_symbols(&mut out);
        }
        out
    }

    /// Sort of a symbol; undeclared symbols default to a 32-bit `int`.
    pub fn sort_of(&self, name: &str) -> IntType {
        self.symbols.get(name).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// A satisfying assignment. Values are bit-vector encodings: a 32-bit
/// signed `-1` is reported as `4294967295`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverModel {
    assignments: BTreeMap<String, u128>,
}

impl SolverModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, raw: u128) {
        self.assignments.insert(name.into(), raw);
    }

    pub fn get(&self, name: &str) -> Option<u128> {
        self.assignments.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u128)> {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl FromIterator<(String, u128)> for SolverModel {
    fn from_iter<I: IntoIterator<Item = (String, u128)>>(iter: I) -> Self {
        Self {
            assignments: iter.into_iter().collect(),
        }
    }
}
