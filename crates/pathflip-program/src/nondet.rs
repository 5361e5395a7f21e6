//! Nondeterministic input values and the per-attempt value context.
//!
//! Every attempt gets its own [`NondetContext`]. It is seeded with the
//! values the attempt should replay, hands them out in call order per
//! location, and records everything it returned so the attempt can be
//! exported as a test case.

use crate::location::NondetLocation;
use pathflip_solver::IntType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A concrete input value, already wrapped into its type's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(pub i128);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Values per call site, consumed in call order.
pub type ValuesMap = BTreeMap<NondetLocation, Vec<Value>>;

/// One value handed out by the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnedValue {
    pub location: NondetLocation,
    /// How many times this location had been hit before (0-based).
    pub occurrence: usize,
    pub value: Value,
    /// Whether the value came from the seeded map rather than the default.
    pub known: bool,
}

/// Value provider for one execution attempt.
#[derive(Debug, Clone, Default)]
pub struct NondetContext {
    known: ValuesMap,
    occurrences: BTreeMap<NondetLocation, usize>,
    history: Vec<ReturnedValue>,
}

impl NondetContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(values: ValuesMap) -> Self {
        let mut ctx = Self::new();
        ctx.set_known_values(values);
        ctx
    }

    /// Drop known values, occurrence counters and history.
    pub fn clear_known_values(&mut self) {
        self.known.clear();
        self.occurrences.clear();
        self.history.clear();
    }

    pub fn set_known_values(&mut self, values: ValuesMap) {
        self.known = values;
    }

    pub fn known_values(&self) -> &ValuesMap {
        &self.known
    }

    /// Next value for `location`. Unknown values default to `0`.
    ///
    /// Returns the value and its occurrence index at that location.
    pub fn next_value(&mut self, location: &NondetLocation, ty: IntType) -> (Value, usize) {
        let occurrence = {
            let counter = self.occurrences.entry(location.clone()).or_insert(0);
            let current = *counter;
            *counter += 1;
            current
        };

        let known = self
            .known
            .get(location)
            .and_then(|values| values.get(occurrence))
            .copied();
        let value = Value(ty.wrap(known.map(|v| v.0).unwrap_or(0)));

        self.history.push(ReturnedValue {
            location: location.clone(),
            occurrence,
            value,
            known: known.is_some(),
        });
        (value, occurrence)
    }

    /// Values returned so far, in call order.
    pub fn returned_value_history(&self) -> Vec<Value> {
        self.history.iter().map(|r| r.value).collect()
    }

    pub fn history(&self) -> &[ReturnedValue] {
        &self.history
    }
}
