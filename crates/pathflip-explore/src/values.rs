//! Mapping solver models back to nondet call sites, and merging the
//! result with a parent's values.

use log::warn;
use pathflip_program::{ConstraintState, NondetLocation, Value, ValuesMap};
use pathflip_solver::SolverModel;
use std::collections::BTreeMap;

/// Model values per location, keyed by occurrence index.
pub type ModelValues = BTreeMap<NondetLocation, BTreeMap<usize, Value>>;

/// Resolve every model variable to the nondet call that introduced it.
///
/// Raw bit-vector values are decoded into the call's type, so a 32-bit
/// signed `4294967295` becomes `-1`. Variables with no known call site are
/// skipped with a warning.
pub fn values_from_model(model: &SolverModel, constraints: &ConstraintState) -> ModelValues {
    let mut out = ModelValues::new();
    for (name, raw) in model.iter() {
        let Some(info) = constraints.symbol(name) else {
            warn!("Model variable {} has no nondet call site, skipping", name);
            continue;
        };
        out.entry(info.location.clone())
            .or_default()
            .insert(info.occurrence, Value(info.ty.decode(*raw)));
    }
    out
}

/// Child values: the parent's values with the model's values written over
/// them at their occurrence indices.
///
/// Locations the model does not mention are inherited unchanged. Gaps
/// before a model occurrence are filled with `0`, the value the context
/// would have returned anyway.
pub fn merge(model: &ModelValues, parent: &ValuesMap) -> ValuesMap {
    let mut merged = parent.clone();
    for (location, occurrences) in model {
        let sequence = merged.entry(location.clone()).or_default();
        for (&occurrence, &value) in occurrences {
            if sequence.len() <= occurrence {
                sequence.resize(occurrence + 1, Value(0));
            }
            sequence[occurrence] = value;
        }
    }
    merged
}
