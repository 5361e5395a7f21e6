//! Execution states.
//!
//! A full state has a location, concrete variable values, a call stack and
//! a symbolic component. Concrete replay uses the reduced form with no
//! symbolic component.

use crate::location::NondetLocation;
use crate::program::NodeId;
use pathflip_solver::{ConstraintSet, IntType, Predicate, Term};
use std::collections::BTreeMap;

/// The nondet call that introduced a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub location: NondetLocation,
    /// Occurrence index of the call at `location` (0-based).
    pub occurrence: usize,
    pub ty: IntType,
}

/// Path constraints collected along one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintState {
    constraints: Vec<Predicate>,
    symbols: BTreeMap<String, SymbolInfo>,
    /// Concrete value each symbol took on this path.
    hints: BTreeMap<String, i128>,
}

impl ConstraintState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constraints(&self) -> &[Predicate] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn push_constraint(&mut self, predicate: Predicate) {
        self.constraints.push(predicate);
    }

    pub fn declare_symbol(&mut self, name: impl Into<String>, info: SymbolInfo, concrete: i128) {
        let name = name.into();
        self.hints.insert(name.clone(), concrete);
        self.symbols.insert(name, info);
    }

    pub fn symbol(&self, name: &str) -> Option<&SymbolInfo> {
        self.symbols.get(name)
    }

    pub fn symbols(&self) -> &BTreeMap<String, SymbolInfo> {
        &self.symbols
    }

    /// Solver query for `constraints` over this state's symbols.
    pub fn to_constraint_set(&self, constraints: Vec<Predicate>) -> ConstraintSet {
        let mut set = ConstraintSet::new(constraints);
        for (name, info) in &self.symbols {
            set.declare(name.clone(), info.ty);
        }
        for (name, value) in &self.hints {
            set.hint(name.clone(), *value);
        }
        set
    }

    /// `C[0..index) + [!C[index]]`, or `None` if `index` is out of range.
    pub fn flipped(&self, index: usize) -> Option<Vec<Predicate>> {
        let target = self.constraints.get(index)?;
        let mut out = self.constraints[..index].to_vec();
        out.push(target.negate());
        Some(out)
    }
}

/// Symbolic part of a full execution state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolicComponent {
    /// Symbolic value of every variable that depends on nondet input.
    pub store: BTreeMap<String, Term>,
    pub constraints: ConstraintState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecState {
    pub location: NodeId,
    pub values: BTreeMap<String, i128>,
    /// Return nodes of the active calls, innermost last.
    pub call_stack: Vec<NodeId>,
    pub symbolic: Option<SymbolicComponent>,
}

impl ExecState {
    /// Full state, including an empty symbolic component.
    pub fn symbolic(location: NodeId, values: BTreeMap<String, i128>) -> Self {
        Self {
            location,
            values,
            call_stack: Vec::new(),
            symbolic: Some(SymbolicComponent::default()),
        }
    }

    /// Reduced state for concrete replay.
    pub fn concrete(location: NodeId, values: BTreeMap<String, i128>) -> Self {
        Self {
            location,
            values,
            call_stack: Vec::new(),
            symbolic: None,
        }
    }

    pub fn constraint_state(&self) -> Option<&ConstraintState> {
        self.symbolic.as_ref().map(|s| &s.constraints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathflip_solver::CmpOp;

    fn state_with_two_constraints() -> ConstraintState {
        let mut state = ConstraintState::new();
        let info = SymbolInfo {
            location: NondetLocation::new("a.c", 1, 1, 10),
            occurrence: 0,
            ty: IntType::INT,
        };
        state.declare_symbol("x@a.c:1:1-10#0", info, 5);
        let x = Term::symbol("x@a.c:1:1-10#0");
        state.push_constraint(Predicate::cmp(CmpOp::Gt, x.clone(), Term::Const(0)));
        state.push_constraint(Predicate::cmp(CmpOp::Lt, x, Term::Const(10)));
        state
    }

    #[test]
    fn test_flipped_drops_suffix() {
        let state = state_with_two_constraints();

        let first = state.flipped(0).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0], state.constraints()[0].negate());

        let second = state.flipped(1).unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0], state.constraints()[0]);
        assert_eq!(second[1], state.constraints()[1].negate());

        assert!(state.flipped(2).is_none());
    }

    #[test]
    fn test_constraint_set_carries_sorts_and_hints() {
        let state = state_with_two_constraints();
        let set = state.to_constraint_set(state.flipped(0).unwrap());
        assert_eq!(set.sort_of("x@a.c:1:1-10#0"), IntType::INT);
        assert_eq!(set.hints.get("x@a.c:1:1-10#0"), Some(&5));
    }

    #[test]
    fn test_reduced_state_has_no_constraints() {
        let state = ExecState::concrete(NodeId(0), BTreeMap::new());
        assert!(state.constraint_state().is_none());
        let full = ExecState::symbolic(NodeId(0), BTreeMap::new());
        assert!(full.constraint_state().unwrap().is_empty());
    }
}
