//! Per-step simulation state and the run history.
//!
//! A [`SimulationState`] is a total mapping from every known cell to its
//! population label at one discrete time step. The map is BTree-backed so
//! iteration order is the cell-id order -- the migration engine depends on
//! that for seed-deterministic classification.
//!
//! [`IterationHistory`] is the append-only sequence of states, one per step
//! `0..=N`. Cells only move between states; per-label population counts are
//! conserved (see `enclave-model::verify`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::CellId;
use crate::label::Label;

/// Total mapping from cell id to population label at one time step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationState {
    cells: BTreeMap<CellId, Label>,
}

impl SimulationState {
    /// Create an empty state.
    pub const fn new() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }

    /// Set the label of a cell.
    pub fn set(&mut self, cell: CellId, label: Label) {
        self.cells.insert(cell, label);
    }

    /// The label of `cell`, or [`Label::EMPTY`] for cells the state does not
    /// know about. Neighbor lists may reference cells filtered out of the
    /// run; those count as empty rather than crashing classification.
    pub fn label(&self, cell: CellId) -> Label {
        self.cells.get(&cell).copied().unwrap_or(Label::EMPTY)
    }

    /// Number of cells in the state.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the state holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over `(cell, label)` pairs in ascending cell-id order.
    pub fn iter(&self) -> impl Iterator<Item = (CellId, Label)> + '_ {
        self.cells.iter().map(|(c, l)| (*c, *l))
    }

    /// Count of cells per non-empty label, keyed by label.
    ///
    /// This is the quantity the conservation law protects: the returned map
    /// must be identical between consecutive states of a run.
    pub fn population_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for label in self.cells.values() {
            if !label.is_empty() {
                let count: &mut usize = counts.entry(*label).or_insert(0);
                *count = count.saturating_add(1);
            }
        }
        counts
    }

    /// Number of empty cells.
    pub fn empty_count(&self) -> usize {
        self.cells.values().filter(|l| l.is_empty()).count()
    }
}

impl FromIterator<(CellId, Label)> for SimulationState {
    fn from_iter<T: IntoIterator<Item = (CellId, Label)>>(iter: T) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Append-only sequence of simulation states, one per time step.
#[derive(Debug, Clone, Default)]
pub struct IterationHistory {
    states: Vec<SimulationState>,
}

impl IterationHistory {
    /// Create an empty history.
    pub const fn new() -> Self {
        Self { states: Vec::new() }
    }

    /// Append the state for the next time step.
    pub fn push(&mut self, state: SimulationState) {
        self.states.push(state);
    }

    /// The most recent state, if any step has been recorded.
    pub fn last(&self) -> Option<&SimulationState> {
        self.states.last()
    }

    /// Number of recorded steps (seed state included).
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if no step has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The state at step `t`, if recorded.
    pub fn get(&self, t: usize) -> Option<&SimulationState> {
        self.states.get(t)
    }

    /// Iterate over all recorded states in step order.
    pub fn iter(&self) -> impl Iterator<Item = &SimulationState> {
        self.states.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(i64, u32)]) -> SimulationState {
        pairs
            .iter()
            .map(|&(c, l)| (CellId(c), Label(l)))
            .collect()
    }

    #[test]
    fn unknown_cells_read_as_empty() {
        let s = state(&[(1, 2)]);
        assert_eq!(s.label(CellId(1)), Label(2));
        assert_eq!(s.label(CellId(99)), Label::EMPTY);
    }

    #[test]
    fn population_counts_skip_empty() {
        let s = state(&[(1, 1), (2, 1), (3, 0), (4, 2)]);
        let counts = s.population_counts();
        assert_eq!(counts.get(&Label(1)), Some(&2));
        assert_eq!(counts.get(&Label(2)), Some(&1));
        assert_eq!(counts.get(&Label(0)), None);
        assert_eq!(s.empty_count(), 1);
    }

    #[test]
    fn history_is_append_only_in_order() {
        let mut h = IterationHistory::new();
        h.push(state(&[(1, 0)]));
        h.push(state(&[(1, 1)]));
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(0).map(|s| s.label(CellId(1))), Some(Label(0)));
        assert_eq!(h.last().map(|s| s.label(CellId(1))), Some(Label(1)));
    }
}
