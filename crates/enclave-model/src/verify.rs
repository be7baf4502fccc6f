//! Conservation law verification between consecutive states.
//!
//! Migration redistributes populations; it never creates or destroys them.
//! For every non-empty label the cell count must therefore be identical
//! between a state and its successor. The check is guaranteed by
//! construction of the migration step -- it exists as defense-in-depth
//! against future bugs, and a violation is the run's most critical
//! integrity alert.

use std::collections::BTreeSet;

use enclave_types::{Label, SimulationState};

/// A detected conservation violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConservationAnomaly {
    /// The label whose count changed.
    pub label: Label,
    /// Count in the earlier state.
    pub before: usize,
    /// Count in the later state.
    pub after: usize,
}

/// The result of a conservation check between two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConservationResult {
    /// All per-label counts match.
    Balanced,
    /// At least one label's count changed; the first mismatch in label
    /// order is reported.
    Anomaly(ConservationAnomaly),
}

/// Compare per-label population counts of two consecutive states.
pub fn verify_conservation(
    before: &SimulationState,
    after: &SimulationState,
) -> ConservationResult {
    let counts_before = before.population_counts();
    let counts_after = after.population_counts();

    let labels: BTreeSet<Label> = counts_before
        .keys()
        .chain(counts_after.keys())
        .copied()
        .collect();

    for label in labels {
        let b = counts_before.get(&label).copied().unwrap_or(0);
        let a = counts_after.get(&label).copied().unwrap_or(0);
        if b != a {
            return ConservationResult::Anomaly(ConservationAnomaly {
                label,
                before: b,
                after: a,
            });
        }
    }
    ConservationResult::Balanced
}
