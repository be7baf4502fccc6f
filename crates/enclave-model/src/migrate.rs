//! One migration step of the Schelling model.
//!
//! Classification reads only `last` (the previous state), so results do not
//! depend on the order cells are processed in -- but the order still matters
//! for reproducibility of the placement draws, so everything walks cells in
//! ascending id order.
//!
//! `tolerance` is the maximum fraction of unlike neighbors (different label
//! or empty) a population accepts. At `tolerance = 1.0` every cell with at
//! least one neighbor is satisfied and migration is effectively disabled;
//! at `tolerance = 0.0` only perfectly homogeneous neighborhoods stay put.

use rand::Rng;

use enclave_types::{CellId, Label, NeighborGraph, SimulationState};

use crate::sampler::PoolSampler;

/// The result of one migration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// The produced state, total over the same cell set as the input.
    pub next: SimulationState,
    /// Number of populations that were dissatisfied and relocated.
    pub moved: usize,
    /// Number of occupied cells with zero neighbors (classified as
    /// satisfied by convention and reported with a warning).
    pub isolated: usize,
}

impl MigrationOutcome {
    /// `true` when nobody wanted to move -- the model has settled.
    pub const fn is_settled(&self) -> bool {
        self.moved == 0
    }
}

/// Run one Schelling step over `last`.
///
/// Every cell of `last` appears in the returned state: satisfied
/// populations stay, dissatisfied ones vacate their cell and are placed
/// uniformly without replacement into the pool of empty cells (original
/// empties plus freshly vacated ones), and whatever the pool has left over
/// becomes empty. Identical inputs and RNG state produce bit-identical
/// output.
pub fn step<R: Rng>(
    last: &SimulationState,
    neighbors: &NeighborGraph,
    tolerance: f64,
    rng: &mut R,
) -> MigrationOutcome {
    let mut next = SimulationState::new();
    let mut empty_pool: Vec<CellId> = Vec::new();
    let mut movers: Vec<Label> = Vec::new();
    let mut isolated = 0usize;

    for (cell, label) in last.iter() {
        if label.is_empty() {
            empty_pool.push(cell);
            continue;
        }

        let neigh = neighbors.neighbors(cell);
        if neigh.is_empty() {
            // Zero neighbors: the like fraction is undefined. Convention:
            // the population stays. Dividing would be a crash, not a model.
            tracing::warn!(cell = %cell, "occupied cell has no neighbors, keeping it in place");
            isolated = isolated.saturating_add(1);
            next.set(cell, label);
            continue;
        }

        let same = neigh.iter().filter(|&&n| last.label(n) == label).count();
        // Both values are bounded; safe to represent as f64.
        #[allow(clippy::cast_precision_loss)]
        let like_fraction = (same as f64) / (neigh.len() as f64);
        let unlike_fraction = 1.0 - like_fraction;

        if unlike_fraction <= tolerance {
            next.set(cell, label);
        } else {
            movers.push(label);
            empty_pool.push(cell);
        }
    }

    let moved = movers.len();
    let mut pool = PoolSampler::new(empty_pool);
    for label in movers {
        match pool.draw(rng) {
            Some(cell) => next.set(cell, label),
            // Cannot happen: every mover vacated a cell into the pool.
            None => tracing::error!(%label, "placement pool exhausted, population lost"),
        }
    }
    for cell in pool.into_remaining() {
        next.set(cell, Label::EMPTY);
    }

    MigrationOutcome {
        next,
        moved,
        isolated,
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;
    use crate::verify::{verify_conservation, ConservationResult};

    const A: Label = Label(1);
    const B: Label = Label(2);

    fn state(pairs: &[(i64, Label)]) -> SimulationState {
        pairs.iter().map(|&(c, l)| (CellId(c), l)).collect()
    }

    fn line_graph(edges: &[(i64, i64)]) -> NeighborGraph {
        let mut graph = NeighborGraph::new();
        for &(a, b) in edges {
            graph.insert(CellId(a), CellId(b));
        }
        graph.symmetrize();
        graph
    }

    /// The reference scenario: cells {1:A, 2:A, 3:empty, 4:B}, chain graph
    /// 1-2-3-4, tolerance 0.5. Cells 1 and 2 stay; B at cell 4 sees only
    /// unlike neighbors and moves into one of {3, 4}.
    #[test]
    fn four_cell_reference_scenario() {
        let last = state(&[(1, A), (2, A), (3, Label::EMPTY), (4, B)]);
        let graph = line_graph(&[(1, 2), (2, 3), (3, 4)]);

        for seed in 0..16 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let outcome = step(&last, &graph, 0.5, &mut rng);

            assert_eq!(outcome.moved, 1);
            assert_eq!(outcome.next.label(CellId(1)), A);
            assert_eq!(outcome.next.label(CellId(2)), A);

            let b_at_3 = outcome.next.label(CellId(3)) == B;
            let b_at_4 = outcome.next.label(CellId(4)) == B;
            assert!(b_at_3 ^ b_at_4, "B must land in exactly one of {{3, 4}}");
            if b_at_3 {
                assert_eq!(outcome.next.label(CellId(4)), Label::EMPTY);
            } else {
                assert_eq!(outcome.next.label(CellId(3)), Label::EMPTY);
            }
        }
    }

    #[test]
    fn full_tolerance_disables_migration() {
        let last = state(&[(1, A), (2, B), (3, A), (4, B), (5, Label::EMPTY)]);
        let graph = line_graph(&[(1, 2), (2, 3), (3, 4), (4, 5)]);
        let mut rng = SmallRng::seed_from_u64(7);
        let outcome = step(&last, &graph, 1.0, &mut rng);
        assert_eq!(outcome.moved, 0);
        assert!(outcome.is_settled());
        assert_eq!(outcome.next, last);
    }

    #[test]
    fn zero_tolerance_moves_every_mixed_neighborhood() {
        // 1:A-2:B: each sees only the other, both fully unlike.
        let last = state(&[(1, A), (2, B), (3, Label::EMPTY)]);
        let graph = line_graph(&[(1, 2), (2, 3), (3, 1)]);
        let mut rng = SmallRng::seed_from_u64(1);
        let outcome = step(&last, &graph, 0.0, &mut rng);
        assert_eq!(outcome.moved, 2);
    }

    #[test]
    fn isolated_cells_stay_with_a_warning_count() {
        let last = state(&[(1, A), (2, B)]);
        // Only cell 2 has an entry; cell 1 is absent from the graph.
        let graph = line_graph(&[(2, 2)]);
        let mut rng = SmallRng::seed_from_u64(5);
        let outcome = step(&last, &graph, 0.0, &mut rng);
        assert_eq!(outcome.isolated, 1);
        assert_eq!(outcome.next.label(CellId(1)), A);
    }

    #[test]
    fn empty_neighbors_count_as_unlike() {
        // Cell 1:A with neighbors {2:A, 3:empty}: like fraction 1/2.
        let last = state(&[(1, A), (2, A), (3, Label::EMPTY)]);
        let graph = line_graph(&[(1, 2), (1, 3)]);
        // tolerance 0.5 accepts exactly half unlike -- cell 1 stays.
        let mut rng = SmallRng::seed_from_u64(2);
        let outcome = step(&last, &graph, 0.5, &mut rng);
        assert_eq!(outcome.moved, 0);
        assert_eq!(outcome.next.label(CellId(1)), A);
        // tolerance 0.4 does not -- cell 1 is dissatisfied.
        let mut rng = SmallRng::seed_from_u64(2);
        let outcome = step(&last, &graph, 0.4, &mut rng);
        assert_eq!(outcome.moved, 1);
    }

    #[test]
    fn population_is_conserved_across_steps() {
        let last = state(&[
            (1, A),
            (2, B),
            (3, A),
            (4, Label::EMPTY),
            (5, B),
            (6, A),
            (7, Label::EMPTY),
            (8, B),
        ]);
        let graph = line_graph(&[(1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 7), (7, 8)]);
        let mut current = last;
        let mut rng = SmallRng::seed_from_u64(99);
        for _ in 0..10 {
            let outcome = step(&current, &graph, 0.3, &mut rng);
            assert_eq!(
                verify_conservation(&current, &outcome.next),
                ConservationResult::Balanced
            );
            assert_eq!(outcome.next.len(), current.len());
            current = outcome.next;
        }
    }

    #[test]
    fn identical_seed_gives_bit_identical_next_state() {
        let last = state(&[
            (1, A),
            (2, B),
            (3, Label::EMPTY),
            (4, B),
            (5, A),
            (6, Label::EMPTY),
        ]);
        let graph = line_graph(&[(1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 1)]);
        let run = |seed: u64| {
            let mut rng = SmallRng::seed_from_u64(seed);
            step(&last, &graph, 0.2, &mut rng)
        };
        assert_eq!(run(1234), run(1234));
    }
}
