//! The neighbor graph: which cells sit within the configured radius of
//! which.
//!
//! Built once per run by the neighbor graph builder (or loaded from the
//! persisted side table) and immutable afterwards. A per-cell radius query
//! computed independently for each cell does not guarantee a symmetric
//! relation -- boundary effects, filters, and geometry quirks can make A see
//! B without B seeing A -- so the builder calls [`NeighborGraph::symmetrize`]
//! before installing the graph. The migration engine's classification is
//! sensitive to asymmetry, which is why this is explicit rather than
//! assumed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::CellId;

/// Mapping from cell id to its ordered list of neighbor cell ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborGraph {
    edges: BTreeMap<CellId, Vec<CellId>>,
}

impl NeighborGraph {
    /// Create an empty graph.
    pub const fn new() -> Self {
        Self {
            edges: BTreeMap::new(),
        }
    }

    /// Record that `neighbor` is within radius of `cell`.
    ///
    /// Duplicates are tolerated here and removed by [`Self::symmetrize`].
    pub fn insert(&mut self, cell: CellId, neighbor: CellId) {
        self.edges.entry(cell).or_default().push(neighbor);
    }

    /// Ensure `cell` has an entry even if its radius query matched nothing.
    ///
    /// Isolated cells must still appear so the migration engine can classify
    /// them (satisfied by convention) instead of silently skipping them.
    pub fn insert_isolated(&mut self, cell: CellId) {
        self.edges.entry(cell).or_default();
    }

    /// The neighbors of `cell`, empty for unknown or isolated cells.
    pub fn neighbors(&self, cell: CellId) -> &[CellId] {
        self.edges.get(&cell).map_or(&[], Vec::as_slice)
    }

    /// Number of cells with an entry in the graph.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if the graph has no entries.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Total number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Make the neighbor relation symmetric: whenever A lists B, B lists A.
    ///
    /// Also sorts every neighbor list and removes duplicates, so lookups and
    /// iteration are deterministic regardless of the order in which the
    /// asynchronous proximity results arrived.
    pub fn symmetrize(&mut self) {
        let mut missing: Vec<(CellId, CellId)> = Vec::new();
        for (&cell, neighbors) in &self.edges {
            for &n in neighbors {
                let back = self.edges.get(&n).is_some_and(|list| list.contains(&cell));
                if !back {
                    missing.push((n, cell));
                }
            }
        }
        for (cell, neighbor) in missing {
            self.edges.entry(cell).or_default().push(neighbor);
        }
        for neighbors in self.edges.values_mut() {
            neighbors.sort_unstable();
            neighbors.dedup();
        }
    }

    /// Iterate over `(cell, neighbors)` entries in ascending cell-id order.
    pub fn iter(&self) -> impl Iterator<Item = (CellId, &[CellId])> {
        self.edges.iter().map(|(c, ns)| (*c, ns.as_slice()))
    }
}
