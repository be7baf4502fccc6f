//! Type-safe identifier for simulation cells.
//!
//! Cells come from the spatial store's shape table, which keys them by a
//! stable integer column (`gid` in the default configuration). The newtype
//! prevents accidental mixing with other integers (step numbers, row counts)
//! at compile time.

use serde::{Deserialize, Serialize};

/// Stable identifier of a spatial cell.
///
/// Wraps the integer primary key of the source shape table. Ordering follows
/// the integer ordering, which the simulation relies on for deterministic
/// iteration over cell sets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct CellId(pub i64);

impl CellId {
    /// Return the inner integer value.
    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for CellId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CellId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<CellId> for i64 {
    fn from(id: CellId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_inner_value() {
        let mut ids = vec![CellId(9), CellId(1), CellId(4)];
        ids.sort();
        assert_eq!(ids, vec![CellId(1), CellId(4), CellId(9)]);
    }

    #[test]
    fn display_matches_inner() {
        assert_eq!(CellId(42).to_string(), "42");
    }
}
