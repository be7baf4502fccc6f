//! Opaque geometry values and the cell record fetched from the store.
//!
//! The simulation core never interprets geometry. It carries the value
//! returned by the store's select (WKT text on the Postgres backend) and
//! hands it back verbatim in proximity queries, exactly as the original
//! pipeline passed `block.geom` into its radius queries. Only the storage
//! backends ever look inside.

use serde::{Deserialize, Serialize};

use crate::ids::CellId;

/// Opaque geometry text for a cell.
///
/// On the Postgres backend this is WKT produced by `ST_AsText` and consumed
/// by `ST_GeomFromText`. The memory backend stores planar `POINT (x y)`
/// values it can parse back. The core treats the contents as a black box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry(pub String);

impl Geometry {
    /// Build a planar point geometry in WKT form.
    pub fn point(x: f64, y: f64) -> Self {
        Self(format!("POINT ({x} {y})"))
    }

    /// Borrow the geometry text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Geometry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cell as fetched from the source shape table: id plus geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Stable identifier from the shape table's key column.
    pub id: CellId,
    /// The cell's geometry, opaque to the core.
    pub geometry: Geometry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_renders_wkt() {
        assert_eq!(Geometry::point(3.0, -1.5).as_str(), "POINT (3 -1.5)");
    }
}
