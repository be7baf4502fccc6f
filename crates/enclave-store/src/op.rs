//! Store operation descriptors and typed row values.
//!
//! [`StoreOp`] is the full vocabulary the simulation core speaks to the
//! store: table lifecycle, row movement, proximity queries, and raw
//! maintenance. Backends translate these into SQL (Postgres) or in-process
//! mutations (memory); the core never sees a dialect.

use enclave_types::{CellId, Geometry};
use serde::{Deserialize, Serialize};

/// Column type tags used in DDL and to decode select results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit integer (cell ids, step numbers).
    BigInt,
    /// 32-bit integer (population labels).
    Integer,
    /// Double-precision float (distances).
    Double,
    /// Unbounded text.
    Text,
    /// Spatial geometry; selected as WKT text, bound via geometry casts.
    Geometry,
}

/// A column in a table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Column type tag.
    pub ty: ColumnType,
}

impl ColumnSpec {
    /// Convenience constructor.
    pub fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_owned(),
            ty,
        }
    }
}

/// A single typed value flowing to or from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Text.
    Text(String),
    /// SQL NULL.
    Null,
}

impl SqlValue {
    /// The value as an integer, if it is one.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a float; integers widen.
    // Ids and counts are bounded; safe to represent as f64.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// One result row: values in the order of the requested columns.
pub type Row = Vec<SqlValue>;

/// Describes a select: which columns from which table, with optional raw
/// filter and ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectDescriptor {
    /// Table to read.
    pub table: String,
    /// Columns to fetch, with the types to decode them as.
    pub columns: Vec<ColumnSpec>,
    /// Optional raw `WHERE` clause (without the keyword).
    pub where_clause: Option<String>,
    /// Optional raw `ORDER BY` clause (without the keywords).
    pub order_by: Option<String>,
}

/// Describes an update: bound assignments plus a raw `WHERE` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    /// Table to update.
    pub table: String,
    /// `(column, value)` assignments; values are bound, not interpolated.
    pub assignments: Vec<(String, SqlValue)>,
    /// Optional raw `WHERE` clause (without the keyword).
    pub where_clause: Option<String>,
}

/// An operation dispatched to the store.
///
/// Every variant is asynchronous: dispatch returns a correlation token
/// immediately and the result arrives later on the completion channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreOp {
    /// Drop a table if it exists.
    DropTable {
        /// Table name.
        name: String,
    },
    /// Create a table from column specs with a composite primary key.
    CreateTable {
        /// Table name.
        name: String,
        /// Column definitions.
        columns: Vec<ColumnSpec>,
        /// Primary-key column names (empty for no key).
        primary_key: Vec<String>,
        /// Skip creation when the table already exists.
        if_not_exists: bool,
    },
    /// Create a table as a copy of selected columns (rows included).
    CopyTable {
        /// New table name.
        name: String,
        /// Source select the copy is built from.
        source: SelectDescriptor,
    },
    /// Add columns to an existing table.
    AlterAddColumns {
        /// Table name.
        name: String,
        /// Columns to add.
        columns: Vec<ColumnSpec>,
        /// Primary-key constraint to add afterwards (empty for none).
        primary_key: Vec<String>,
    },
    /// Update rows per a descriptor.
    UpdateRows {
        /// The update descriptor.
        descriptor: UpdateDescriptor,
    },
    /// Insert rows (multi-row values; callers chunk large batches).
    InsertRows {
        /// Target table.
        table: String,
        /// Column names, matching each row's value order.
        columns: Vec<String>,
        /// Rows to insert.
        rows: Vec<Row>,
    },
    /// Select rows per a descriptor.
    SelectRows {
        /// The select descriptor.
        descriptor: SelectDescriptor,
    },
    /// Find cells within `radius` of a geometry.
    ProximityQuery {
        /// Table holding the candidate cells.
        table: String,
        /// Name of the id column.
        id_column: String,
        /// Name of the geometry column.
        geometry_column: String,
        /// The cell the probe geometry belongs to; excluded from the hits.
        origin: CellId,
        /// Probe geometry.
        geometry: Geometry,
        /// Search radius in the store's distance units.
        radius: f64,
        /// Optional raw attribute filter ANDed onto the predicate.
        filter: Option<String>,
    },
    /// Raw maintenance statement (e.g. `VACUUM`).
    RawMaintenance {
        /// The statement to run verbatim.
        statement: String,
    },
}

impl StoreOp {
    /// Short human-readable summary for logs and failure diagnostics.
    pub fn summary(&self) -> String {
        match self {
            Self::DropTable { name } => format!("drop table {name}"),
            Self::CreateTable { name, columns, .. } => {
                format!("create table {name} ({} columns)", columns.len())
            }
            Self::CopyTable { name, source } => {
                format!("copy table {} -> {name}", source.table)
            }
            Self::AlterAddColumns { name, columns, .. } => {
                format!("alter table {name} add {} columns", columns.len())
            }
            Self::UpdateRows { descriptor } => format!("update {}", descriptor.table),
            Self::InsertRows { table, rows, .. } => {
                format!("insert {} rows into {table}", rows.len())
            }
            Self::SelectRows { descriptor } => format!("select from {}", descriptor.table),
            Self::ProximityQuery { origin, radius, .. } => {
                format!("proximity cell={origin} radius={radius}")
            }
            Self::RawMaintenance { statement } => format!("maintenance `{statement}`"),
        }
    }
}

/// One cell matched by a proximity query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighborHit {
    /// The matched cell.
    pub id: CellId,
    /// Distance from the probe geometry.
    pub distance: f64,
}

/// The result payload of a completed store operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreValue {
    /// The operation produced no rows (DDL, inserts, updates, maintenance).
    Unit,
    /// Ordered rows from a select.
    Rows(Vec<Row>),
    /// Hits from a proximity query.
    Neighbors(Vec<NeighborHit>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_value_accessors() {
        assert_eq!(SqlValue::Int(7).as_i64(), Some(7));
        assert_eq!(SqlValue::Int(7).as_f64(), Some(7.0));
        assert_eq!(SqlValue::Text("x".to_owned()).as_text(), Some("x"));
        assert_eq!(SqlValue::Null.as_i64(), None);
    }

    #[test]
    fn summaries_name_the_target() {
        let op = StoreOp::DropTable {
            name: "schelling".to_owned(),
        };
        assert_eq!(op.summary(), "drop table schelling");

        let op = StoreOp::ProximityQuery {
            table: "blocks".to_owned(),
            id_column: "gid".to_owned(),
            geometry_column: "geom".to_owned(),
            origin: CellId(5),
            geometry: Geometry::point(0.0, 0.0),
            radius: 1000.0,
            filter: None,
        };
        assert!(op.summary().contains("cell=5"));
    }
}
