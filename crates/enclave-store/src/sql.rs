//! Runtime SQL rendering for the Postgres backend.
//!
//! Queries are built at runtime (no live database needed at compile time).
//! Values flow through bind parameters; identifiers (table and column names)
//! are interpolated and therefore validated against [`valid_identifier`]
//! when configuration is loaded. Geometry columns are selected as WKT via
//! `ST_AsText` and bound back through `ST_GeomFromText`, so geometry stays
//! opaque text everywhere outside the database.

use crate::op::{ColumnSpec, ColumnType, SelectDescriptor, SqlValue, StoreOp};

/// A rendered statement plus its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    /// The SQL text with `$n` placeholders.
    pub sql: String,
    /// Values for `$1..$n`.
    pub binds: Vec<SqlValue>,
}

impl RenderedQuery {
    fn plain(sql: String) -> Self {
        Self {
            sql,
            binds: Vec::new(),
        }
    }
}

/// Returns `true` when `name` is safe to interpolate as an identifier:
/// ASCII alphanumerics and underscores, not starting with a digit.
pub fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

const fn type_name(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::BigInt => "BIGINT",
        ColumnType::Integer => "INTEGER",
        ColumnType::Double => "DOUBLE PRECISION",
        ColumnType::Text => "TEXT",
        ColumnType::Geometry => "GEOMETRY",
    }
}

fn column_defs(columns: &[ColumnSpec]) -> String {
    columns
        .iter()
        .map(|c| format!("{} {}", c.name, type_name(c.ty)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a select's column list, wrapping geometry columns in `ST_AsText`.
fn select_columns(columns: &[ColumnSpec]) -> String {
    columns
        .iter()
        .map(|c| match c.ty {
            ColumnType::Geometry => format!("ST_AsText({name}) AS {name}", name = c.name),
            _ => c.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn select_sql(descriptor: &SelectDescriptor) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}",
        select_columns(&descriptor.columns),
        descriptor.table
    );
    if let Some(where_clause) = &descriptor.where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    if let Some(order_by) = &descriptor.order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    sql
}

/// Render one operation into a single statement with binds.
pub fn render(op: &StoreOp) -> RenderedQuery {
    match op {
        StoreOp::DropTable { name } => RenderedQuery::plain(format!("DROP TABLE IF EXISTS {name}")),

        StoreOp::CreateTable {
            name,
            columns,
            primary_key,
            if_not_exists,
        } => {
            let exists = if *if_not_exists { "IF NOT EXISTS " } else { "" };
            let mut defs = column_defs(columns);
            if !primary_key.is_empty() {
                defs.push_str(&format!(", PRIMARY KEY ({})", primary_key.join(", ")));
            }
            RenderedQuery::plain(format!("CREATE TABLE {exists}{name} ({defs})"))
        }

        // The copy keeps native column types (geometry stays geometry), so
        // columns are named plainly instead of going through `ST_AsText`.
        StoreOp::CopyTable { name, source } => {
            let columns: Vec<&str> = source.columns.iter().map(|c| c.name.as_str()).collect();
            let mut sql = format!(
                "CREATE TABLE {name} AS SELECT {} FROM {}",
                columns.join(", "),
                source.table
            );
            if let Some(where_clause) = &source.where_clause {
                sql.push_str(" WHERE ");
                sql.push_str(where_clause);
            }
            RenderedQuery::plain(sql)
        }

        StoreOp::AlterAddColumns {
            name,
            columns,
            primary_key,
        } => {
            let mut actions: Vec<String> = columns
                .iter()
                .map(|c| format!("ADD COLUMN {} {}", c.name, type_name(c.ty)))
                .collect();
            if !primary_key.is_empty() {
                actions.push(format!("ADD PRIMARY KEY ({})", primary_key.join(", ")));
            }
            RenderedQuery::plain(format!("ALTER TABLE {name} {}", actions.join(", ")))
        }

        StoreOp::UpdateRows { descriptor } => {
            let mut binds = Vec::with_capacity(descriptor.assignments.len());
            let sets: Vec<String> = descriptor
                .assignments
                .iter()
                .enumerate()
                .map(|(i, (column, value))| {
                    binds.push(value.clone());
                    format!("{column} = ${}", i.saturating_add(1))
                })
                .collect();
            let mut sql = format!("UPDATE {} SET {}", descriptor.table, sets.join(", "));
            if let Some(where_clause) = &descriptor.where_clause {
                sql.push_str(" WHERE ");
                sql.push_str(where_clause);
            }
            RenderedQuery { sql, binds }
        }

        StoreOp::InsertRows {
            table,
            columns,
            rows,
        } => {
            let mut binds = Vec::with_capacity(rows.len().saturating_mul(columns.len()));
            let mut tuples = Vec::with_capacity(rows.len());
            let mut n = 0usize;
            for row in rows {
                let placeholders: Vec<String> = row
                    .iter()
                    .map(|value| {
                        binds.push(value.clone());
                        n = n.saturating_add(1);
                        format!("${n}")
                    })
                    .collect();
                tuples.push(format!("({})", placeholders.join(", ")));
            }
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES {}",
                columns.join(", "),
                tuples.join(", ")
            );
            RenderedQuery { sql, binds }
        }

        StoreOp::SelectRows { descriptor } => RenderedQuery::plain(select_sql(descriptor)),

        StoreOp::ProximityQuery {
            table,
            id_column,
            geometry_column,
            origin,
            geometry,
            radius,
            filter,
        } => {
            let mut sql = format!(
                "SELECT {id_column}, \
                 ST_Distance({geometry_column}, ST_GeomFromText($1)) AS distance \
                 FROM {table} \
                 WHERE ST_DWithin({geometry_column}, ST_GeomFromText($1), $2) \
                 AND {id_column} <> $3"
            );
            if let Some(filter) = filter {
                sql.push_str(" AND (");
                sql.push_str(filter);
                sql.push(')');
            }
            RenderedQuery {
                sql,
                binds: vec![
                    SqlValue::Text(geometry.as_str().to_owned()),
                    SqlValue::Float(*radius),
                    SqlValue::Int(origin.into_inner()),
                ],
            }
        }

        StoreOp::RawMaintenance { statement } => RenderedQuery::plain(statement.clone()),
    }
}
