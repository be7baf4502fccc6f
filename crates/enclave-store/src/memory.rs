//! In-process gateway backend.
//!
//! Holds tables as plain vectors of rows and answers proximity queries with
//! planar Euclidean distance over `POINT (x y)` geometries. Used by the test
//! suite and by dry runs: the live-database path needs running services, so
//! the always-on counterpart executes the same operation vocabulary against
//! process memory and honors the same dispatch/completion contract --
//! including out-of-order-safe token correlation, since completions are
//! queued through the same channel the Postgres backend reports into.
//!
//! The `WHERE` support is deliberately narrow: conjunctions of `IS NULL`,
//! comparisons against numeric literals, and `IN` lists -- the shapes the
//! pipeline actually emits. Anything else is rejected loudly rather than
//! silently matching nothing.

use std::collections::HashMap;

use enclave_types::{Cell, CellId, Geometry};

use crate::error::StoreError;
use crate::gateway::{Completion, CompletionSender, Gateway};
use crate::op::{NeighborHit, Row, SqlValue, StoreOp, StoreValue};
use crate::token::CorrelationToken;

/// One in-memory table: named columns and rows of values in column order.
#[derive(Debug, Clone, Default)]
pub struct MemTable {
    /// Column names, in row value order.
    pub columns: Vec<String>,
    /// The rows.
    pub rows: Vec<Row>,
}

impl MemTable {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Gateway backed by process memory.
pub struct MemoryGateway {
    tables: HashMap<String, MemTable>,
    completions: CompletionSender,
    next_token: u64,
    op_log: Vec<String>,
}

impl MemoryGateway {
    /// Create an empty gateway bound to a completion channel.
    pub fn new(completions: CompletionSender) -> Self {
        Self {
            tables: HashMap::new(),
            completions,
            next_token: 0,
            op_log: Vec::new(),
        }
    }

    /// Seed a source shape table from a cell list.
    #[must_use]
    pub fn with_source_cells(
        mut self,
        table: &str,
        id_column: &str,
        geometry_column: &str,
        cells: &[Cell],
    ) -> Self {
        let rows = cells
            .iter()
            .map(|cell| {
                vec![
                    SqlValue::Int(cell.id.into_inner()),
                    SqlValue::Text(cell.geometry.as_str().to_owned()),
                ]
            })
            .collect();
        self.tables.insert(
            table.to_owned(),
            MemTable {
                columns: vec![id_column.to_owned(), geometry_column.to_owned()],
                rows,
            },
        );
        self
    }

    /// Build a synthetic `width x height` grid of unit-spaced point cells.
    ///
    /// Cell ids start at 1 and run row-major. A radius of 1.0 < r < sqrt(2)
    /// therefore yields the 4-neighborhood.
    pub fn unit_grid(width: u32, height: u32) -> Vec<Cell> {
        let mut cells = Vec::with_capacity((width as usize).saturating_mul(height as usize));
        let mut id = 0i64;
        for y in 0..height {
            for x in 0..width {
                id = id.saturating_add(1);
                cells.push(Cell {
                    id: CellId(id),
                    geometry: Geometry::point(f64::from(x), f64::from(y)),
                });
            }
        }
        cells
    }

    /// Summaries of every dispatched operation, in dispatch order.
    pub fn ops(&self) -> &[String] {
        &self.op_log
    }

    /// Look up a table by name (test assertions).
    pub fn table(&self, name: &str) -> Option<&MemTable> {
        self.tables.get(name)
    }

    fn execute(&mut self, op: &StoreOp) -> Result<StoreValue, StoreError> {
        match op {
            StoreOp::DropTable { name } => {
                self.tables.remove(name);
                Ok(StoreValue::Unit)
            }

            StoreOp::CreateTable {
                name,
                columns,
                if_not_exists,
                ..
            } => {
                if *if_not_exists && self.tables.contains_key(name) {
                    return Ok(StoreValue::Unit);
                }
                self.tables.insert(
                    name.clone(),
                    MemTable {
                        columns: columns.iter().map(|c| c.name.clone()).collect(),
                        rows: Vec::new(),
                    },
                );
                Ok(StoreValue::Unit)
            }

            StoreOp::CopyTable { name, source } => {
                let src = self
                    .tables
                    .get(&source.table)
                    .ok_or_else(|| StoreError::MissingTable(source.table.clone()))?;
                let indices: Vec<usize> = source
                    .columns
                    .iter()
                    .map(|c| {
                        src.column_index(&c.name).ok_or_else(|| StoreError::Decode {
                            column: c.name.clone(),
                            reason: "column not in source table".to_owned(),
                        })
                    })
                    .collect::<Result<_, _>>()?;
                let preds = source
                    .where_clause
                    .as_deref()
                    .map(parse_where)
                    .transpose()?;
                let mut rows = Vec::new();
                for row in &src.rows {
                    if let Some(preds) = &preds {
                        if !matches_all(src, row, preds)? {
                            continue;
                        }
                    }
                    rows.push(
                        indices
                            .iter()
                            .map(|&i| row.get(i).cloned().unwrap_or(SqlValue::Null))
                            .collect(),
                    );
                }
                self.tables.insert(
                    name.clone(),
                    MemTable {
                        columns: source.columns.iter().map(|c| c.name.clone()).collect(),
                        rows,
                    },
                );
                Ok(StoreValue::Unit)
            }

            StoreOp::AlterAddColumns { name, columns, .. } => {
                let table = self
                    .tables
                    .get_mut(name)
                    .ok_or_else(|| StoreError::MissingTable(name.clone()))?;
                for column in columns {
                    table.columns.push(column.name.clone());
                    for row in &mut table.rows {
                        row.push(SqlValue::Null);
                    }
                }
                Ok(StoreValue::Unit)
            }

            StoreOp::UpdateRows { descriptor } => {
                let table = self
                    .tables
                    .get_mut(&descriptor.table)
                    .ok_or_else(|| StoreError::MissingTable(descriptor.table.clone()))?;
                let preds = descriptor
                    .where_clause
                    .as_deref()
                    .map(parse_where)
                    .transpose()?;
                let assignments: Vec<(usize, SqlValue)> = descriptor
                    .assignments
                    .iter()
                    .map(|(column, value)| {
                        table
                            .column_index(column)
                            .map(|i| (i, value.clone()))
                            .ok_or_else(|| StoreError::Decode {
                                column: column.clone(),
                                reason: "column not in table".to_owned(),
                            })
                    })
                    .collect::<Result<_, _>>()?;
                let snapshot = table.clone();
                for row in &mut table.rows {
                    let hit = match &preds {
                        Some(preds) => matches_all(&snapshot, row, preds)?,
                        None => true,
                    };
                    if hit {
                        for (index, value) in &assignments {
                            if let Some(slot) = row.get_mut(*index) {
                                *slot = value.clone();
                            }
                        }
                    }
                }
                Ok(StoreValue::Unit)
            }

            StoreOp::InsertRows {
                table,
                columns,
                rows,
            } => {
                let mem = self
                    .tables
                    .get_mut(table)
                    .ok_or_else(|| StoreError::MissingTable(table.clone()))?;
                let indices: Vec<usize> = columns
                    .iter()
                    .map(|c| {
                        mem.column_index(c).ok_or_else(|| StoreError::Decode {
                            column: c.clone(),
                            reason: "column not in table".to_owned(),
                        })
                    })
                    .collect::<Result<_, _>>()?;
                for row in rows {
                    let mut full: Row = vec![SqlValue::Null; mem.columns.len()];
                    for (value, &index) in row.iter().zip(&indices) {
                        if let Some(slot) = full.get_mut(index) {
                            *slot = value.clone();
                        }
                    }
                    mem.rows.push(full);
                }
                Ok(StoreValue::Unit)
            }

            StoreOp::SelectRows { descriptor } => {
                let table = self
                    .tables
                    .get(&descriptor.table)
                    .ok_or_else(|| StoreError::MissingTable(descriptor.table.clone()))?;
                let indices: Vec<usize> = descriptor
                    .columns
                    .iter()
                    .map(|c| {
                        table
                            .column_index(&c.name)
                            .ok_or_else(|| StoreError::Decode {
                                column: c.name.clone(),
                                reason: "column not in table".to_owned(),
                            })
                    })
                    .collect::<Result<_, _>>()?;
                let preds = descriptor
                    .where_clause
                    .as_deref()
                    .map(parse_where)
                    .transpose()?;
                let mut rows: Vec<Row> = Vec::new();
                for row in &table.rows {
                    if let Some(preds) = &preds {
                        if !matches_all(table, row, preds)? {
                            continue;
                        }
                    }
                    rows.push(
                        indices
                            .iter()
                            .map(|&i| row.get(i).cloned().unwrap_or(SqlValue::Null))
                            .collect(),
                    );
                }
                if let Some(order_by) = &descriptor.order_by {
                    let keys: Vec<usize> = order_by
                        .split(',')
                        .map(str::trim)
                        .map(|name| {
                            descriptor
                                .columns
                                .iter()
                                .position(|c| c.name == name)
                                .ok_or_else(|| StoreError::Decode {
                                    column: name.to_owned(),
                                    reason: "ORDER BY column not selected".to_owned(),
                                })
                        })
                        .collect::<Result<_, _>>()?;
                    rows.sort_by(|a, b| {
                        keys.iter()
                            .map(|&k| {
                                let left = a.get(k).and_then(SqlValue::as_f64);
                                let right = b.get(k).and_then(SqlValue::as_f64);
                                left.partial_cmp(&right).unwrap_or(core::cmp::Ordering::Equal)
                            })
                            .find(|o| *o != core::cmp::Ordering::Equal)
                            .unwrap_or(core::cmp::Ordering::Equal)
                    });
                }
                Ok(StoreValue::Rows(rows))
            }

            StoreOp::ProximityQuery {
                table,
                id_column,
                geometry_column,
                origin,
                geometry,
                radius,
                filter,
            } => {
                let mem = self
                    .tables
                    .get(table)
                    .ok_or_else(|| StoreError::MissingTable(table.clone()))?;
                let id_index = mem.column_index(id_column).ok_or_else(|| StoreError::Decode {
                    column: id_column.clone(),
                    reason: "column not in table".to_owned(),
                })?;
                let geom_index =
                    mem.column_index(geometry_column)
                        .ok_or_else(|| StoreError::Decode {
                            column: geometry_column.clone(),
                            reason: "column not in table".to_owned(),
                        })?;
                let preds = filter.as_deref().map(parse_where).transpose()?;
                let (px, py) = parse_point(geometry.as_str())?;
                let mut hits = Vec::new();
                for row in &mem.rows {
                    if let Some(preds) = &preds {
                        if !matches_all(mem, row, preds)? {
                            continue;
                        }
                    }
                    let id = row
                        .get(id_index)
                        .and_then(SqlValue::as_i64)
                        .map(CellId)
                        .ok_or_else(|| StoreError::Decode {
                            column: id_column.clone(),
                            reason: "non-integer id".to_owned(),
                        })?;
                    if id == *origin {
                        continue;
                    }
                    let wkt = row
                        .get(geom_index)
                        .and_then(|v| v.as_text())
                        .ok_or_else(|| StoreError::Geometry("non-text geometry".to_owned()))?;
                    let (x, y) = parse_point(wkt)?;
                    let distance = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
                    if distance <= *radius {
                        hits.push(NeighborHit { id, distance });
                    }
                }
                hits.sort_by_key(|h| h.id);
                Ok(StoreValue::Neighbors(hits))
            }

            StoreOp::RawMaintenance { .. } => Ok(StoreValue::Unit),
        }
    }
}

impl Gateway for MemoryGateway {
    fn dispatch(&mut self, op: StoreOp) -> CorrelationToken {
        self.next_token = self.next_token.saturating_add(1);
        let token = CorrelationToken(self.next_token);
        self.op_log.push(op.summary());
        let result = self.execute(&op);
        if self.completions.send(Completion { token, result }).is_err() {
            tracing::warn!(%token, "completion channel closed, result dropped");
        }
        token
    }
}

// =========================================================================
// Minimal WHERE evaluation
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    IsNull(String),
    Compare(String, CompareOp, f64),
    In(String, Vec<i64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
}

fn unsupported(clause: &str) -> StoreError {
    StoreError::Config(format!("unsupported WHERE clause for memory backend: `{clause}`"))
}

fn parse_where(clause: &str) -> Result<Vec<Predicate>, StoreError> {
    clause
        .split(" AND ")
        .map(|term| parse_term(term.trim()).ok_or_else(|| unsupported(clause)))
        .collect()
}

fn parse_term(term: &str) -> Option<Predicate> {
    if let Some(column) = term.strip_suffix(" IS NULL") {
        return Some(Predicate::IsNull(column.trim().to_owned()));
    }
    if let Some(open) = term.find(" IN (") {
        let column = term.get(..open)?.trim().to_owned();
        let list = term.get(open.saturating_add(5)..)?.strip_suffix(')')?;
        let values = list
            .split(',')
            .map(|v| v.trim().parse::<i64>().ok())
            .collect::<Option<Vec<_>>>()?;
        return Some(Predicate::In(column, values));
    }
    for (symbol, op) in [
        ("<>", CompareOp::Ne),
        ("=", CompareOp::Eq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
    ] {
        if let Some(position) = term.find(symbol) {
            let column = term.get(..position)?.trim().to_owned();
            let literal = term.get(position.saturating_add(symbol.len())..)?.trim();
            let value = literal.parse::<f64>().ok()?;
            return Some(Predicate::Compare(column, op, value));
        }
    }
    None
}

fn matches_all(table: &MemTable, row: &Row, preds: &[Predicate]) -> Result<bool, StoreError> {
    for pred in preds {
        let column = match pred {
            Predicate::IsNull(c) | Predicate::Compare(c, _, _) | Predicate::In(c, _) => c,
        };
        let index = table.column_index(column).ok_or_else(|| StoreError::Decode {
            column: column.clone(),
            reason: "WHERE column not in table".to_owned(),
        })?;
        let value = row.get(index).unwrap_or(&SqlValue::Null);
        let hit = match pred {
            Predicate::IsNull(_) => matches!(value, SqlValue::Null),
            Predicate::Compare(_, op, rhs) => match value.as_f64() {
                None => false,
                Some(lhs) => match op {
                    CompareOp::Eq => (lhs - rhs).abs() < f64::EPSILON,
                    CompareOp::Ne => (lhs - rhs).abs() >= f64::EPSILON,
                    CompareOp::Gt => lhs > *rhs,
                    CompareOp::Lt => lhs < *rhs,
                },
            },
            Predicate::In(_, values) => value
                .as_i64()
                .is_some_and(|v| values.contains(&v)),
        };
        if !hit {
            return Ok(false);
        }
    }
    Ok(true)
}

fn parse_point(wkt: &str) -> Result<(f64, f64), StoreError> {
    let bad = || StoreError::Geometry(wkt.to_owned());
    let inner = wkt
        .trim()
        .strip_prefix("POINT")
        .ok_or_else(bad)?
        .trim()
        .strip_prefix('(')
        .ok_or_else(bad)?
        .strip_suffix(')')
        .ok_or_else(bad)?;
    let mut parts = inner.split_whitespace();
    let x = parts
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(bad)?;
    let y = parts
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(bad)?;
    Ok((x, y))
}
