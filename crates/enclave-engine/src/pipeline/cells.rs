//! Producer of the cell list.
//!
//! Front-inserted by whichever task first needs the cells (the neighbor
//! graph builder, the seeder). Guarded: once the list is in run state this
//! task is a no-op, so it runs exactly once per run no matter how many
//! dependents request it.

use enclave_scheduler::{SchedulerError, Task, TaskContext};
use enclave_store::{ColumnSpec, ColumnType, SelectDescriptor, SqlValue, StoreOp, StoreValue};
use enclave_types::{Cell, CellId, Geometry};

use crate::state::RunState;

/// Fetches `(id, geometry)` for every source cell, ordered by id.
pub struct FetchCells;

impl Task<RunState> for FetchCells {
    fn name(&self) -> &'static str {
        "fetch_cells"
    }

    fn run(self: Box<Self>, tc: &mut TaskContext<'_, RunState>) -> Result<(), SchedulerError> {
        if tc.state.cells.is_some() {
            return Ok(());
        }

        let source = tc.state.config.source.clone();
        let descriptor = SelectDescriptor {
            table: source.table,
            columns: vec![
                ColumnSpec::new(&source.id_column, ColumnType::BigInt),
                ColumnSpec::new(&source.geometry_column, ColumnType::Geometry),
            ],
            where_clause: source.filter,
            order_by: Some(source.id_column.clone()),
        };

        tc.dispatch(
            StoreOp::SelectRows { descriptor },
            Box::new(|tc, value| {
                let StoreValue::Rows(rows) = value else {
                    return Err(SchedulerError::task("fetch_cells", "unexpected result shape"));
                };
                let mut cells = Vec::with_capacity(rows.len());
                for row in rows {
                    let id = row.first().and_then(SqlValue::as_i64).ok_or_else(|| {
                        SchedulerError::task("fetch_cells", "cell id is not an integer")
                    })?;
                    let wkt = row
                        .get(1)
                        .and_then(|v| v.as_text())
                        .ok_or_else(|| {
                            SchedulerError::task("fetch_cells", "cell geometry is not text")
                        })?;
                    cells.push(Cell {
                        id: CellId(id),
                        geometry: Geometry(wkt.to_owned()),
                    });
                }
                tracing::info!(cells = cells.len(), "cell list fetched");
                tc.state.cells = Some(cells);
                Ok(())
            }),
        )?;
        Ok(())
    }
}
