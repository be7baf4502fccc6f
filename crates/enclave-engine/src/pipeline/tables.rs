//! Second phase: create the output and neighbor tables.
//!
//! The output table is a copy of the source cells (id + geometry) extended
//! with `(t, pop)` columns. The sequence matters: the `(t, gid)` key can
//! only be added after the copied rows have `t` populated, so the steps
//! chain through completion handlers -- copy, add columns, initialize,
//! key -- while the neighbor table is created in parallel.

use enclave_scheduler::{discard_result, SchedulerError, Task, TaskContext};
use enclave_store::{ColumnSpec, ColumnType, SelectDescriptor, SqlValue, StoreOp, UpdateDescriptor};

use crate::pipeline::{Maintenance, NEIGHBOR_COLUMNS};
use crate::state::RunState;

/// Creates the iteration output table and the neighbor side table, then
/// front-enqueues a maintenance pass.
pub struct CreateTables;

impl Task<RunState> for CreateTables {
    fn name(&self) -> &'static str {
        "create_tables"
    }

    fn run(self: Box<Self>, tc: &mut TaskContext<'_, RunState>) -> Result<(), SchedulerError> {
        let config = &tc.state.config;
        let output = config.run.output_table.clone();
        let id_column = config.source.id_column.clone();
        let neighbors_table = config.neighbors_table();
        let copy = StoreOp::CopyTable {
            name: output.clone(),
            source: SelectDescriptor {
                table: config.source.table.clone(),
                columns: vec![
                    ColumnSpec::new(&id_column, ColumnType::BigInt),
                    ColumnSpec::new(&config.source.geometry_column, ColumnType::Geometry),
                ],
                where_clause: config.source.filter.clone(),
                order_by: None,
            },
        };

        // Output table: copy -> add (t, pop) -> initialize -> key.
        tc.dispatch(
            copy,
            Box::new(move |tc, _| {
                let alter = StoreOp::AlterAddColumns {
                    name: output.clone(),
                    columns: vec![
                        ColumnSpec::new("t", ColumnType::Integer),
                        ColumnSpec::new("pop", ColumnType::Integer),
                    ],
                    primary_key: Vec::new(),
                };
                tc.dispatch(
                    alter,
                    Box::new(move |tc, _| {
                        let init = StoreOp::UpdateRows {
                            descriptor: UpdateDescriptor {
                                table: output.clone(),
                                assignments: vec![
                                    ("t".to_owned(), SqlValue::Int(0)),
                                    ("pop".to_owned(), SqlValue::Int(-1)),
                                ],
                                where_clause: Some("t IS NULL".to_owned()),
                            },
                        };
                        tc.dispatch(
                            init,
                            Box::new(move |tc, _| {
                                let key = StoreOp::AlterAddColumns {
                                    name: output,
                                    columns: Vec::new(),
                                    primary_key: vec!["t".to_owned(), id_column],
                                };
                                tc.dispatch(key, discard_result())?;
                                Ok(())
                            }),
                        )?;
                        Ok(())
                    }),
                )?;
                Ok(())
            }),
        )?;

        // Neighbor side table, kept across runs when reuse is configured.
        let neighbor = StoreOp::CreateTable {
            name: neighbors_table,
            columns: vec![
                ColumnSpec::new(NEIGHBOR_COLUMNS[0], ColumnType::BigInt),
                ColumnSpec::new(NEIGHBOR_COLUMNS[1], ColumnType::BigInt),
                ColumnSpec::new(NEIGHBOR_COLUMNS[2], ColumnType::Double),
            ],
            primary_key: vec![
                NEIGHBOR_COLUMNS[0].to_owned(),
                NEIGHBOR_COLUMNS[1].to_owned(),
            ],
            if_not_exists: true,
        };
        tc.dispatch(neighbor, discard_result())?;

        tc.enqueue_front(Box::new(Maintenance));
        Ok(())
    }
}
