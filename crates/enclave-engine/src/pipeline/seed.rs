//! Fourth phase: seed the initial populations.

use std::collections::BTreeMap;

use enclave_scheduler::{discard_result, SchedulerError, Task, TaskContext, TaskList};
use enclave_store::{SqlValue, StoreOp, UpdateDescriptor};
use enclave_types::Label;

use crate::pipeline::{FetchCells, UPDATE_BATCH};
use crate::state::RunState;

/// Assigns every cell an initial label (empty or one of the K groups),
/// records the step-0 state, and persists it onto the `t = 0` rows.
pub struct SeedPopulation {
    retried: bool,
}

impl SeedPopulation {
    /// A fresh seeding task.
    pub const fn new() -> Self {
        Self { retried: false }
    }
}

impl Default for SeedPopulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Task<RunState> for SeedPopulation {
    fn name(&self) -> &'static str {
        "seed_population"
    }

    fn run(self: Box<Self>, tc: &mut TaskContext<'_, RunState>) -> Result<(), SchedulerError> {
        // Guard: the run is already seeded.
        if !tc.state.history.is_empty() {
            return Ok(());
        }

        if tc.state.cells.is_none() {
            if self.retried {
                return Err(SchedulerError::MissingDependency {
                    task: "seed_population",
                    dependency: "cell list",
                });
            }
            let next: TaskList<RunState> =
                vec![Box::new(FetchCells), Box::new(Self { retried: true })];
            tc.enqueue_front_all(next);
            return Ok(());
        }

        let ids: Vec<_> = tc
            .state
            .cells
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|cell| cell.id)
            .collect();
        let groups = tc.state.config.run.groups;
        let empty_fraction = tc.state.config.run.empty_fraction;
        let initial =
            enclave_model::initial_state(&ids, groups, empty_fraction, &mut tc.state.rng);

        tracing::info!(
            cells = initial.len(),
            empty = initial.empty_count(),
            groups,
            "initial population seeded"
        );

        // Persist onto the t = 0 rows: one update per label, chunked so no
        // single statement carries an unbounded id list.
        let output = tc.state.config.run.output_table.clone();
        let id_column = tc.state.config.source.id_column.clone();
        let mut by_label: BTreeMap<Label, Vec<i64>> = BTreeMap::new();
        for (cell, label) in initial.iter() {
            by_label.entry(label).or_default().push(cell.into_inner());
        }
        tc.state.history.push(initial);

        for (label, cell_ids) in by_label {
            for chunk in cell_ids.chunks(UPDATE_BATCH) {
                let list = chunk
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                let op = StoreOp::UpdateRows {
                    descriptor: UpdateDescriptor {
                        table: output.clone(),
                        assignments: vec![(
                            "pop".to_owned(),
                            SqlValue::Int(i64::from(label.into_inner())),
                        )],
                        where_clause: Some(format!("t = 0 AND {id_column} IN ({list})")),
                    },
                };
                tc.dispatch(op, discard_result())?;
            }
        }
        Ok(())
    }
}
