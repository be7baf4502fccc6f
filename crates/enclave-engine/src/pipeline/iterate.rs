//! One migration iteration: run the Schelling step and persist its state.
//!
//! The pipeline enqueues one of these per configured iteration. Each checks
//! its prerequisites (neighbor graph, seed state) through the front-
//! insertion protocol, runs the pure migration step against the last
//! recorded state, appends the result to the history, and persists the
//! `(t, gid, pop)` rows -- the barrier guarantees the rows are stored
//! before the next iteration task is admitted.

use enclave_scheduler::{discard_result, SchedulerError, Task, TaskContext, TaskList};
use enclave_store::{Row, SqlValue, StoreOp};

use crate::pipeline::{ComputeNeighbors, SeedPopulation, INSERT_BATCH};
use crate::state::RunState;

/// Runs migration step `step` and persists the produced state.
pub struct Iterate {
    step: u32,
    retried_graph: bool,
    retried_seed: bool,
}

impl Iterate {
    /// The task for time step `step` (1-based; step 0 is the seed state).
    pub const fn new(step: u32) -> Self {
        Self {
            step,
            retried_graph: false,
            retried_seed: false,
        }
    }
}

impl Task<RunState> for Iterate {
    fn name(&self) -> &'static str {
        "iterate"
    }

    fn run(self: Box<Self>, tc: &mut TaskContext<'_, RunState>) -> Result<(), SchedulerError> {
        let step = self.step;

        if tc.state.settled && tc.state.config.run.stop_when_settled {
            tracing::debug!(step, "model settled, skipping iteration");
            return Ok(());
        }

        if tc.state.graph.is_none() {
            if self.retried_graph {
                return Err(SchedulerError::MissingDependency {
                    task: "iterate",
                    dependency: "neighbor graph",
                });
            }
            let next: TaskList<RunState> = vec![
                Box::new(ComputeNeighbors::new()),
                Box::new(Self {
                    step,
                    retried_graph: true,
                    retried_seed: self.retried_seed,
                }),
            ];
            tc.enqueue_front_all(next);
            return Ok(());
        }

        if tc.state.history.is_empty() {
            if self.retried_seed {
                return Err(SchedulerError::MissingDependency {
                    task: "iterate",
                    dependency: "seed state",
                });
            }
            let next: TaskList<RunState> = vec![
                Box::new(SeedPopulation::new()),
                Box::new(Self {
                    step,
                    retried_graph: self.retried_graph,
                    retried_seed: true,
                }),
            ];
            tc.enqueue_front_all(next);
            return Ok(());
        }

        let outcome = {
            let state = &mut *tc.state;
            let Some(graph) = state.graph.as_ref() else {
                return Err(SchedulerError::task("iterate", "neighbor graph vanished"));
            };
            let Some(last) = state.history.last() else {
                return Err(SchedulerError::task("iterate", "history vanished"));
            };
            enclave_model::step(last, graph, state.config.run.tolerance, &mut state.rng)
        };

        if outcome.is_settled() && !tc.state.settled {
            tc.state.settled = true;
            tracing::info!(step, "no population moved; model settled");
        }
        tracing::info!(
            step,
            moved = outcome.moved,
            isolated = outcome.isolated,
            "iteration complete"
        );

        let output = tc.state.config.run.output_table.clone();
        let columns = vec![
            "t".to_owned(),
            tc.state.config.source.id_column.clone(),
            "pop".to_owned(),
        ];
        let rows: Vec<Row> = outcome
            .next
            .iter()
            .map(|(cell, label)| {
                vec![
                    SqlValue::Int(i64::from(step)),
                    SqlValue::Int(cell.into_inner()),
                    SqlValue::Int(i64::from(label.into_inner())),
                ]
            })
            .collect();
        for chunk in rows.chunks(INSERT_BATCH) {
            tc.dispatch(
                StoreOp::InsertRows {
                    table: output.clone(),
                    columns: columns.clone(),
                    rows: chunk.to_vec(),
                },
                discard_result(),
            )?;
        }

        tc.state.history.push(outcome.next);
        Ok(())
    }
}
