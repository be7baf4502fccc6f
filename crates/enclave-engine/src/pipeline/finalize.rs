//! Last phase: audit the run and reclaim storage.

use enclave_model::{verify_conservation, ConservationResult};
use enclave_scheduler::{discard_result, SchedulerError, Task, TaskContext};
use enclave_store::StoreOp;

use crate::state::RunState;

/// Verifies the conservation law across the whole history, logs the final
/// population counts, and runs `VACUUM ANALYZE` on the output table.
pub struct Finalize;

impl Task<RunState> for Finalize {
    fn name(&self) -> &'static str {
        "finalize"
    }

    fn run(self: Box<Self>, tc: &mut TaskContext<'_, RunState>) -> Result<(), SchedulerError> {
        // Integrity audit: per-label counts must be identical between every
        // pair of consecutive states. A violation is logged, not fatal --
        // the persisted data is still worth inspecting.
        let history = &tc.state.history;
        let mut anomalies = 0usize;
        for (before, after) in history.iter().zip(history.iter().skip(1)) {
            if let ConservationResult::Anomaly(anomaly) = verify_conservation(before, after) {
                anomalies = anomalies.saturating_add(1);
                tracing::error!(
                    label = %anomaly.label,
                    before = anomaly.before,
                    after = anomaly.after,
                    "population count changed between steps"
                );
            }
        }
        if anomalies == 0 {
            tracing::info!(
                steps = history.len(),
                "conservation verified across the run"
            );
        }

        if let Some(final_state) = history.last() {
            for (label, count) in final_state.population_counts() {
                tracing::info!(%label, count, "final population");
            }
            tracing::info!(empty = final_state.empty_count(), "final empty cells");
        }

        let output = tc.state.config.run.output_table.clone();
        tc.dispatch(
            StoreOp::RawMaintenance {
                statement: format!("VACUUM ANALYZE {output}"),
            },
            discard_result(),
        )?;
        Ok(())
    }
}
