//! First phase: drop the previous run's tables.

use enclave_scheduler::{discard_result, SchedulerError, Task, TaskContext};
use enclave_store::StoreOp;

use crate::state::RunState;

/// Drops the output table, and the neighbor side table unless the run is
/// configured to reuse it.
pub struct Clean;

impl Task<RunState> for Clean {
    fn name(&self) -> &'static str {
        "clean"
    }

    fn run(self: Box<Self>, tc: &mut TaskContext<'_, RunState>) -> Result<(), SchedulerError> {
        let output = tc.state.config.run.output_table.clone();
        let neighbors = tc.state.config.neighbors_table();
        let reuse = tc.state.config.neighbors.reuse;

        tc.dispatch(StoreOp::DropTable { name: output }, discard_result())?;
        if reuse {
            tracing::info!(table = %neighbors, "keeping neighbor table for reuse");
        } else {
            tc.dispatch(StoreOp::DropTable { name: neighbors }, discard_result())?;
        }
        Ok(())
    }
}
