//! Storage reclamation between heavy phases.

use enclave_scheduler::{discard_result, SchedulerError, Task, TaskContext};
use enclave_store::StoreOp;

use crate::state::RunState;

/// Issues a `VACUUM` so bulk DDL and the neighbor fan-out do not leave the
/// store bloated for the phases that follow.
pub struct Maintenance;

impl Task<RunState> for Maintenance {
    fn name(&self) -> &'static str {
        "maintenance"
    }

    fn run(self: Box<Self>, tc: &mut TaskContext<'_, RunState>) -> Result<(), SchedulerError> {
        tc.dispatch(
            StoreOp::RawMaintenance {
                statement: "VACUUM".to_owned(),
            },
            discard_result(),
        )?;
        Ok(())
    }
}
