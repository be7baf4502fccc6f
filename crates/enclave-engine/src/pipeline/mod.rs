//! The concrete pipeline: clean, create tables, build or load the neighbor
//! graph, seed populations, iterate the model, finalize.
//!
//! Each task follows the scheduler contract: dispatch asynchronous store
//! operations, return, and let the step barrier hold the pipeline until
//! every operation completes. Tasks that need data produced elsewhere (the
//! cell list, the neighbor graph, the seed state) use the front-insertion
//! dependency protocol instead of computing it inline, so each producer
//! runs exactly once no matter how many tasks need its output.

pub mod cells;
pub mod clean;
pub mod finalize;
pub mod iterate;
pub mod maintenance;
pub mod neighbors;
pub mod seed;
pub mod tables;

pub use cells::FetchCells;
pub use clean::Clean;
pub use finalize::Finalize;
pub use iterate::Iterate;
pub use maintenance::Maintenance;
pub use neighbors::{ComputeNeighbors, LoadNeighbors};
pub use seed::SeedPopulation;
pub use tables::CreateTables;

use enclave_scheduler::TaskList;

use crate::config::RunConfig;
use crate::state::RunState;

/// Rows per iteration INSERT dispatch.
pub(crate) const INSERT_BATCH: usize = 200;

/// Cell ids per seeding UPDATE dispatch.
pub(crate) const UPDATE_BATCH: usize = 500;

/// Columns of the neighbor side table, keyed `(gid, neighbor_gid)`.
pub(crate) const NEIGHBOR_COLUMNS: [&str; 3] = ["gid", "neighbor_gid", "lineal_distance"];

/// Assemble the run's initial task queue from the configuration.
///
/// The order mirrors the phases of a run: drop leftovers, create tables,
/// obtain the neighbor graph (computed, or loaded from the side table when
/// `neighbors.reuse` is set), seed the populations, run N iterations, and
/// finalize. Tasks re-enqueue producers at the front as needed, so this
/// list is the coarse plan, not a straitjacket.
pub fn build_pipeline(config: &RunConfig) -> TaskList<RunState> {
    let mut tasks: TaskList<RunState> = vec![Box::new(Clean), Box::new(CreateTables)];
    if config.neighbors.reuse {
        tasks.push(Box::new(LoadNeighbors));
    } else {
        tasks.push(Box::new(ComputeNeighbors::new()));
    }
    tasks.push(Box::new(SeedPopulation::new()));
    for step in 1..=config.run.iterations {
        tasks.push(Box::new(Iterate::new(step)));
    }
    tasks.push(Box::new(Finalize));
    tasks
}
