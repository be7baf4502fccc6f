//! The explicit run context shared by every pipeline task.
//!
//! One `RunState` is created per run and owned by the caller of the
//! scheduler; tasks reach it through their task context. There are no
//! module-level singletons -- two runs never share state by accident.

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use enclave_types::{Cell, IterationHistory, NeighborGraph};

use crate::config::RunConfig;

/// In-progress bookkeeping of the neighbor graph builder.
#[derive(Debug, Default)]
pub struct BuildState {
    /// Cells whose proximity query has not been dispatched yet.
    pub pending: VecDeque<Cell>,
    /// Total number of cells in this build.
    pub total: usize,
    /// Number of proximity results received so far.
    pub done: usize,
    /// The accumulating (pre-symmetrization) graph.
    pub graph: NeighborGraph,
}

/// Everything a run owns: configuration, the seeded RNG, fetched cells,
/// the installed neighbor graph, and the iteration history.
pub struct RunState {
    /// The validated run configuration.
    pub config: RunConfig,
    /// Deterministic RNG, seeded from `config.run.seed`.
    pub rng: SmallRng,
    /// Cell list fetched from the source table; `None` until produced.
    pub cells: Option<Vec<Cell>>,
    /// The symmetrized neighbor graph; `None` until built or loaded.
    pub graph: Option<NeighborGraph>,
    /// One state per completed time step, seed state included.
    pub history: IterationHistory,
    /// Neighbor build in progress, if any.
    pub build: Option<BuildState>,
    /// Set once an iteration moves nobody.
    pub settled: bool,
}

impl RunState {
    /// Create the context for one run.
    pub fn new(config: RunConfig) -> Self {
        let rng = SmallRng::seed_from_u64(config.run.seed);
        Self {
            config,
            rng,
            cells: None,
            graph: None,
            history: IterationHistory::new(),
            build: None,
            settled: false,
        }
    }
}
