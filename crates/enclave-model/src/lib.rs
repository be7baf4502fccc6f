//! The migration engine: one Schelling step, pure and reproducible.
//!
//! Everything here is synchronous and side-effect free apart from warning
//! logs. Randomness is injected as `&mut impl Rng`, so a run seeded with a
//! `SmallRng` produces bit-identical output for identical inputs -- required
//! both for the test suite and for resuming interrupted runs.
//!
//! # Modules
//!
//! - [`migrate`] -- classify cells and relocate dissatisfied populations
//! - [`sampler`] -- uniform-without-replacement draws (partial Fisher-Yates)
//! - [`seed`] -- the initial population assignment
//! - [`verify`] -- the conservation law between consecutive states

pub mod migrate;
pub mod sampler;
pub mod seed;
pub mod verify;

pub use migrate::{step, MigrationOutcome};
pub use sampler::PoolSampler;
pub use seed::initial_state;
pub use verify::{verify_conservation, ConservationAnomaly, ConservationResult};
