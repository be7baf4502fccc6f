//! Shared domain types for the Enclave segregation simulation.
//!
//! Everything in this crate is plain data: identifiers, population labels,
//! the opaque geometry wrapper, per-step simulation states, the run history,
//! and the neighbor graph. No I/O, no randomness, no async -- those concerns
//! live in `enclave-store`, `enclave-scheduler`, and `enclave-model`.
//!
//! # Modules
//!
//! - [`ids`] -- stable integer cell identifiers
//! - [`label`] -- population labels (0 = empty, 1..=K = groups)
//! - [`geom`] -- opaque geometry text and the id/geometry pair
//! - [`state`] -- per-step simulation state and the append-only history
//! - [`graph`] -- the cell adjacency produced by the neighbor graph builder

pub mod geom;
pub mod graph;
pub mod ids;
pub mod label;
pub mod state;

pub use geom::{Cell, Geometry};
pub use graph::NeighborGraph;
pub use ids::CellId;
pub use label::Label;
pub use state::{IterationHistory, SimulationState};
