//! Pipeline wiring for the Enclave segregation simulation.
//!
//! This crate turns the building blocks -- scheduler, store gateway,
//! migration engine -- into the concrete run: clean state, create tables,
//! build (or load) the neighbor graph, seed populations, iterate the model,
//! finalize. The binary in `main.rs` loads configuration and drives
//! [`pipeline::build_pipeline`] through the scheduler against the configured
//! backend.
//!
//! # Modules
//!
//! - [`config`] -- YAML run configuration with validation
//! - [`state`] -- the explicit run context shared by all tasks
//! - [`pipeline`] -- the pipeline tasks themselves

pub mod config;
pub mod pipeline;
pub mod state;

pub use config::{ConfigError, RunConfig, StorageBackend};
pub use state::{BuildState, RunState};
