//! Gateway to the external spatial data store.
//!
//! Everything the simulation persists or reads flows through one contract:
//! dispatch an operation, receive a [`CorrelationToken`] synchronously, and
//! get the result later on the completion channel tagged with that token.
//! Completions can arrive in any order relative to dispatch order -- the
//! token, not the position, pairs a result with its request.
//!
//! # Architecture
//!
//! ```text
//! Scheduler loop (single logical thread)
//!     |
//!     +-- dispatch(StoreOp) -> CorrelationToken      (synchronous)
//!     |        |
//!     |        +-- PgGateway: spawn sqlx query       (PostGIS)
//!     |        +-- MemoryGateway: execute in-process (tests, dry runs)
//!     |
//!     +-- completion channel <- Completion { token, result }
//! ```
//!
//! # Modules
//!
//! - [`op`] -- operation descriptors and typed row values
//! - [`token`] -- the opaque correlation token
//! - [`gateway`] -- the dispatch contract and completion channel
//! - [`sql`] -- runtime SQL rendering for the Postgres backend
//! - [`postgres`] -- the sqlx/PostGIS backend
//! - [`memory`] -- the in-process backend
//! - [`error`] -- shared error types

pub mod error;
pub mod gateway;
pub mod memory;
pub mod op;
pub mod postgres;
pub mod sql;
pub mod token;

pub use error::StoreError;
pub use gateway::{completion_channel, Completion, CompletionReceiver, CompletionSender, Gateway};
pub use memory::MemoryGateway;
pub use op::{
    ColumnSpec, ColumnType, NeighborHit, Row, SelectDescriptor, SqlValue, StoreOp, StoreValue,
    UpdateDescriptor,
};
pub use postgres::{PgGateway, PostgresConfig};
pub use token::CorrelationToken;
