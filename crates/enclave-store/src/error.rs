//! Error types for the store layer.
//!
//! All backend failures surface as [`StoreError`], which wraps the
//! underlying [`sqlx`] error or names the in-process condition. The
//! scheduler attaches the operation summary, token, and phase when it
//! turns one of these into a run abort.

/// Errors produced by a gateway backend while executing an operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A fetched column could not be decoded as the requested type.
    #[error("failed to decode column `{column}`: {reason}")]
    Decode {
        /// Column name from the select descriptor.
        column: String,
        /// What went wrong.
        reason: String,
    },

    /// The memory backend was asked about a table it does not hold.
    #[error("no such table: {0}")]
    MissingTable(String),

    /// The memory backend could not interpret a geometry value.
    #[error("unparseable geometry: {0}")]
    Geometry(String),

    /// A configuration error (bad URL, bad identifier).
    #[error("store configuration error: {0}")]
    Config(String),
}
