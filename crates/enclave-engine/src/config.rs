//! Run configuration: typed structs mirroring `enclave-config.yaml`.
//!
//! All fields have defaults, so an absent file or an empty section still
//! yields a runnable configuration. `DATABASE_URL` overrides the Postgres
//! URL, matching how deployments inject credentials. Validation happens
//! once, before the run starts: table and column names are checked as SQL
//! identifiers because DDL interpolates them, and the model parameters are
//! range-checked so the pipeline never has to.

use std::path::Path;

use serde::Deserialize;

use enclave_store::sql::valid_identifier;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// A value failed validation.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong and where.
        reason: String,
    },
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

/// Which store backend a run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `PostgreSQL`/PostGIS via the network gateway.
    Postgres,
    /// The in-process backend over a synthetic cell grid.
    Memory,
}

/// Top-level run configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Model parameters and output naming.
    #[serde(default)]
    pub run: ModelSection,

    /// Where the source cells come from.
    #[serde(default)]
    pub source: SourceSection,

    /// Neighbor graph builder settings.
    #[serde(default)]
    pub neighbors: NeighborSection,

    /// Store backend selection and connection settings.
    #[serde(default)]
    pub storage: StorageSection,
}

/// Model parameters and output naming.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelSection {
    /// Name of the iteration output table.
    #[serde(default = "default_output_table")]
    pub output_table: String,

    /// Neighbor search radius, in the store's distance units.
    #[serde(default = "default_radius")]
    pub radius: f64,

    /// Number of population groups (K).
    #[serde(default = "default_groups")]
    pub groups: u32,

    /// Maximum accepted fraction of unlike neighbors before a population
    /// moves, in `[0, 1]`.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Number of migration iterations (N).
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Fraction of cells left empty at seeding, in `[0, 1)`.
    #[serde(default = "default_empty_fraction")]
    pub empty_fraction: f64,

    /// Stop early once an iteration moves nobody.
    #[serde(default)]
    pub stop_when_settled: bool,
}

/// Where the source cells come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSection {
    /// Shape table holding the cells.
    #[serde(default = "default_source_table")]
    pub table: String,

    /// Integer id column of the shape table.
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Geometry column of the shape table.
    #[serde(default = "default_geometry_column")]
    pub geometry_column: String,

    /// Optional raw row filter applied when fetching cells and answering
    /// proximity queries (e.g. `pop > 0`).
    #[serde(default)]
    pub filter: Option<String>,
}

/// Neighbor graph builder settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NeighborSection {
    /// Maximum proximity queries outstanding at once (W).
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Fixed delay before each proximity query, as a rate limiter.
    #[serde(default)]
    pub dispatch_delay_ms: u64,

    /// Load the neighbor graph from the persisted side table instead of
    /// recomputing it.
    #[serde(default)]
    pub reuse: bool,
}

/// Store backend selection and connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageSection {
    /// Which backend to run against.
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// `PostgreSQL` connection URL (Postgres backend).
    #[serde(default = "default_postgres_url")]
    pub postgres_url: String,

    /// Maximum pool connections (Postgres backend).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Synthetic grid width (memory backend).
    #[serde(default = "default_grid_dim")]
    pub grid_width: u32,

    /// Synthetic grid height (memory backend).
    #[serde(default = "default_grid_dim")]
    pub grid_height: u32,
}

const _NEIGHBORS_TABLE_SUFFIX: &str = "_neighbor";

fn default_output_table() -> String {
    "schelling".to_owned()
}
const fn default_radius() -> f64 {
    1000.0
}
const fn default_groups() -> u32 {
    2
}
const fn default_tolerance() -> f64 {
    0.5
}
const fn default_iterations() -> u32 {
    10
}
const fn default_seed() -> u64 {
    42
}
const fn default_empty_fraction() -> f64 {
    0.1
}
fn default_source_table() -> String {
    "blocks".to_owned()
}
fn default_id_column() -> String {
    "gid".to_owned()
}
fn default_geometry_column() -> String {
    "geom".to_owned()
}
const fn default_pool_size() -> usize {
    8
}
const fn default_backend() -> StorageBackend {
    StorageBackend::Postgres
}
fn default_postgres_url() -> String {
    "postgresql://localhost:5432/enclave".to_owned()
}
const fn default_max_connections() -> u32 {
    10
}
const fn default_grid_dim() -> u32 {
    10
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            output_table: default_output_table(),
            radius: default_radius(),
            groups: default_groups(),
            tolerance: default_tolerance(),
            iterations: default_iterations(),
            seed: default_seed(),
            empty_fraction: default_empty_fraction(),
            stop_when_settled: false,
        }
    }
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            table: default_source_table(),
            id_column: default_id_column(),
            geometry_column: default_geometry_column(),
            filter: None,
        }
    }
}

impl Default for NeighborSection {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            dispatch_delay_ms: 0,
            reuse: false,
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            postgres_url: default_postgres_url(),
            max_connections: default_max_connections(),
            grid_width: default_grid_dim(),
            grid_height: default_grid_dim(),
        }
    }
}

impl RunConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `DATABASE_URL` overrides `storage.postgres_url` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.storage.postgres_url = url;
            }
        }
    }

    /// Name of the neighbor side table, derived from the output table.
    pub fn neighbors_table(&self) -> String {
        format!("{}{_NEIGHBORS_TABLE_SUFFIX}", self.run.output_table)
    }

    /// Range-check every parameter and validate interpolated identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (what, name) in [
            ("run.output_table", self.run.output_table.as_str()),
            ("source.table", self.source.table.as_str()),
            ("source.id_column", self.source.id_column.as_str()),
            ("source.geometry_column", self.source.geometry_column.as_str()),
        ] {
            if !valid_identifier(name) {
                return Err(invalid(format!("{what} `{name}` is not a valid identifier")));
            }
        }
        if !(self.run.radius.is_finite() && self.run.radius > 0.0) {
            return Err(invalid("run.radius must be a positive number"));
        }
        if self.run.groups < 1 {
            return Err(invalid("run.groups must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.run.tolerance) {
            return Err(invalid("run.tolerance must be in [0, 1]"));
        }
        if self.run.iterations < 1 {
            return Err(invalid("run.iterations must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.run.empty_fraction) {
            return Err(invalid("run.empty_fraction must be in [0, 1)"));
        }
        if self.neighbors.pool_size < 1 {
            return Err(invalid("neighbors.pool_size must be at least 1"));
        }
        match self.storage.backend {
            StorageBackend::Postgres => {
                if self.storage.postgres_url.is_empty() {
                    return Err(invalid("storage.postgres_url must not be empty"));
                }
            }
            StorageBackend::Memory => {
                if self.storage.grid_width < 1 || self.storage.grid_height < 1 {
                    return Err(invalid("storage grid dimensions must be at least 1"));
                }
            }
        }
        Ok(())
    }
}
