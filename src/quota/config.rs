//! Quota configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for environment variable overrides (e.g. `MODELQUOTA_DATA_DIR`).
pub const ENV_PREFIX: &str = "MODELQUOTA";

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// TOML text could not be parsed.
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// No resources were configured.
    #[error("At least one resource must be configured")]
    EmptyResources,

    /// A resource name is empty or whitespace.
    #[error("Resource names must not be blank")]
    BlankName,

    /// Two resources share a name.
    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    /// A resource was given no daily capacity.
    #[error("Resource {0} must have a positive daily capacity")]
    ZeroCapacity(String),
}

/// One named quota bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Model identifier
    pub name: String,
    /// Maximum reservations per calendar day
    pub daily_capacity: u32,
}

impl ResourceSpec {
    /// Create a resource spec.
    pub fn new(name: impl Into<String>, daily_capacity: u32) -> Self {
        Self {
            name: name.into(),
            daily_capacity,
        }
    }
}

/// Configuration for the quota reservoir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Resources in priority order (earlier entries are tried first)
    pub resources: Vec<ResourceSpec>,

    /// Base directory for the file-backed store
    pub data_dir: PathBuf,

    /// Days of usage history to keep when pruning (0 = keep everything)
    pub retention_days: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            resources: vec![
                ResourceSpec::new("gemini-2.5-pro", 100),
                ResourceSpec::new("gemini-2.5-flash", 250),
                ResourceSpec::new("gemini-2.5-flash-lite", 1000),
            ],
            data_dir: PathBuf::from("."),
            retention_days: 0,
        }
    }
}

impl QuotaConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with no resources, to be filled with `with_resource`.
    pub fn empty() -> Self {
        Self {
            resources: Vec::new(),
            ..Self::default()
        }
    }

    /// Load configuration from an optional TOML file plus environment.
    ///
    /// Environment variables use the `MODELQUOTA_` prefix and override file
    /// values (`MODELQUOTA_DATA_DIR`, `MODELQUOTA_RETENTION_DAYS`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: QuotaConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: QuotaConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Append a resource at the lowest priority.
    pub fn with_resource(mut self, name: impl Into<String>, daily_capacity: u32) -> Self {
        self.resources.push(ResourceSpec::new(name, daily_capacity));
        self
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the retention window.
    pub fn with_retention_days(mut self, days: u64) -> Self {
        self.retention_days = days;
        self
    }

    /// Check the resource list is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_resources(&self.resources)
    }
}

/// Validate an ordered resource list.
pub fn validate_resources(resources: &[ResourceSpec]) -> Result<(), ConfigError> {
    if resources.is_empty() {
        return Err(ConfigError::EmptyResources);
    }

    let mut seen = HashSet::new();
    for resource in resources {
        if resource.name.trim().is_empty() {
            return Err(ConfigError::BlankName);
        }
        if resource.daily_capacity == 0 {
            return Err(ConfigError::ZeroCapacity(resource.name.clone()));
        }
        if !seen.insert(resource.name.as_str()) {
            return Err(ConfigError::DuplicateResource(resource.name.clone()));
        }
    }

    Ok(())
}
