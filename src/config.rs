use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::enrichment::TransmitterDefaults;

/// Output file written when no other path is configured
pub const DEFAULT_OUTPUT_PATH: &str = "State_new.json";

/// What to do when two records of a category end up with the same key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Last record wins, silently
    Overwrite,
    /// Last record wins, and the collision is logged and reported
    #[default]
    Warn,
    /// Abort the migration
    Reject,
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollisionPolicy::Overwrite => "overwrite",
            CollisionPolicy::Warn => "warn",
            CollisionPolicy::Reject => "reject",
        };
        f.write_str(name)
    }
}

impl FromStr for CollisionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(CollisionPolicy::Overwrite),
            "warn" => Ok(CollisionPolicy::Warn),
            "reject" => Ok(CollisionPolicy::Reject),
            _ => Err(ConfigError::InvalidValue {
                key: "onCollision".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Resolved settings for one migration run
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOptions {
    pub normalize: bool,
    pub enrich: bool,
    pub collision_policy: CollisionPolicy,
    pub transmitter_defaults: TransmitterDefaults,
    pub output_path: PathBuf,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            enrich: true,
            collision_policy: CollisionPolicy::default(),
            transmitter_defaults: TransmitterDefaults::default(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }
}

impl MigrationOptions {
    /// Regroup only: names keep their casing and transmitters are not enriched
    pub fn legacy() -> Self {
        Self {
            normalize: false,
            enrich: false,
            ..Self::default()
        }
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    /// Layer the values present in a config file over these options
    pub fn merge_config(mut self, config: MigrationConfig) -> Self {
        if let Some(normalize) = config.normalize {
            self.normalize = normalize;
        }
        if let Some(enrich) = config.enrich {
            self.enrich = enrich;
        }
        if let Some(policy) = config.on_collision {
            self.collision_policy = policy;
        }
        if let Some(output) = config.output {
            self.output_path = output;
        }
        if let Some(defaults) = config.transmitter_defaults {
            self.transmitter_defaults = defaults;
        }
        self
    }
}

/// Optional YAML config file; every key may be omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MigrationConfig {
    pub normalize: Option<bool>,
    pub enrich: Option<bool>,
    pub on_collision: Option<CollisionPolicy>,
    pub output: Option<PathBuf>,
    pub transmitter_defaults: Option<TransmitterDefaults>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

impl MigrationConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file parses as null rather than an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_yaml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), ?config, "Loaded migration config");
        Ok(config)
    }
}
