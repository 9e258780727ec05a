//! # Engine Configuration
//!
//! All hyperparameters live in one `EngineConfig`. Every section and key has a
//! default, so an empty TOML document (or no file at all) yields the standard
//! configuration. Values are validated once at the boundary; the numeric core
//! assumes they are sane.

use crate::hashing::DEFAULT_DIMENSION;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_EPOCHS: usize = 3;
pub const DEFAULT_LEARNING_RATE: f64 = 0.2;
pub const DEFAULT_L2_LAMBDA: f64 = 1e-3;
pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_MIN_SUPPORT: usize = 30;
pub const DEFAULT_MIN_DELTA: f64 = 1e-3;
/// Values per field considered by chain search.
pub const DEFAULT_CHAIN_DOMAIN_CAP: usize = 12;
/// Values per field offered for interactive selection.
pub const DEFAULT_DISPLAY_DOMAIN_CAP: usize = 25;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid configuration value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HashingConfig {
    /// Number of hash buckets, i.e. the length of the weight vector.
    pub dimension: usize,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }
}

/// Stochastic gradient descent schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub epochs: usize,
    /// Learning rate of the first epoch; epoch `e` uses `learning_rate / (1 + e)`.
    pub learning_rate: f64,
    pub l2_lambda: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
            l2_lambda: DEFAULT_L2_LAMBDA,
        }
    }
}

/// Bounds for greedy risk-chain search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainConfig {
    /// Maximum number of assignments after the Start step.
    pub max_depth: usize,
    /// Minimum number of matching records for a candidate to be considered.
    pub min_support: usize,
    /// Smallest directional improvement that still extends a chain.
    pub min_delta: f64,
    pub domain_cap: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            min_support: DEFAULT_MIN_SUPPORT,
            min_delta: DEFAULT_MIN_DELTA,
            domain_cap: DEFAULT_CHAIN_DOMAIN_CAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub domain_cap: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            domain_cap: DEFAULT_DISPLAY_DOMAIN_CAP,
        }
    }
}

/// The complete set of engine hyperparameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub hashing: HashingConfig,
    pub training: TrainingConfig,
    pub chain: ChainConfig,
    pub display: DisplayConfig,
}

impl EngineConfig {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects values the numeric core cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                key,
                reason: reason.into(),
            })
        }

        if self.hashing.dimension == 0 {
            return invalid("hashing.dimension", "must be at least 1");
        }
        if self.hashing.dimension > i32::MAX as usize {
            return invalid("hashing.dimension", "must fit in a 32-bit signed integer");
        }
        if self.training.epochs == 0 {
            return invalid("training.epochs", "must be at least 1");
        }
        let rate = self.training.learning_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return invalid(
                "training.learning_rate",
                format!("must be a positive finite number, got {rate}"),
            );
        }
        let lambda = self.training.l2_lambda;
        if !lambda.is_finite() || lambda < 0.0 {
            return invalid(
                "training.l2_lambda",
                format!("must be a non-negative finite number, got {lambda}"),
            );
        }
        let delta = self.chain.min_delta;
        if !delta.is_finite() || delta < 0.0 {
            return invalid(
                "chain.min_delta",
                format!("must be a non-negative finite number, got {delta}"),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty config");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.hashing.dimension, 1024);
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.chain.min_support, 30);
        assert_eq!(config.chain.domain_cap, 12);
        assert_eq!(config.display.domain_cap, 25);
    }

    #[test]
    fn partial_sections_override_only_given_keys() {
        let config = EngineConfig::from_toml_str(
            "[training]\nepochs = 5\n\n[chain]\nmin_support = 2\n",
        )
        .expect("partial config");
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.learning_rate, DEFAULT_LEARNING_RATE);
        assert_eq!(config.chain.min_support, 2);
        assert_eq!(config.chain.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("[training]\nepoch = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_rejects_degenerate_values() {
        let mut config = EngineConfig::default();
        config.hashing.dimension = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "hashing.dimension",
                ..
            })
        ));

        let mut config = EngineConfig::default();
        config.training.learning_rate = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.chain.min_delta = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_output_parses_back() {
        let mut config = EngineConfig::default();
        config.chain.max_depth = 2;
        let text = config.to_toml_string().expect("serialize");
        assert_eq!(EngineConfig::from_toml_str(&text).expect("parse"), config);
    }
}
