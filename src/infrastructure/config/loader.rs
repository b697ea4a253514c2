use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local configuration directory.
pub const CONFIG_DIR: &str = ".foresight";

/// Environment variable prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "FORESIGHT_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {name}: {value}. Must be between 0.0 and 1.0")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error(
        "Invalid pattern thresholds: emerging ({emerging}) must be below established ({established})"
    )]
    InvalidThresholdOrder { emerging: f64, established: f64 },

    #[error("Invalid min_observations_for_pattern: {0}. Must be at least 1")]
    InvalidMinObservations(usize),

    #[error("Invalid pattern_decay_days: {0}. Must be at least 1")]
    InvalidDecayDays(u32),

    #[error("Invalid retention_days: {retention}. Must be at least pattern_decay_days ({decay})")]
    InvalidRetention { retention: u32, decay: u32 },

    #[error("Invalid utc_offset_minutes: {0}. Must be within ±1439")]
    InvalidUtcOffset(i32),

    #[error("Invalid prediction horizons: {0}")]
    InvalidHorizons(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid tick_interval_secs: {0}. Must be at least 1")]
    InvalidTickInterval(u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration relative to the working directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .foresight/config.yaml (project config, created by init)
    /// 3. .foresight/local.yaml (project local overrides, optional)
    /// 4. Environment variables (FORESIGHT_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration for the project rooted at `root`.
    pub fn load_from(root: &Path) -> Result<Config> {
        let dir = root.join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Default configuration rendered as YAML, as written by `foresight init`.
    pub fn default_yaml() -> Result<String> {
        serde_yaml::to_string(&Config::default()).context("Failed to serialize default configuration")
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let patterns = &config.pattern_engine;
        let scenarios = &config.scenario_engine;

        for (name, value) in [
            ("min_confidence_threshold", patterns.min_confidence_threshold),
            ("emerging_pattern_threshold", patterns.emerging_pattern_threshold),
            ("established_pattern_threshold", patterns.established_pattern_threshold),
            ("min_scenario_probability", scenarios.min_scenario_probability),
            ("auto_execute_threshold", scenarios.auto_execute_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        if patterns.emerging_pattern_threshold >= patterns.established_pattern_threshold {
            return Err(ConfigError::InvalidThresholdOrder {
                emerging: patterns.emerging_pattern_threshold,
                established: patterns.established_pattern_threshold,
            });
        }

        if patterns.min_observations_for_pattern == 0 {
            return Err(ConfigError::InvalidMinObservations(0));
        }

        if patterns.pattern_decay_days == 0 {
            return Err(ConfigError::InvalidDecayDays(0));
        }

        if patterns.retention_days < patterns.pattern_decay_days {
            return Err(ConfigError::InvalidRetention {
                retention: patterns.retention_days,
                decay: patterns.pattern_decay_days,
            });
        }

        if patterns.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidUtcOffset(patterns.utc_offset_minutes));
        }

        // Horizons must be non-empty and strictly increasing
        let h = &scenarios.prediction_horizons;
        if h.immediate_minutes == 0 {
            return Err(ConfigError::InvalidHorizons(
                "immediate_minutes must be at least 1".to_string(),
            ));
        }
        if !(h.immediate() < h.short_term() && h.short_term() < h.daily() && h.daily() < h.weekly()) {
            return Err(ConfigError::InvalidHorizons(format!(
                "expected immediate < short_term < daily < weekly, got {}m, {}m, {}h, {}d",
                h.immediate_minutes, h.short_term_minutes, h.daily_hours, h.weekly_days
            )));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.daemon.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidTickInterval(0));
        }

        Ok(())
    }
}
