//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - Programmatic defaults
//! - `.foresight/config.yaml` and `.foresight/local.yaml`
//! - `FORESIGHT_` environment overrides

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR, ENV_PREFIX};
