use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Main configuration structure for Foresight
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Pattern engine configuration
    #[serde(default)]
    pub pattern_engine: PatternEngineConfig,

    /// Scenario engine configuration
    #[serde(default)]
    pub scenario_engine: ScenarioEngineConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Background daemon configuration
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Pattern engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PatternEngineConfig {
    /// Observations a candidate needs before promotion
    #[serde(default = "default_min_observations")]
    pub min_observations_for_pattern: usize,

    /// Confidence a pattern needs to flag anomalies
    #[serde(default = "default_min_confidence")]
    pub min_confidence_threshold: f64,

    /// Days without a match before decay starts
    #[serde(default = "default_decay_days")]
    pub pattern_decay_days: u32,

    /// Consistency a time slot must exceed to become a candidate
    #[serde(default = "default_emerging_threshold")]
    pub emerging_pattern_threshold: f64,

    /// Strength a candidate must reach for promotion
    #[serde(default = "default_established_threshold")]
    pub established_pattern_threshold: f64,

    /// Rolling observation window in days
    #[serde(default = "default_observation_retention_days")]
    pub retention_days: u32,

    /// Minimum seconds between incremental analysis passes
    #[serde(default = "default_analysis_interval_secs")]
    pub analysis_interval_secs: u64,

    /// Household clock offset east of UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

const fn default_min_observations() -> usize {
    5
}

const fn default_min_confidence() -> f64 {
    0.6
}

const fn default_decay_days() -> u32 {
    14
}

const fn default_emerging_threshold() -> f64 {
    0.3
}

const fn default_established_threshold() -> f64 {
    0.7
}

const fn default_observation_retention_days() -> u32 {
    90
}

const fn default_analysis_interval_secs() -> u64 {
    60
}

impl PatternEngineConfig {
    pub fn retention(&self) -> Duration {
        Duration::days(i64::from(self.retention_days))
    }

    pub fn decay_window(&self) -> Duration {
        Duration::days(i64::from(self.pattern_decay_days))
    }

    pub fn analysis_interval(&self) -> Duration {
        Duration::seconds(i64::try_from(self.analysis_interval_secs).unwrap_or(i64::MAX))
    }
}

impl Default for PatternEngineConfig {
    fn default() -> Self {
        Self {
            min_observations_for_pattern: default_min_observations(),
            min_confidence_threshold: default_min_confidence(),
            pattern_decay_days: default_decay_days(),
            emerging_pattern_threshold: default_emerging_threshold(),
            established_pattern_threshold: default_established_threshold(),
            retention_days: default_observation_retention_days(),
            analysis_interval_secs: default_analysis_interval_secs(),
            utc_offset_minutes: 0,
        }
    }
}

/// How overlapping, mutually exclusive scenarios are reconciled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolutionStrategy {
    /// Halve the less likely scenario and mark it conflicted
    Conservative,
    /// Scale both scenarios by 0.7 and cross-reference them
    #[default]
    Balanced,
    /// Delete the less likely scenario
    Aggressive,
}

impl ConflictResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        }
    }
}

impl std::fmt::Display for ConflictResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look-ahead windows of the four scenario horizons
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PredictionHorizons {
    #[serde(default = "default_immediate_minutes")]
    pub immediate_minutes: u32,

    #[serde(default = "default_short_term_minutes")]
    pub short_term_minutes: u32,

    #[serde(default = "default_daily_hours")]
    pub daily_hours: u32,

    #[serde(default = "default_weekly_days")]
    pub weekly_days: u32,
}

const fn default_immediate_minutes() -> u32 {
    30
}

const fn default_short_term_minutes() -> u32 {
    240
}

const fn default_daily_hours() -> u32 {
    24
}

const fn default_weekly_days() -> u32 {
    7
}

impl PredictionHorizons {
    pub fn immediate(&self) -> Duration {
        Duration::minutes(i64::from(self.immediate_minutes))
    }

    pub fn short_term(&self) -> Duration {
        Duration::minutes(i64::from(self.short_term_minutes))
    }

    pub fn daily(&self) -> Duration {
        Duration::hours(i64::from(self.daily_hours))
    }

    pub fn weekly(&self) -> Duration {
        Duration::days(i64::from(self.weekly_days))
    }
}

impl Default for PredictionHorizons {
    fn default() -> Self {
        Self {
            immediate_minutes: default_immediate_minutes(),
            short_term_minutes: default_short_term_minutes(),
            daily_hours: default_daily_hours(),
            weekly_days: default_weekly_days(),
        }
    }
}

/// Scenario engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioEngineConfig {
    #[serde(default)]
    pub prediction_horizons: PredictionHorizons,

    /// Scenarios below this probability are never created
    #[serde(default = "default_min_scenario_probability")]
    pub min_scenario_probability: f64,

    /// Preparations of scenarios at or above this probability may run unattended
    #[serde(default = "default_auto_execute_threshold")]
    pub auto_execute_threshold: f64,

    #[serde(default)]
    pub conflict_resolution_strategy: ConflictResolutionStrategy,
}

const fn default_min_scenario_probability() -> f64 {
    0.3
}

const fn default_auto_execute_threshold() -> f64 {
    0.8
}

impl Default for ScenarioEngineConfig {
    fn default() -> Self {
        Self {
            prediction_horizons: PredictionHorizons::default(),
            min_scenario_probability: default_min_scenario_probability(),
            auto_execute_threshold: default_auto_execute_threshold(),
            conflict_resolution_strategy: ConflictResolutionStrategy::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".foresight/foresight.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Anticipation daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DaemonConfig {
    /// Seconds between ticks
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Regenerate scenarios on every tick, not only when context changed
    #[serde(default = "default_true")]
    pub regenerate_every_tick: bool,
}

const fn default_tick_interval_secs() -> u64 {
    60
}

const fn default_true() -> bool {
    true
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            regenerate_every_tick: default_true(),
        }
    }
}
