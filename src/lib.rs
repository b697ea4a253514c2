//! Foresight - household anticipation engine
//!
//! Foresight learns the rhythms of a household from a stream of observations
//! (activities, presence, device states, environment readings) and turns them
//! into probabilistic scenarios with preparation actions scheduled ahead of
//! time.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and ports
//! - **Service Layer** (`services`): pattern engine, scenario engine, event bus, daemon
//! - **Adapters** (`adapters`): SQLite persistence
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use foresight::{Anticipator, Config, EventBus, EventBusConfig, Observation, SystemClock};
//!
//! let bus = Arc::new(EventBus::new(EventBusConfig::default()));
//! let mut anticipator = Anticipator::new(&Config::default(), Arc::new(SystemClock), bus);
//! let now = anticipator.now();
//! anticipator.observe(Observation::activity(now, "cooking").in_room("kitchen"))?;
//! let report = anticipator.regenerate_scenarios();
//! println!("{} scenario(s) generated", report.generated);
//! # Ok::<(), foresight::DomainError>(())
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    CalendarEvent, Config, ConflictResolutionStrategy, ExternalContext, Horizon,
    MomentPrediction, Observation, OccupantState, Pattern, PatternStatus, PatternType,
    PreparationAction, Scenario, TriggeredPreparation,
};
pub use domain::ports::{Clock, ManualClock, PatternSource, SystemClock};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AnticipationDaemon, Anticipator, EngineEvent, EventBus, EventBusConfig, EventEnvelope,
    PatternEngine, ScenarioEngine,
};
