pub mod config;
pub mod context;
pub mod local_time;
pub mod observation;
pub mod pattern;
pub mod scenario;

pub use config::{
    Config, ConflictResolutionStrategy, DaemonConfig, DatabaseConfig, LoggingConfig,
    PatternEngineConfig, PredictionHorizons, ScenarioEngineConfig,
};
pub use context::{
    CalendarCategory, CalendarEvent, ExternalContext, Holiday, OccupantState, TrafficLevel,
    Weather,
};
pub use local_time::{DayType, LocalTime, SLOT_HOURS, SLOTS_PER_DAY};
pub use observation::{
    EnvironmentVariable, Observation, ObservationKind, ObservationPayload, PresenceState,
};
pub use pattern::{
    EnvironmentForecast, MomentPrediction, Pattern, PatternCandidate, PatternSignature,
    PatternStatus, PatternType, PredictedActivity, DORMANT_CONFIDENCE,
};
pub use scenario::{
    EnergyDemand, EnvironmentNeeds, Horizon, Occupancy, PredictedState, PreparationAction,
    PreparationCategory, ResourceNeeds, Scenario, ScenarioBuilder, ScenarioSource, Timeframe,
    TriggeredPreparation,
};
