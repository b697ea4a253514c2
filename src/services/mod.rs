//! Engine services.
//!
//! The pattern side (observation store, candidate tracker, pattern registry)
//! feeds the scenario side (generator, conflict resolver, preparation
//! scheduler) through the [`PatternSource`](crate::domain::ports::PatternSource)
//! port. [`Anticipator`] wires both to a clock and the event bus.

pub mod anticipation_daemon;
pub mod anticipator;
pub mod candidate_tracker;
pub mod conflict_resolver;
pub mod event_bus;
pub mod observation_store;
pub mod pattern_engine;
pub mod pattern_registry;
pub mod preparation_scheduler;
pub mod scenario_engine;
pub mod scenario_generator;

pub use anticipation_daemon::{
    AnticipationDaemon, AnticipationDaemonConfig, DaemonEvent, DaemonHandle, DaemonStatus,
    StopReason,
};
pub use anticipator::{Anticipator, TickReport};
pub use candidate_tracker::{AnalysisReport, CandidateTracker, TrackerSettings};
pub use conflict_resolver::{ConflictResolver, EXCLUSIVE_ACTIVITIES};
pub use event_bus::{
    EngineEvent, EventBus, EventBusConfig, EventCategory, EventEnvelope, EventId, SequenceNumber,
};
pub use observation_store::{ObservationStore, RecordOutcome};
pub use pattern_engine::{ObserveReport, PassReport, PatternEngine};
pub use pattern_registry::{PatternRegistry, RegistrySettings};
pub use preparation_scheduler::PreparationScheduler;
pub use scenario_engine::{RegenerationReport, ScenarioEngine};
pub use scenario_generator::{GenerationInput, ScenarioGenerator};
