//! Port trait definitions (Hexagonal Architecture)
//!
//! - Clock: injectable time source driving decay, expiry and scheduling
//! - PatternSource: read-only view of established patterns for scenario generation
//! - ObservationRepository / PatternRepository: persistence collaborators

pub mod clock;
pub mod observation_repository;
pub mod pattern_repository;
pub mod pattern_source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use observation_repository::ObservationRepository;
pub use pattern_repository::PatternRepository;
pub use pattern_source::PatternSource;
