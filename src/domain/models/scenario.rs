//! Scenario domain model.
//!
//! A scenario is a probabilistic, time-boxed prediction of household state
//! together with the preparation actions that ready the home for it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pattern::PredictedActivity;
use crate::domain::errors::{DomainError, DomainResult};

/// Look-ahead window a scenario was generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Immediate,
    ShortTerm,
    Daily,
    Weekly,
}

impl Horizon {
    pub const ALL: [Self; 4] = [Self::Immediate, Self::ShortTerm, Self::Daily, Self::Weekly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::ShortTerm => "short_term",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a scenario's evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioSource {
    /// Explicit calendar entry
    Calendar,
    /// Learned behavioral pattern
    Pattern,
    /// Derived from context (weather, holidays, resource demand)
    Inference,
}

impl ScenarioSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Pattern => "pattern",
            Self::Inference => "inference",
        }
    }
}

impl std::fmt::Display for ScenarioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated time window. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeframe")]
pub struct Timeframe {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawTimeframe {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawTimeframe> for Timeframe {
    type Error = DomainError;

    fn try_from(raw: RawTimeframe) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl Timeframe {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if end < start {
            return Err(DomainError::InvalidTimeframe { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn starting_at(start: DateTime<Utc>, length: Duration) -> DomainResult<Self> {
        Self::new(start, start + length)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Strict overlap: windows that only touch do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.end < now
    }
}

/// Who is expected to be home.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Occupancy {
    pub home: bool,
    #[serde(default)]
    pub expected_occupants: Vec<String>,
    #[serde(default)]
    pub guest_count: u32,
}

/// Environment targets the home should reach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentNeeds {
    pub target_temperature: Option<f64>,
    pub target_humidity: Option<f64>,
    pub target_light: Option<f64>,
}

/// Expected energy demand level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyDemand {
    Low,
    Normal,
    High,
}

/// Resources the scenario will draw on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceNeeds {
    pub energy_demand: Option<EnergyDemand>,
    #[serde(default)]
    pub hot_water: bool,
    #[serde(default)]
    pub supplies: Vec<String>,
}

/// Forecast bundle inside a scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictedState {
    pub occupancy: Occupancy,
    pub activities: Vec<PredictedActivity>,
    pub environment_needs: EnvironmentNeeds,
    pub resource_needs: ResourceNeeds,
}

impl PredictedState {
    pub fn has_activity(&self, name: &str) -> bool {
        self.activities.iter().any(|a| a.name == name)
    }
}

/// Category of a preparation action, routed to an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreparationCategory {
    Climate,
    Lighting,
    Kitchen,
    Cleaning,
    Supplies,
    Security,
    Energy,
    Notification,
}

impl PreparationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Climate => "climate",
            Self::Lighting => "lighting",
            Self::Kitchen => "kitchen",
            Self::Cleaning => "cleaning",
            Self::Supplies => "supplies",
            Self::Security => "security",
            Self::Energy => "energy",
            Self::Notification => "notification",
        }
    }
}

impl std::fmt::Display for PreparationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled side-effecting instruction owned by a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparationAction {
    /// Stable id derived from the owning scenario's key
    pub id: String,
    pub category: PreparationCategory,
    pub description: String,
    /// May precede the scenario start (lead time)
    pub execute_at: DateTime<Utc>,
    /// Priority (0-10, higher = more urgent)
    pub priority: u8,
    pub reversible: bool,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A probabilistic prediction of a future household state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique identifier, kept across regenerations
    pub id: Uuid,
    /// Stable deduplication key
    pub key: String,
    pub description: String,
    /// Probability after conflict resolution (0.0-1.0)
    pub probability: f64,
    /// Probability as generated, before conflict resolution
    pub base_probability: f64,
    pub timeframe: Timeframe,
    pub source: ScenarioSource,
    pub horizon: Horizon,
    pub predicted_state: PredictedState,
    pub required_preparation: Vec<PreparationAction>,
    pub conflicts_with: Vec<Uuid>,
    /// Set when a conservative resolution penalized this scenario
    pub conflicted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Insertion order, used for first-seen tie breaks
    pub sequence: u64,
}

impl Scenario {
    /// Start building a scenario. Probability is validated by [`ScenarioBuilder::build`].
    pub fn builder(
        key: impl Into<String>,
        description: impl Into<String>,
        timeframe: Timeframe,
    ) -> ScenarioBuilder {
        ScenarioBuilder {
            key: key.into(),
            description: description.into(),
            timeframe,
            probability: 0.0,
            source: ScenarioSource::Inference,
            horizon: Horizon::Immediate,
            predicted_state: PredictedState::default(),
            preparations: Vec::new(),
        }
    }

    pub fn activity_names(&self) -> impl Iterator<Item = &str> {
        self.predicted_state.activities.iter().map(|a| a.name.as_str())
    }

    pub fn preparation(&self, id: &str) -> Option<&PreparationAction> {
        self.required_preparation.iter().find(|a| a.id == id)
    }
}

/// Builder that keeps action ids tied to the scenario key.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    key: String,
    description: String,
    timeframe: Timeframe,
    probability: f64,
    source: ScenarioSource,
    horizon: Horizon,
    predicted_state: PredictedState,
    preparations: Vec<PreparationAction>,
}

impl ScenarioBuilder {
    pub fn probability(mut self, probability: f64) -> Self {
        self.probability = probability;
        self
    }

    pub fn source(mut self, source: ScenarioSource) -> Self {
        self.source = source;
        self
    }

    pub fn horizon(mut self, horizon: Horizon) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn activity(mut self, name: impl Into<String>, confidence: f64, room: Option<String>) -> Self {
        self.predicted_state.activities.push(PredictedActivity {
            name: name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            room,
        });
        self
    }

    pub fn state(mut self, f: impl FnOnce(&mut PredictedState)) -> Self {
        f(&mut self.predicted_state);
        self
    }

    /// Attach a preparation executing `lead` before `instant`.
    pub fn prepare(
        mut self,
        category: PreparationCategory,
        description: impl Into<String>,
        instant: DateTime<Utc>,
        lead: Duration,
        priority: u8,
    ) -> Self {
        let id = format!("{}/{}", self.key, category.as_str());
        let depends_on = self
            .preparations
            .last()
            .filter(|prev| prev.execute_at <= instant - lead)
            .map(|prev| vec![prev.id.clone()])
            .unwrap_or_default();
        self.preparations.push(PreparationAction {
            id,
            category,
            description: description.into(),
            execute_at: instant - lead,
            priority: priority.min(10),
            reversible: !matches!(category, PreparationCategory::Supplies | PreparationCategory::Cleaning),
            depends_on,
        });
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn base_probability(&self) -> f64 {
        self.probability
    }

    /// Finish the scenario, rejecting out-of-range probabilities.
    pub fn build(self, now: DateTime<Utc>) -> DomainResult<Scenario> {
        if !(0.0..=1.0).contains(&self.probability) || self.probability.is_nan() {
            return Err(DomainError::InvalidProbability(self.probability));
        }
        Ok(Scenario {
            id: Uuid::new_v4(),
            key: self.key,
            description: self.description,
            probability: self.probability,
            base_probability: self.probability,
            timeframe: self.timeframe,
            source: self.source,
            horizon: self.horizon,
            predicted_state: self.predicted_state,
            required_preparation: self.preparations,
            conflicts_with: Vec::new(),
            conflicted: false,
            created_at: now,
            updated_at: now,
            sequence: 0,
        })
    }
}

/// A preparation action that came due, with the context an executor needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredPreparation {
    pub scenario_id: Uuid,
    pub scenario_description: String,
    pub probability: f64,
    /// Probability met the auto-execute threshold
    pub auto_execute: bool,
    pub action: PreparationAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_rejects_inverted_bounds() {
        let now = Utc::now();
        let err = Timeframe::new(now, now - Duration::minutes(1)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTimeframe { .. }));
        assert!(Timeframe::new(now, now).is_ok());
    }

    #[test]
    fn test_timeframe_deserialize_validates() {
        let json = serde_json::json!({
            "start": "2026-03-02T10:00:00Z",
            "end": "2026-03-02T09:00:00Z",
        });
        assert!(serde_json::from_value::<Timeframe>(json).is_err());
    }

    #[test]
    fn test_touching_windows_do_not_overlap() {
        let now = Utc::now();
        let a = Timeframe::starting_at(now, Duration::hours(1)).unwrap();
        let b = Timeframe::starting_at(now + Duration::hours(1), Duration::hours(1)).unwrap();
        let c = Timeframe::starting_at(now + Duration::minutes(30), Duration::hours(1)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_builder_derives_action_ids_and_dependencies() {
        let now = Utc::now();
        let start = now + Duration::hours(2);
        let scenario = Scenario::builder("daily:meal:dinner:2026-03-02", "dinner", Timeframe::starting_at(start, Duration::hours(1)).unwrap())
            .probability(0.8)
            .prepare(PreparationCategory::Kitchen, "preheat", start, Duration::minutes(30), 6)
            .prepare(PreparationCategory::Lighting, "dining lights", start, Duration::minutes(15), 4)
            .build(now)
            .unwrap();

        let kitchen = scenario.preparation("daily:meal:dinner:2026-03-02/kitchen").unwrap();
        assert_eq!(kitchen.execute_at, start - Duration::minutes(30));
        let lighting = scenario.preparation("daily:meal:dinner:2026-03-02/lighting").unwrap();
        assert_eq!(lighting.depends_on, vec![kitchen.id.clone()]);
    }

    #[test]
    fn test_builder_rejects_probability_out_of_range() {
        let now = Utc::now();
        let tf = Timeframe::starting_at(now, Duration::hours(1)).unwrap();
        let err = Scenario::builder("k", "d", tf).probability(1.2).build(now).unwrap_err();
        assert!(matches!(err, DomainError::InvalidProbability(_)));
    }
}
