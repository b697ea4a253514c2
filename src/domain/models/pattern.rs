//! Pattern domain model.
//!
//! Behavioral regularities move through a one-directional lifecycle:
//! - Emerging: a candidate inside the tracker, not visible to consumers
//! - Established: promoted, queryable, used for prediction
//! - Fading: not re-observed within the decay window, confidence shrinking
//! - Dormant: confidence below the floor, retained but ignored by predictions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::local_time::{DayType, SLOT_HOURS};
use super::observation::EnvironmentVariable;

/// Confidence below which a fading pattern becomes dormant.
pub const DORMANT_CONFIDENCE: f64 = 0.3;

/// Type of behavioral pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Recurring activity in a fixed time slot
    DailyRoutine,
    /// Activity mix that differs between weekdays and weekends
    WeeklyRoutine,
    /// Recurring ordered run of activities
    Sequence,
    /// Preferred range of an environment variable
    ComfortPreference,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyRoutine => "daily_routine",
            Self::WeeklyRoutine => "weekly_routine",
            Self::Sequence => "sequence",
            Self::ComfortPreference => "comfort_preference",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "daily_routine" | "daily" => Some(Self::DailyRoutine),
            "weekly_routine" | "weekly" => Some(Self::WeeklyRoutine),
            "sequence" => Some(Self::Sequence),
            "comfort_preference" | "comfort" => Some(Self::ComfortPreference),
            _ => None,
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a promoted pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    Established,
    Fading,
    Dormant,
}

impl PatternStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Established => "established",
            Self::Fading => "fading",
            Self::Dormant => "dormant",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "established" => Some(Self::Established),
            "fading" => Some(Self::Fading),
            "dormant" => Some(Self::Dormant),
            _ => None,
        }
    }

    /// One step back toward established, never skipping a state.
    pub fn step_up(self) -> Self {
        match self {
            Self::Dormant => Self::Fading,
            Self::Fading | Self::Established => Self::Established,
        }
    }
}

impl std::fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific payload of a pattern or candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternSignature {
    DailyRoutine {
        /// Slot index (0-11)
        slot: u32,
        /// Mean local minute of day of the contributing observations
        mean_minute_of_day: u32,
        /// Normalized activity frequencies within the slot
        activities: BTreeMap<String, f64>,
        dominant_room: Option<String>,
        /// Distinct days observed / days spanned
        consistency: f64,
    },
    WeeklyRoutine {
        weekday_profile: BTreeMap<String, f64>,
        weekend_profile: BTreeMap<String, f64>,
        /// Total absolute profile difference (0-2)
        divergence: f64,
    },
    Sequence {
        activities: Vec<String>,
        /// Share of windows containing the sequence
        support: f64,
    },
    ComfortPreference {
        variable: EnvironmentVariable,
        preferred_low: f64,
        preferred_high: f64,
        median: f64,
        /// 1 - IQR / full range
        tightness: f64,
    },
}

impl PatternSignature {
    pub fn pattern_type(&self) -> PatternType {
        match self {
            Self::DailyRoutine { .. } => PatternType::DailyRoutine,
            Self::WeeklyRoutine { .. } => PatternType::WeeklyRoutine,
            Self::Sequence { .. } => PatternType::Sequence,
            Self::ComfortPreference { .. } => PatternType::ComfortPreference,
        }
    }

    /// Consistency measure of the axis that produced the signature.
    pub fn stability(&self) -> f64 {
        let raw = match self {
            Self::DailyRoutine { consistency, .. } => *consistency,
            Self::WeeklyRoutine { divergence, .. } => divergence / 2.0,
            Self::Sequence { support, .. } => *support,
            Self::ComfortPreference { tightness, .. } => *tightness,
        };
        raw.clamp(0.0, 1.0)
    }

    /// Activity with the largest share, and that share.
    ///
    /// For weekly routines the profile of `day_type` is used.
    pub fn dominant_activity(&self, day_type: DayType) -> Option<(&str, f64)> {
        let profile = match self {
            Self::DailyRoutine { activities, .. } => activities,
            Self::WeeklyRoutine {
                weekday_profile,
                weekend_profile,
                ..
            } => match day_type {
                DayType::Weekday => weekday_profile,
                DayType::Weekend => weekend_profile,
            },
            Self::Sequence { .. } | Self::ComfortPreference { .. } => return None,
        };
        dominant(profile)
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        match self {
            Self::DailyRoutine {
                slot, activities, ..
            } => {
                let start = slot * SLOT_HOURS;
                let top = dominant(activities).map_or("activity", |(name, _)| name);
                format!("{top} around {start:02}:00-{:02}:00", start + SLOT_HOURS)
            }
            Self::WeeklyRoutine {
                weekend_profile, ..
            } => {
                let top = dominant(weekend_profile).map_or("activity", |(name, _)| name);
                format!("weekends differ from weekdays (weekend: {top})")
            }
            Self::Sequence { activities, .. } => activities.join(" -> "),
            Self::ComfortPreference {
                variable,
                preferred_low,
                preferred_high,
                ..
            } => format!("{variable} between {preferred_low:.1} and {preferred_high:.1}"),
        }
    }
}

pub(crate) fn dominant(profile: &BTreeMap<String, f64>) -> Option<(&str, f64)> {
    profile
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(name, share)| (name.as_str(), *share))
}

/// An unconfirmed, strengthening hypothesis about a recurring behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCandidate {
    /// Stable key derived from the axis' grouping criteria
    pub key: String,
    pub signature: PatternSignature,
    /// Contributing observations from the latest pass
    pub observation_ids: Vec<Uuid>,
    /// Strength (0.0-1.0)
    pub strength: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl PatternCandidate {
    pub fn pattern_type(&self) -> PatternType {
        self.signature.pattern_type()
    }

    pub fn observation_count(&self) -> usize {
        self.observation_ids.len()
    }
}

/// A confirmed, queryable behavioral regularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Unique identifier
    pub id: Uuid,
    /// Key of the candidate the pattern was promoted from
    pub key: String,
    pub pattern_type: PatternType,
    pub signature: PatternSignature,
    /// Confidence (0.0-1.0)
    pub confidence: f64,
    /// Stability (0.0-1.0)
    pub stability: f64,
    pub first_observed: DateTime<Utc>,
    pub last_observed: DateTime<Utc>,
    /// Number of observations supporting the pattern
    pub occurrences: u64,
    pub status: PatternStatus,
    /// Last decay tick applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_decayed_at: Option<DateTime<Utc>>,
}

impl Pattern {
    /// Promote a candidate into a new established pattern.
    pub fn from_candidate(candidate: &PatternCandidate) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: candidate.key.clone(),
            pattern_type: candidate.pattern_type(),
            signature: candidate.signature.clone(),
            confidence: candidate.strength.clamp(0.0, 1.0),
            stability: candidate.signature.stability(),
            first_observed: candidate.first_seen,
            last_observed: candidate.last_seen,
            occurrences: candidate.observation_count() as u64,
            status: PatternStatus::Established,
            last_decayed_at: None,
        }
    }

    /// Whether the pattern may contribute to predictions.
    pub fn is_active(&self) -> bool {
        self.status != PatternStatus::Dormant
    }

    pub fn summary(&self) -> String {
        self.signature.summary()
    }
}

/// An activity expected at some moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedActivity {
    pub name: String,
    /// Independent confidence (0.0-1.0); predicted activities need not sum to 1
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// Environment targets learned from comfort preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentForecast {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub light: Option<f64>,
}

impl EnvironmentForecast {
    pub fn set(&mut self, variable: EnvironmentVariable, value: f64) {
        match variable {
            EnvironmentVariable::Temperature => self.temperature = Some(value),
            EnvironmentVariable::Humidity => self.humidity = Some(value),
            EnvironmentVariable::Light => self.light = Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none() && self.light.is_none()
    }
}

/// Aggregate forecast for a single moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentPrediction {
    pub moment: DateTime<Utc>,
    pub activities: Vec<PredictedActivity>,
    pub environment: EnvironmentForecast,
    /// Mean confidence of contributing patterns, 0 when none apply
    pub confidence: f64,
    pub contributing_patterns: Vec<Uuid>,
}

impl MomentPrediction {
    pub fn empty(moment: DateTime<Utc>) -> Self {
        Self {
            moment,
            activities: Vec::new(),
            environment: EnvironmentForecast::default(),
            confidence: 0.0,
            contributing_patterns: Vec::new(),
        }
    }

    pub fn activity(&self, name: &str) -> Option<&PredictedActivity> {
        self.activities.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_status_step_up_never_skips() {
        assert_eq!(PatternStatus::Dormant.step_up(), PatternStatus::Fading);
        assert_eq!(PatternStatus::Fading.step_up(), PatternStatus::Established);
        assert_eq!(PatternStatus::Established.step_up(), PatternStatus::Established);
    }

    #[test]
    fn test_dominant_activity_for_weekly_uses_day_type() {
        let sig = PatternSignature::WeeklyRoutine {
            weekday_profile: profile(&[("working", 0.8), ("cooking", 0.2)]),
            weekend_profile: profile(&[("gardening", 0.6), ("cooking", 0.4)]),
            divergence: 1.6,
        };
        assert_eq!(sig.dominant_activity(DayType::Weekday), Some(("working", 0.8)));
        assert_eq!(sig.dominant_activity(DayType::Weekend), Some(("gardening", 0.6)));
        assert!((sig.stability() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_daily_summary() {
        let sig = PatternSignature::DailyRoutine {
            slot: 9,
            mean_minute_of_day: 19 * 60,
            activities: profile(&[("cooking", 1.0)]),
            dominant_room: Some("kitchen".to_string()),
            consistency: 1.0,
        };
        assert_eq!(sig.summary(), "cooking around 18:00-20:00");
    }

    #[test]
    fn test_signature_tagged_json() {
        let sig = PatternSignature::Sequence {
            activities: vec!["waking".into(), "showering".into()],
            support: 0.4,
        };
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["type"], "sequence");
        let back: PatternSignature = serde_json::from_value(json).unwrap();
        assert_eq!(back, sig);
    }
}
