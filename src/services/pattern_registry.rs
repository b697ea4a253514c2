//! Pattern registry.
//!
//! Owns every promoted pattern and drives the lifecycle state machine:
//! strengthening from new observations, promotion from candidates, and
//! time-based decay. Each operation returns the events it produced.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::models::{
    DayType, LocalTime, MomentPrediction, Observation, Pattern, PatternCandidate, PatternEngineConfig,
    PatternSignature, PatternStatus, PatternType, PredictedActivity, DORMANT_CONFIDENCE,
    SLOTS_PER_DAY,
};
use crate::domain::ports::PatternSource;
use crate::services::event_bus::EngineEvent;

/// Fit at or above which an observation counts as matching a pattern.
pub const MATCH_THRESHOLD: f64 = 0.6;

/// Activity score below which an in-slot observation is anomalous.
pub const ANOMALY_THRESHOLD: f64 = 0.3;

/// Confidence gained per matching observation.
const STRENGTHEN_STEP: f64 = 0.01;

/// Confidence multiplier per decay tick.
const DECAY_FACTOR: f64 = 0.9;

/// Patterns above this confidence contribute to moment predictions.
const PREDICTION_CONFIDENCE: f64 = 0.5;

/// Weight of the previous stability on re-promotion.
const STABILITY_MEMORY: f64 = 0.8;

#[derive(Debug, Clone, Copy)]
pub struct RegistrySettings {
    pub min_observations: usize,
    pub min_confidence: f64,
    pub established_threshold: f64,
    pub decay_window: Duration,
    pub local_time: LocalTime,
}

impl From<&PatternEngineConfig> for RegistrySettings {
    fn from(config: &PatternEngineConfig) -> Self {
        Self {
            min_observations: config.min_observations_for_pattern.max(1),
            min_confidence: config.min_confidence_threshold,
            established_threshold: config.established_pattern_threshold,
            decay_window: config.decay_window(),
            local_time: LocalTime::new(config.utc_offset_minutes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatternRegistry {
    settings: RegistrySettings,
    /// Keyed by candidate key
    patterns: BTreeMap<String, Pattern>,
}

impl PatternRegistry {
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            settings,
            patterns: BTreeMap::new(),
        }
    }

    /// Reload previously persisted patterns, replacing any with the same key.
    pub fn restore(&mut self, patterns: impl IntoIterator<Item = Pattern>) {
        for pattern in patterns {
            self.patterns.insert(pattern.key.clone(), pattern);
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Pattern> {
        self.patterns.values().find(|p| p.id == id)
    }

    pub fn get_by_key(&self, key: &str) -> Option<&Pattern> {
        self.patterns.get(key)
    }

    pub fn patterns_by_type(&self, pattern_type: PatternType) -> Vec<&Pattern> {
        self.patterns
            .values()
            .filter(|p| p.pattern_type == pattern_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Apply new observations: raise confidence of matching patterns,
    /// step non-established patterns back up, and flag anomalies.
    ///
    /// Observations at or before a pattern's `last_observed` are already
    /// reflected in it and leave it untouched, so replaying history over
    /// restored patterns is a no-op.
    pub fn strengthen(&mut self, observations: &[Observation]) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let lt = self.settings.local_time;
        let min_confidence = self.settings.min_confidence;

        for observation in observations {
            for pattern in self.patterns.values_mut() {
                if observation.timestamp <= pattern.last_observed {
                    continue;
                }
                if is_anomaly(pattern, observation, lt, min_confidence) {
                    debug!(
                        pattern_id = %pattern.id,
                        observation_id = %observation.id,
                        "observation contradicts established routine"
                    );
                    events.push(EngineEvent::AnomalyDetected {
                        observation: observation.clone(),
                        pattern: pattern.clone(),
                    });
                }

                if pattern_fit(pattern, observation, lt) < MATCH_THRESHOLD {
                    continue;
                }

                pattern.confidence = (pattern.confidence + STRENGTHEN_STEP).min(1.0);
                pattern.occurrences += 1;
                pattern.last_observed = observation.timestamp;
                pattern.last_decayed_at = None;

                if pattern.status != PatternStatus::Established {
                    let previous = pattern.status;
                    pattern.status = previous.step_up();
                    if previous == PatternStatus::Dormant {
                        pattern.confidence = pattern.confidence.max(DORMANT_CONFIDENCE);
                    }
                    info!(
                        pattern_id = %pattern.id,
                        key = %pattern.key,
                        from = %previous,
                        to = %pattern.status,
                        "pattern re-strengthened"
                    );
                    events.push(EngineEvent::PatternStrengthened {
                        pattern: pattern.clone(),
                    });
                }
            }
        }
        events
    }

    /// Promote qualifying candidates, or refresh the pattern they already back.
    pub fn promote<'a>(
        &mut self,
        candidates: impl IntoIterator<Item = &'a PatternCandidate>,
    ) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for candidate in candidates {
            if candidate.strength < self.settings.established_threshold
                || candidate.observation_count() < self.settings.min_observations
            {
                continue;
            }

            let Some(pattern) = self.patterns.get_mut(&candidate.key) else {
                let pattern = Pattern::from_candidate(candidate);
                info!(
                    pattern_id = %pattern.id,
                    key = %pattern.key,
                    confidence = pattern.confidence,
                    "pattern discovered"
                );
                events.push(EngineEvent::PatternDiscovered {
                    pattern: pattern.clone(),
                });
                self.patterns.insert(pattern.key.clone(), pattern);
                continue;
            };

            if candidate.last_seen <= pattern.last_observed {
                continue;
            }

            let previous = pattern.status;
            pattern.signature = candidate.signature.clone();
            pattern.stability = STABILITY_MEMORY * pattern.stability
                + (1.0 - STABILITY_MEMORY) * candidate.signature.stability();
            pattern.last_observed = candidate.last_seen;
            pattern.last_decayed_at = None;
            pattern.occurrences = pattern.occurrences.max(candidate.observation_count() as u64);
            pattern.status = previous.step_up();
            if previous == PatternStatus::Dormant {
                pattern.confidence = pattern.confidence.max(DORMANT_CONFIDENCE);
            }

            if previous != pattern.status {
                info!(
                    pattern_id = %pattern.id,
                    key = %pattern.key,
                    from = %previous,
                    to = %pattern.status,
                    "pattern re-promoted"
                );
                events.push(EngineEvent::PatternStrengthened {
                    pattern: pattern.clone(),
                });
            }
        }
        events
    }

    /// Apply every whole decay tick elapsed since the last one applied.
    pub fn decay(&mut self, now: DateTime<Utc>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let window = self.settings.decay_window;

        for pattern in self.patterns.values_mut() {
            let start = pattern.last_observed + window;
            let due = ticks_through(start, now);
            let applied = pattern
                .last_decayed_at
                .map_or(0, |at| ticks_through(start, at));
            if due <= applied {
                continue;
            }

            let ticks = due - applied;
            pattern.confidence *= DECAY_FACTOR.powi(i32::try_from(ticks).unwrap_or(i32::MAX));
            pattern.last_decayed_at = Some(start + Duration::days(due - 1));

            if pattern.status == PatternStatus::Dormant {
                continue;
            }
            if pattern.status == PatternStatus::Established {
                pattern.status = PatternStatus::Fading;
            }
            debug!(
                pattern_id = %pattern.id,
                key = %pattern.key,
                ticks,
                confidence = pattern.confidence,
                "pattern decayed"
            );
            events.push(EngineEvent::PatternWeakened {
                pattern: pattern.clone(),
            });

            if pattern.confidence < DORMANT_CONFIDENCE {
                pattern.status = PatternStatus::Dormant;
                info!(pattern_id = %pattern.id, key = %pattern.key, "pattern went dormant");
                events.push(EngineEvent::PatternFaded {
                    pattern: pattern.clone(),
                });
            }
        }
        events
    }

    /// Fit of `observation` against `pattern`, in [0, 1].
    pub fn fit(&self, pattern: &Pattern, observation: &Observation) -> f64 {
        pattern_fit(pattern, observation, self.settings.local_time)
    }
}

impl PatternSource for PatternRegistry {
    fn patterns(&self) -> Vec<&Pattern> {
        self.patterns.values().collect()
    }

    fn prediction_for_moment(&self, moment: DateTime<Utc>) -> MomentPrediction {
        let lt = self.settings.local_time;
        let slot = lt.slot(moment);
        let day_type = lt.day_type(moment);
        let mut prediction = MomentPrediction::empty(moment);
        let mut activities: BTreeMap<String, PredictedActivity> = BTreeMap::new();
        let mut confidences = Vec::new();

        for pattern in self.patterns.values() {
            if !pattern.is_active() || pattern.confidence <= PREDICTION_CONFIDENCE {
                continue;
            }
            let room = match &pattern.signature {
                PatternSignature::DailyRoutine {
                    slot: pattern_slot,
                    dominant_room,
                    ..
                } => {
                    if *pattern_slot != slot {
                        continue;
                    }
                    dominant_room.clone()
                }
                PatternSignature::WeeklyRoutine { .. } => None,
                PatternSignature::ComfortPreference {
                    variable,
                    preferred_low,
                    preferred_high,
                    ..
                } => {
                    prediction
                        .environment
                        .set(*variable, (preferred_low + preferred_high) / 2.0);
                    confidences.push(pattern.confidence);
                    prediction.contributing_patterns.push(pattern.id);
                    continue;
                }
                PatternSignature::Sequence { .. } => continue,
            };

            let Some(profile) = activity_profile(&pattern.signature, day_type) else {
                continue;
            };
            let Some((_, dominant_share)) = pattern.signature.dominant_activity(day_type) else {
                continue;
            };
            for (name, share) in profile {
                let confidence = (pattern.confidence * share / dominant_share).clamp(0.0, 1.0);
                let entry = activities.entry(name.clone()).or_insert_with(|| PredictedActivity {
                    name: name.clone(),
                    confidence: 0.0,
                    room: room.clone(),
                });
                if confidence > entry.confidence {
                    entry.confidence = confidence;
                    entry.room = room.clone().or(entry.room.take());
                }
            }
            confidences.push(pattern.confidence);
            prediction.contributing_patterns.push(pattern.id);
        }

        let mut activities: Vec<PredictedActivity> = activities.into_values().collect();
        activities.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.name.cmp(&b.name))
        });
        prediction.activities = activities;
        if !confidences.is_empty() {
            prediction.confidence = confidences.iter().sum::<f64>() / confidences.len() as f64;
        }
        prediction
    }
}

/// Number of whole-day ticks due at `at` when the first tick falls on `start`.
fn ticks_through(start: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    if at < start {
        0
    } else {
        (at - start).num_days() + 1
    }
}

fn activity_profile(signature: &PatternSignature, day_type: DayType) -> Option<&BTreeMap<String, f64>> {
    match signature {
        PatternSignature::DailyRoutine { activities, .. } => Some(activities),
        PatternSignature::WeeklyRoutine {
            weekday_profile,
            weekend_profile,
            ..
        } => Some(match day_type {
            DayType::Weekday => weekday_profile,
            DayType::Weekend => weekend_profile,
        }),
        _ => None,
    }
}

/// Share of `activity` relative to the dominant share of the profile.
fn activity_score(signature: &PatternSignature, activity: &str, lt: LocalTime, ts: DateTime<Utc>) -> f64 {
    let day_type = lt.day_type(ts);
    let Some(profile) = activity_profile(signature, day_type) else {
        return 0.0;
    };
    match signature.dominant_activity(day_type) {
        Some((_, dominant)) if dominant > 0.0 => {
            profile.get(activity).copied().unwrap_or(0.0) / dominant
        }
        _ => 0.0,
    }
}

/// Fit scoring per pattern type.
pub fn pattern_fit(pattern: &Pattern, observation: &Observation, lt: LocalTime) -> f64 {
    let score = match &pattern.signature {
        PatternSignature::DailyRoutine {
            slot,
            dominant_room,
            ..
        } => {
            let Some(activity) = observation.inferred_activity() else {
                return 0.0;
            };
            let distance = slot.abs_diff(lt.slot(observation.timestamp));
            let distance = distance.min(SLOTS_PER_DAY - distance);
            let time = match distance {
                0 => 1.0,
                1 => 0.5,
                _ => 0.0,
            };
            let activity = activity_score(&pattern.signature, &activity, lt, observation.timestamp);
            let room = match (dominant_room, &observation.room) {
                (Some(expected), Some(actual)) if expected == actual => 1.0,
                (Some(_), Some(_)) => 0.0,
                _ => 0.5,
            };
            0.4 * time + 0.45 * activity + 0.15 * room
        }
        PatternSignature::WeeklyRoutine { .. } => match observation.inferred_activity() {
            Some(activity) => activity_score(&pattern.signature, &activity, lt, observation.timestamp),
            None => 0.0,
        },
        PatternSignature::Sequence { activities, .. } => match observation.inferred_activity() {
            Some(activity) if activities.contains(&activity) => 1.0,
            _ => 0.0,
        },
        PatternSignature::ComfortPreference {
            variable,
            preferred_low,
            preferred_high,
            ..
        } => match observation.environment_reading() {
            Some((v, value)) if v == *variable => {
                let iqr = preferred_high - preferred_low;
                let outside = if value < *preferred_low {
                    preferred_low - value
                } else if value > *preferred_high {
                    value - preferred_high
                } else {
                    0.0
                };
                if outside == 0.0 {
                    1.0
                } else if iqr > 0.0 {
                    (1.0 - outside / iqr).max(0.0)
                } else {
                    0.0
                }
            }
            _ => 0.0,
        },
    };
    score.clamp(0.0, 1.0)
}

/// Whether an in-slot activity contradicts an established, confident daily routine.
fn is_anomaly(pattern: &Pattern, observation: &Observation, lt: LocalTime, min_confidence: f64) -> bool {
    if pattern.status != PatternStatus::Established || pattern.confidence < min_confidence {
        return false;
    }
    let PatternSignature::DailyRoutine {
        slot,
        dominant_room,
        ..
    } = &pattern.signature
    else {
        return false;
    };
    let Some(activity) = observation.inferred_activity() else {
        return false;
    };
    if *slot != lt.slot(observation.timestamp) {
        return false;
    }
    if let (Some(expected), Some(actual)) = (dominant_room, &observation.room) {
        if expected != actual {
            return false;
        }
    }
    activity_score(&pattern.signature, &activity, lt, observation.timestamp) < ANOMALY_THRESHOLD
}
