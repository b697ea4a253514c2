//! Pattern candidate tracker.
//!
//! Groups the observation window along four independent axes:
//! - time slots (2-hour routines)
//! - weekday vs weekend activity mix
//! - recurring activity sequences
//! - comfort ranges of environment variables
//!
//! Candidate keys depend only on the grouping criteria, so repeated passes
//! over the same data converge on the same candidate set.
//!
//! Sequences are read from windows of five consecutive activity
//! observations with repeated neighbours merged, so `a a b c d` and
//! `a b c d d` both count toward the `a>b>c>d` candidate. A window that
//! merges down to a single activity is not a sequence.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;
use uuid::Uuid;

use crate::domain::models::{
    DayType, EnvironmentVariable, LocalTime, Observation, PatternCandidate, PatternEngineConfig,
    PatternSignature,
};

/// Observations per sliding sequence window.
pub const SEQUENCE_WINDOW: usize = 5;

/// Share of windows a sequence must exceed.
const MIN_SEQUENCE_SUPPORT: f64 = 0.10;

/// Total absolute profile difference a weekly routine must exceed.
const MIN_WEEKLY_DIVERGENCE: f64 = 0.3;

/// Tuning shared by every axis.
#[derive(Debug, Clone, Copy)]
pub struct TrackerSettings {
    pub min_observations: usize,
    pub emerging_threshold: f64,
    pub retention: Duration,
    pub local_time: LocalTime,
}

impl From<&PatternEngineConfig> for TrackerSettings {
    fn from(config: &PatternEngineConfig) -> Self {
        Self {
            min_observations: config.min_observations_for_pattern.max(1),
            emerging_threshold: config.emerging_pattern_threshold,
            retention: config.retention(),
            local_time: LocalTime::new(config.utc_offset_minutes),
        }
    }
}

/// Summary of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    pub created: usize,
    pub updated: usize,
    pub dropped: usize,
}

/// Keyed candidate set with strength tracking.
#[derive(Debug, Clone)]
pub struct CandidateTracker {
    settings: TrackerSettings,
    candidates: BTreeMap<String, PatternCandidate>,
}

impl CandidateTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            candidates: BTreeMap::new(),
        }
    }

    /// Run all four axes over `observations` and merge the results.
    pub fn analyze(&mut self, observations: &[Observation], now: DateTime<Utc>) -> AnalysisReport {
        let mut report = AnalysisReport::default();

        let mut computed = self.slot_candidates(observations);
        computed.extend(self.weekly_candidate(observations));
        computed.extend(self.sequence_candidates(observations));
        computed.extend(self.comfort_candidates(observations));

        for candidate in computed {
            match self.candidates.get_mut(&candidate.key) {
                Some(existing) => {
                    existing.strength = existing.strength.max(candidate.strength);
                    existing.first_seen = existing.first_seen.min(candidate.first_seen);
                    existing.last_seen = candidate.last_seen;
                    existing.signature = candidate.signature;
                    existing.observation_ids = candidate.observation_ids;
                    report.updated += 1;
                }
                None => {
                    self.candidates.insert(candidate.key.clone(), candidate);
                    report.created += 1;
                }
            }
        }

        let cutoff = now - self.settings.retention;
        let before = self.candidates.len();
        self.candidates.retain(|_, c| c.last_seen >= cutoff);
        report.dropped = before - self.candidates.len();

        debug!(
            created = report.created,
            updated = report.updated,
            dropped = report.dropped,
            tracked = self.candidates.len(),
            "candidate analysis pass complete"
        );
        report
    }

    pub fn candidates(&self) -> impl Iterator<Item = &PatternCandidate> {
        self.candidates.values()
    }

    pub fn get(&self, key: &str) -> Option<&PatternCandidate> {
        self.candidates.get(key)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    fn slot_candidates(&self, observations: &[Observation]) -> Vec<PatternCandidate> {
        let lt = self.settings.local_time;
        let min = self.settings.min_observations;

        let activities: Vec<(&Observation, String)> = observations
            .iter()
            .filter_map(|o| o.inferred_activity().map(|a| (o, a)))
            .collect();
        let mut slots: BTreeMap<u32, Vec<&(&Observation, String)>> = BTreeMap::new();
        for entry in &activities {
            slots.entry(lt.slot(entry.0.timestamp)).or_default().push(entry);
        }

        let mut out = Vec::new();
        for (slot, entries) in slots {
            if entries.len() < min {
                continue;
            }
            let (Some(first_seen), Some(last_seen)) = (
                entries.iter().map(|(o, _)| o.timestamp).min(),
                entries.iter().map(|(o, _)| o.timestamp).max(),
            ) else {
                continue;
            };
            // Consistency is measured over the slot's own span
            let days_spanned = lt.days_spanned(first_seen, last_seen).max(1);
            let days: BTreeSet<NaiveDate> = entries.iter().map(|(o, _)| lt.date(o.timestamp)).collect();
            let consistency = days.len() as f64 / days_spanned as f64;
            if consistency <= self.settings.emerging_threshold {
                continue;
            }

            let count = entries.len();
            let minutes: u64 = entries
                .iter()
                .map(|(o, _)| u64::from(lt.minute_of_day(o.timestamp)))
                .sum();
            let mean_minute_of_day = (minutes / count as u64) as u32;
            let rooms = entries.iter().filter_map(|(o, _)| o.room.as_deref());
            let strength =
                0.7 * consistency + 0.3 * (count as f64 / (2 * min) as f64).min(1.0);

            out.push(PatternCandidate {
                key: format!("daily_routine:slot_{slot}"),
                signature: PatternSignature::DailyRoutine {
                    slot,
                    mean_minute_of_day,
                    activities: profile(entries.iter().map(|(_, a)| a.as_str())),
                    dominant_room: most_common(rooms),
                    consistency: consistency.min(1.0),
                },
                observation_ids: entries.iter().map(|(o, _)| o.id).collect(),
                strength: strength.clamp(0.0, 1.0),
                first_seen,
                last_seen,
            });
        }
        out
    }

    fn weekly_candidate(&self, observations: &[Observation]) -> Option<PatternCandidate> {
        let lt = self.settings.local_time;
        let mut weekday = Vec::new();
        let mut weekend = Vec::new();
        let mut ids = Vec::new();
        for o in observations {
            let Some(activity) = o.inferred_activity() else {
                continue;
            };
            ids.push((o.id, o.timestamp));
            match lt.day_type(o.timestamp) {
                DayType::Weekday => weekday.push(activity),
                DayType::Weekend => weekend.push(activity),
            }
        }
        let min = self.settings.min_observations;
        if weekday.len() < min || weekend.len() < min {
            return None;
        }

        let weekday_profile = profile(weekday.iter().map(String::as_str));
        let weekend_profile = profile(weekend.iter().map(String::as_str));
        let names: BTreeSet<&String> = weekday_profile.keys().chain(weekend_profile.keys()).collect();
        let divergence: f64 = names
            .into_iter()
            .map(|name| {
                let a = weekday_profile.get(name).copied().unwrap_or(0.0);
                let b = weekend_profile.get(name).copied().unwrap_or(0.0);
                (a - b).abs()
            })
            .sum();
        if divergence <= MIN_WEEKLY_DIVERGENCE {
            return None;
        }

        let first_seen = ids.iter().map(|(_, ts)| *ts).min()?;
        let last_seen = ids.iter().map(|(_, ts)| *ts).max()?;
        Some(PatternCandidate {
            key: "weekly_routine:weekday_weekend".to_string(),
            signature: PatternSignature::WeeklyRoutine {
                weekday_profile,
                weekend_profile,
                divergence,
            },
            observation_ids: ids.into_iter().map(|(id, _)| id).collect(),
            strength: divergence.min(1.0),
            first_seen,
            last_seen,
        })
    }

    /// Support is the share of raw windows whose merged form matches.
    fn sequence_candidates(&self, observations: &[Observation]) -> Vec<PatternCandidate> {
        let timeline: Vec<(&Observation, String)> = observations
            .iter()
            .filter_map(|o| o.inferred_activity().map(|a| (o, a)))
            .collect();
        if timeline.len() < 2 * SEQUENCE_WINDOW {
            return Vec::new();
        }

        let total_windows = timeline.len() - SEQUENCE_WINDOW + 1;
        let mut occurrences: HashMap<Vec<String>, Vec<&[(&Observation, String)]>> = HashMap::new();
        for window in timeline.windows(SEQUENCE_WINDOW) {
            let mut sequence: Vec<String> = Vec::with_capacity(SEQUENCE_WINDOW);
            for (_, activity) in window {
                if sequence.last() != Some(activity) {
                    sequence.push(activity.clone());
                }
            }
            if sequence.len() < 2 {
                continue;
            }
            occurrences.entry(sequence).or_default().push(window);
        }

        let mut out: Vec<PatternCandidate> = occurrences
            .into_iter()
            .filter_map(|(sequence, windows)| {
                let support = windows.len() as f64 / total_windows as f64;
                if windows.len() < 2 || support <= MIN_SEQUENCE_SUPPORT {
                    return None;
                }
                let mut seen = BTreeSet::new();
                let mut ids: Vec<(DateTime<Utc>, Uuid)> = Vec::new();
                for window in &windows {
                    for (o, _) in *window {
                        if seen.insert(o.id) {
                            ids.push((o.timestamp, o.id));
                        }
                    }
                }
                ids.sort();
                let first_seen = ids.first()?.0;
                let last_seen = ids.last()?.0;
                Some(PatternCandidate {
                    key: format!("sequence:{}", sequence.join(">")),
                    signature: PatternSignature::Sequence {
                        activities: sequence,
                        support: support.min(1.0),
                    },
                    observation_ids: ids.into_iter().map(|(_, id)| id).collect(),
                    strength: support.min(1.0),
                    first_seen,
                    last_seen,
                })
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    fn comfort_candidates(&self, observations: &[Observation]) -> Vec<PatternCandidate> {
        let min = self.settings.min_observations.max(4);
        let mut out = Vec::new();
        for variable in EnvironmentVariable::ALL {
            let readings: Vec<&Observation> = observations
                .iter()
                .filter(|o| matches!(o.environment_reading(), Some((v, _)) if v == variable))
                .collect();
            if readings.len() < min {
                continue;
            }
            let mut values: Vec<f64> = readings
                .iter()
                .filter_map(|o| o.environment_reading().map(|(_, value)| value))
                .collect();
            values.sort_by(f64::total_cmp);

            let q1 = quantile(&values, 0.25);
            let median = quantile(&values, 0.5);
            let q3 = quantile(&values, 0.75);
            let (Some(lowest), Some(highest)) = (values.first(), values.last()) else {
                continue;
            };
            let range = highest - lowest;
            let tightness = if range > 0.0 {
                (1.0 - (q3 - q1) / range).clamp(0.0, 1.0)
            } else {
                1.0
            };

            out.push(PatternCandidate {
                key: format!("comfort_preference:{variable}"),
                signature: PatternSignature::ComfortPreference {
                    variable,
                    preferred_low: q1,
                    preferred_high: q3,
                    median,
                    tightness,
                },
                observation_ids: readings.iter().map(|o| o.id).collect(),
                strength: tightness,
                first_seen: readings.iter().map(|o| o.timestamp).min().unwrap_or_default(),
                last_seen: readings.iter().map(|o| o.timestamp).max().unwrap_or_default(),
            });
        }
        out
    }
}

/// Normalized frequency of each name.
fn profile<'a>(names: impl Iterator<Item = &'a str>) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total = 0usize;
    for name in names {
        *counts.entry(name.to_string()).or_default() += 1;
        total += 1;
    }
    counts
        .into_iter()
        .map(|(name, count)| (name, count as f64 / total.max(1) as f64))
        .collect()
}

/// Most frequent value; ties resolve to the alphabetically first.
fn most_common<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(value, _)| value.to_string())
}

/// Linear-interpolation quantile of sorted, non-empty `values`.
fn quantile(values: &[f64], p: f64) -> f64 {
    let pos = p * (values.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let fraction = pos - lower as f64;
    values[lower] + (values[upper] - values[lower]) * fraction
}
