//! Scenario generator.
//!
//! Four independent passes, one per horizon, turn patterns, calendar events
//! and external context into candidate scenarios. Windows are relative to
//! `now`:
//! - immediate: `[now, now + immediate]`
//! - short-term: `(now + immediate, now + short_term]`
//! - daily: `(now + short_term, end of local day]`
//! - weekly: `(max(end of local day, now + short_term), now + weekly]`
//!
//! Pattern-driven scenarios use their own anchors: immediate activity
//! predictions sample the middle of the immediate window, meals and bedtime
//! cover the rest of the local day, and energy demand sits at a fixed local
//! peak per day.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::domain::models::{
    CalendarCategory, CalendarEvent, DayType, EnergyDemand, EnvironmentForecast, ExternalContext,
    Horizon, LocalTime, OccupantState, Pattern, PatternSignature, PatternStatus, PatternType,
    PredictionHorizons, PreparationCategory, Scenario, ScenarioBuilder, ScenarioEngineConfig,
    ScenarioSource, Timeframe,
};
use crate::domain::ports::PatternSource;

/// Probability of a scenario backed by an explicit calendar entry.
pub const CALENDAR_PROBABILITY: f64 = 0.9;

/// Probability that guests show up for a social calendar event.
pub const GUEST_PROBABILITY: f64 = 0.95;

/// Probability of a holiday scenario.
pub const HOLIDAY_PROBABILITY: f64 = 0.8;

/// Forecast high at or above which cooling demand is predicted.
pub const HOT_DAY_CELSIUS: f64 = 28.0;

/// Forecast low at or below which heating demand is predicted.
pub const COLD_DAY_CELSIUS: f64 = 5.0;

/// Local minute of day at which cooling demand peaks.
pub const COOLING_PEAK_MINUTE: u32 = 14 * 60;

/// Local minute of day at which heating demand peaks.
pub const HEATING_PEAK_MINUTE: u32 = 6 * 60;

const MEAL_ACTIVITIES: [&str; 6] = ["cooking", "eating", "dining", "breakfast", "lunch", "dinner"];

/// Everything a generation pass reads.
pub struct GenerationInput<'a> {
    pub now: DateTime<Utc>,
    pub patterns: &'a dyn PatternSource,
    pub calendar: &'a [CalendarEvent],
    pub context: &'a ExternalContext,
    pub occupants: &'a [OccupantState],
}

#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    horizons: PredictionHorizons,
    min_probability: f64,
    local_time: LocalTime,
}

impl ScenarioGenerator {
    pub fn new(config: &ScenarioEngineConfig, local_time: LocalTime) -> Self {
        Self {
            horizons: config.prediction_horizons.clone(),
            min_probability: config.min_scenario_probability,
            local_time,
        }
    }

    /// Run all four horizon passes.
    pub fn generate(&self, input: &GenerationInput<'_>) -> Vec<Scenario> {
        let mut builders = self.immediate(input);
        builders.extend(self.short_term(input));
        builders.extend(self.daily(input));
        builders.extend(self.weekly(input));

        let total = builders.len();
        let scenarios: Vec<Scenario> = builders
            .into_iter()
            .filter(|b| b.base_probability() >= self.min_probability)
            .filter_map(|b| {
                let key = b.key().to_string();
                b.build(input.now)
                    .map_err(|err| warn!(key = %key, error = %err, "discarding malformed scenario"))
                    .ok()
            })
            .collect();
        debug!(
            generated = scenarios.len(),
            below_threshold = total - scenarios.len(),
            "scenario generation complete"
        );
        scenarios
    }

    /// Calendar events starting in the window plus pattern activity
    /// predictions for the middle of it.
    pub fn immediate(&self, input: &GenerationInput<'_>) -> Vec<ScenarioBuilder> {
        let now = input.now;
        let end = now + self.horizons.immediate();
        let mut out = self.calendar_in(input, Horizon::Immediate, |s| s >= now && s <= end);

        let Ok(timeframe) = Timeframe::new(now, end) else {
            return out;
        };
        let moment = now + self.horizons.immediate() / 2;
        let prediction = input.patterns.prediction_for_moment(moment);
        let slot_tag = format!(
            "{}T{:02}",
            self.local_time.date(moment),
            self.local_time.slot(moment)
        );
        for activity in &prediction.activities {
            if activity.confidence < self.min_probability {
                continue;
            }
            out.push(
                Scenario::builder(
                    format!("immediate:activity:{}:{slot_tag}", activity.name),
                    format!("{} expected", activity.name.replace('_', " ")),
                    timeframe,
                )
                .probability(activity.confidence)
                .source(ScenarioSource::Pattern)
                .horizon(Horizon::Immediate)
                .activity(activity.name.clone(), activity.confidence, activity.room.clone())
                .state(|state| {
                    state.occupancy.home = true;
                    apply_environment(&prediction.environment, state);
                }),
            );
        }
        out
    }

    /// Calendar events, arrivals of away occupants, and weather-driven
    /// energy demand.
    pub fn short_term(&self, input: &GenerationInput<'_>) -> Vec<ScenarioBuilder> {
        let now = input.now;
        let lower = now + self.horizons.immediate();
        let upper = now + self.horizons.short_term();
        let mut out = self.calendar_in(input, Horizon::ShortTerm, |s| s > lower && s <= upper);
        out.extend(self.arrival(input, lower, upper));
        out.extend(self.energy_demand(input));
        out
    }

    /// Meals and bedtime later today, plus remaining calendar events.
    pub fn daily(&self, input: &GenerationInput<'_>) -> Vec<ScenarioBuilder> {
        let now = input.now;
        let end_of_day = self.local_time.end_of_day(now);
        let after = now + self.horizons.short_term();
        let mut out = self.calendar_in(input, Horizon::Daily, |s| s > after && s <= end_of_day);

        let mut meals: BTreeMap<&'static str, Vec<(DateTime<Utc>, &Pattern, Option<String>)>> =
            BTreeMap::new();
        let mut bedtimes = Vec::new();
        for pattern in input.patterns.active_patterns() {
            let Some((activity, instant, room)) = self.routine_instant(pattern, now) else {
                continue;
            };
            if instant <= now || instant > end_of_day {
                continue;
            }
            if MEAL_ACTIVITIES.iter().any(|meal| *meal == activity) {
                meals
                    .entry(meal_name(self.local_time.minute_of_day(instant) / 60))
                    .or_default()
                    .push((instant, pattern, room));
            } else if activity == "sleeping" {
                bedtimes.push((instant, pattern, room));
            }
        }

        let date = self.local_time.date(now);
        for (meal, entries) in meals {
            let Some((instant, probability, room)) = mean_of(&entries) else {
                continue;
            };
            let Ok(timeframe) = Timeframe::starting_at(instant, Duration::hours(1)) else {
                continue;
            };
            out.push(
                Scenario::builder(
                    format!("daily:meal:{meal}:{date}"),
                    format!("{meal} preparation expected"),
                    timeframe,
                )
                .probability(probability)
                .source(ScenarioSource::Pattern)
                .horizon(Horizon::Daily)
                .activity("cooking", probability, room.clone())
                .activity("eating", probability, room)
                .state(|state| {
                    state.occupancy.home = true;
                    state.resource_needs.hot_water = true;
                    state.resource_needs.energy_demand = Some(EnergyDemand::Normal);
                })
                .prepare(
                    PreparationCategory::Kitchen,
                    format!("prepare kitchen for {meal}"),
                    instant,
                    Duration::minutes(30),
                    6,
                )
                .prepare(
                    PreparationCategory::Lighting,
                    "turn on dining lights",
                    instant,
                    Duration::minutes(15),
                    4,
                ),
            );
        }

        if let Some((instant, probability, room)) = mean_of(&bedtimes) {
            if let Ok(timeframe) = Timeframe::starting_at(instant, Duration::hours(8)) {
                let target = input.patterns.prediction_for_moment(instant).environment;
                out.push(
                    Scenario::builder(format!("daily:sleep:bedtime:{date}"), "bedtime expected", timeframe)
                        .probability(probability)
                        .source(ScenarioSource::Pattern)
                        .horizon(Horizon::Daily)
                        .activity("sleeping", probability, room)
                        .state(|state| {
                            state.occupancy.home = true;
                            state.resource_needs.energy_demand = Some(EnergyDemand::Low);
                            apply_environment(&target, state);
                        })
                        .prepare(
                            PreparationCategory::Lighting,
                            "dim lights for bedtime",
                            instant,
                            Duration::minutes(60),
                            3,
                        )
                        .prepare(
                            PreparationCategory::Climate,
                            "set night-time temperature",
                            instant,
                            Duration::minutes(30),
                            5,
                        ),
                );
            }
        }
        out
    }

    /// Calendar events beyond today, weekend routines and holidays.
    pub fn weekly(&self, input: &GenerationInput<'_>) -> Vec<ScenarioBuilder> {
        let now = input.now;
        let lower = self
            .local_time
            .end_of_day(now)
            .max(now + self.horizons.short_term());
        let upper = now + self.horizons.weekly();
        let mut out = self.calendar_in(input, Horizon::Weekly, |s| s > lower && s <= upper);

        let days = self.upcoming_days(now, upper);

        for pattern in input.patterns.patterns() {
            if pattern.pattern_type != PatternType::WeeklyRoutine
                || pattern.status != PatternStatus::Established
            {
                continue;
            }
            let Some((activity, share)) = pattern.signature.dominant_activity(DayType::Weekend) else {
                continue;
            };
            let probability = (pattern.confidence * share).clamp(0.0, 1.0);
            for date in days.iter().filter(|d| DayType::of(d.weekday()) == DayType::Weekend) {
                let Some(timeframe) = self.whole_day(*date) else {
                    continue;
                };
                out.push(
                    Scenario::builder(
                        format!("weekly:weekend_routine:{activity}:{date}"),
                        format!("weekend {} expected", activity.replace('_', " ")),
                        timeframe,
                    )
                    .probability(probability)
                    .source(ScenarioSource::Pattern)
                    .horizon(Horizon::Weekly)
                    .activity(activity, probability, None)
                    .state(|state| state.occupancy.home = true)
                    .prepare(
                        PreparationCategory::Energy,
                        "apply weekend heating schedule",
                        timeframe.start(),
                        Duration::zero(),
                        2,
                    ),
                );
            }
        }

        for holiday in &input.context.holidays {
            if !days.contains(&holiday.date) {
                continue;
            }
            let Some(timeframe) = self.whole_day(holiday.date) else {
                continue;
            };
            out.push(
                Scenario::builder(
                    format!("weekly:holiday:{}:{}", slug(&holiday.name), holiday.date),
                    format!("{} at home", holiday.name),
                    timeframe,
                )
                .probability(HOLIDAY_PROBABILITY)
                .source(ScenarioSource::Inference)
                .horizon(Horizon::Weekly)
                .state(|state| {
                    state.occupancy.home = true;
                    state.resource_needs.energy_demand = Some(EnergyDemand::High);
                })
                .prepare(
                    PreparationCategory::Energy,
                    "apply holiday schedule",
                    timeframe.start(),
                    Duration::zero(),
                    2,
                ),
            );
        }
        out
    }

    fn calendar_in(
        &self,
        input: &GenerationInput<'_>,
        horizon: Horizon,
        starts_in: impl Fn(DateTime<Utc>) -> bool,
    ) -> Vec<ScenarioBuilder> {
        let mut out = Vec::new();
        for event in input.calendar.iter().filter(|e| starts_in(e.start)) {
            let Ok(timeframe) = event.timeframe() else {
                continue;
            };
            let date = self.local_time.date(event.start);
            let activities = event.category.activities();
            let away = event.category == CalendarCategory::Travel;

            let mut builder = Scenario::builder(
                format!("calendar:{}:{date}", event.id),
                event.title.clone(),
                timeframe,
            )
            .probability(CALENDAR_PROBABILITY)
            .source(ScenarioSource::Calendar)
            .horizon(horizon)
            .state(|state| {
                state.occupancy.home = !away;
                state.occupancy.guest_count = u32::try_from(event.attendees.len()).unwrap_or(u32::MAX);
            });
            for activity in activities {
                builder = builder.activity(*activity, CALENDAR_PROBABILITY, None);
            }
            builder = match event.category {
                CalendarCategory::Travel => builder
                    .prepare(
                        PreparationCategory::Security,
                        "arm security system",
                        event.start,
                        Duration::minutes(10),
                        8,
                    )
                    .prepare(
                        PreparationCategory::Energy,
                        "switch home to away mode",
                        event.start,
                        Duration::zero(),
                        5,
                    ),
                CalendarCategory::Social => builder.prepare(
                    PreparationCategory::Lighting,
                    "set entertaining lighting",
                    event.start,
                    Duration::minutes(30),
                    4,
                ),
                _ => builder.prepare(
                    PreparationCategory::Notification,
                    format!("reminder: {}", event.title),
                    event.start,
                    Duration::minutes(15),
                    3,
                ),
            };
            out.push(builder);

            if event.is_social() {
                let guests = u32::try_from(event.attendees.len()).unwrap_or(u32::MAX);
                out.push(
                    Scenario::builder(format!("calendar:{}:guests", event.id), "guests expected", timeframe)
                        .probability(GUEST_PROBABILITY)
                        .source(ScenarioSource::Calendar)
                        .horizon(horizon)
                        .state(|state| {
                            state.occupancy.home = true;
                            state.occupancy.guest_count = guests;
                            state.occupancy.expected_occupants = event.attendees.clone();
                            state.resource_needs.supplies = vec!["drinks".to_string(), "snacks".to_string()];
                        })
                        .prepare(
                            PreparationCategory::Supplies,
                            "stock up for guests",
                            event.start,
                            Duration::days(1),
                            5,
                        )
                        .prepare(
                            PreparationCategory::Cleaning,
                            "tidy common areas",
                            event.start,
                            Duration::hours(2),
                            6,
                        ),
                );
            }
        }
        out
    }

    fn arrival(
        &self,
        input: &GenerationInput<'_>,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> Option<ScenarioBuilder> {
        let away: Vec<String> = input
            .occupants
            .iter()
            .filter(|o| !o.home)
            .map(|o| o.user_id.clone())
            .collect();
        if away.is_empty() {
            return None;
        }

        let arrivals: Vec<_> = input
            .patterns
            .active_patterns()
            .into_iter()
            .filter_map(|p| {
                let (activity, instant, room) = self.routine_instant(p, input.now)?;
                let instant = if instant <= input.now { instant + Duration::days(1) } else { instant };
                (activity == "arriving" && instant > lower && instant <= upper).then_some((instant, p, room))
            })
            .collect();
        let (instant, probability, _) = mean_of(&arrivals)?;
        let timeframe = Timeframe::starting_at(instant, Duration::minutes(30)).ok()?;
        let target = input.patterns.prediction_for_moment(instant).environment;

        Some(
            Scenario::builder(
                format!("short_term:arrival:home:{}", self.local_time.date(instant)),
                "arrival home expected",
                timeframe,
            )
            .probability(probability)
            .source(ScenarioSource::Pattern)
            .horizon(Horizon::ShortTerm)
            .activity("arriving", probability, None)
            .state(|state| {
                state.occupancy.home = true;
                state.occupancy.expected_occupants = away;
                apply_environment(&target, state);
            })
            .prepare(
                PreparationCategory::Climate,
                "bring home to comfort temperature",
                instant,
                Duration::minutes(30),
                6,
            )
            .prepare(
                PreparationCategory::Lighting,
                "turn on entry lights",
                instant,
                Duration::minutes(10),
                4,
            ),
        )
    }

    /// One scenario per forecast day, anchored at the local demand peak.
    fn energy_demand(&self, input: &GenerationInput<'_>) -> Vec<ScenarioBuilder> {
        let weather = &input.context.weather;
        let now = input.now;
        let date = self.local_time.date(now);

        let mut out = Vec::new();
        let mut push = |kind: &str, peak_minute: u32, description: &str, distance: f64, action: &str| {
            let peak = self.local_time.at_minute(now, peak_minute);
            let Ok(timeframe) = Timeframe::starting_at(peak, self.horizons.short_term()) else {
                return;
            };
            if peak - now > self.horizons.short_term() || timeframe.has_elapsed(now) {
                return;
            }
            let probability = (0.6 + 0.05 * distance).clamp(0.6, 0.9);
            out.push(
                Scenario::builder(format!("short_term:energy:{kind}:{date}"), description, timeframe)
                    .probability(probability)
                    .source(ScenarioSource::Inference)
                    .horizon(Horizon::ShortTerm)
                    .state(|state| state.resource_needs.energy_demand = Some(EnergyDemand::High))
                    .prepare(PreparationCategory::Energy, action, peak, Duration::minutes(30), 5),
            );
        };
        if let Some(high) = weather.forecast_high.filter(|h| *h >= HOT_DAY_CELSIUS) {
            push(
                "cooling",
                COOLING_PEAK_MINUTE,
                "high cooling demand expected",
                high - HOT_DAY_CELSIUS,
                "pre-cool home before peak",
            );
        }
        if let Some(low) = weather.forecast_low.filter(|l| *l <= COLD_DAY_CELSIUS) {
            push(
                "heating",
                HEATING_PEAK_MINUTE,
                "high heating demand expected",
                COLD_DAY_CELSIUS - low,
                "pre-heat home before cold spell",
            );
        }
        out
    }

    /// Dominant activity, predicted instant today, and room of a daily routine.
    fn routine_instant<'p>(
        &self,
        pattern: &'p Pattern,
        now: DateTime<Utc>,
    ) -> Option<(&'p str, DateTime<Utc>, Option<String>)> {
        let PatternSignature::DailyRoutine {
            mean_minute_of_day,
            dominant_room,
            ..
        } = &pattern.signature
        else {
            return None;
        };
        let (activity, _) = pattern.signature.dominant_activity(DayType::Weekday)?;
        Some((
            activity,
            self.local_time.at_minute(now, *mean_minute_of_day),
            dominant_room.clone(),
        ))
    }

    /// Local dates after today up to and including the date of `upper`.
    fn upcoming_days(&self, now: DateTime<Utc>, upper: DateTime<Utc>) -> Vec<NaiveDate> {
        let today = self.local_time.date(now);
        let last = self.local_time.date(upper);
        today
            .iter_days()
            .skip(1)
            .take_while(|d| *d <= last)
            .collect()
    }

    fn whole_day(&self, date: NaiveDate) -> Option<Timeframe> {
        let start = self.local_time.to_utc(date.and_hms_opt(0, 0, 0)?);
        Timeframe::starting_at(start, Duration::days(1)).ok()
    }
}

fn meal_name(hour: u32) -> &'static str {
    match hour {
        0..=10 => "breakfast",
        11..=15 => "lunch",
        _ => "dinner",
    }
}

/// Earliest instant, mean confidence, and the room of the most confident pattern.
fn mean_of(entries: &[(DateTime<Utc>, &Pattern, Option<String>)]) -> Option<(DateTime<Utc>, f64, Option<String>)> {
    let instant = entries.iter().map(|(t, _, _)| *t).min()?;
    let probability = entries.iter().map(|(_, p, _)| p.confidence).sum::<f64>() / entries.len() as f64;
    let room = entries
        .iter()
        .max_by(|a, b| a.1.confidence.total_cmp(&b.1.confidence))
        .and_then(|(_, _, room)| room.clone());
    Some((instant, probability.clamp(0.0, 1.0), room))
}

fn apply_environment(forecast: &EnvironmentForecast, state: &mut crate::domain::models::PredictedState) {
    state.environment_needs.target_temperature = forecast.temperature;
    state.environment_needs.target_humidity = forecast.humidity;
    state.environment_needs.target_light = forecast.light;
}

fn slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
