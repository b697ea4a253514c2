//! Snapshots pushed in by external collaborators: calendar, weather and
//! other context, and per-occupant presence.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::scenario::Timeframe;
use crate::domain::errors::{DomainError, DomainResult};

/// Calendar event category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarCategory {
    Work,
    Social,
    Family,
    Personal,
    Travel,
    #[default]
    Other,
}

impl CalendarCategory {
    /// Activities the household is expected to perform during the event.
    pub fn activities(&self) -> &'static [&'static str] {
        match self {
            Self::Work => &["working"],
            Self::Social => &["socializing", "entertaining"],
            Self::Family => &["family_time"],
            Self::Personal => &["personal"],
            Self::Travel => &["away"],
            Self::Other => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Social => "social",
            Self::Family => "family",
            Self::Personal => "personal",
            Self::Travel => "travel",
            Self::Other => "other",
        }
    }
}

/// A calendar entry supplied by the calendar collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub category: CalendarCategory,
}

impl CalendarEvent {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        category: CalendarCategory,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            attendees: Vec::new(),
            category,
        }
    }

    pub fn with_attendees(mut self, attendees: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.attendees = attendees.into_iter().map(Into::into).collect();
        self
    }

    /// Events with guests or a social category bring visitors.
    pub fn is_social(&self) -> bool {
        self.category == CalendarCategory::Social || !self.attendees.is_empty()
    }

    pub fn timeframe(&self) -> DomainResult<Timeframe> {
        Timeframe::new(self.start, self.end)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.id.trim().is_empty() {
            return Err(DomainError::InvalidCalendarEvent {
                id: self.id.clone(),
                reason: "id is empty".to_string(),
            });
        }
        if self.end < self.start {
            return Err(DomainError::InvalidTimeframe {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Current weather and the forecast for the rest of the day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub current_temperature: Option<f64>,
    pub forecast_high: Option<f64>,
    pub forecast_low: Option<f64>,
    #[serde(default)]
    pub conditions: Option<String>,
}

/// Commute conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    Light,
    Moderate,
    Heavy,
}

/// A public holiday or local event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holiday {
    pub name: String,
    pub date: NaiveDate,
}

/// External context snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalContext {
    #[serde(default)]
    pub weather: Weather,
    #[serde(default)]
    pub traffic: Option<TrafficLevel>,
    #[serde(default)]
    pub local_events: Vec<String>,
    #[serde(default)]
    pub holidays: Vec<Holiday>,
}

/// Presence snapshot for one occupant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupantState {
    pub user_id: String,
    pub home: bool,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub current_room: Option<String>,
    #[serde(default)]
    pub current_activity: Option<String>,
}

impl OccupantState {
    pub fn away(user_id: impl Into<String>, last_seen: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            home: false,
            last_seen,
            current_room: None,
            current_activity: None,
        }
    }

    pub fn home(user_id: impl Into<String>, last_seen: DateTime<Utc>) -> Self {
        Self {
            home: true,
            ..Self::away(user_id, last_seen)
        }
    }
}
