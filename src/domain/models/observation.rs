//! Observation domain model.
//!
//! An observation is one immutable, timestamped fact about the household:
//! an activity, a presence change, a device state, or an environment reading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Kind of observation, derived from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    Activity,
    Presence,
    DeviceState,
    Environment,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Presence => "presence",
            Self::DeviceState => "device_state",
            Self::Environment => "environment",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "activity" => Some(Self::Activity),
            "presence" => Some(Self::Presence),
            "device_state" | "device" => Some(Self::DeviceState),
            "environment" => Some(Self::Environment),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence transition reported by an occupancy sensor or phone geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Arrived,
    Departed,
}

/// Environment variable measured by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentVariable {
    Temperature,
    Humidity,
    Light,
}

impl EnvironmentVariable {
    pub const ALL: [Self; 3] = [Self::Temperature, Self::Humidity, Self::Light];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Light => "light",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "temperature" | "temp" => Some(Self::Temperature),
            "humidity" => Some(Self::Humidity),
            "light" | "lux" => Some(Self::Light),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnvironmentVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed observation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObservationPayload {
    Activity { activity: String },
    Presence { state: PresenceState },
    DeviceState { device: String, state: String },
    Environment { variable: EnvironmentVariable, value: f64 },
}

/// A single recorded fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Unique identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// When the fact was observed
    pub timestamp: DateTime<Utc>,
    /// What was observed
    pub payload: ObservationPayload,
    /// Occupant the observation refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Room the observation was made in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Device that produced the observation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Observation {
    fn with_payload(timestamp: DateTime<Utc>, payload: ObservationPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            payload,
            user_id: None,
            room: None,
            device_id: None,
        }
    }

    /// Create an activity observation.
    pub fn activity(timestamp: DateTime<Utc>, activity: impl Into<String>) -> Self {
        Self::with_payload(
            timestamp,
            ObservationPayload::Activity {
                activity: activity.into(),
            },
        )
    }

    /// Create a presence observation.
    pub fn presence(timestamp: DateTime<Utc>, state: PresenceState) -> Self {
        Self::with_payload(timestamp, ObservationPayload::Presence { state })
    }

    /// Create a device state observation.
    pub fn device_state(
        timestamp: DateTime<Utc>,
        device: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self::with_payload(
            timestamp,
            ObservationPayload::DeviceState {
                device: device.into(),
                state: state.into(),
            },
        )
    }

    /// Create an environment reading.
    pub fn environment(timestamp: DateTime<Utc>, variable: EnvironmentVariable, value: f64) -> Self {
        Self::with_payload(timestamp, ObservationPayload::Environment { variable, value })
    }

    /// Set the room.
    pub fn in_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Set the occupant.
    pub fn by_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the reporting device.
    pub fn from_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn kind(&self) -> ObservationKind {
        match self.payload {
            ObservationPayload::Activity { .. } => ObservationKind::Activity,
            ObservationPayload::Presence { .. } => ObservationKind::Presence,
            ObservationPayload::DeviceState { .. } => ObservationKind::DeviceState,
            ObservationPayload::Environment { .. } => ObservationKind::Environment,
        }
    }

    /// Activity this observation implies, if any.
    ///
    /// Environment readings carry no activity.
    pub fn inferred_activity(&self) -> Option<String> {
        match &self.payload {
            ObservationPayload::Activity { activity } => Some(activity.to_lowercase()),
            ObservationPayload::Presence {
                state: PresenceState::Arrived,
            } => Some("arriving".to_string()),
            ObservationPayload::Presence {
                state: PresenceState::Departed,
            } => Some("leaving".to_string()),
            ObservationPayload::DeviceState { device, .. } => {
                Some(format!("using_{}", device.to_lowercase()))
            }
            ObservationPayload::Environment { .. } => None,
        }
    }

    /// Environment reading carried by this observation, if any.
    pub fn environment_reading(&self) -> Option<(EnvironmentVariable, f64)> {
        match self.payload {
            ObservationPayload::Environment { variable, value } => Some((variable, value)),
            _ => None,
        }
    }

    /// Reject observations no engine can reason about.
    pub fn validate(&self) -> DomainResult<()> {
        match &self.payload {
            ObservationPayload::Activity { activity } if activity.trim().is_empty() => {
                Err(DomainError::InvalidObservation {
                    id: self.id,
                    reason: "activity name is empty".to_string(),
                })
            }
            ObservationPayload::DeviceState { device, .. } if device.trim().is_empty() => {
                Err(DomainError::InvalidObservation {
                    id: self.id,
                    reason: "device name is empty".to_string(),
                })
            }
            ObservationPayload::Environment { value, .. } if !value.is_finite() => {
                Err(DomainError::InvalidObservation {
                    id: self.id,
                    reason: format!("environment value {value} is not finite"),
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inferred_activity_per_payload() {
        let now = Utc::now();
        assert_eq!(
            Observation::activity(now, "Cooking").inferred_activity(),
            Some("cooking".to_string())
        );
        assert_eq!(
            Observation::presence(now, PresenceState::Arrived).inferred_activity(),
            Some("arriving".to_string())
        );
        assert_eq!(
            Observation::device_state(now, "TV", "on").inferred_activity(),
            Some("using_tv".to_string())
        );
        assert_eq!(
            Observation::environment(now, EnvironmentVariable::Humidity, 40.0).inferred_activity(),
            None
        );
    }

    #[test]
    fn test_validate_rejects_non_finite_reading() {
        let obs = Observation::environment(Utc::now(), EnvironmentVariable::Temperature, f64::NAN);
        assert!(matches!(
            obs.validate(),
            Err(DomainError::InvalidObservation { .. })
        ));
    }

    #[test]
    fn test_payload_json_shape() {
        let obs = Observation::activity(Utc::now(), "reading").in_room("den");
        let json = serde_json::to_value(&obs).unwrap();
        assert_eq!(json["payload"]["kind"], "activity");
        assert_eq!(json["payload"]["activity"], "reading");
        assert_eq!(json["room"], "den");
        assert!(json.get("device_id").is_none());
    }

    #[test]
    fn test_kind_round_trip_through_str() {
        for kind in [
            ObservationKind::Activity,
            ObservationKind::Presence,
            ObservationKind::DeviceState,
            ObservationKind::Environment,
        ] {
            assert_eq!(ObservationKind::from_str(kind.as_str()), Some(kind));
        }
    }
}
