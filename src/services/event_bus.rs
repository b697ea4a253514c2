//! EventBus service for distributing engine events.
//!
//! Engines return events from their operations; the facade publishes them
//! here after the operation completes. Every event is wrapped in an
//! [`EventEnvelope`] carrying a monotonically increasing sequence number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::{Observation, Pattern, Scenario, TriggeredPreparation};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing sequence number assigned by EventBus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event category for filtering and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Pattern,
    Scenario,
    Preparation,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pattern => write!(f, "pattern"),
            Self::Scenario => write!(f, "scenario"),
            Self::Preparation => write!(f, "preparation"),
        }
    }
}

/// Events emitted by the pattern and scenario engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum EngineEvent {
    PatternDiscovered {
        pattern: Pattern,
    },
    PatternStrengthened {
        pattern: Pattern,
    },
    PatternWeakened {
        pattern: Pattern,
    },
    PatternFaded {
        pattern: Pattern,
    },
    AnomalyDetected {
        observation: Observation,
        pattern: Pattern,
    },
    ScenarioGenerated {
        scenario: Scenario,
    },
    ScenarioUpdated {
        scenario: Scenario,
    },
    ScenarioExpired {
        scenario: Scenario,
    },
    ConflictDetected {
        scenario_a: Scenario,
        scenario_b: Scenario,
    },
    PreparationTriggered {
        preparation: TriggeredPreparation,
    },
}

impl EngineEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            Self::PatternDiscovered { .. }
            | Self::PatternStrengthened { .. }
            | Self::PatternWeakened { .. }
            | Self::PatternFaded { .. }
            | Self::AnomalyDetected { .. } => EventCategory::Pattern,
            Self::ScenarioGenerated { .. }
            | Self::ScenarioUpdated { .. }
            | Self::ScenarioExpired { .. }
            | Self::ConflictDetected { .. } => EventCategory::Scenario,
            Self::PreparationTriggered { .. } => EventCategory::Preparation,
        }
    }

    /// Event name as it appears in the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PatternDiscovered { .. } => "patternDiscovered",
            Self::PatternStrengthened { .. } => "patternStrengthened",
            Self::PatternWeakened { .. } => "patternWeakened",
            Self::PatternFaded { .. } => "patternFaded",
            Self::AnomalyDetected { .. } => "anomalyDetected",
            Self::ScenarioGenerated { .. } => "scenarioGenerated",
            Self::ScenarioUpdated { .. } => "scenarioUpdated",
            Self::ScenarioExpired { .. } => "scenarioExpired",
            Self::ConflictDetected { .. } => "conflictDetected",
            Self::PreparationTriggered { .. } => "preparationTriggered",
        }
    }
}

/// Event envelope containing delivery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub category: EventCategory,
    pub event: EngineEvent,
}

/// Configuration for the EventBus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Central event bus for broadcasting events to multiple consumers.
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    sequence: AtomicU64,
}

impl EventBus {
    /// Create a new EventBus with the given configuration.
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Wrap and broadcast one event.
    pub fn publish(&self, event: EngineEvent, timestamp: DateTime<Utc>) -> EventEnvelope {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            id: EventId::new(),
            sequence: SequenceNumber(seq),
            timestamp,
            category: event.category(),
            event,
        };

        tracing::trace!(
            sequence = seq,
            event = envelope.event.name(),
            "publishing event"
        );

        // No subscribers is not an error
        let _ = self.sender.send(envelope.clone());
        envelope
    }

    /// Publish a batch in order.
    pub fn publish_all(
        &self,
        events: impl IntoIterator<Item = EngineEvent>,
        timestamp: DateTime<Utc>,
    ) -> Vec<EventEnvelope> {
        events
            .into_iter()
            .map(|event| self.publish(event, timestamp))
            .collect()
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the next sequence number to be assigned.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Scenario, Timeframe};
    use chrono::Duration;

    fn scenario() -> Scenario {
        let now = Utc::now();
        Scenario::builder(
            "daily:meal:dinner:2026-03-02",
            "dinner preparation expected",
            Timeframe::starting_at(now, Duration::hours(1)).unwrap(),
        )
        .probability(0.7)
        .build(now)
        .unwrap()
    }

    #[tokio::test]
    async fn test_event_bus_sequence_assignment() {
        let bus = EventBus::default();
        assert_eq!(bus.current_sequence().0, 0);

        let mut rx = bus.subscribe();
        let now = Utc::now();

        bus.publish(EngineEvent::ScenarioGenerated { scenario: scenario() }, now);
        let event1 = rx.recv().await.unwrap();
        assert_eq!(event1.sequence.0, 0);
        assert_eq!(event1.category, EventCategory::Scenario);

        bus.publish(EngineEvent::ScenarioExpired { scenario: scenario() }, now);
        let event2 = rx.recv().await.unwrap();
        assert_eq!(event2.sequence.0, 1);

        assert_eq!(bus.current_sequence().0, 2);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        let envelopes = bus.publish_all(
            vec![EngineEvent::ScenarioGenerated { scenario: scenario() }],
            Utc::now(),
        );
        assert_eq!(envelopes.len(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_type_tag_matches_name() {
        let event = EngineEvent::ScenarioUpdated { scenario: scenario() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scenarioUpdated");
        assert_eq!(json["type"], event.name());
    }
}
