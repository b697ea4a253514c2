mod common;

use chrono::Duration;
use common::{at, daily_pattern};
use foresight::domain::models::{PatternEngineConfig, PatternStatus, DORMANT_CONFIDENCE};
use foresight::services::{PatternRegistry, RegistrySettings};
use foresight::PatternSource;
use proptest::prelude::*;

fn registry_with(confidence: f64) -> PatternRegistry {
    let mut registry = PatternRegistry::new(RegistrySettings::from(&PatternEngineConfig::default()));
    registry.restore([daily_pattern("reading", 21 * 60, confidence)]);
    registry
}

fn only_pattern(registry: &PatternRegistry) -> (f64, PatternStatus) {
    let pattern = registry.patterns()[0];
    (pattern.confidence, pattern.status)
}

proptest! {
    /// Property: confidence never rises while a pattern goes unobserved,
    /// and a pattern below the dormancy floor is always dormant.
    #[test]
    fn prop_decay_is_monotone(
        confidence in 0.3f64..=1.0,
        steps in prop::collection::vec(0i64..4000, 1..40),
    ) {
        let mut registry = registry_with(confidence);
        let mut now = at(1, 0, 0);
        let mut previous = confidence;

        for minutes in steps {
            now += Duration::minutes(minutes);
            registry.decay(now);
            let (current, status) = only_pattern(&registry);

            prop_assert!(current <= previous);
            prop_assert!(current >= 0.0);
            if current < DORMANT_CONFIDENCE {
                prop_assert_eq!(status, PatternStatus::Dormant);
            }
            previous = current;
        }
    }

    /// Property: decaying in many small steps matches one decay at the end.
    #[test]
    fn prop_decay_is_path_independent(
        confidence in 0.3f64..=1.0,
        steps in prop::collection::vec(1i64..2000, 1..40),
    ) {
        let mut stepped = registry_with(confidence);
        let mut once = registry_with(confidence);
        let mut now = at(1, 0, 0);

        for minutes in steps {
            now += Duration::minutes(minutes);
            stepped.decay(now);
        }
        once.decay(now);

        let (a, _) = only_pattern(&stepped);
        let (b, _) = only_pattern(&once);
        prop_assert!((a - b).abs() < 1e-9, "stepped {} vs once {}", a, b);
    }

    /// Property: nothing decays inside the decay window.
    #[test]
    fn prop_no_decay_within_window(
        confidence in 0.3f64..=1.0,
        minutes in 0i64..(14 * 24 * 60),
    ) {
        let mut registry = registry_with(confidence);
        let events = registry.decay(at(1, 0, 0) + Duration::minutes(minutes));
        prop_assert!(events.is_empty());
        prop_assert_eq!(only_pattern(&registry), (confidence, PatternStatus::Established));
    }
}
