mod common;

use chrono::Duration;
use common::{at, scenario};
use foresight::domain::models::{ConflictResolutionStrategy, Scenario};
use foresight::services::conflict_resolver::in_conflict;
use foresight::services::ConflictResolver;
use proptest::prelude::*;
use std::collections::BTreeMap;

const ACTIVITIES: [&str; 5] = ["sleeping", "entertaining", "socializing", "working", "cooking"];

fn arb_scenario(key: &'static str) -> impl Strategy<Value = Scenario> {
    (0usize..ACTIVITIES.len(), 0.3f64..=1.0, 0i64..720, 1i64..600).prop_map(
        move |(activity, probability, offset, length)| {
            let start = at(2, 12, 0) + Duration::minutes(offset);
            scenario(key, ACTIVITIES[activity], probability, start, start + Duration::minutes(length))
        },
    )
}

fn live(mut a: Scenario, mut b: Scenario, a_first: bool) -> BTreeMap<String, Scenario> {
    a.sequence = if a_first { 0 } else { 1 };
    b.sequence = if a_first { 1 } else { 0 };
    BTreeMap::from([(a.key.clone(), a), (b.key.clone(), b)])
}

fn probabilities(live: &BTreeMap<String, Scenario>) -> Vec<f64> {
    live.values().map(|s| s.probability).collect()
}

proptest! {
    /// Property: conflict detection does not depend on argument order.
    #[test]
    fn prop_conflict_detection_symmetric(a in arb_scenario("a"), b in arb_scenario("b")) {
        prop_assert_eq!(in_conflict(&a, &b), in_conflict(&b, &a));
    }

    /// Property: under the conservative policy the strictly more likely
    /// scenario keeps its probability whichever one was seen first.
    #[test]
    fn prop_conservative_winner_independent_of_order(
        a in arb_scenario("a"),
        b in arb_scenario("b"),
        a_first in any::<bool>(),
    ) {
        prop_assume!(in_conflict(&a, &b));
        prop_assume!((a.base_probability - b.base_probability).abs() > 1e-6);

        let (winner, loser) = if a.base_probability > b.base_probability { ("a", "b") } else { ("b", "a") };
        let mut live = live(a, b, a_first);
        ConflictResolver::new(ConflictResolutionStrategy::Conservative).resolve(&mut live, at(2, 0, 0));

        prop_assert_eq!(live[winner].probability, live[winner].base_probability);
        prop_assert!((live[loser].probability - live[loser].base_probability * 0.5).abs() < 1e-9);
        prop_assert_eq!(live[winner].conflicts_with.clone(), vec![live[loser].id]);
        prop_assert_eq!(live[loser].conflicts_with.clone(), vec![live[winner].id]);
    }

    /// Property: resolving an unchanged set again yields the same probabilities.
    #[test]
    fn prop_resolution_idempotent(
        a in arb_scenario("a"),
        b in arb_scenario("b"),
        a_first in any::<bool>(),
        balanced in any::<bool>(),
    ) {
        let strategy = if balanced {
            ConflictResolutionStrategy::Balanced
        } else {
            ConflictResolutionStrategy::Conservative
        };
        let mut resolver = ConflictResolver::new(strategy);
        let mut live = live(a, b, a_first);

        resolver.resolve(&mut live, at(2, 0, 0));
        let first = probabilities(&live);
        let events = resolver.resolve(&mut live, at(2, 0, 1));

        prop_assert_eq!(first, probabilities(&live));
        prop_assert!(events.is_empty());
    }
}
