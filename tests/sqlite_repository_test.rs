//! Integration tests for the SQLite observation and pattern repositories.

mod common;

use common::{at, daily_pattern};
use foresight::adapters::sqlite::{
    create_migrated_test_pool, SqliteObservationRepository, SqlitePatternRepository,
};
use foresight::domain::models::{
    EnvironmentVariable, Observation, PatternStatus, PatternType, PresenceState,
};
use foresight::domain::ports::{ObservationRepository, PatternRepository};

async fn observation_repo() -> SqliteObservationRepository {
    let pool = create_migrated_test_pool()
        .await
        .expect("failed to create test pool");
    SqliteObservationRepository::new(pool)
}

async fn pattern_repo() -> SqlitePatternRepository {
    let pool = create_migrated_test_pool()
        .await
        .expect("failed to create test pool");
    SqlitePatternRepository::new(pool)
}

#[tokio::test]
async fn test_append_and_list_round_trip() {
    let repo = observation_repo().await;
    let cooking = Observation::activity(at(2, 19, 0), "cooking")
        .in_room("kitchen")
        .by_user("ana");
    let temperature = Observation::environment(at(2, 19, 5), EnvironmentVariable::Temperature, 21.5)
        .from_device("thermostat");

    repo.append(&cooking).await.unwrap();
    repo.append(&temperature).await.unwrap();

    let listed = repo.list_since(at(1, 0, 0)).await.unwrap();
    assert_eq!(listed, vec![cooking, temperature]);
}

#[tokio::test]
async fn test_duplicate_ids_are_ignored() {
    let repo = observation_repo().await;
    let observation = Observation::presence(at(2, 8, 0), PresenceState::Departed);

    repo.append(&observation).await.unwrap();
    repo.append(&observation).await.unwrap();
    let inserted = repo
        .append_batch(&[observation.clone(), Observation::activity(at(2, 9, 0), "working")])
        .await
        .unwrap();

    assert_eq!(inserted, 1);
    assert_eq!(repo.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_list_since_is_ordered_and_bounded() {
    let repo = observation_repo().await;
    let batch: Vec<_> = [5, 1, 3, 2, 4]
        .into_iter()
        .map(|day| Observation::activity(at(day, 7, 0), "breakfast"))
        .collect();
    assert_eq!(repo.append_batch(&batch).await.unwrap(), 5);

    let recent = repo.list_since(at(3, 7, 0)).await.unwrap();
    let days: Vec<_> = recent.iter().map(|o| o.timestamp).collect();
    assert_eq!(days, vec![at(3, 7, 0), at(4, 7, 0), at(5, 7, 0)]);
}

#[tokio::test]
async fn test_purge_before_removes_only_older() {
    let repo = observation_repo().await;
    let batch: Vec<_> = (1..=6)
        .map(|day| Observation::activity(at(day, 22, 0), "sleeping"))
        .collect();
    repo.append_batch(&batch).await.unwrap();

    let purged = repo.purge_before(at(4, 22, 0)).await.unwrap();

    assert_eq!(purged, 3);
    assert_eq!(repo.count().await.unwrap(), 3);
    assert_eq!(repo.list_since(at(1, 0, 0)).await.unwrap()[0].timestamp, at(4, 22, 0));
}

#[tokio::test]
async fn test_pattern_upsert_and_get() {
    let repo = pattern_repo().await;
    let mut pattern = daily_pattern("cooking", 19 * 60, 0.75);

    repo.upsert(&pattern).await.unwrap();
    assert_eq!(repo.get(pattern.id).await.unwrap(), Some(pattern.clone()));

    pattern.confidence = 0.25;
    pattern.status = PatternStatus::Dormant;
    pattern.last_decayed_at = Some(at(20, 0, 0));
    repo.upsert(&pattern).await.unwrap();

    let stored = repo.get(pattern.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PatternStatus::Dormant);
    assert_eq!(stored.last_decayed_at, Some(at(20, 0, 0)));
    assert_eq!(repo.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_pattern_list_orders_and_filters() {
    let repo = pattern_repo().await;
    for (activity, minute, confidence) in [("reading", 21 * 60, 0.6), ("cooking", 19 * 60, 0.9)] {
        repo.upsert(&daily_pattern(activity, minute, confidence)).await.unwrap();
    }

    let all = repo.list(None).await.unwrap();
    let confidences: Vec<_> = all.iter().map(|p| p.confidence).collect();
    assert_eq!(confidences, vec![0.9, 0.6]);

    assert_eq!(repo.list(Some(PatternType::DailyRoutine)).await.unwrap().len(), 2);
    assert!(repo.list(Some(PatternType::WeeklyRoutine)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_pattern_is_none() {
    let repo = pattern_repo().await;
    assert!(repo.get(uuid::Uuid::new_v4()).await.unwrap().is_none());
}
