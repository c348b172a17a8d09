use std::sync::Arc;

use chrono::Duration;
use drill_core::model::{Problem, ProblemRecord, Session, SessionId};
use drill_core::time::fixed_now;
use serde_json::json;
use storage::repository::{SessionRepository, SettingsRepository};
use storage::sqlite::SqliteRepository;
use storage::{EphemeralStore, StorageGateway, StorageStatus};

fn build_session(id: &str, mode: &str, minutes_ago: i64, correct: bool) -> Session {
    let problem = Problem::new("12 × 34", "408");
    let answer = if correct { "408" } else { "400" };
    Session::from_records(
        SessionId::new(id),
        mode,
        fixed_now() - Duration::minutes(minutes_ago),
        60,
        60,
        vec![ProblemRecord::answered(&problem, answer, 1500, correct)],
        Some("2x2".into()),
        None,
    )
    .unwrap()
}

async fn open(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_session_roundtrip_and_filters() {
    let repo = open("memdb_sessions").await;

    repo.upsert_session(&build_session("a", "Multiplication", 90, true))
        .await
        .unwrap();
    repo.upsert_session(&build_session("b", "Multiplication", 10, false))
        .await
        .unwrap();
    repo.upsert_session(&build_session("c", "Calendar", 5, true))
        .await
        .unwrap();
    assert_eq!(repo.count_sessions().await.unwrap(), 3);

    let all = repo.list_sessions().await.unwrap();
    let ids: Vec<_> = all.iter().map(|s| s.id().as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(all[0].difficulty(), Some("2x2"));
    assert_eq!(all[1].records()[0].time_taken_ms, Some(1500));
    assert!(!all[1].records()[0].is_correct);

    let recent = repo
        .sessions_for_mode("Multiplication", Some(fixed_now() - Duration::minutes(30)))
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id().as_str(), "b");

    let every = repo.sessions_for_mode("Multiplication", None).await.unwrap();
    assert_eq!(every.len(), 2);
}

#[tokio::test]
async fn sqlite_upsert_overwrites_and_delete_removes() {
    let repo = open("memdb_upsert").await;

    repo.upsert_session(&build_session("a", "Addition", 5, false))
        .await
        .unwrap();
    repo.upsert_session(&build_session("a", "Addition", 5, true))
        .await
        .unwrap();
    let all = repo.list_sessions().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].correct_count(), 1);

    repo.delete_session(&SessionId::new("a")).await.unwrap();
    repo.delete_session(&SessionId::new("missing")).await.unwrap();
    assert_eq!(repo.count_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn sqlite_replace_clears_then_inserts() {
    let repo = open("memdb_replace").await;

    repo.upsert_session(&build_session("old", "Addition", 50, true))
        .await
        .unwrap();
    repo.replace_sessions(&[
        build_session("x", "Addition", 2, true),
        build_session("y", "Addition", 1, true),
    ])
    .await
    .unwrap();

    let ids: Vec<_> = repo
        .list_sessions()
        .await
        .unwrap()
        .iter()
        .map(|s| s.id().as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["x", "y"]);

    repo.clear_sessions().await.unwrap();
    assert_eq!(repo.count_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn sqlite_settings_keep_json_types() {
    let repo = open("memdb_settings").await;

    repo.put_setting("useSmartGenerator", &json!(true)).await.unwrap();
    repo.put_setting("probSlowest", &json!(0.5)).await.unwrap();
    repo.put_setting("multiplicationDifficulty", &json!("4x4"))
        .await
        .unwrap();
    repo.put_setting("probSlowest", &json!(0.75)).await.unwrap();

    assert_eq!(
        repo.get_setting("useSmartGenerator").await.unwrap(),
        Some(json!(true))
    );
    assert_eq!(repo.get_setting("probSlowest").await.unwrap(), Some(json!(0.75)));
    assert_eq!(repo.get_setting("nope").await.unwrap(), None);
    assert_eq!(
        repo.setting_keys().await.unwrap(),
        vec!["multiplicationDifficulty", "probSlowest", "useSmartGenerator"]
    );

    repo.remove_setting("probSlowest").await.unwrap();
    assert_eq!(repo.get_setting("probSlowest").await.unwrap(), None);

    repo.clear_settings().await.unwrap();
    assert!(repo.setting_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = open("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
    repo.upsert_session(&build_session("a", "Addition", 1, true))
        .await
        .unwrap();
    repo.migrate().await.expect("third migrate");
    assert_eq!(repo.count_sessions().await.unwrap(), 1);
}

#[tokio::test]
async fn corrupt_payload_row_is_skipped() {
    let repo = open("memdb_corrupt_row").await;
    repo.upsert_session(&build_session("good", "Multiplication", 5, true))
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO sessions (id, mode, started_at, duration_seconds, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind("broken")
    .bind("Multiplication")
    .bind(fixed_now())
    .bind(60_i64)
    .bind("{not json")
    .execute(repo.pool())
    .await
    .unwrap();

    let all = repo.list_sessions().await.unwrap();
    let ids: Vec<_> = all.iter().map(|s| s.id().as_str()).collect();
    assert_eq!(ids, vec!["good"]);
    assert_eq!(repo.sessions_for_mode("Multiplication", None).await.unwrap().len(), 1);

    let gateway = StorageGateway::new(Some(Arc::new(repo.clone())), EphemeralStore::new());
    assert_eq!(gateway.all_sessions().await.len(), 1);
    gateway.put_session(&build_session("after", "Multiplication", 0, true)).await;
    assert!(!gateway.is_degraded());
    assert_eq!(gateway.status(), StorageStatus::Connected);
    assert_eq!(repo.count_sessions().await.unwrap(), 3);
}
