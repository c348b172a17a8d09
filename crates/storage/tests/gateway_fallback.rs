use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use drill_core::model::{Problem, ProblemRecord, Session, SessionId};
use drill_core::time::fixed_now;
use serde_json::{Value, json};
use storage::ephemeral::SESSIONS_KEY;
use storage::repository::{SessionRepository, SettingsRepository};
use storage::sqlite::SqliteRepository;
use storage::{Backend, EphemeralStore, StorageError, StorageGateway, StorageStatus, StoreKind};

fn build_session(id: &str, minutes_ago: i64) -> Session {
    let problem = Problem::new("1000 + 2000", "3000");
    Session::from_records(
        SessionId::new(id),
        "Addition",
        fixed_now() - Duration::minutes(minutes_ago),
        60,
        60,
        vec![ProblemRecord::answered(&problem, "3000", 2100, true)],
        None,
        None,
    )
    .unwrap()
}

fn legacy_store() -> EphemeralStore {
    let scores = json!([
        {"mode": "Addition", "date": "2024-01-01T10:00:00.000Z", "score": 1, "totalProblems": 2,
         "duration": 60, "time": 60,
         "problems": [
            {"problem": "1 + 1", "answer": "2", "userAnswer": "2", "timeTaken": 900, "isCorrect": true},
            {"problem": "2 + 2", "answer": "4", "userAnswer": "5", "timeTaken": 3000, "isCorrect": false}
         ]},
        {"id": "score-kept", "mode": "Calendar", "date": "2024-01-02T10:00:00.000Z",
         "score": 3, "totalProblems": 4, "duration": 120,
         "mistakes": [{"problem": "2024 Jan 1", "correctAnswer": "1", "userAnswer": "2"}]}
    ]);
    EphemeralStore::from_entries([
        (SESSIONS_KEY.to_string(), scores.to_string()),
        ("showFeedback".to_string(), "false".to_string()),
        ("lastGameDuration".to_string(), "120".to_string()),
    ])
}

async fn sqlite_backend(name: &str) -> SqliteRepository {
    SqliteRepository::open(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("open sqlite")
}

/// Ephemeral-backed durable stand-in that can be switched to failing.
#[derive(Clone, Default)]
struct FlakyBackend {
    inner: EphemeralStore,
    failing: Arc<AtomicBool>,
}

impl FlakyBackend {
    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Connection("disk unplugged".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionRepository for FlakyBackend {
    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        self.check()?;
        self.inner.list_sessions().await
    }

    async fn sessions_for_mode(
        &self,
        mode: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Session>, StorageError> {
        self.check()?;
        self.inner.sessions_for_mode(mode, since).await
    }

    async fn count_sessions(&self) -> Result<usize, StorageError> {
        self.check()?;
        self.inner.count_sessions().await
    }

    async fn upsert_session(&self, session: &Session) -> Result<(), StorageError> {
        self.check()?;
        self.inner.upsert_session(session).await
    }

    async fn replace_sessions(&self, sessions: &[Session]) -> Result<(), StorageError> {
        self.check()?;
        self.inner.replace_sessions(sessions).await
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError> {
        self.check()?;
        self.inner.delete_session(id).await
    }

    async fn clear_sessions(&self) -> Result<(), StorageError> {
        self.check()?;
        self.inner.clear_sessions().await
    }
}

#[async_trait]
impl SettingsRepository for FlakyBackend {
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.check()?;
        self.inner.get_setting(key).await
    }

    async fn put_setting(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.check()?;
        self.inner.put_setting(key, value).await
    }

    async fn setting_keys(&self) -> Result<Vec<String>, StorageError> {
        self.check()?;
        self.inner.setting_keys().await
    }

    async fn remove_setting(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.remove_setting(key).await
    }

    async fn clear_settings(&self) -> Result<(), StorageError> {
        self.check()?;
        self.inner.clear_settings().await
    }
}

#[tokio::test]
async fn migration_moves_legacy_data_once() {
    let repo = sqlite_backend("memdb_gateway_migrate").await;
    let fallback = legacy_store();
    let gateway = StorageGateway::new(Some(Arc::new(repo.clone())), fallback.clone());

    let first = gateway.migrate_legacy().await;
    assert!(first.completed);
    assert_eq!(first.sessions_copied, 2);
    assert_eq!(first.settings_copied, 2);

    let sessions = gateway.all_sessions().await;
    let ids: Vec<_> = sessions.iter().map(|s| s.id().as_str().to_string()).collect();
    assert_eq!(ids, vec!["score-2024-01-01T10:00:00.000Z-0", "score-kept"]);
    assert_eq!(sessions[1].records().len(), 1);
    assert!(!sessions[1].records()[0].is_correct);
    assert!(!gateway.get_setting("showFeedback", true).await);
    assert_eq!(gateway.get_setting("lastGameDuration", 60u32).await, 120);

    assert!(fallback.is_empty().unwrap());

    let second = gateway.migrate_legacy().await;
    assert!(second.completed);
    assert_eq!(second.sessions_copied, 0);
    assert_eq!(second.settings_copied, 0);
    assert_eq!(repo.count_sessions().await.unwrap(), 2);
}

#[tokio::test]
async fn migration_leaves_sessions_when_durable_has_records() {
    let repo = sqlite_backend("memdb_gateway_nonempty").await;
    repo.upsert_session(&build_session("existing", 1)).await.unwrap();
    repo.put_setting("showFeedback", &json!(true)).await.unwrap();

    let fallback = legacy_store();
    let gateway = StorageGateway::new(Some(Arc::new(repo.clone())), fallback.clone());
    let report = gateway.migrate_legacy().await;

    assert!(report.completed);
    assert_eq!(report.sessions_copied, 0);
    assert_eq!(report.sessions_kept, 2);
    assert_eq!(report.settings_copied, 1);
    assert_eq!(report.settings_superseded, 1);
    assert_eq!(repo.count_sessions().await.unwrap(), 1);
    assert!(gateway.get_setting("showFeedback", false).await);
    assert_eq!(fallback.count_sessions().await.unwrap(), 2);

    let again = gateway.migrate_legacy().await;
    assert_eq!(again.settings_copied, 0);
    assert_eq!(repo.count_sessions().await.unwrap(), 1);
}

#[tokio::test]
async fn browser_saved_sessions_survive_migration() {
    // Newer browser builds stored full problem records under `mistakes`.
    let wrong = json!({"problem": "12 × 13", "answer": "156", "userAnswer": "146",
                       "timeTaken": 4200, "isCorrect": false, "source": "random"});
    let scores = json!([
        {"id": "score-2024-05-01T08:00:00.000Z-k3j9x", "mode": "Multiplication",
         "date": "2024-05-01T08:00:00.000Z", "time": 60, "score": 1, "totalProblems": 2,
         "mistakes": [wrong.clone()], "accuracy": 50, "duration": 60,
         "problems": [
            {"problem": "11 × 12", "answer": "132", "userAnswer": "132",
             "timeTaken": 1800, "isCorrect": true, "source": "slow"},
            wrong
         ],
         "difficulty": "2x2"},
        {"id": "score-other", "mode": "Addition", "date": "2024-05-02T08:00:00.000Z",
         "score": 0, "totalProblems": 0, "duration": 60, "problems": [], "difficulty": null},
        42
    ]);
    let fallback = EphemeralStore::from_entries([(SESSIONS_KEY, scores.to_string())]);

    let degraded = StorageGateway::ephemeral(fallback.clone());
    assert_eq!(degraded.all_sessions().await.len(), 2);

    let repo = sqlite_backend("memdb_gateway_browser_shape").await;
    let gateway = StorageGateway::new(Some(Arc::new(repo.clone())), fallback);
    let report = gateway.migrate_legacy().await;
    assert_eq!(report.sessions_copied, 2);

    let sessions = gateway.sessions_for_mode("Multiplication", None).await;
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.id().as_str(), "score-2024-05-01T08:00:00.000Z-k3j9x");
    assert_eq!(session.correct_count(), 1);
    assert_eq!(session.difficulty(), Some("2x2"));
    let times: Vec<_> = session.records().iter().map(|r| r.time_taken_ms).collect();
    assert_eq!(times, vec![Some(1800), Some(4200)]);
}

#[tokio::test]
async fn failing_durable_store_degrades_without_errors() {
    let flaky = FlakyBackend::default();
    let durable: Arc<dyn Backend> = Arc::new(flaky.clone());
    let gateway = StorageGateway::new(Some(durable), EphemeralStore::new());
    let mut status = gateway.subscribe();

    gateway.put_session(&build_session("before", 3)).await;
    assert_eq!(gateway.status(), StorageStatus::Connected);
    assert!(!gateway.is_degraded());

    flaky.failing.store(true, Ordering::SeqCst);
    gateway.put_session(&build_session("during", 2)).await;

    assert!(gateway.is_degraded());
    assert!(status.has_changed().unwrap());
    assert!(matches!(&*status.borrow_and_update(), StorageStatus::Error(_)));
    assert!(gateway.status().to_string().starts_with("Error: "));

    let sessions = gateway.all_sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id().as_str(), "during");

    gateway.put_setting("debugMode", &true).await;
    assert_eq!(gateway.status(), StorageStatus::Fallback);
    assert_eq!(
        gateway.status().to_string(),
        "Fallback: using ephemeral store"
    );
    assert!(gateway.get_setting("debugMode", false).await);

    // Recovery of the backend does not un-degrade the gateway.
    flaky.failing.store(false, Ordering::SeqCst);
    assert_eq!(gateway.all_sessions().await.len(), 1);
    assert!(gateway.is_degraded());
}

#[tokio::test]
async fn closed_sqlite_pool_falls_back_mid_session() {
    let repo = sqlite_backend("memdb_gateway_closed").await;
    let gateway = StorageGateway::new(Some(Arc::new(repo.clone())), EphemeralStore::new());

    gateway.put_session(&build_session("first", 2)).await;
    repo.close().await;
    gateway.put_session(&build_session("second", 1)).await;

    assert!(gateway.is_degraded());
    let ids: Vec<_> = gateway
        .sessions_for_mode("Addition", None)
        .await
        .iter()
        .map(|s| s.id().as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["second"]);
}

#[tokio::test]
async fn unreachable_database_starts_degraded() {
    let gateway = StorageGateway::sqlite(
        "sqlite:file:/nonexistent-drill-dir/nested/drill.db?mode=ro",
        EphemeralStore::new(),
    )
    .await;

    assert!(gateway.is_degraded());
    assert!(matches!(gateway.status(), StorageStatus::Error(_)));

    gateway.put_session(&build_session("only", 0)).await;
    assert_eq!(gateway.all_sessions().await.len(), 1);
    assert_eq!(gateway.status(), StorageStatus::Fallback);
    assert_eq!(gateway.migrate_legacy().await.sessions_copied, 0);
}

#[tokio::test]
async fn settings_fall_back_to_defaults() {
    let gateway = StorageGateway::ephemeral(EphemeralStore::new());

    assert_eq!(gateway.get_setting("lookbackDays", 1u32).await, 1);
    gateway.put_setting("lookbackDays", &"seven").await;
    assert_eq!(gateway.get_setting("lookbackDays", 1u32).await, 1);
    gateway.put_setting("lookbackDays", &7u32).await;
    assert_eq!(gateway.get_setting("lookbackDays", 1u32).await, 7);
}

#[tokio::test]
async fn clear_and_delete_reach_the_active_backend() {
    let repo = sqlite_backend("memdb_gateway_clear").await;
    let gateway = StorageGateway::new(Some(Arc::new(repo)), EphemeralStore::new());

    gateway
        .replace_sessions(&[build_session("a", 3), build_session("b", 2)])
        .await;
    gateway.put_setting("showFeedback", &false).await;

    gateway.delete_session(&SessionId::new("a")).await;
    assert_eq!(gateway.all_sessions().await.len(), 1);

    gateway.clear(StoreKind::Settings).await;
    assert!(gateway.get_setting("showFeedback", true).await);
    assert_eq!(gateway.all_sessions().await.len(), 1);

    gateway.clear(StoreKind::Records).await;
    assert!(gateway.all_sessions().await.is_empty());
    assert_eq!(gateway.status(), StorageStatus::Connected);
}

#[tokio::test]
async fn write_probe_succeeds_on_both_backends() {
    let repo = sqlite_backend("memdb_gateway_probe").await;
    let durable = StorageGateway::new(Some(Arc::new(repo)), EphemeralStore::new());
    assert!(durable.probe_write().await);
    assert_eq!(durable.status(), StorageStatus::Connected);

    let fallback = EphemeralStore::new();
    let ephemeral = StorageGateway::ephemeral(fallback.clone());
    assert!(ephemeral.probe_write().await);
    assert!(fallback.is_empty().unwrap());
}
