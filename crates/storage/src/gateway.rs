//! Uniform storage front over a durable backend and the ephemeral fallback.
//!
//! Gateway methods never return errors. The first failed durable operation
//! degrades the gateway for the rest of the process; that operation and every
//! later one are served by the fallback store.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use drill_core::model::settings::keys;
use drill_core::model::{Session, SessionId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::ephemeral::EphemeralStore;
use crate::repository::{Backend, SessionRepository, SettingsRepository, StorageError, StoreKind};
use crate::sqlite::SqliteRepository;

/// Health of the storage layer as shown to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageStatus {
    Connected,
    Error(String),
    Fallback,
}

impl fmt::Display for StorageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageStatus::Connected => f.write_str("Connected"),
            StorageStatus::Error(msg) => write!(f, "Error: {msg}"),
            StorageStatus::Fallback => f.write_str("Fallback: using ephemeral store"),
        }
    }
}

/// What a legacy migration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub sessions_copied: usize,
    /// Legacy sessions left in the fallback because the durable store already had records.
    pub sessions_kept: usize,
    pub settings_copied: usize,
    /// Legacy settings dropped because the durable store already had the key.
    pub settings_superseded: usize,
    /// False when there was no durable backend, or it failed mid-way.
    pub completed: bool,
}

pub struct StorageGateway {
    durable: Option<Arc<dyn Backend>>,
    fallback: EphemeralStore,
    degraded: AtomicBool,
    status: watch::Sender<StorageStatus>,
}

impl StorageGateway {
    /// Build a gateway over an already opened durable backend.
    ///
    /// With `durable = None` the gateway starts degraded.
    #[must_use]
    pub fn new(durable: Option<Arc<dyn Backend>>, fallback: EphemeralStore) -> Self {
        let initial = if durable.is_some() {
            StorageStatus::Connected
        } else {
            StorageStatus::Fallback
        };
        let (status, _rx) = watch::channel(initial);
        Self {
            degraded: AtomicBool::new(durable.is_none()),
            durable,
            fallback,
            status,
        }
    }

    /// Gateway with only the ephemeral store.
    #[must_use]
    pub fn ephemeral(fallback: EphemeralStore) -> Self {
        Self::new(None, fallback)
    }

    /// Open `SQLite` at `database_url`; degrade to `fallback` if that fails.
    pub async fn sqlite(database_url: &str, fallback: EphemeralStore) -> Self {
        match SqliteRepository::open(database_url).await {
            Ok(repo) => {
                info!(database_url, "durable store connected");
                Self::new(Some(Arc::new(repo)), fallback)
            }
            Err(err) => {
                warn!(database_url, error = %err, "durable store unavailable; using ephemeral store");
                let gateway = Self::new(None, fallback);
                gateway.status.send_replace(StorageStatus::Error(err.to_string()));
                gateway
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> StorageStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StorageStatus> {
        self.status.subscribe()
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Direct handle on the fallback store.
    #[must_use]
    pub fn fallback(&self) -> &EphemeralStore {
        &self.fallback
    }

    fn durable(&self) -> Option<&dyn Backend> {
        if self.is_degraded() {
            None
        } else {
            self.durable.as_deref()
        }
    }

    fn degrade(&self, op: &'static str, err: &StorageError) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            warn!(op, error = %err, "durable store failed; switching to ephemeral store");
        }
        self.status.send_replace(StorageStatus::Error(err.to_string()));
    }

    /// Await a durable operation; on failure degrade and yield `None`.
    async fn attempt<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StorageError>>,
    ) -> Option<T> {
        match fut.await {
            Ok(value) => Some(value),
            Err(err) => {
                self.degrade(op, &err);
                None
            }
        }
    }

    fn mark_durable_write(&self) {
        self.status.send_if_modified(|s| {
            if *s == StorageStatus::Connected {
                false
            } else {
                *s = StorageStatus::Connected;
                true
            }
        });
    }

    /// A write that completed on the fallback. A fresh error stays visible
    /// until the next fallback-only write.
    fn mark_fallback_write(&self, failed_over: bool) {
        if !failed_over {
            self.status.send_if_modified(|s| {
                if *s == StorageStatus::Fallback {
                    false
                } else {
                    *s = StorageStatus::Fallback;
                    true
                }
            });
        }
    }

    fn fallback_result<T: Default>(op: &'static str, result: Result<T, StorageError>) -> T {
        result.unwrap_or_else(|err| {
            error!(op, error = %err, "ephemeral store failed");
            T::default()
        })
    }

    //
    // ─── SETTINGS ──────────────────────────────────────────────────────────────
    //

    async fn raw_setting(&self, key: &str) -> Option<Value> {
        if let Some(durable) = self.durable() {
            if let Some(value) = self.attempt("get_setting", durable.get_setting(key)).await {
                return value;
            }
        }
        Self::fallback_result("get_setting", self.fallback.get_setting(key).await)
    }

    /// Read `key`, or `default` when it is absent or holds a value of the wrong type.
    pub async fn get_setting<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.raw_setting(key).await {
            None => default,
            Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
                warn!(key, error = %err, "ignoring malformed setting");
                default
            }),
        }
    }

    /// Store `value` under `key`. The last write wins.
    pub async fn put_setting<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(err) => {
                error!(key, error = %err, "setting is not serializable");
                return;
            }
        };

        let mut failed_over = false;
        if let Some(durable) = self.durable() {
            if self.attempt("put_setting", durable.put_setting(key, &value)).await.is_some() {
                self.mark_durable_write();
                return;
            }
            failed_over = true;
        }
        Self::fallback_result("put_setting", self.fallback.put_setting(key, &value).await);
        debug!(key, "setting written to ephemeral store");
        self.mark_fallback_write(failed_over);
    }

    //
    // ─── SESSIONS ──────────────────────────────────────────────────────────────
    //

    pub async fn all_sessions(&self) -> Vec<Session> {
        if let Some(durable) = self.durable() {
            if let Some(sessions) = self.attempt("list_sessions", durable.list_sessions()).await {
                return sessions;
            }
        }
        Self::fallback_result("list_sessions", self.fallback.list_sessions().await)
    }

    pub async fn sessions_for_mode(&self, mode: &str, since: Option<DateTime<Utc>>) -> Vec<Session> {
        if let Some(durable) = self.durable() {
            if let Some(sessions) = self
                .attempt("sessions_for_mode", durable.sessions_for_mode(mode, since))
                .await
            {
                return sessions;
            }
        }
        Self::fallback_result(
            "sessions_for_mode",
            self.fallback.sessions_for_mode(mode, since).await,
        )
    }

    /// Upsert one session by id.
    pub async fn put_session(&self, session: &Session) {
        let mut failed_over = false;
        if let Some(durable) = self.durable() {
            if self.attempt("upsert_session", durable.upsert_session(session)).await.is_some() {
                self.mark_durable_write();
                return;
            }
            failed_over = true;
        }
        Self::fallback_result("upsert_session", self.fallback.upsert_session(session).await);
        warn!(id = %session.id(), "session written to ephemeral store");
        self.mark_fallback_write(failed_over);
    }

    /// Replace every stored session with `sessions`.
    pub async fn replace_sessions(&self, sessions: &[Session]) {
        let mut failed_over = false;
        if let Some(durable) = self.durable() {
            if self
                .attempt("replace_sessions", durable.replace_sessions(sessions))
                .await
                .is_some()
            {
                self.mark_durable_write();
                return;
            }
            failed_over = true;
        }
        Self::fallback_result(
            "replace_sessions",
            self.fallback.replace_sessions(sessions).await,
        );
        warn!(count = sessions.len(), "session list written to ephemeral store");
        self.mark_fallback_write(failed_over);
    }

    pub async fn delete_session(&self, id: &SessionId) {
        let mut failed_over = false;
        if let Some(durable) = self.durable() {
            if self.attempt("delete_session", durable.delete_session(id)).await.is_some() {
                self.mark_durable_write();
                return;
            }
            failed_over = true;
        }
        Self::fallback_result("delete_session", self.fallback.delete_session(id).await);
        self.mark_fallback_write(failed_over);
    }

    /// Empty one store kind.
    pub async fn clear(&self, kind: StoreKind) {
        async fn clear_in(backend: &dyn Backend, kind: StoreKind) -> Result<(), StorageError> {
            match kind {
                StoreKind::Records => backend.clear_sessions().await,
                StoreKind::Settings => backend.clear_settings().await,
            }
        }

        let mut failed_over = false;
        if let Some(durable) = self.durable() {
            if self.attempt("clear", clear_in(durable, kind)).await.is_some() {
                self.mark_durable_write();
                return;
            }
            failed_over = true;
        }
        Self::fallback_result("clear", clear_in(&self.fallback, kind).await);
        self.mark_fallback_write(failed_over);
    }

    //
    // ─── MIGRATION & DIAGNOSTICS ───────────────────────────────────────────────
    //

    /// Move legacy data from the fallback into the durable store.
    ///
    /// Sessions are copied only into an empty durable record store, then
    /// erased from the fallback. Each legacy setting is copied when the
    /// durable store lacks the key and erased from the fallback either way.
    /// Running it again finds nothing left to move.
    pub async fn migrate_legacy(&self) -> MigrationReport {
        let mut report = MigrationReport::default();
        let Some(durable) = self.durable() else {
            debug!("no durable store; legacy migration skipped");
            return report;
        };

        let legacy_sessions =
            Self::fallback_result("list_sessions", self.fallback.list_sessions().await);
        if !legacy_sessions.is_empty() {
            let Some(existing) = self.attempt("count_sessions", durable.count_sessions()).await
            else {
                return report;
            };
            if existing == 0 {
                if self
                    .attempt("replace_sessions", durable.replace_sessions(&legacy_sessions))
                    .await
                    .is_none()
                {
                    return report;
                }
                report.sessions_copied = legacy_sessions.len();
                Self::fallback_result("clear_sessions", self.fallback.clear_sessions().await);
            } else {
                report.sessions_kept = legacy_sessions.len();
                info!(
                    legacy = legacy_sessions.len(),
                    existing, "durable store already has sessions; legacy copy left in place"
                );
            }
        }

        let legacy_keys = Self::fallback_result("setting_keys", self.fallback.setting_keys().await);
        for key in legacy_keys {
            if key == keys::WRITE_PROBE {
                Self::fallback_result("remove_setting", self.fallback.remove_setting(&key).await);
                continue;
            }
            let Some(value) =
                Self::fallback_result("get_setting", self.fallback.get_setting(&key).await)
            else {
                continue;
            };
            let Some(current) = self.attempt("get_setting", durable.get_setting(&key)).await
            else {
                return report;
            };
            if current.is_none() {
                if self
                    .attempt("put_setting", durable.put_setting(&key, &value))
                    .await
                    .is_none()
                {
                    return report;
                }
                report.settings_copied += 1;
            } else {
                report.settings_superseded += 1;
            }
            Self::fallback_result("remove_setting", self.fallback.remove_setting(&key).await);
        }

        report.completed = true;
        if report.sessions_copied > 0 || report.settings_copied > 0 {
            info!(
                sessions = report.sessions_copied,
                settings = report.settings_copied,
                "legacy data migrated to durable store"
            );
        }
        report
    }

    /// Write, read back and remove a probe setting; reports success in the status.
    pub async fn probe_write(&self) -> bool {
        let stamp = Utc::now().timestamp_millis();
        self.put_setting(keys::WRITE_PROBE, &stamp).await;
        let read: Option<i64> = self.get_setting(keys::WRITE_PROBE, None).await;
        let ok = read == Some(stamp);

        if let Some(durable) = self.durable() {
            self.attempt("remove_setting", durable.remove_setting(keys::WRITE_PROBE))
                .await;
        }
        Self::fallback_result(
            "remove_setting",
            self.fallback.remove_setting(keys::WRITE_PROBE).await,
        );

        if !ok {
            self.status
                .send_replace(StorageStatus::Error("write probe read back a different value".into()));
        }
        info!(ok, status = %self.status(), "storage write probe");
        ok
    }
}
