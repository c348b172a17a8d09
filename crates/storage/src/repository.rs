use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drill_core::model::{Session, SessionId};
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),
}

/// Repository contract for completed sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// All stored sessions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the sessions cannot be read.
    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError>;

    /// Sessions of `mode`, optionally limited to those started at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the sessions cannot be read.
    async fn sessions_for_mode(
        &self,
        mode: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Session>, StorageError>;

    /// Number of stored sessions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn count_sessions(&self) -> Result<usize, StorageError>;

    /// Insert a session, replacing any existing one with the same id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn upsert_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Replace the whole record store with `sessions`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be rewritten.
    async fn replace_sessions(&self, sessions: &[Session]) -> Result<(), StorageError>;

    /// Delete a session. Deleting an unknown id is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn clear_sessions(&self) -> Result<(), StorageError>;
}

/// Repository contract for independently stored settings.
///
/// Values are JSON so that booleans, numbers and strings survive unchanged.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be read or decoded.
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Store `value` under `key`; the last write wins.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn put_setting(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn setting_keys(&self) -> Result<Vec<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn remove_setting(&self, key: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn clear_settings(&self) -> Result<(), StorageError>;
}

/// A backend holding both stores.
pub trait Backend: SessionRepository + SettingsRepository {}

impl<T: SessionRepository + SettingsRepository + ?Sized> Backend for T {}

/// Which store [`crate::StorageGateway::clear`] empties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Records,
    Settings,
}
