use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drill_core::model::{Session, SessionId};
use serde_json::Value;
use tracing::warn;

use crate::record::{SessionRecord, decode_sessions};
use crate::repository::{SessionRepository, SettingsRepository, StorageError};

/// Key under which the session list is stored as a JSON array.
pub const SESSIONS_KEY: &str = "mathScores";

/// String-keyed store of JSON-encoded values, held in memory.
///
/// This is the fallback backend: sessions live under [`SESSIONS_KEY`] as one
/// JSON array and every other key is a setting. Clones share the same map.
#[derive(Clone, Default)]
pub struct EphemeralStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl std::fmt::Debug for EphemeralStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.entries.lock().map(|g| g.len()).unwrap_or_default();
        f.debug_struct("EphemeralStore").field("entries", &len).finish()
    }
}

impl EphemeralStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw key/value text.
    #[must_use]
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Arc::new(Mutex::new(map)),
        }
    }

    /// Parse a JSON object dump of a legacy store.
    ///
    /// String values are taken as the stored text; any other value is stored
    /// as its JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if `json` is not an object.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(StorageError::Serialization(
                "legacy store must be a JSON object".into(),
            ));
        };
        Ok(Self::from_entries(map.into_iter().map(|(k, v)| {
            let text = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, text)
        })))
    }

    /// Load a legacy dump from disk.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the file cannot be read, or
    /// `StorageError::Serialization` if it is not a JSON object.
    pub fn load_json_file(path: &Path) -> Result<Self, StorageError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Raw text stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn set_raw(&self, key: impl Into<String>, value: impl Into<String>) -> Result<(), StorageError> {
        self.lock()?.insert(key.into(), value.into());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.lock()?.is_empty())
    }

    fn read_records(&self) -> Result<Vec<SessionRecord>, StorageError> {
        match self.get_raw(SESSIONS_KEY)? {
            None => Ok(Vec::new()),
            Some(text) if text.trim().is_empty() => Ok(Vec::new()),
            Some(text) => {
                let items: Vec<Value> = serde_json::from_str(&text)
                    .map_err(|e| StorageError::Serialization(format!("{SESSIONS_KEY}: {e}")))?;
                Ok(items
                    .into_iter()
                    .enumerate()
                    .filter_map(|(index, item)| match serde_json::from_value(item) {
                        Ok(record) => Some(record),
                        Err(err) => {
                            warn!(
                                index,
                                key = SESSIONS_KEY,
                                error = %err,
                                "skipping malformed session entry"
                            );
                            None
                        }
                    })
                    .collect())
            }
        }
    }

    fn write_records(&self, records: &[SessionRecord]) -> Result<(), StorageError> {
        let text =
            serde_json::to_string(records).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set_raw(SESSIONS_KEY, text)
    }
}

#[async_trait]
impl SessionRepository for EphemeralStore {
    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        Ok(decode_sessions(self.read_records()?))
    }

    async fn sessions_for_mode(
        &self,
        mode: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Session>, StorageError> {
        Ok(self
            .list_sessions()
            .await?
            .into_iter()
            .filter(|s| s.mode() == mode && since.is_none_or(|t| s.started_at() >= t))
            .collect())
    }

    async fn count_sessions(&self) -> Result<usize, StorageError> {
        Ok(self.read_records()?.len())
    }

    async fn upsert_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut records = self.read_records()?;
        let record = SessionRecord::from_session(session);
        let existing = records
            .iter()
            .enumerate()
            .position(|(i, r)| r.resolved_id(i) == *session.id());
        match existing {
            Some(i) => records[i] = record,
            None => records.push(record),
        }
        self.write_records(&records)
    }

    async fn replace_sessions(&self, sessions: &[Session]) -> Result<(), StorageError> {
        let records: Vec<SessionRecord> = sessions.iter().map(SessionRecord::from_session).collect();
        self.write_records(&records)
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError> {
        let records: Vec<SessionRecord> = self
            .read_records()?
            .into_iter()
            .enumerate()
            .filter(|(i, r)| r.resolved_id(*i) != *id)
            .map(|(i, mut r)| {
                // Pin back-filled ids so removing an earlier entry does not renumber later ones.
                r.id = Some(r.resolved_id(i).as_str().to_string());
                r
            })
            .collect();
        self.write_records(&records)
    }

    async fn clear_sessions(&self) -> Result<(), StorageError> {
        self.lock()?.remove(SESSIONS_KEY);
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for EphemeralStore {
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StorageError> {
        if key == SESSIONS_KEY {
            return Ok(None);
        }
        // Legacy writers stored JSON text; anything unparseable is kept as a plain string.
        Ok(self
            .get_raw(key)?
            .map(|text| serde_json::from_str(&text).unwrap_or(Value::String(text))))
    }

    async fn put_setting(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        if key == SESSIONS_KEY {
            return Err(StorageError::Serialization(format!(
                "{SESSIONS_KEY} is reserved for session records"
            )));
        }
        self.set_raw(key, value.to_string())
    }

    async fn setting_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .lock()?
            .keys()
            .filter(|k| k.as_str() != SESSIONS_KEY)
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn remove_setting(&self, key: &str) -> Result<(), StorageError> {
        if key != SESSIONS_KEY {
            self.lock()?.remove(key);
        }
        Ok(())
    }

    async fn clear_settings(&self) -> Result<(), StorageError> {
        self.lock()?.retain(|k, _| k == SESSIONS_KEY);
        Ok(())
    }
}
