use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use drill_core::model::{Session, SessionId};
use storage::{StorageGateway, StoreKind};
use tracing::info;

/// Presentation-agnostic row for one past session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionListItem {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub score: u32,
    pub total: u32,
    pub accuracy_percent: u32,
    pub difficulty: Option<String>,
}

impl SessionListItem {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.id().clone(),
            started_at: session.started_at(),
            duration_seconds: session.duration_seconds(),
            score: session.correct_count(),
            total: session.total_attempted(),
            accuracy_percent: session.accuracy_percent(),
            difficulty: session.difficulty().map(str::to_owned),
        }
    }
}

/// All sessions of one mode, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeHistory {
    pub mode: String,
    pub sessions: Vec<SessionListItem>,
}

/// Browsing and pruning of stored sessions.
#[derive(Clone)]
pub struct HistoryService {
    gateway: Arc<StorageGateway>,
}

impl HistoryService {
    #[must_use]
    pub fn new(gateway: Arc<StorageGateway>) -> Self {
        Self { gateway }
    }

    /// Sessions grouped by mode name (alphabetical), newest first within a group.
    pub async fn grouped_by_mode(&self) -> Vec<ModeHistory> {
        let mut groups: BTreeMap<String, Vec<SessionListItem>> = BTreeMap::new();
        for session in self.gateway.all_sessions().await {
            groups
                .entry(session.mode().to_string())
                .or_default()
                .push(SessionListItem::from_session(&session));
        }

        groups
            .into_iter()
            .map(|(mode, mut sessions)| {
                sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
                ModeHistory { mode, sessions }
            })
            .collect()
    }

    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        self.gateway
            .all_sessions()
            .await
            .into_iter()
            .find(|s| s.id() == id)
    }

    /// Delete one session. Returns false when no session had that id.
    pub async fn delete(&self, id: &SessionId) -> bool {
        if self.get(id).await.is_none() {
            return false;
        }
        self.gateway.delete_session(id).await;
        info!(%id, "session deleted");
        true
    }

    /// Erase every stored session; settings are kept.
    pub async fn clear(&self) {
        self.gateway.clear(StoreKind::Records).await;
        info!("history cleared");
    }
}
