use std::sync::Arc;

use drill_core::leaderboard::{LeaderboardEntry, LeaderboardQuery, rank};
use storage::StorageGateway;
use tracing::debug;

/// Ranked views over stored sessions.
#[derive(Clone)]
pub struct LeaderboardService {
    gateway: Arc<StorageGateway>,
}

impl LeaderboardService {
    #[must_use]
    pub fn new(gateway: Arc<StorageGateway>) -> Self {
        Self { gateway }
    }

    /// Top entries for `query`.
    pub async fn rank(&self, query: &LeaderboardQuery) -> Vec<LeaderboardEntry> {
        let sessions = self.gateway.sessions_for_mode(&query.mode, None).await;
        let entries = rank(&sessions, query);
        debug!(
            mode = %query.mode,
            metric = %query.metric,
            duration = %query.duration,
            candidates = sessions.len(),
            ranked = entries.len(),
            "leaderboard computed"
        );
        entries
    }

    /// Distinct round durations recorded for `mode`, ascending; used to offer filters.
    pub async fn durations(&self, mode: &str) -> Vec<u32> {
        let mut durations: Vec<u32> = self
            .gateway
            .sessions_for_mode(mode, None)
            .await
            .iter()
            .map(|s| s.duration_seconds())
            .collect();
        durations.sort_unstable();
        durations.dedup();
        durations
    }
}
