use std::sync::Arc;

use storage::{EphemeralStore, MigrationReport, StorageGateway, StorageStatus};
use tokio::sync::watch;

use crate::Clock;
use crate::history_service::HistoryService;
use crate::leaderboard_service::LeaderboardService;
use crate::sessions::DrillLoopService;
use crate::settings_service::SettingsService;

/// Assembles app-facing services over one storage gateway.
#[derive(Clone)]
pub struct AppServices {
    gateway: Arc<StorageGateway>,
    migration: MigrationReport,
    drill_loop: Arc<DrillLoopService>,
    settings: Arc<SettingsService>,
    history: Arc<HistoryService>,
    leaderboard: Arc<LeaderboardService>,
}

impl AppServices {
    /// Build services backed by `SQLite`, degrading to `fallback` if it cannot
    /// be opened. Legacy data in `fallback` is migrated on the way.
    pub async fn new_sqlite(db_url: &str, clock: Clock, fallback: EphemeralStore) -> Self {
        let gateway = StorageGateway::sqlite(db_url, fallback).await;
        Self::from_gateway(Arc::new(gateway), clock).await
    }

    /// Services over the ephemeral store only.
    pub async fn new_ephemeral(clock: Clock, store: EphemeralStore) -> Self {
        Self::from_gateway(Arc::new(StorageGateway::ephemeral(store)), clock).await
    }

    /// Run the one-time legacy migration and wire the services.
    pub async fn from_gateway(gateway: Arc<StorageGateway>, clock: Clock) -> Self {
        let migration = gateway.migrate_legacy().await;

        Self {
            drill_loop: Arc::new(DrillLoopService::new(clock, Arc::clone(&gateway))),
            settings: Arc::new(SettingsService::new(Arc::clone(&gateway))),
            history: Arc::new(HistoryService::new(Arc::clone(&gateway))),
            leaderboard: Arc::new(LeaderboardService::new(Arc::clone(&gateway))),
            migration,
            gateway,
        }
    }

    #[must_use]
    pub fn migration(&self) -> &MigrationReport {
        &self.migration
    }

    #[must_use]
    pub fn storage_status(&self) -> StorageStatus {
        self.gateway.status()
    }

    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<StorageStatus> {
        self.gateway.subscribe()
    }

    /// Write/read-back check of the active store.
    pub async fn probe_storage(&self) -> bool {
        self.gateway.probe_write().await
    }

    #[must_use]
    pub fn drill_loop(&self) -> Arc<DrillLoopService> {
        Arc::clone(&self.drill_loop)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings)
    }

    #[must_use]
    pub fn history(&self) -> Arc<HistoryService> {
        Arc::clone(&self.history)
    }

    #[must_use]
    pub fn leaderboard(&self) -> Arc<LeaderboardService> {
        Arc::clone(&self.leaderboard)
    }
}
