//! Persistence for the drill trainer: a durable `SQLite` backend, an
//! ephemeral fallback store, and the [`StorageGateway`] that routes between them.

pub mod ephemeral;
pub mod gateway;
pub mod record;
pub mod repository;
pub mod sqlite;

pub use ephemeral::EphemeralStore;
pub use gateway::{MigrationReport, StorageGateway, StorageStatus};
pub use repository::{Backend, SessionRepository, SettingsRepository, StorageError, StoreKind};
