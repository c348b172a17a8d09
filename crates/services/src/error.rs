//! Shared error types for the services crate.

use thiserror::Error;

use drill_core::model::{SessionModelError, SettingsError};

/// Errors emitted by the round state machine and its orchestration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("round is already running")]
    AlreadyRunning,
    #[error("round is not running")]
    NotRunning,
    #[error("no problem has been drawn")]
    NoProblem,
    #[error(transparent)]
    Model(#[from] SessionModelError),
}

/// Errors emitted by `SettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsServiceError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
