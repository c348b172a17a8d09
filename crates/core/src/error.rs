use thiserror::Error;

use crate::leaderboard::LeaderboardError;
use crate::model::{SessionModelError, SettingsError};
use crate::modes::ModeError;

/// Any domain error raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionModelError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Mode(#[from] ModeError),
    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
}
