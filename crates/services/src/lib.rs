#![forbid(unsafe_code)]

pub mod app_services;
pub mod app_state;
pub mod error;
pub mod history_service;
pub mod leaderboard_service;
pub mod sessions;
pub mod settings_service;

pub use drill_core::Clock;

pub use app_services::AppServices;
pub use app_state::{AppState, LeaderboardPrefs};
pub use error::{SessionError, SettingsServiceError};
pub use history_service::{HistoryService, ModeHistory, SessionListItem};
pub use leaderboard_service::LeaderboardService;
pub use settings_service::SettingsService;

pub use sessions::{
    AnswerVerdict, DrillLoopService, DrillRound, RoundOutcome, RoundState, RoundTimer,
    SmartSummary, StartedRound,
};
