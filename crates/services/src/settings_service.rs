use std::sync::Arc;

use drill_core::leaderboard::{DurationFilter, LeaderboardMetric};
use drill_core::model::settings::keys;
use drill_core::model::{
    DEFAULT_ROUND_DURATION_SECS, SmartGeneratorConfig, SmartGeneratorDraft, validate_round_duration,
};
use drill_core::modes::{MultiplicationLevel, PracticeMode};
use serde_json::Value;
use storage::StorageGateway;
use tracing::{debug, warn};

use crate::app_state::{AppState, LeaderboardPrefs};
use crate::error::SettingsServiceError;

/// Typed access to user preferences stored as individual settings.
#[derive(Clone)]
pub struct SettingsService {
    gateway: Arc<StorageGateway>,
}

impl SettingsService {
    #[must_use]
    pub fn new(gateway: Arc<StorageGateway>) -> Self {
        Self { gateway }
    }

    /// Apply every persisted preference to `state` and mark it loaded.
    pub async fn load_into(&self, state: &mut AppState) {
        state.round_duration = self.round_duration().await;
        state.show_feedback = self.show_feedback().await;
        state.multiplication = self.multiplication_difficulty().await;
        state.smart = self.smart_config().await;
        state.debug = self.debug_mode().await;
        state.leaderboard = self.leaderboard_prefs().await;
        state.settings_loaded = true;
        debug!(mode = %state.mode, duration = state.round_duration, "settings loaded");
    }

    //
    // ─── ROUND ─────────────────────────────────────────────────────────────────
    //

    /// Selected round length, falling back to the legacy key and then 60 s.
    pub async fn round_duration(&self) -> u32 {
        let legacy = self
            .gateway
            .get_setting(keys::LEGACY_ROUND_DURATION, DEFAULT_ROUND_DURATION_SECS)
            .await;
        let seconds = self.gateway.get_setting(keys::ROUND_DURATION, legacy).await;
        validate_round_duration(seconds).unwrap_or(DEFAULT_ROUND_DURATION_SECS)
    }

    /// # Errors
    ///
    /// Returns `SettingsServiceError` for a zero-second duration.
    pub async fn set_round_duration(&self, seconds: u32) -> Result<u32, SettingsServiceError> {
        let seconds = validate_round_duration(seconds)?;
        self.gateway.put_setting(keys::ROUND_DURATION, &seconds).await;
        Ok(seconds)
    }

    pub async fn show_feedback(&self) -> bool {
        self.gateway.get_setting(keys::SHOW_FEEDBACK, true).await
    }

    pub async fn set_show_feedback(&self, show: bool) {
        self.gateway.put_setting(keys::SHOW_FEEDBACK, &show).await;
    }

    pub async fn multiplication_difficulty(&self) -> MultiplicationLevel {
        let default = MultiplicationLevel::default();
        let raw: String = self
            .gateway
            .get_setting(keys::MULTIPLICATION_DIFFICULTY, default.as_str().to_string())
            .await;
        raw.parse().unwrap_or_else(|err| {
            warn!(value = %raw, error = %err, "ignoring stored multiplication difficulty");
            default
        })
    }

    pub async fn set_multiplication_difficulty(&self, level: MultiplicationLevel) {
        self.gateway
            .put_setting(keys::MULTIPLICATION_DIFFICULTY, level.as_str())
            .await;
    }

    pub async fn debug_mode(&self) -> bool {
        self.gateway.get_setting(keys::DEBUG_MODE, false).await
    }

    pub async fn set_debug_mode(&self, enabled: bool) {
        self.gateway.put_setting(keys::DEBUG_MODE, &enabled).await;
    }

    //
    // ─── SMART GENERATOR ───────────────────────────────────────────────────────
    //

    /// Persisted smart-generator fields; out-of-range probabilities are clamped.
    pub async fn smart_config(&self) -> SmartGeneratorConfig {
        let defaults = SmartGeneratorDraft::default();
        let g = &self.gateway;
        SmartGeneratorDraft {
            enabled: g.get_setting(keys::SMART_ENABLED, defaults.enabled).await,
            lookback_days: g
                .get_setting(keys::SMART_LOOKBACK_DAYS, defaults.lookback_days)
                .await,
            prob_slowest: g
                .get_setting(keys::SMART_PROB_SLOWEST, defaults.prob_slowest)
                .await,
            prob_mistakes: g
                .get_setting(keys::SMART_PROB_MISTAKES, defaults.prob_mistakes)
                .await,
            use_time_filter: g
                .get_setting(keys::SMART_USE_TIME_FILTER, defaults.use_time_filter)
                .await,
            time_threshold_seconds: g
                .get_setting(keys::SMART_TIME_THRESHOLD, defaults.time_threshold_seconds)
                .await,
        }
        .clamped()
    }

    /// Validate and persist each smart-generator field under its own key.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` if a probability is outside `[0, 1]`;
    /// nothing is written in that case.
    pub async fn save_smart_config(
        &self,
        draft: SmartGeneratorDraft,
    ) -> Result<SmartGeneratorConfig, SettingsServiceError> {
        let config = draft.validate()?;
        let g = &self.gateway;
        g.put_setting(keys::SMART_ENABLED, &config.enabled()).await;
        g.put_setting(keys::SMART_LOOKBACK_DAYS, &config.lookback_days())
            .await;
        g.put_setting(keys::SMART_PROB_SLOWEST, &config.prob_slowest())
            .await;
        g.put_setting(keys::SMART_PROB_MISTAKES, &config.prob_mistakes())
            .await;
        g.put_setting(keys::SMART_USE_TIME_FILTER, &config.use_time_filter())
            .await;
        g.put_setting(keys::SMART_TIME_THRESHOLD, &config.time_threshold_seconds())
            .await;
        Ok(config)
    }

    //
    // ─── LEADERBOARD ───────────────────────────────────────────────────────────
    //

    pub async fn leaderboard_prefs(&self) -> LeaderboardPrefs {
        let defaults = LeaderboardPrefs::default();

        let mode: String = self
            .gateway
            .get_setting(keys::LEADERBOARD_MODE, defaults.mode.name().to_string())
            .await;
        let metric: String = self
            .gateway
            .get_setting(keys::LEADERBOARD_METRIC, defaults.metric.as_str().to_string())
            .await;
        let filter: Value = self
            .gateway
            .get_setting(keys::LEADERBOARD_DURATION_FILTER, Value::Null)
            .await;

        LeaderboardPrefs {
            mode: mode.parse::<PracticeMode>().unwrap_or(defaults.mode),
            duration: duration_filter_from(&filter).unwrap_or(defaults.duration),
            metric: metric.parse::<LeaderboardMetric>().unwrap_or(defaults.metric),
        }
    }

    pub async fn save_leaderboard_prefs(&self, prefs: LeaderboardPrefs) {
        let g = &self.gateway;
        g.put_setting(keys::LEADERBOARD_MODE, prefs.mode.name()).await;
        g.put_setting(keys::LEADERBOARD_DURATION_FILTER, &prefs.duration.to_string())
            .await;
        g.put_setting(keys::LEADERBOARD_METRIC, prefs.metric.as_str())
            .await;
    }
}

/// Older writers stored the filter as a bare number; newer ones as text.
fn duration_filter_from(value: &Value) -> Option<DurationFilter> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(DurationFilter::Seconds),
        _ => None,
    }
}
