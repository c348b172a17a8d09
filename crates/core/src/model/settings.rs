use thiserror::Error;

/// Names of independently persisted settings.
///
/// The strings match the keys written by earlier releases so that legacy
/// fallback data migrates without renaming.
pub mod keys {
    pub const ROUND_DURATION: &str = "lastSelectedDuration";
    pub const LEGACY_ROUND_DURATION: &str = "lastGameDuration";
    pub const SHOW_FEEDBACK: &str = "showFeedback";
    pub const MULTIPLICATION_DIFFICULTY: &str = "multiplicationDifficulty";
    pub const SMART_ENABLED: &str = "useSmartGenerator";
    pub const SMART_LOOKBACK_DAYS: &str = "lookbackDays";
    pub const SMART_PROB_SLOWEST: &str = "probSlowest";
    pub const SMART_PROB_MISTAKES: &str = "probMistakes";
    pub const SMART_USE_TIME_FILTER: &str = "useTimeFilter";
    pub const SMART_TIME_THRESHOLD: &str = "timeThreshold";
    pub const LEADERBOARD_MODE: &str = "currentLeaderboardMode";
    pub const LEADERBOARD_DURATION_FILTER: &str = "currentLeaderboardFilter";
    pub const LEADERBOARD_METRIC: &str = "currentLeaderboardType";
    pub const DEBUG_MODE: &str = "debugMode";
    pub const WRITE_PROBE: &str = "testWrite";

    /// Every key a legacy fallback store may hold.
    pub const MIGRATABLE: &[&str] = &[
        ROUND_DURATION,
        LEGACY_ROUND_DURATION,
        SHOW_FEEDBACK,
        MULTIPLICATION_DIFFICULTY,
        LEADERBOARD_MODE,
        LEADERBOARD_DURATION_FILTER,
        LEADERBOARD_METRIC,
        SMART_ENABLED,
        SMART_LOOKBACK_DAYS,
        SMART_PROB_SLOWEST,
        SMART_PROB_MISTAKES,
        SMART_USE_TIME_FILTER,
        SMART_TIME_THRESHOLD,
        DEBUG_MODE,
    ];
}

pub const DEFAULT_ROUND_DURATION_SECS: u32 = 60;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("{field} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },

    #[error("round duration must be positive")]
    ZeroDuration,
}

/// Parameters of the smart generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartGeneratorConfig {
    enabled: bool,
    lookback_days: u32,
    prob_slowest: f64,
    prob_mistakes: f64,
    use_time_filter: bool,
    time_threshold_seconds: u32,
}

/// Unvalidated smart-generator fields, as entered by a user or read from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartGeneratorDraft {
    pub enabled: bool,
    pub lookback_days: u32,
    pub prob_slowest: f64,
    pub prob_mistakes: f64,
    pub use_time_filter: bool,
    pub time_threshold_seconds: u32,
}

impl Default for SmartGeneratorDraft {
    fn default() -> Self {
        Self {
            enabled: false,
            lookback_days: 1,
            prob_slowest: 0.25,
            prob_mistakes: 0.25,
            use_time_filter: false,
            time_threshold_seconds: 2,
        }
    }
}

impl SmartGeneratorDraft {
    /// Validate the draft.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::ProbabilityOutOfRange` if a probability is
    /// outside `[0, 1]` or not finite.
    pub fn validate(self) -> Result<SmartGeneratorConfig, SettingsError> {
        check_probability("probSlowest", self.prob_slowest)?;
        check_probability("probMistakes", self.prob_mistakes)?;
        Ok(SmartGeneratorConfig {
            enabled: self.enabled,
            lookback_days: self.lookback_days,
            prob_slowest: self.prob_slowest,
            prob_mistakes: self.prob_mistakes,
            use_time_filter: self.use_time_filter,
            time_threshold_seconds: self.time_threshold_seconds,
        })
    }

    /// Like [`validate`](Self::validate) but clamps probabilities into range.
    ///
    /// Used for persisted values, which are trusted less than user input but
    /// must never block a round from starting.
    #[must_use]
    pub fn clamped(self) -> SmartGeneratorConfig {
        SmartGeneratorConfig {
            enabled: self.enabled,
            lookback_days: self.lookback_days,
            prob_slowest: clamp_probability(self.prob_slowest),
            prob_mistakes: clamp_probability(self.prob_mistakes),
            use_time_filter: self.use_time_filter,
            time_threshold_seconds: self.time_threshold_seconds,
        }
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::ProbabilityOutOfRange { field, value })
    }
}

fn clamp_probability(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl Default for SmartGeneratorConfig {
    fn default() -> Self {
        SmartGeneratorDraft::default().clamped()
    }
}

impl SmartGeneratorConfig {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    #[must_use]
    pub fn prob_slowest(&self) -> f64 {
        self.prob_slowest
    }

    #[must_use]
    pub fn prob_mistakes(&self) -> f64 {
        self.prob_mistakes
    }

    #[must_use]
    pub fn use_time_filter(&self) -> bool {
        self.use_time_filter
    }

    #[must_use]
    pub fn time_threshold_seconds(&self) -> u32 {
        self.time_threshold_seconds
    }

    /// Minimum response time a record needs to enter the pools; 0 disables filtering.
    #[must_use]
    pub fn min_time_ms(&self) -> u64 {
        if self.use_time_filter {
            u64::from(self.time_threshold_seconds) * 1000
        } else {
            0
        }
    }

    #[must_use]
    pub fn to_draft(&self) -> SmartGeneratorDraft {
        SmartGeneratorDraft {
            enabled: self.enabled,
            lookback_days: self.lookback_days,
            prob_slowest: self.prob_slowest,
            prob_mistakes: self.prob_mistakes,
            use_time_filter: self.use_time_filter,
            time_threshold_seconds: self.time_threshold_seconds,
        }
    }
}

/// Validate a round duration.
///
/// # Errors
///
/// Returns `SettingsError::ZeroDuration` for a zero-second round.
pub fn validate_round_duration(seconds: u32) -> Result<u32, SettingsError> {
    if seconds == 0 {
        Err(SettingsError::ZeroDuration)
    } else {
        Ok(seconds)
    }
}
