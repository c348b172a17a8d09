use drill_core::leaderboard::{DurationFilter, LeaderboardMetric, LeaderboardQuery};
use drill_core::model::{DEFAULT_ROUND_DURATION_SECS, SmartGeneratorConfig};
use drill_core::modes::{
    ModeError, Multiplication, MultiplicationLevel, PracticeMode, ProblemSource, SquareRootRange,
};

/// Leaderboard selections remembered between launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardPrefs {
    pub mode: PracticeMode,
    pub duration: DurationFilter,
    pub metric: LeaderboardMetric,
}

impl Default for LeaderboardPrefs {
    fn default() -> Self {
        Self {
            mode: PracticeMode::Calendar,
            duration: DurationFilter::All,
            metric: LeaderboardMetric::Speed,
        }
    }
}

impl LeaderboardPrefs {
    #[must_use]
    pub fn query(&self) -> LeaderboardQuery {
        LeaderboardQuery {
            mode: self.mode.name().to_string(),
            duration: self.duration,
            metric: self.metric,
        }
    }
}

/// Everything a round needs to know about the current user choices.
///
/// Passed explicitly to the engine; nothing here is global.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub mode: PracticeMode,
    pub round_duration: u32,
    pub show_feedback: bool,
    pub multiplication: MultiplicationLevel,
    pub smart: SmartGeneratorConfig,
    pub debug: bool,
    pub leaderboard: LeaderboardPrefs,
    root_range: (u32, u32),
    pub(crate) settings_loaded: bool,
}

impl AppState {
    /// Unloaded state for `mode`; persisted settings are applied on first use.
    #[must_use]
    pub fn new(mode: PracticeMode) -> Self {
        Self {
            mode,
            round_duration: DEFAULT_ROUND_DURATION_SECS,
            show_feedback: true,
            multiplication: MultiplicationLevel::default(),
            smart: SmartGeneratorConfig::default(),
            debug: false,
            leaderboard: LeaderboardPrefs::default(),
            root_range: SquareRootRange::default().range(),
            settings_loaded: false,
        }
    }

    #[must_use]
    pub fn settings_loaded(&self) -> bool {
        self.settings_loaded
    }

    #[must_use]
    pub fn root_range(&self) -> (u32, u32) {
        self.root_range
    }

    /// Set the bounds used by the square-root range mode.
    ///
    /// # Errors
    ///
    /// Returns `ModeError::InvalidRange` if `min > max`.
    pub fn set_root_range(&mut self, min: u32, max: u32) -> Result<(), ModeError> {
        SquareRootRange::new(min, max)?;
        self.root_range = (min, max);
        Ok(())
    }

    /// Problem source for the current mode, configured from this state.
    #[must_use]
    pub fn problem_source(&self) -> Box<dyn ProblemSource> {
        match self.mode {
            PracticeMode::Multiplication => Box::new(Multiplication::new(self.multiplication)),
            PracticeMode::SquareRootRange => {
                let (min, max) = self.root_range;
                match SquareRootRange::new(min, max) {
                    Ok(source) => Box::new(source),
                    Err(_) => Box::new(SquareRootRange::default()),
                }
            }
            mode => mode.source(),
        }
    }
}
