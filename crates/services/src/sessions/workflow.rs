use std::sync::Arc;

use chrono::Duration;
use rand::RngCore;
use tracing::info;

use drill_core::Clock;
use drill_core::history::{HistoryIndex, HistoryQuery, PoolAdvisory};
use drill_core::model::Problem;
use drill_core::selector::SmartSelector;
use storage::StorageGateway;

use super::outcome::RoundOutcome;
use super::round::{AnswerVerdict, DrillRound};
use crate::app_state::AppState;
use crate::error::SessionError;
use crate::settings_service::SettingsService;

/// A round that has been started, plus any notice about empty history pools.
#[derive(Debug)]
pub struct StartedRound {
    pub round: DrillRound,
    pub advisory: Option<PoolAdvisory>,
}

/// Orchestrates round start, answering and persistence.
#[derive(Clone)]
pub struct DrillLoopService {
    clock: Clock,
    gateway: Arc<StorageGateway>,
    settings: SettingsService,
}

impl DrillLoopService {
    #[must_use]
    pub fn new(clock: Clock, gateway: Arc<StorageGateway>) -> Self {
        let settings = SettingsService::new(Arc::clone(&gateway));
        Self {
            clock,
            gateway,
            settings,
        }
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Build and start a round for `state.mode`.
    ///
    /// Loads settings into `state` on first use. With smart mode on, the
    /// history index for the mode's lookback window is built from storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the round cannot be started.
    pub async fn start_round(
        &self,
        state: &mut AppState,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<StartedRound, SessionError> {
        if !state.settings_loaded() {
            self.settings.load_into(state).await;
        }

        let now = self.clock.now();
        let mut round = DrillRound::new(state.problem_source(), state.round_duration, rng);
        let mut advisory = None;

        if state.smart.enabled() {
            let mode = state.mode.name();
            let since = now - Duration::days(i64::from(state.smart.lookback_days()));
            let sessions = self.gateway.sessions_for_mode(mode, Some(since)).await;
            let index = HistoryIndex::build(&sessions, &HistoryQuery::for_config(mode, &state.smart, now));

            advisory = index.advisory(state.smart.prob_slowest(), state.smart.prob_mistakes());
            if let Some(notice) = advisory {
                info!(mode, advisory = %notice, "smart selection pool is empty");
            }
            info!(
                mode,
                sessions = index.sessions_used(),
                slow = index.slow().len(),
                mistakes = index.mistakes().len(),
                "history index built"
            );

            let selector = SmartSelector::new(
                index,
                state.smart.prob_slowest(),
                state.smart.prob_mistakes(),
            );
            round = round.with_smart(selector, state.smart.clone());
        }

        round.start(now)?;
        Ok(StartedRound { round, advisory })
    }

    /// Check `input` against the open problem at the current clock time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the round is not running or has no open problem.
    pub fn answer(&self, round: &mut DrillRound, input: &str) -> Result<AnswerVerdict, SessionError> {
        round.check_answer(input, self.clock.now())
    }

    /// Draw the next problem at the current clock time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotRunning` outside a running round.
    pub fn next_problem<'a>(&self, round: &'a mut DrillRound) -> Result<&'a Problem, SessionError> {
        round.next_problem(self.clock.now())
    }

    #[must_use]
    pub fn is_expired(&self, round: &DrillRound) -> bool {
        round.is_expired(self.clock.now())
    }

    /// End the round and persist its session through the gateway.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the round is not running.
    pub async fn finish_round(&self, round: &mut DrillRound) -> Result<RoundOutcome, SessionError> {
        let outcome = round.end(self.clock.now())?;
        self.gateway.put_session(outcome.session()).await;
        Ok(outcome)
    }
}
