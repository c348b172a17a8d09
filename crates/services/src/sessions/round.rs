use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use tracing::{debug, info};

use drill_core::model::{Problem, ProblemRecord, Session, SessionId, SmartGeneratorConfig, SmartSnapshot};
use drill_core::modes::{PracticeMode, ProblemSource};
use drill_core::selector::{SelectionWeights, SmartSelector};

use super::outcome::RoundOutcome;
use crate::error::SessionError;

/// Lifecycle of a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Running,
    Ended,
}

/// Result of checking one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerVerdict {
    Correct,
    Incorrect { expected: String },
    /// Blank input; nothing was recorded and the problem stays open.
    NoAnswer,
}

impl AnswerVerdict {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        matches!(self, AnswerVerdict::Correct)
    }

    #[must_use]
    pub fn is_recorded(&self) -> bool {
        !matches!(self, AnswerVerdict::NoAnswer)
    }
}

struct SmartPlan {
    selector: SmartSelector,
    config: SmartGeneratorConfig,
}

impl SmartPlan {
    fn snapshot(&self) -> SmartSnapshot {
        let index = self.selector.index();
        SmartSnapshot {
            lookback_days: self.config.lookback_days(),
            slowest_pool: index.slow().len(),
            mistake_pool: index.mistakes().len(),
            prob_slowest: self.config.prob_slowest(),
            prob_mistakes: self.config.prob_mistakes(),
            use_time_filter: self.config.use_time_filter(),
            time_threshold_seconds: self.config.time_threshold_seconds(),
        }
    }
}

/// One timed practice round: `Idle → Running → Ended`.
///
/// Time is passed in by the caller so the machine itself never reads a clock.
/// A round can be started again after it ended; counters reset on every start.
pub struct DrillRound {
    state: RoundState,
    source: Box<dyn ProblemSource>,
    rng: Box<dyn RngCore + Send>,
    duration_seconds: u32,
    smart: Option<SmartPlan>,
    started_at: Option<DateTime<Utc>>,
    drawn_at: Option<DateTime<Utc>>,
    current: Option<Problem>,
    problem_count: u32,
    records: Vec<ProblemRecord>,
}

impl std::fmt::Debug for DrillRound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrillRound")
            .field("state", &self.state)
            .field("mode", &self.source.mode())
            .field("duration_seconds", &self.duration_seconds)
            .field("smart", &self.smart.is_some())
            .field("problem_count", &self.problem_count)
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl DrillRound {
    #[must_use]
    pub fn new(
        source: Box<dyn ProblemSource>,
        duration_seconds: u32,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        Self {
            state: RoundState::Idle,
            source,
            rng,
            duration_seconds,
            smart: None,
            started_at: None,
            drawn_at: None,
            current: None,
            problem_count: 0,
            records: Vec::new(),
        }
    }

    /// Draw problems through `selector`; the round records `config` in its snapshot.
    #[must_use]
    pub fn with_smart(mut self, selector: SmartSelector, config: SmartGeneratorConfig) -> Self {
        self.smart = Some(SmartPlan { selector, config });
        self
    }

    #[must_use]
    pub fn state(&self) -> RoundState {
        self.state
    }

    #[must_use]
    pub fn mode(&self) -> PracticeMode {
        self.source.mode()
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// The problem awaiting an answer, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Problem> {
        self.current.as_ref()
    }

    /// Problems drawn since the round started.
    #[must_use]
    pub fn problem_count(&self) -> u32 {
        self.problem_count
    }

    #[must_use]
    pub fn records(&self) -> &[ProblemRecord] {
        &self.records
    }

    #[must_use]
    pub fn score(&self) -> usize {
        self.records.iter().filter(|r| r.is_correct).count()
    }

    #[must_use]
    pub fn smart_weights(&self) -> Option<SelectionWeights> {
        self.smart.as_ref().map(|plan| plan.selector.weights())
    }

    fn ensure_running(&self) -> Result<(), SessionError> {
        if self.state == RoundState::Running {
            Ok(())
        } else {
            Err(SessionError::NotRunning)
        }
    }

    /// Reset counters, enter `Running` and draw the first problem.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyRunning` if the round is in progress.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<&Problem, SessionError> {
        if self.state == RoundState::Running {
            return Err(SessionError::AlreadyRunning);
        }
        self.state = RoundState::Running;
        self.started_at = Some(now);
        self.problem_count = 0;
        self.records.clear();
        info!(
            mode = %self.source.mode(),
            duration = self.duration_seconds,
            smart = self.smart.is_some(),
            "round started"
        );
        self.next_problem(now)
    }

    /// Draw the next problem and stamp its draw time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotRunning` outside a running round.
    pub fn next_problem(&mut self, now: DateTime<Utc>) -> Result<&Problem, SessionError> {
        self.ensure_running()?;
        self.problem_count += 1;
        self.drawn_at = Some(now);

        let problem = match &self.smart {
            Some(plan) => plan.selector.select(self.source.as_mut(), self.rng.as_mut()),
            None => self.source.generate_problem(self.rng.as_mut()),
        };
        debug!(
            count = self.problem_count,
            origin = %problem.origin(),
            question = problem.question(),
            "problem drawn"
        );
        Ok(self.current.insert(problem))
    }

    /// Check `input` against the open problem.
    ///
    /// Blank input yields [`AnswerVerdict::NoAnswer`] and records nothing.
    /// Otherwise the answer is recorded with the time since the draw and the
    /// problem is closed until the next draw.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotRunning` outside a running round and
    /// `SessionError::NoProblem` when no problem is open.
    pub fn check_answer(
        &mut self,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<AnswerVerdict, SessionError> {
        self.ensure_running()?;
        if self.current.is_none() {
            return Err(SessionError::NoProblem);
        }
        let answer = input.trim();
        if answer.is_empty() {
            return Ok(AnswerVerdict::NoAnswer);
        }
        let Some(problem) = self.current.take() else {
            return Err(SessionError::NoProblem);
        };

        let drawn_at = self.drawn_at.unwrap_or(now);
        let elapsed_ms = u64::try_from((now - drawn_at).num_milliseconds()).unwrap_or(0);
        let is_correct = self.source.validate_answer(answer, problem.answer());
        self.records
            .push(ProblemRecord::answered(&problem, answer, elapsed_ms, is_correct));

        Ok(if is_correct {
            AnswerVerdict::Correct
        } else {
            AnswerVerdict::Incorrect {
                expected: problem.answer().to_string(),
            }
        })
    }

    /// Time left in the round; the full duration before start and zero after end.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let total = Duration::seconds(i64::from(self.duration_seconds));
        match (self.state, self.started_at) {
            (RoundState::Running, Some(started)) => (total - (now - started)).max(Duration::zero()),
            (RoundState::Ended, _) => Duration::zero(),
            _ => total,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == RoundState::Running && self.remaining(now) <= Duration::zero()
    }

    /// Stop the round and package its records.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotRunning` if the round is not running, or a
    /// model error if the session cannot be built.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<RoundOutcome, SessionError> {
        self.ensure_running()?;
        let started_at = self.started_at.ok_or(SessionError::NotRunning)?;
        self.state = RoundState::Ended;
        self.current = None;
        self.drawn_at = None;

        let elapsed = (now - started_at)
            .num_seconds()
            .clamp(0, i64::from(self.duration_seconds));
        let elapsed = u32::try_from(elapsed).unwrap_or(self.duration_seconds);

        let id = SessionId::generate(now, &mut *self.rng);
        let session = Session::from_records(
            id,
            self.source.mode().name(),
            started_at,
            self.duration_seconds,
            elapsed,
            std::mem::take(&mut self.records),
            self.source.difficulty(),
            self.smart.as_ref().map(SmartPlan::snapshot),
        )?;

        info!(
            id = %session.id(),
            mode = session.mode(),
            score = session.correct_count(),
            total = session.total_attempted(),
            accuracy = session.accuracy_percent(),
            "round ended"
        );
        Ok(RoundOutcome::new(session, self.smart_weights()))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
