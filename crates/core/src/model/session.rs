use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{ProblemRecord, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionModelError {
    #[error("correct count ({correct}) exceeds attempted count ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("too many records for a single session: {len}")]
    TooManyRecords { len: usize },

    #[error("mode name must not be empty")]
    EmptyMode,
}

/// Accuracy in whole percent: `round(correct / total * 100)`, or 100 for an empty round.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn accuracy_percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 100;
    }
    let ratio = f64::from(correct) / f64::from(total) * 100.0;
    ratio.round() as u32
}

/// Smart-generator parameters and pool sizes that were in effect for a round.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartSnapshot {
    pub lookback_days: u32,
    pub slowest_pool: usize,
    pub mistake_pool: usize,
    pub prob_slowest: f64,
    pub prob_mistakes: f64,
    pub use_time_filter: bool,
    pub time_threshold_seconds: u32,
}

/// Raw field set used to rehydrate a persisted session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDraft {
    pub id: SessionId,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub elapsed_seconds: u32,
    pub correct_count: u32,
    pub total_attempted: u32,
    pub accuracy_percent: u32,
    pub records: Vec<ProblemRecord>,
    pub difficulty: Option<String>,
    pub smart: Option<SmartSnapshot>,
    /// Records were rebuilt from a legacy mistakes list rather than stored per problem.
    pub reconstructed: bool,
}

/// One completed practice round.
///
/// Built once at round end; immutable afterwards. Sessions produced by the
/// engine always satisfy `total_attempted == records.len()` and
/// `correct_count == records.filter(is_correct).count()`. Rehydrated legacy
/// sessions keep the counts they were stored with.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    mode: String,
    started_at: DateTime<Utc>,
    duration_seconds: u32,
    elapsed_seconds: u32,
    correct_count: u32,
    total_attempted: u32,
    accuracy_percent: u32,
    records: Vec<ProblemRecord>,
    difficulty: Option<String>,
    smart: Option<SmartSnapshot>,
    reconstructed: bool,
}

impl Session {
    /// Build a session from the records of a finished round.
    ///
    /// Entries without a user answer are dropped before counting.
    ///
    /// # Errors
    ///
    /// Returns `SessionModelError::EmptyMode` for a blank mode name and
    /// `SessionModelError::TooManyRecords` if the count cannot fit in `u32`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_records(
        id: SessionId,
        mode: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_seconds: u32,
        elapsed_seconds: u32,
        records: Vec<ProblemRecord>,
        difficulty: Option<String>,
        smart: Option<SmartSnapshot>,
    ) -> Result<Self, SessionModelError> {
        let mode = mode.into();
        if mode.trim().is_empty() {
            return Err(SessionModelError::EmptyMode);
        }

        let records: Vec<ProblemRecord> =
            records.into_iter().filter(ProblemRecord::is_answered).collect();
        let total_attempted = u32::try_from(records.len())
            .map_err(|_| SessionModelError::TooManyRecords { len: records.len() })?;
        let correct = records.iter().filter(|r| r.is_correct).count();
        let correct_count = u32::try_from(correct)
            .map_err(|_| SessionModelError::TooManyRecords { len: correct })?;

        Ok(Self {
            id,
            mode,
            started_at,
            duration_seconds,
            elapsed_seconds,
            correct_count,
            total_attempted,
            accuracy_percent: accuracy_percent(correct_count, total_attempted),
            records,
            difficulty,
            smart,
            reconstructed: false,
        })
    }

    /// Rehydrate a session from persisted storage, trusting stored counts.
    ///
    /// # Errors
    ///
    /// Returns `SessionModelError::CountMismatch` if more answers are marked
    /// correct than were attempted.
    pub fn from_persisted(draft: SessionDraft) -> Result<Self, SessionModelError> {
        if draft.correct_count > draft.total_attempted {
            return Err(SessionModelError::CountMismatch {
                correct: draft.correct_count,
                total: draft.total_attempted,
            });
        }

        Ok(Self {
            id: draft.id,
            mode: draft.mode,
            started_at: draft.started_at,
            duration_seconds: draft.duration_seconds,
            elapsed_seconds: draft.elapsed_seconds,
            correct_count: draft.correct_count,
            total_attempted: draft.total_attempted,
            accuracy_percent: draft.accuracy_percent,
            records: draft.records,
            difficulty: draft.difficulty,
            smart: draft.smart,
            reconstructed: draft.reconstructed,
        })
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn mode(&self) -> &str {
        &self.mode
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_attempted(&self) -> u32 {
        self.total_attempted
    }

    /// Attempts that were not correct.
    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.total_attempted.saturating_sub(self.correct_count)
    }

    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        self.accuracy_percent
    }

    #[must_use]
    pub fn records(&self) -> &[ProblemRecord] {
        &self.records
    }

    #[must_use]
    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    /// True for legacy sessions whose records were rebuilt from a mistakes list.
    ///
    /// Such records carry no timing and omit correct answers, so they are
    /// shown in history but never ranked or replayed.
    #[must_use]
    pub fn is_reconstructed(&self) -> bool {
        self.reconstructed
    }

    /// Has a full per-problem log, as leaderboards and history pools require.
    #[must_use]
    pub fn has_problem_log(&self) -> bool {
        self.has_records() && !self.reconstructed
    }

    /// Records that were answered incorrectly, in answer order.
    pub fn mistakes(&self) -> impl Iterator<Item = &ProblemRecord> {
        self.records.iter().filter(|r| !r.is_correct)
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    #[must_use]
    pub fn smart(&self) -> Option<&SmartSnapshot> {
        self.smart.as_ref()
    }
}
