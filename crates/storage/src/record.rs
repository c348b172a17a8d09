//! Persisted JSON shape of a session.
//!
//! Field names follow the records written by earlier browser releases so a
//! legacy fallback dump can be read without conversion. Both backends store
//! this shape: the ephemeral store as one JSON array, `SQLite` as one payload
//! column per row.

use chrono::{DateTime, SecondsFormat, Utc};
use drill_core::model::{
    ProblemOrigin, ProblemRecord, Session, SessionDraft, SessionId, SmartSnapshot,
    accuracy_percent,
};
use drill_core::modes::integer_answer_matches;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::repository::StorageError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub mode: String,
    pub date: String,
    /// Elapsed seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u32>,
    /// Correct answers.
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub total_problems: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<u32>,
    /// Configured round length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default)]
    pub problems: Vec<ProblemEntry>,
    #[serde(default)]
    pub mistakes: Vec<MistakeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_stats: Option<SmartStatsEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemEntry {
    pub problem: String,
    pub answer: String,
    #[serde(default)]
    pub user_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub source: ProblemOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeEntry {
    pub problem: String,
    /// Later releases stored the whole problem record here, keyed `answer`.
    #[serde(alias = "answer")]
    pub correct_answer: String,
    #[serde(default)]
    pub user_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartStatsEntry {
    pub lookback_days: u32,
    pub slowest_problems: usize,
    pub mistake_problems: usize,
    pub prob_slowest: f64,
    pub prob_mistakes: f64,
    pub use_time_filter: bool,
    pub time_threshold: u32,
}

impl From<&SmartSnapshot> for SmartStatsEntry {
    fn from(s: &SmartSnapshot) -> Self {
        Self {
            lookback_days: s.lookback_days,
            slowest_problems: s.slowest_pool,
            mistake_problems: s.mistake_pool,
            prob_slowest: s.prob_slowest,
            prob_mistakes: s.prob_mistakes,
            use_time_filter: s.use_time_filter,
            time_threshold: s.time_threshold_seconds,
        }
    }
}

impl From<SmartStatsEntry> for SmartSnapshot {
    fn from(s: SmartStatsEntry) -> Self {
        Self {
            lookback_days: s.lookback_days,
            slowest_pool: s.slowest_problems,
            mistake_pool: s.mistake_problems,
            prob_slowest: s.prob_slowest,
            prob_mistakes: s.prob_mistakes,
            use_time_filter: s.use_time_filter,
            time_threshold_seconds: s.time_threshold,
        }
    }
}

impl ProblemEntry {
    fn from_record(r: &ProblemRecord) -> Self {
        Self {
            problem: r.problem_text.clone(),
            answer: r.correct_answer.clone(),
            user_answer: r.user_answer.clone(),
            time_taken: r.time_taken_ms,
            is_correct: Some(r.is_correct),
            source: r.source,
        }
    }

    fn into_record(self) -> ProblemRecord {
        // Entries written before the flag existed are re-checked against the answer.
        let is_correct = self
            .is_correct
            .unwrap_or_else(|| integer_answer_matches(&self.user_answer, &self.answer));
        ProblemRecord {
            problem_text: self.problem,
            correct_answer: self.answer,
            user_answer: self.user_answer,
            time_taken_ms: self.time_taken,
            is_correct,
            source: self.source,
        }
    }
}

/// Timestamp text used in the `date` field.
#[must_use]
pub fn format_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl SessionRecord {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: Some(session.id().as_str().to_string()),
            mode: session.mode().to_string(),
            date: format_date(session.started_at()),
            time: Some(session.elapsed_seconds()),
            score: session.correct_count(),
            total_problems: session.total_attempted(),
            accuracy: Some(session.accuracy_percent()),
            duration: Some(session.duration_seconds()),
            // Rebuilt records go back out as the mistakes list they came from.
            problems: if session.is_reconstructed() {
                Vec::new()
            } else {
                session.records().iter().map(ProblemEntry::from_record).collect()
            },
            mistakes: session
                .mistakes()
                .map(|r| MistakeEntry {
                    problem: r.problem_text.clone(),
                    correct_answer: r.correct_answer.clone(),
                    user_answer: r.user_answer.clone(),
                })
                .collect(),
            difficulty: session.difficulty().map(str::to_string),
            smart_stats: session.smart().map(SmartStatsEntry::from),
        }
    }

    /// Identifier of the record, back-filled from its date and list position when absent.
    #[must_use]
    pub fn resolved_id(&self, index: usize) -> SessionId {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => SessionId::new(id),
            _ => SessionId::backfill(&self.date, index),
        }
    }

    /// Rehydrate the domain session.
    ///
    /// `index` is the record's position in its list and only matters for
    /// records stored without an id. Records that carry only a `mistakes`
    /// list are rebuilt as incorrect answers with unknown time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for an unparseable date or
    /// inconsistent counts.
    pub fn into_session(self, index: usize) -> Result<Session, StorageError> {
        let id = self.resolved_id(index);
        let started_at = DateTime::parse_from_rfc3339(&self.date)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| StorageError::Serialization(format!("invalid date {:?}: {e}", self.date)))?;

        let reconstructed = self.problems.is_empty() && !self.mistakes.is_empty();
        let records: Vec<ProblemRecord> = if reconstructed {
            self.mistakes
                .into_iter()
                .map(|m| ProblemRecord::legacy_mistake(m.problem, m.correct_answer, m.user_answer))
                .collect()
        } else {
            self.problems.into_iter().map(ProblemEntry::into_record).collect()
        };

        let elapsed = self.time.or(self.duration).unwrap_or_default();
        let duration = self.duration.unwrap_or(elapsed);

        Session::from_persisted(SessionDraft {
            id,
            mode: self.mode,
            started_at,
            duration_seconds: duration,
            elapsed_seconds: elapsed,
            correct_count: self.score,
            total_attempted: self.total_problems,
            accuracy_percent: self
                .accuracy
                .unwrap_or_else(|| accuracy_percent(self.score, self.total_problems)),
            records,
            difficulty: self.difficulty,
            smart: self.smart_stats.map(SmartSnapshot::from),
            reconstructed,
        })
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// Rehydrate a list of records, skipping (and logging) ones that cannot be decoded.
#[must_use]
pub fn decode_sessions(records: Vec<SessionRecord>) -> Vec<Session> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match record.into_session(index) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(index, error = %err, "skipping unreadable session record");
                None
            }
        })
        .collect()
}
