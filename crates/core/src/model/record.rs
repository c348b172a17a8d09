use crate::model::problem::{Problem, ProblemOrigin};

/// Outcome of one answered problem within a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemRecord {
    pub problem_text: String,
    pub correct_answer: String,
    pub user_answer: String,
    /// Response time; `None` only for legacy records that never stored it.
    pub time_taken_ms: Option<u64>,
    pub is_correct: bool,
    pub source: ProblemOrigin,
}

impl ProblemRecord {
    /// Record an answer given to `problem`.
    #[must_use]
    pub fn answered(
        problem: &Problem,
        user_answer: impl Into<String>,
        time_taken_ms: u64,
        is_correct: bool,
    ) -> Self {
        Self {
            problem_text: problem.question().to_owned(),
            correct_answer: problem.answer().to_owned(),
            user_answer: user_answer.into(),
            time_taken_ms: Some(time_taken_ms),
            is_correct,
            source: problem.origin(),
        }
    }

    /// Rebuild a legacy mistake entry that only kept the texts.
    ///
    /// Such entries are treated as incorrect with an unknown time.
    #[must_use]
    pub fn legacy_mistake(
        problem_text: impl Into<String>,
        correct_answer: impl Into<String>,
        user_answer: impl Into<String>,
    ) -> Self {
        Self {
            problem_text: problem_text.into(),
            correct_answer: correct_answer.into(),
            user_answer: user_answer.into(),
            time_taken_ms: None,
            is_correct: false,
            source: ProblemOrigin::Random,
        }
    }

    /// Time used for ordering; unknown times sort as zero.
    #[must_use]
    pub fn time_or_zero(&self) -> u64 {
        self.time_taken_ms.unwrap_or(0)
    }

    /// An entry counts as answered when the user supplied non-empty input.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        !self.user_answer.trim().is_empty()
    }
}

/// Returns up to `n` records with the largest response times.
///
/// Ties keep their original relative order.
#[must_use]
pub fn slowest(records: &[ProblemRecord], n: usize) -> Vec<ProblemRecord> {
    let mut sorted: Vec<&ProblemRecord> = records.iter().collect();
    // `sort_by` is stable, so equal times keep insertion order.
    sorted.sort_by(|a, b| b.time_or_zero().cmp(&a.time_or_zero()));
    sorted.into_iter().take(n).cloned().collect()
}
