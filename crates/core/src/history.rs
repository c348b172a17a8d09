use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::model::{ProblemRecord, Session, SmartGeneratorConfig, slowest};

/// Share of each session's records that enter the slow pool.
const SLOW_FRACTION: f64 = 0.1;

/// Which sessions and records feed the pools.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub mode: String,
    pub lookback_days: u32,
    /// Records answered faster than this are ignored; 0 disables the filter.
    pub min_time_ms: u64,
    pub now: DateTime<Utc>,
}

impl HistoryQuery {
    #[must_use]
    pub fn for_config(mode: impl Into<String>, config: &SmartGeneratorConfig, now: DateTime<Utc>) -> Self {
        Self {
            mode: mode.into(),
            lookback_days: config.lookback_days(),
            min_time_ms: config.min_time_ms(),
            now,
        }
    }

    fn window_start(&self) -> DateTime<Utc> {
        self.now - Duration::days(i64::from(self.lookback_days))
    }

    fn includes(&self, session: &Session) -> bool {
        let started = session.started_at();
        session.mode() == self.mode
            && started >= self.window_start()
            && started <= self.now
            && session.has_problem_log()
    }

    fn keeps(&self, record: &ProblemRecord) -> bool {
        self.min_time_ms == 0 || record.time_taken_ms.is_some_and(|t| t >= self.min_time_ms)
    }
}

/// Slow and mistake pools built from a mode's recent sessions.
///
/// Pools accumulate across sessions without deduplication, so a problem that
/// was slow in several rounds is proportionally more likely to come back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryIndex {
    slow: Vec<ProblemRecord>,
    mistakes: Vec<ProblemRecord>,
    sessions_used: usize,
}

impl HistoryIndex {
    #[must_use]
    pub fn build<'a>(sessions: impl IntoIterator<Item = &'a Session>, query: &HistoryQuery) -> Self {
        let mut index = Self::default();

        for session in sessions.into_iter().filter(|s| query.includes(s)) {
            index.sessions_used += 1;

            let eligible: Vec<ProblemRecord> = session
                .records()
                .iter()
                .filter(|r| query.keeps(r))
                .cloned()
                .collect();
            if eligible.is_empty() {
                continue;
            }

            index.slow.extend(slowest(&eligible, slow_count(eligible.len())));
            index
                .mistakes
                .extend(eligible.into_iter().filter(|r| !r.is_correct));
        }

        index
    }

    #[must_use]
    pub fn slow(&self) -> &[ProblemRecord] {
        &self.slow
    }

    #[must_use]
    pub fn mistakes(&self) -> &[ProblemRecord] {
        &self.mistakes
    }

    /// Sessions that matched mode and window, including ones with no eligible records.
    #[must_use]
    pub fn sessions_used(&self) -> usize {
        self.sessions_used
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slow.is_empty() && self.mistakes.is_empty()
    }

    /// Advisory to show when a non-zero probability has nothing to draw from.
    #[must_use]
    pub fn advisory(&self, prob_slowest: f64, prob_mistakes: f64) -> Option<PoolAdvisory> {
        let slow_starved = prob_slowest > 0.0 && self.slow.is_empty();
        let mistakes_starved = prob_mistakes > 0.0 && self.mistakes.is_empty();

        if slow_starved && mistakes_starved {
            Some(PoolAdvisory::Both)
        } else if slow_starved && prob_mistakes == 0.0 {
            Some(PoolAdvisory::Slow)
        } else if mistakes_starved && prob_slowest == 0.0 {
            Some(PoolAdvisory::Mistakes)
        } else {
            None
        }
    }
}

/// `max(1, ceil(10% of n))`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn slow_count(n: usize) -> usize {
    ((n as f64 * SLOW_FRACTION).ceil() as usize).max(1)
}

/// Notice that smart selection will fall back to random problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolAdvisory {
    Both,
    Slow,
    Mistakes,
}

impl PoolAdvisory {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            PoolAdvisory::Both => {
                "No mistakes or slow problems found in your history. Random problems will be used instead."
            }
            PoolAdvisory::Slow => {
                "No slow problems found in your history. Random problems will be used instead."
            }
            PoolAdvisory::Mistakes => {
                "No mistakes found in your history. Random problems will be used instead."
            }
        }
    }
}

impl fmt::Display for PoolAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProblemOrigin, SessionId};
    use crate::time::fixed_now;

    fn rec(text: &str, ms: Option<u64>, correct: bool) -> ProblemRecord {
        ProblemRecord {
            problem_text: text.into(),
            correct_answer: "1".into(),
            user_answer: "1".into(),
            time_taken_ms: ms,
            is_correct: correct,
            source: ProblemOrigin::Random,
        }
    }

    fn session(mode: &str, days_ago: i64, records: Vec<ProblemRecord>) -> Session {
        Session::from_records(
            SessionId::new(format!("{mode}-{days_ago}")),
            mode,
            fixed_now() - Duration::days(days_ago),
            60,
            60,
            records,
            None,
            None,
        )
        .unwrap()
    }

    fn query(lookback_days: u32, min_time_ms: u64) -> HistoryQuery {
        HistoryQuery {
            mode: "Addition".into(),
            lookback_days,
            min_time_ms,
            now: fixed_now(),
        }
    }

    #[test]
    fn slow_count_is_ceiling_of_tenth_with_floor_one() {
        assert_eq!(slow_count(1), 1);
        assert_eq!(slow_count(10), 1);
        assert_eq!(slow_count(11), 2);
        assert_eq!(slow_count(25), 3);
    }

    #[test]
    fn pools_take_slowest_and_mistakes_per_session() {
        let records: Vec<_> = (1..=12)
            .map(|i| rec(&format!("p{i}"), Some(i * 100), i % 5 != 0))
            .collect();
        let sessions = vec![session("Addition", 0, records)];

        let index = HistoryIndex::build(&sessions, &query(1, 0));
        let slow: Vec<_> = index.slow().iter().map(|r| r.problem_text.as_str()).collect();
        assert_eq!(slow, vec!["p12", "p11"]);
        let mistakes: Vec<_> = index.mistakes().iter().map(|r| r.problem_text.as_str()).collect();
        assert_eq!(mistakes, vec!["p5", "p10"]);
    }

    #[test]
    fn session_outside_lookback_is_excluded() {
        let sessions = vec![
            session("Addition", 2, vec![rec("old", Some(9000), false)]),
            session("Addition", 0, vec![rec("new", Some(100), true)]),
        ];
        let index = HistoryIndex::build(&sessions, &query(1, 0));
        assert_eq!(index.sessions_used(), 1);
        assert!(index.slow().iter().all(|r| r.problem_text != "old"));
        assert!(index.mistakes().is_empty());
    }

    #[test]
    fn other_modes_and_future_sessions_are_ignored() {
        let sessions = vec![
            session("Calendar", 0, vec![rec("cal", Some(5000), false)]),
            session("Addition", -1, vec![rec("future", Some(5000), false)]),
        ];
        assert!(HistoryIndex::build(&sessions, &query(3, 0)).is_empty());
    }

    #[test]
    fn time_filter_drops_fast_and_unknown_records() {
        let sessions = vec![session(
            "Addition",
            0,
            vec![
                rec("fast", Some(500), false),
                rec("unknown", None, false),
                rec("slow", Some(2500), false),
            ],
        )];
        let index = HistoryIndex::build(&sessions, &query(1, 2000));
        let mistakes: Vec<_> = index.mistakes().iter().map(|r| r.problem_text.as_str()).collect();
        assert_eq!(mistakes, vec!["slow"]);
        assert_eq!(index.slow().len(), 1);
    }

    #[test]
    fn rebuilt_legacy_sessions_are_not_replayed() {
        let legacy = Session::from_persisted(crate::model::SessionDraft {
            id: SessionId::new("legacy"),
            mode: "Addition".into(),
            started_at: fixed_now(),
            duration_seconds: 60,
            elapsed_seconds: 60,
            correct_count: 4,
            total_attempted: 5,
            accuracy_percent: 80,
            records: vec![ProblemRecord::legacy_mistake("7 + 8", "15", "14")],
            difficulty: None,
            smart: None,
            reconstructed: true,
        })
        .unwrap();
        let sessions = vec![legacy, session("Addition", 0, vec![rec("kept", Some(900), false)])];

        let index = HistoryIndex::build(&sessions, &query(1, 0));
        assert_eq!(index.sessions_used(), 1);
        let mistakes: Vec<_> = index.mistakes().iter().map(|r| r.problem_text.as_str()).collect();
        assert_eq!(mistakes, vec!["kept"]);
    }

    #[test]
    fn pools_accumulate_without_dedup() {
        let sessions = vec![
            session("Addition", 0, vec![rec("same", Some(3000), false)]),
            session("Addition", 0, vec![rec("same", Some(3000), false)]),
        ];
        let index = HistoryIndex::build(&sessions, &query(1, 0));
        assert_eq!(index.slow().len(), 2);
        assert_eq!(index.mistakes().len(), 2);
    }

    #[test]
    fn advisories_follow_starved_pools() {
        let empty = HistoryIndex::default();
        assert_eq!(empty.advisory(0.25, 0.25), Some(PoolAdvisory::Both));
        assert_eq!(empty.advisory(0.25, 0.0), Some(PoolAdvisory::Slow));
        assert_eq!(empty.advisory(0.0, 0.25), Some(PoolAdvisory::Mistakes));
        assert_eq!(empty.advisory(0.0, 0.0), None);

        let sessions = vec![session("Addition", 0, vec![rec("ok", Some(100), true)])];
        let slow_only = HistoryIndex::build(&sessions, &query(1, 0));
        assert_eq!(slow_only.advisory(0.25, 0.25), None);
        assert_eq!(slow_only.advisory(0.0, 0.25), Some(PoolAdvisory::Mistakes));
    }
}
