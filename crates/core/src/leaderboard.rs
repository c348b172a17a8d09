//! Ranked views over completed sessions.
//!
//! Each metric is a pure function from sessions to at most
//! [`LEADERBOARD_SIZE`] entries.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Session, SessionId};

pub const LEADERBOARD_SIZE: usize = 10;

/// Seconds-per-problem assigned when a session has no positive net score.
pub const SPEED_SENTINEL: f64 = 999.99;

/// Rank given to sessions missing from the percentile top list.
const UNRANKED_PERCENTILE: usize = LEADERBOARD_SIZE + 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LeaderboardError {
    #[error("unknown leaderboard metric: {0}")]
    UnknownMetric(String),

    #[error("invalid duration filter: {0}")]
    InvalidFilter(String),
}

//
// ─── QUERY ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LeaderboardMetric {
    /// Seconds per net-correct problem; lower is better.
    #[default]
    Speed,
    /// 90th-percentile response time; lower is better.
    Percentile,
    /// Speed weighted by percentile rank; higher is better.
    Combined,
}

impl LeaderboardMetric {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LeaderboardMetric::Speed => "speed",
            LeaderboardMetric::Percentile => "percentile",
            LeaderboardMetric::Combined => "combined",
        }
    }
}

impl fmt::Display for LeaderboardMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaderboardMetric {
    type Err = LeaderboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "speed" => Ok(Self::Speed),
            "percentile" => Ok(Self::Percentile),
            "combined" => Ok(Self::Combined),
            other => Err(LeaderboardError::UnknownMetric(other.to_string())),
        }
    }
}

/// Exact-duration filter; `All` keeps every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DurationFilter {
    #[default]
    All,
    Seconds(u32),
}

impl DurationFilter {
    #[must_use]
    pub fn matches(self, duration_seconds: u32) -> bool {
        match self {
            DurationFilter::All => true,
            DurationFilter::Seconds(s) => s == duration_seconds,
        }
    }
}

impl fmt::Display for DurationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationFilter::All => f.write_str("all"),
            DurationFilter::Seconds(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for DurationFilter {
    type Err = LeaderboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse()
            .map(Self::Seconds)
            .map_err(|_| LeaderboardError::InvalidFilter(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardQuery {
    pub mode: String,
    pub duration: DurationFilter,
    pub metric: LeaderboardMetric,
}

//
// ─── ENTRIES ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub session_id: SessionId,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub difficulty: Option<String>,
    pub metric: LeaderboardMetric,
    /// Value the entry is ranked by, rounded to two decimals where the metric is fractional.
    pub score: f64,
    pub seconds_per_problem: Option<f64>,
    pub percentile_ms: Option<u64>,
    pub percentile_rank: Option<usize>,
}

impl LeaderboardEntry {
    /// Human-readable score: `"10s/prob"`, `"1m 5s"` or `"9.5 pts"`.
    #[must_use]
    pub fn display_score(&self) -> String {
        match self.metric {
            LeaderboardMetric::Speed => format!("{}s/prob", self.score),
            LeaderboardMetric::Percentile => {
                format_duration_ms(self.percentile_ms.unwrap_or_default())
            }
            LeaderboardMetric::Combined => format!("{} pts", self.score),
        }
    }
}

/// `"42s"` below a minute, `"1m 5s"` above.
#[must_use]
pub fn format_duration_ms(ms: u64) -> String {
    let seconds = ms / 1000;
    if seconds < 60 {
        format!("{seconds}s")
    } else {
        format!("{}m {}s", seconds / 60, seconds % 60)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//
// ─── METRICS ───────────────────────────────────────────────────────────────────
//

/// `duration / (correct − incorrect)`, or [`SPEED_SENTINEL`] when the net
/// score is not positive.
///
/// `duration` is the configured round length. Browser releases divided the
/// elapsed time instead, which differs only for rounds cut short.
#[must_use]
pub fn seconds_per_problem(session: &Session) -> f64 {
    let net = i64::from(session.correct_count()) - i64::from(session.incorrect_count());
    if net > 0 {
        #[allow(clippy::cast_precision_loss)]
        let net = net as f64;
        f64::from(session.duration_seconds()) / net
    } else {
        SPEED_SENTINEL
    }
}

/// 90th-percentile response time over records with a known time.
#[must_use]
pub fn percentile_time_ms(session: &Session) -> Option<u64> {
    let mut times: Vec<u64> = session
        .records()
        .iter()
        .filter_map(|r| r.time_taken_ms)
        .collect();
    if times.is_empty() {
        return None;
    }
    times.sort_unstable();
    let idx = (times.len() * 9 / 10).min(times.len() - 1);
    Some(times[idx])
}

fn eligible<'a>(
    sessions: &'a [Session],
    mode: &'a str,
    duration: DurationFilter,
) -> impl Iterator<Item = &'a Session> + 'a {
    sessions
        .iter()
        .filter(move |s| s.mode() == mode && duration.matches(s.duration_seconds()))
        .filter(|s| s.has_problem_log())
}

fn entry(session: &Session, metric: LeaderboardMetric, score: f64) -> LeaderboardEntry {
    LeaderboardEntry {
        session_id: session.id().clone(),
        mode: session.mode().to_string(),
        started_at: session.started_at(),
        duration_seconds: session.duration_seconds(),
        difficulty: session.difficulty().map(str::to_string),
        metric,
        score,
        seconds_per_problem: None,
        percentile_ms: None,
        percentile_rank: None,
    }
}

fn ascending(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    a.score.total_cmp(&b.score)
}

fn speed_entries(sessions: &[Session], mode: &str, duration: DurationFilter) -> Vec<LeaderboardEntry> {
    eligible(sessions, mode, duration)
        .map(|s| {
            let spp = seconds_per_problem(s);
            LeaderboardEntry {
                seconds_per_problem: Some(spp),
                ..entry(s, LeaderboardMetric::Speed, round2(spp))
            }
        })
        .collect()
}

#[must_use]
pub fn rank_speed(sessions: &[Session], mode: &str, duration: DurationFilter) -> Vec<LeaderboardEntry> {
    let mut entries = speed_entries(sessions, mode, duration);
    entries.sort_by(ascending);
    entries.truncate(LEADERBOARD_SIZE);
    entries
}

#[must_use]
pub fn rank_percentile(
    sessions: &[Session],
    mode: &str,
    duration: DurationFilter,
) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = eligible(sessions, mode, duration)
        .filter_map(|s| {
            let p = percentile_time_ms(s)?;
            #[allow(clippy::cast_precision_loss)]
            let score = p as f64;
            Some(LeaderboardEntry {
                percentile_ms: Some(p),
                ..entry(s, LeaderboardMetric::Percentile, score)
            })
        })
        .collect();
    entries.sort_by(ascending);
    entries.truncate(LEADERBOARD_SIZE);
    entries
}

/// `(11 − (rank + 1) / 2) / secondsPerProblem`, ranked descending.
///
/// Only sessions on the speed top list are scored. `rank` is the 1-based
/// position in the percentile top list, or 11 when the session is not on it.
/// A zero seconds-per-problem is treated as 1.
#[must_use]
pub fn rank_combined(
    sessions: &[Session],
    mode: &str,
    duration: DurationFilter,
) -> Vec<LeaderboardEntry> {
    let percentile = rank_percentile(sessions, mode, duration);
    let rank_of = |id: &SessionId| {
        percentile
            .iter()
            .position(|e| &e.session_id == id)
            .map_or(UNRANKED_PERCENTILE, |i| i + 1)
    };

    let mut entries: Vec<LeaderboardEntry> = rank_speed(sessions, mode, duration)
        .into_iter()
        .map(|e| {
            let rank = rank_of(&e.session_id);
            let spp = e.seconds_per_problem.unwrap_or(SPEED_SENTINEL);
            let divisor = if spp == 0.0 { 1.0 } else { spp };
            #[allow(clippy::cast_precision_loss)]
            let weight = UNRANKED_PERCENTILE as f64 - (rank as f64 + 1.0) / 2.0;
            LeaderboardEntry {
                metric: LeaderboardMetric::Combined,
                score: round2(weight / divisor),
                percentile_rank: Some(rank),
                ..e
            }
        })
        .collect();

    entries.sort_by(|a, b| ascending(b, a));
    entries.truncate(LEADERBOARD_SIZE);
    entries
}

/// Dispatch on the query's metric.
#[must_use]
pub fn rank(sessions: &[Session], query: &LeaderboardQuery) -> Vec<LeaderboardEntry> {
    match query.metric {
        LeaderboardMetric::Speed => rank_speed(sessions, &query.mode, query.duration),
        LeaderboardMetric::Percentile => rank_percentile(sessions, &query.mode, query.duration),
        LeaderboardMetric::Combined => rank_combined(sessions, &query.mode, query.duration),
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
