use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ID_PREFIX: &str = "score-";
const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Unique identifier for a persisted practice session.
///
/// Identifiers are time-derived (`score-<rfc3339>-<suffix>`), which keeps them
/// readable in exports and compatible with records written by older clients.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier from a timestamp plus a random base-36 suffix.
    #[must_use]
    pub fn generate<R: Rng + ?Sized>(at: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| {
                let idx = rng.random_range(0..SUFFIX_ALPHABET.len());
                char::from(SUFFIX_ALPHABET[idx])
            })
            .collect();
        Self(format!(
            "{ID_PREFIX}{}-{suffix}",
            at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ))
    }

    /// Identifier assigned to a legacy record that was stored without one.
    ///
    /// `date` is the record's raw timestamp text and `index` its position in the
    /// legacy list, so the same legacy list always back-fills the same ids.
    #[must_use]
    pub fn backfill(date: &str, index: usize) -> Self {
        Self(format!("{ID_PREFIX}{date}-{index}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error type for parsing a `SessionId` from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    raw: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse SessionId from {:?}", self.raw)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for SessionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError { raw: s.to_string() });
        }
        Ok(Self(trimmed.to_string()))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
