//! Practice modes: one [`ProblemSource`] per [`PracticeMode`].

mod arithmetic;
mod calendar;
mod cross_sum;
mod square_root;

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use thiserror::Error;

use crate::model::{Problem, ProblemRecord};

pub use arithmetic::{Addition, Multiplication, MultiplicationLevel};
pub use calendar::{Calendar, CalendarDay};
pub use cross_sum::{CrossSum4, CrossSum8};
pub use square_root::{SquareRoot, SquareRootRange, SquareRootRemainder};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModeError {
    #[error("unknown practice mode: {0}")]
    UnknownMode(String),

    #[error("unknown multiplication level: {0}")]
    UnknownLevel(String),

    #[error("range minimum {min} exceeds maximum {max}")]
    InvalidRange { min: u32, max: u32 },
}

//
// ─── PROBLEM SOURCE ────────────────────────────────────────────────────────────
//

/// Generator and validator for a single practice mode.
///
/// Sources hold configuration only (difficulty, range); every draw takes the
/// caller's RNG so rounds can be replayed from a seed.
pub trait ProblemSource: Send {
    fn mode(&self) -> PracticeMode;

    /// Draw a fresh problem.
    fn generate_problem(&mut self, rng: &mut dyn RngCore) -> Problem;

    /// Compare user input against the stored answer.
    ///
    /// The default accepts input whose leading integer, printed canonically,
    /// equals `correct`.
    fn validate_answer(&self, user: &str, correct: &str) -> bool {
        integer_answer_matches(user, correct)
    }

    /// Draw a problem with operands close to `prior`.
    ///
    /// Returns `None` for modes that have no notion of similarity.
    fn generate_similar_problem(
        &mut self,
        _prior: &ProblemRecord,
        _rng: &mut dyn RngCore,
    ) -> Option<Problem> {
        None
    }

    /// Rebuild a historical problem verbatim for replay.
    fn replay_problem(&self, record: &ProblemRecord) -> Problem {
        Problem::new(record.problem_text.as_str(), record.correct_answer.as_str())
            .with_display(format!("{} = ", record.problem_text))
    }

    /// Difficulty label stored with finished sessions, if the mode has one.
    fn difficulty(&self) -> Option<String> {
        None
    }
}

/// Parse the leading integer of `input` the lenient way: leading whitespace,
/// optional sign, then digits up to the first non-digit.
#[must_use]
pub fn parse_leading_integer(input: &str) -> Option<i64> {
    let s = input.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }

    let value: i64 = digits[..len].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// True when the leading integer of `user` prints as exactly `correct`.
#[must_use]
pub fn integer_answer_matches(user: &str, correct: &str) -> bool {
    parse_leading_integer(user).is_some_and(|n| n.to_string() == correct)
}

/// Stacked two-operand layout shared by the long-number modes.
pub(crate) fn stacked(top: impl fmt::Display, bottom: impl fmt::Display) -> String {
    format!("{top}\n{bottom}\n———")
}

//
// ─── PRACTICE MODE ─────────────────────────────────────────────────────────────
//

/// Closed set of practice modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PracticeMode {
    Calendar,
    CalendarDay,
    Multiplication,
    CrossSum4,
    CrossSum8,
    Addition,
    SquareRoot,
    SquareRootRange,
    SquareRootRemainder,
}

impl PracticeMode {
    pub const ALL: [PracticeMode; 9] = [
        PracticeMode::Calendar,
        PracticeMode::CalendarDay,
        PracticeMode::Multiplication,
        PracticeMode::CrossSum4,
        PracticeMode::CrossSum8,
        PracticeMode::Addition,
        PracticeMode::SquareRoot,
        PracticeMode::SquareRootRange,
        PracticeMode::SquareRootRemainder,
    ];

    /// Display name; this is also the `mode` stored on sessions.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PracticeMode::Calendar => "Calendar",
            PracticeMode::CalendarDay => "Calendar Day",
            PracticeMode::Multiplication => "Multiplication",
            PracticeMode::CrossSum4 => "4×4 Cross Sum",
            PracticeMode::CrossSum8 => "8×8 Cross Sum",
            PracticeMode::Addition => "Addition",
            PracticeMode::SquareRoot => "Square Root",
            PracticeMode::SquareRootRange => "Square Root Range",
            PracticeMode::SquareRootRemainder => "Square Root Remainder",
        }
    }

    /// Short identifier used on the command line.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            PracticeMode::Calendar => "calendar",
            PracticeMode::CalendarDay => "calendar-day",
            PracticeMode::Multiplication => "multiplication",
            PracticeMode::CrossSum4 => "multiplication-cross-sum",
            PracticeMode::CrossSum8 => "multiplication-cross-product",
            PracticeMode::Addition => "addition",
            PracticeMode::SquareRoot => "square-root",
            PracticeMode::SquareRootRange => "square-root-range",
            PracticeMode::SquareRootRemainder => "square-root-remainder",
        }
    }

    /// A source for this mode with default configuration.
    #[must_use]
    pub fn source(self) -> Box<dyn ProblemSource> {
        match self {
            PracticeMode::Calendar => Box::new(Calendar),
            PracticeMode::CalendarDay => Box::new(CalendarDay),
            PracticeMode::Multiplication => Box::new(Multiplication::default()),
            PracticeMode::CrossSum4 => Box::new(CrossSum4),
            PracticeMode::CrossSum8 => Box::new(CrossSum8),
            PracticeMode::Addition => Box::new(Addition),
            PracticeMode::SquareRoot => Box::new(SquareRoot),
            PracticeMode::SquareRootRange => Box::new(SquareRootRange::default()),
            PracticeMode::SquareRootRemainder => Box::new(SquareRootRemainder),
        }
    }
}

impl fmt::Display for PracticeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PracticeMode {
    type Err = ModeError;

    /// Accepts either the display name or the slug.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        PracticeMode::ALL
            .into_iter()
            .find(|m| m.name() == s || m.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModeError::UnknownMode(s.to_string()))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProblemOrigin;

    #[test]
    fn leading_integer_is_parsed_leniently() {
        assert_eq!(parse_leading_integer("42"), Some(42));
        assert_eq!(parse_leading_integer("  42abc"), Some(42));
        assert_eq!(parse_leading_integer("-7"), Some(-7));
        assert_eq!(parse_leading_integer("007"), Some(7));
        assert_eq!(parse_leading_integer("abc"), None);
        assert_eq!(parse_leading_integer("-"), None);
        assert_eq!(parse_leading_integer(""), None);
    }

    #[test]
    fn answers_compare_canonical_text() {
        assert!(integer_answer_matches("042", "42"));
        assert!(integer_answer_matches("42.9", "42"));
        assert!(integer_answer_matches("-0", "0"));
        assert!(!integer_answer_matches("41", "42"));
        assert!(!integer_answer_matches("x", "42"));
    }

    #[test]
    fn modes_parse_from_name_or_slug() {
        for mode in PracticeMode::ALL {
            assert_eq!(mode.name().parse::<PracticeMode>().unwrap(), mode);
            assert_eq!(mode.slug().parse::<PracticeMode>().unwrap(), mode);
            assert_eq!(mode.source().mode(), mode);
        }
        assert!(matches!(
            "chess".parse::<PracticeMode>(),
            Err(ModeError::UnknownMode(_))
        ));
    }

    #[test]
    fn default_replay_keeps_text_verbatim() {
        let record = ProblemRecord::legacy_mistake("1234 + 5678", "6912", "6900");
        let problem = PracticeMode::Addition.source().replay_problem(&record);
        assert_eq!(problem.question(), "1234 + 5678");
        assert_eq!(problem.answer(), "6912");
        assert_eq!(problem.display(), "1234 + 5678 = ");
        assert_eq!(problem.origin(), ProblemOrigin::Random);
        assert!(!problem.is_large_numbers());
    }
}
