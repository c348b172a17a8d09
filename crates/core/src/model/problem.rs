use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a presented problem came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemOrigin {
    /// Freshly generated by the mode's problem source.
    #[default]
    Random,
    /// Replayed from the slowest-decile pool.
    Slow,
    /// Replayed from the incorrect-answer pool.
    Mistake,
}

impl ProblemOrigin {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemOrigin::Random => "random",
            ProblemOrigin::Slow => "slow",
            ProblemOrigin::Mistake => "mistake",
        }
    }

    #[must_use]
    pub fn is_replay(self) -> bool {
        !matches!(self, ProblemOrigin::Random)
    }
}

impl fmt::Display for ProblemOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "slow" => Ok(Self::Slow),
            "mistake" => Ok(Self::Mistake),
            other => Err(format!("unknown problem origin: {other}")),
        }
    }
}

/// A single question shown to the user.
///
/// Problems are immutable once built; the selector re-tags origin by building
/// a new value via [`Problem::with_origin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    question: String,
    answer: String,
    display: String,
    vertical_display: Option<String>,
    is_large_numbers: bool,
    origin: ProblemOrigin,
}

impl Problem {
    /// Build a problem whose display text equals the question.
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            display: question.clone(),
            question,
            answer: answer.into(),
            vertical_display: None,
            is_large_numbers: false,
            origin: ProblemOrigin::Random,
        }
    }

    #[must_use]
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = display.into();
        self
    }

    /// Attach a stacked (multi-line) layout for large operands.
    #[must_use]
    pub fn with_vertical_layout(mut self, vertical: impl Into<String>) -> Self {
        self.vertical_display = Some(vertical.into());
        self.is_large_numbers = true;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: ProblemOrigin) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    #[must_use]
    pub fn display(&self) -> &str {
        &self.display
    }

    #[must_use]
    pub fn vertical_display(&self) -> Option<&str> {
        self.vertical_display.as_deref()
    }

    #[must_use]
    pub fn is_large_numbers(&self) -> bool {
        self.is_large_numbers
    }

    /// Text a front end should render: the stacked layout when present.
    #[must_use]
    pub fn preferred_display(&self) -> &str {
        self.vertical_display.as_deref().unwrap_or(&self.display)
    }

    #[must_use]
    pub fn origin(&self) -> ProblemOrigin {
        self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_round_trips_through_text() {
        for origin in [ProblemOrigin::Random, ProblemOrigin::Slow, ProblemOrigin::Mistake] {
            assert_eq!(origin.as_str().parse::<ProblemOrigin>().unwrap(), origin);
        }
        assert!("fast".parse::<ProblemOrigin>().is_err());
    }

    #[test]
    fn preferred_display_uses_vertical_layout() {
        let p = Problem::new("123 × 456", "56088").with_vertical_layout("123\n× 456\n———");
        assert!(p.is_large_numbers());
        assert_eq!(p.preferred_display(), "123\n× 456\n———");

        let flat = Problem::new("12 + 3", "15");
        assert_eq!(flat.preferred_display(), "12 + 3");
    }
}
