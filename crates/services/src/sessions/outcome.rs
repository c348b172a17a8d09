use drill_core::model::{ProblemRecord, Session, SmartSnapshot, slowest};
use drill_core::selector::SelectionWeights;

/// Number of slowest answers shown after a round.
pub const SLOWEST_SHOWN: usize = 5;

/// Smart-generator settings of a round together with the effective draw shares.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartSummary {
    pub snapshot: SmartSnapshot,
    pub weights: SelectionWeights,
}

impl SmartSummary {
    /// True when the configured probabilities summed above 1 and were rescaled.
    #[must_use]
    pub fn scaled(&self) -> bool {
        self.weights.scaled
    }
}

/// Everything the results view shows for a finished round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    session: Session,
    slowest: Vec<ProblemRecord>,
    smart: Option<SmartSummary>,
}

impl RoundOutcome {
    #[must_use]
    pub fn new(session: Session, weights: Option<SelectionWeights>) -> Self {
        let slowest = slowest(session.records(), SLOWEST_SHOWN);
        let smart = session
            .smart()
            .cloned()
            .zip(weights)
            .map(|(snapshot, weights)| SmartSummary { snapshot, weights });
        Self {
            session,
            slowest,
            smart,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Up to five slowest answers, slowest first; ties keep answer order.
    #[must_use]
    pub fn slowest(&self) -> &[ProblemRecord] {
        &self.slowest
    }

    #[must_use]
    pub fn mistakes(&self) -> Vec<&ProblemRecord> {
        self.session.mistakes().collect()
    }

    #[must_use]
    pub fn smart(&self) -> Option<&SmartSummary> {
        self.smart.as_ref()
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.session.correct_count()
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.session.total_attempted()
    }

    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        self.session.accuracy_percent()
    }
}
