use rand::{Rng, RngCore};

use crate::history::HistoryIndex;
use crate::model::{Problem, ProblemOrigin, ProblemRecord};
use crate::modes::ProblemSource;

/// Normalized draw probabilities for the three problem origins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionWeights {
    pub slow: f64,
    pub mistakes: f64,
    pub random: f64,
    /// True when the configured pair exceeded 1 and was rescaled.
    pub scaled: bool,
}

impl SelectionWeights {
    /// Rescale `(prob_slowest, prob_mistakes)` so that the three shares sum to 1.
    ///
    /// A pair summing above 1 is scaled proportionally and leaves no random
    /// share; otherwise random takes the remainder.
    #[must_use]
    pub fn normalize(prob_slowest: f64, prob_mistakes: f64) -> Self {
        let total = prob_slowest + prob_mistakes;
        if total > 1.0 {
            Self {
                slow: prob_slowest / total,
                mistakes: prob_mistakes / total,
                random: 0.0,
                scaled: true,
            }
        } else {
            Self {
                slow: prob_slowest,
                mistakes: prob_mistakes,
                random: 1.0 - total,
                scaled: false,
            }
        }
    }
}

/// Weighted replay of historical problems over a [`HistoryIndex`].
#[derive(Debug, Clone)]
pub struct SmartSelector {
    index: HistoryIndex,
    weights: SelectionWeights,
}

impl SmartSelector {
    #[must_use]
    pub fn new(index: HistoryIndex, prob_slowest: f64, prob_mistakes: f64) -> Self {
        Self {
            index,
            weights: SelectionWeights::normalize(prob_slowest, prob_mistakes),
        }
    }

    #[must_use]
    pub fn index(&self) -> &HistoryIndex {
        &self.index
    }

    #[must_use]
    pub fn weights(&self) -> SelectionWeights {
        self.weights
    }

    /// Pick the next problem. Never fails: anything not drawn from a pool is
    /// delegated to `source`.
    pub fn select(&self, source: &mut dyn ProblemSource, rng: &mut dyn RngCore) -> Problem {
        if self.index.is_empty() {
            return source.generate_problem(rng);
        }

        let r: f64 = rng.random();
        let slow = self.index.slow();
        let mistakes = self.index.mistakes();

        let pick = if r < self.weights.slow && !slow.is_empty() {
            Some((pick_uniform(slow, rng), ProblemOrigin::Slow))
        } else if r < self.weights.slow + self.weights.mistakes && !mistakes.is_empty() {
            Some((pick_uniform(mistakes, rng), ProblemOrigin::Mistake))
        } else {
            None
        };

        match pick {
            Some((record, origin)) => source.replay_problem(record).with_origin(origin),
            None => source.generate_problem(rng),
        }
    }
}

fn pick_uniform<'a>(pool: &'a [ProblemRecord], rng: &mut dyn RngCore) -> &'a ProblemRecord {
    &pool[rng.random_range(0..pool.len())]
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryQuery;
    use crate::model::{Session, SessionId};
    use crate::modes::{Addition, Multiplication};
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rec(text: &str, answer: &str, ms: u64, correct: bool) -> ProblemRecord {
        ProblemRecord {
            problem_text: text.into(),
            correct_answer: answer.into(),
            user_answer: "0".into(),
            time_taken_ms: Some(ms),
            is_correct: correct,
            source: ProblemOrigin::Random,
        }
    }

    fn index(mode: &str, records: Vec<ProblemRecord>) -> HistoryIndex {
        let session = Session::from_records(
            SessionId::new("h"),
            mode,
            fixed_now(),
            60,
            60,
            records,
            None,
            None,
        )
        .unwrap();
        let query = HistoryQuery {
            mode: mode.into(),
            lookback_days: 1,
            min_time_ms: 0,
            now: fixed_now(),
        };
        HistoryIndex::build([&session], &query)
    }

    #[test]
    fn weights_rescale_when_over_one() {
        let w = SelectionWeights::normalize(0.8, 0.6);
        assert!(w.scaled);
        assert!((w.slow + w.mistakes - 1.0).abs() < 1e-12);
        assert_eq!(w.random, 0.0);
        assert!((w.slow - 0.8 / 1.4).abs() < 1e-12);
    }

    #[test]
    fn weights_leave_remainder_to_random() {
        for (s, m) in [(0.0, 0.0), (0.25, 0.25), (0.5, 0.5), (1.0, 0.0), (0.1, 0.7)] {
            let w = SelectionWeights::normalize(s, m);
            assert!(!w.scaled);
            assert!((w.slow + w.mistakes + w.random - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_history_delegates_to_source() {
        let selector = SmartSelector::new(HistoryIndex::default(), 1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let p = selector.select(&mut Addition, &mut rng);
        assert_eq!(p.origin(), ProblemOrigin::Random);
    }

    #[test]
    fn draws_converge_to_configured_probabilities() {
        // One slow record (the 5000 ms one) and one mistake in the pools.
        let idx = index(
            "Addition",
            vec![
                rec("1000 + 1000", "2000", 5000, true),
                rec("2000 + 2000", "4000", 100, false),
            ],
        );
        let selector = SmartSelector::new(idx, 0.5, 0.3);
        let mut rng = StdRng::seed_from_u64(42);
        let mut source = Addition;

        let draws = 20_000;
        let (mut slow, mut mistakes, mut random) = (0u32, 0u32, 0u32);
        for _ in 0..draws {
            match selector.select(&mut source, &mut rng).origin() {
                ProblemOrigin::Slow => slow += 1,
                ProblemOrigin::Mistake => mistakes += 1,
                ProblemOrigin::Random => random += 1,
            }
        }

        let freq = |n: u32| f64::from(n) / f64::from(draws);
        assert!((freq(slow) - 0.5).abs() < 0.02, "slow {}", freq(slow));
        assert!((freq(mistakes) - 0.3).abs() < 0.02, "mistakes {}", freq(mistakes));
        assert!((freq(random) - 0.2).abs() < 0.02, "random {}", freq(random));
    }

    #[test]
    fn starved_pool_falls_through_to_random() {
        // Only correct answers, so the mistake pool is empty.
        let idx = index("Addition", vec![rec("1000 + 1000", "2000", 5000, true)]);
        let selector = SmartSelector::new(idx, 0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..50 {
            assert_eq!(
                selector.select(&mut Addition, &mut rng).origin(),
                ProblemOrigin::Random
            );
        }
    }

    #[test]
    fn replay_is_verbatim_with_layout() {
        let idx = index("Multiplication", vec![rec("123 × 456", "56088", 9000, false)]);
        let selector = SmartSelector::new(idx, 1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        let p = selector.select(&mut Multiplication::default(), &mut rng);
        assert_eq!(p.origin(), ProblemOrigin::Slow);
        assert_eq!(p.question(), "123 × 456");
        assert_eq!(p.answer(), "56088");
        assert_eq!(p.display(), "123 × 456 = ");
        assert_eq!(p.vertical_display(), Some("123\n× 456\n———"));
    }
}
