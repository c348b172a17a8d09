use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use rand::{Rng, RngCore};

use super::{ModeError, PracticeMode, ProblemSource};
use crate::model::{Problem, ProblemRecord};

const LARGE_OPERAND: u64 = 100;

/// Operand size for multiplication drills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MultiplicationLevel {
    TwoByTwo,
    #[default]
    ThreeByThree,
    FourByFour,
    EightByEight,
}

impl MultiplicationLevel {
    pub const ALL: [MultiplicationLevel; 4] = [
        MultiplicationLevel::TwoByTwo,
        MultiplicationLevel::ThreeByThree,
        MultiplicationLevel::FourByFour,
        MultiplicationLevel::EightByEight,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MultiplicationLevel::TwoByTwo => "2x2",
            MultiplicationLevel::ThreeByThree => "3x3",
            MultiplicationLevel::FourByFour => "4x4",
            MultiplicationLevel::EightByEight => "8x8",
        }
    }

    /// Inclusive operand range for this level.
    #[must_use]
    pub fn operands(self) -> RangeInclusive<u64> {
        match self {
            MultiplicationLevel::TwoByTwo => 10..=99,
            MultiplicationLevel::ThreeByThree => 100..=999,
            MultiplicationLevel::FourByFour => 1_000..=9_999,
            MultiplicationLevel::EightByEight => 10_000_000..=99_999_999,
        }
    }

    /// Smallest operand a similar problem may use.
    #[must_use]
    pub fn min_operand(self) -> u64 {
        *self.operands().start()
    }
}

impl fmt::Display for MultiplicationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MultiplicationLevel {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MultiplicationLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s.trim())
            .ok_or_else(|| ModeError::UnknownLevel(s.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Multiplication {
    level: MultiplicationLevel,
}

impl Multiplication {
    #[must_use]
    pub fn new(level: MultiplicationLevel) -> Self {
        Self { level }
    }

    pub fn set_difficulty(&mut self, level: MultiplicationLevel) {
        self.level = level;
    }

    #[must_use]
    pub fn level(&self) -> MultiplicationLevel {
        self.level
    }

    fn build(a: u64, b: u64) -> Problem {
        let problem = Problem::new(format!("{a} × {b}"), (a * b).to_string());
        if a >= LARGE_OPERAND && b >= LARGE_OPERAND {
            problem.with_vertical_layout(super::stacked(a, b))
        } else {
            problem
        }
    }
}

impl ProblemSource for Multiplication {
    fn mode(&self) -> PracticeMode {
        PracticeMode::Multiplication
    }

    fn generate_problem(&mut self, rng: &mut dyn RngCore) -> Problem {
        let range = self.level.operands();
        let a = rng.random_range(range.clone());
        let b = rng.random_range(range);
        Self::build(a, b)
    }

    fn generate_similar_problem(
        &mut self,
        prior: &ProblemRecord,
        rng: &mut dyn RngCore,
    ) -> Option<Problem> {
        let Some((a, b)) = split_operands(&prior.problem_text, &['×', 'x']) else {
            return Some(self.generate_problem(rng));
        };
        let min = self.level.min_operand();
        let a = perturb(a, (a / 10).max(5), min, rng);
        let b = perturb(b, (b / 10).max(5), min, rng);
        Some(Self::build(a, b))
    }

    /// Replays keep their text; a stacked layout is rebuilt when either
    /// operand has three or more digits.
    fn replay_problem(&self, record: &ProblemRecord) -> Problem {
        let problem = Problem::new(record.problem_text.as_str(), record.correct_answer.as_str())
            .with_display(format!("{} = ", record.problem_text));
        match split_operands(&record.problem_text, &['×', 'x']) {
            Some((a, b)) if a >= LARGE_OPERAND || b >= LARGE_OPERAND => {
                problem.with_vertical_layout(format!("{a}\n× {b}\n———"))
            }
            _ => problem,
        }
    }

    fn difficulty(&self) -> Option<String> {
        Some(self.level.as_str().to_string())
    }
}

/// Four-digit addition.
#[derive(Debug, Clone, Copy, Default)]
pub struct Addition;

const ADDEND_RANGE: RangeInclusive<u64> = 1_000..=9_999;
const ADDITION_MIN_OPERAND: u64 = 100;

impl Addition {
    fn build(a: u64, b: u64) -> Problem {
        Problem::new(format!("{a} + {b}"), (a + b).to_string())
    }
}

impl ProblemSource for Addition {
    fn mode(&self) -> PracticeMode {
        PracticeMode::Addition
    }

    fn generate_problem(&mut self, rng: &mut dyn RngCore) -> Problem {
        let a = rng.random_range(ADDEND_RANGE);
        let b = rng.random_range(ADDEND_RANGE);
        Self::build(a, b)
    }

    fn generate_similar_problem(
        &mut self,
        prior: &ProblemRecord,
        rng: &mut dyn RngCore,
    ) -> Option<Problem> {
        let Some((a, b)) = split_operands(&prior.problem_text, &['+']) else {
            return Some(self.generate_problem(rng));
        };
        let a = perturb(a, a / 10, ADDITION_MIN_OPERAND, rng);
        let b = perturb(b, b / 10, ADDITION_MIN_OPERAND, rng);
        Some(Self::build(a, b))
    }
}

/// Split `"a <op> b"` into its two integer operands.
fn split_operands(text: &str, ops: &[char]) -> Option<(u64, u64)> {
    let mut parts = text.split(|c| ops.contains(&c));
    let a = parts.next()?.trim().parse().ok()?;
    let b = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((a, b))
}

/// Shift `value` by a uniform offset in `[-variance, variance)` and clamp to `min`.
fn perturb(value: u64, variance: u64, min: u64, rng: &mut dyn RngCore) -> u64 {
    if variance == 0 {
        return value.max(min);
    }
    let offset = rng.random_range(0..variance * 2);
    (value + offset).saturating_sub(variance).max(min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn operands(p: &Problem, op: char) -> (u64, u64) {
        split_operands(p.question(), &[op]).unwrap()
    }

    #[test]
    fn levels_bound_operands() {
        let mut rng = StdRng::seed_from_u64(5);
        for level in MultiplicationLevel::ALL {
            let mut source = Multiplication::new(level);
            for _ in 0..50 {
                let p = source.generate_problem(&mut rng);
                let (a, b) = operands(&p, '×');
                assert!(level.operands().contains(&a));
                assert!(level.operands().contains(&b));
                assert_eq!(p.answer(), (a * b).to_string());
                assert_eq!(p.is_large_numbers(), level != MultiplicationLevel::TwoByTwo);
            }
        }
    }

    #[test]
    fn level_parses_from_label() {
        assert_eq!("4x4".parse::<MultiplicationLevel>().unwrap(), MultiplicationLevel::FourByFour);
        assert!("5x5".parse::<MultiplicationLevel>().is_err());
        assert_eq!(Multiplication::default().difficulty().as_deref(), Some("3x3"));
    }

    #[test]
    fn similar_multiplication_stays_near_and_above_minimum() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut source = Multiplication::new(MultiplicationLevel::ThreeByThree);
        let prior = ProblemRecord::legacy_mistake("105 × 900", "94500", "1");
        for _ in 0..100 {
            let p = source.generate_similar_problem(&prior, &mut rng).unwrap();
            let (a, b) = operands(&p, '×');
            assert!((100..115).contains(&a), "a = {a}");
            assert!((810..990).contains(&b), "b = {b}");
        }
    }

    #[test]
    fn similar_addition_clamps_to_minimum() {
        let mut rng = StdRng::seed_from_u64(13);
        let prior = ProblemRecord::legacy_mistake("100 + 5", "105", "1");
        for _ in 0..20 {
            let p = Addition.generate_similar_problem(&prior, &mut rng).unwrap();
            let (a, b) = operands(&p, '+');
            assert!((100..110).contains(&a));
            assert_eq!(b, 100);
        }
    }

    #[test]
    fn unparseable_prior_falls_back_to_random() {
        let mut rng = StdRng::seed_from_u64(1);
        let prior = ProblemRecord::legacy_mistake("garbage", "0", "1");
        let p = Addition.generate_similar_problem(&prior, &mut rng).unwrap();
        let (a, b) = operands(&p, '+');
        assert!(ADDEND_RANGE.contains(&a) && ADDEND_RANGE.contains(&b));
    }

    #[test]
    fn replay_rebuilds_stacked_layout_for_large_operands() {
        let source = Multiplication::default();
        let big = source.replay_problem(&ProblemRecord::legacy_mistake("123 x 45", "5535", "1"));
        assert!(big.is_large_numbers());
        assert_eq!(big.vertical_display(), Some("123\n× 45\n———"));
        assert_eq!(big.display(), "123 x 45 = ");

        let small = source.replay_problem(&ProblemRecord::legacy_mistake("12 × 45", "540", "1"));
        assert!(!small.is_large_numbers());
        assert_eq!(small.vertical_display(), None);
    }
}
