use rand::{Rng, RngCore};

use super::{ModeError, PracticeMode, ProblemSource};
use crate::model::Problem;

/// `√(r²)` for a two-digit root.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquareRoot;

impl ProblemSource for SquareRoot {
    fn mode(&self) -> PracticeMode {
        PracticeMode::SquareRoot
    }

    fn generate_problem(&mut self, rng: &mut dyn RngCore) -> Problem {
        let root = rng.random_range(10..=99u64);
        Problem::new(format!("√{}", root * root), root.to_string())
    }
}

/// Square a root drawn from a configurable range.
#[derive(Debug, Clone)]
pub struct SquareRootRange {
    min: u32,
    max: u32,
}

impl Default for SquareRootRange {
    fn default() -> Self {
        Self { min: 70, max: 80 }
    }
}

impl SquareRootRange {
    /// # Errors
    ///
    /// Returns `ModeError::InvalidRange` if `min > max`.
    pub fn new(min: u32, max: u32) -> Result<Self, ModeError> {
        let mut range = Self::default();
        range.set_range(min, max)?;
        Ok(range)
    }

    /// # Errors
    ///
    /// Returns `ModeError::InvalidRange` if `min > max`; the previous range is kept.
    pub fn set_range(&mut self, min: u32, max: u32) -> Result<(), ModeError> {
        if min > max {
            return Err(ModeError::InvalidRange { min, max });
        }
        self.min = min;
        self.max = max;
        Ok(())
    }

    #[must_use]
    pub fn range(&self) -> (u32, u32) {
        (self.min, self.max)
    }
}

impl ProblemSource for SquareRootRange {
    fn mode(&self) -> PracticeMode {
        PracticeMode::SquareRootRange
    }

    fn generate_problem(&mut self, rng: &mut dyn RngCore) -> Problem {
        let root = u64::from(rng.random_range(self.min..=self.max));
        Problem::new(format!("{root}²"), (root * root).to_string())
    }
}

/// Distance of a six-digit number from the largest square of a multiple of ten below it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquareRootRemainder;

impl ProblemSource for SquareRootRemainder {
    fn mode(&self) -> PracticeMode {
        PracticeMode::SquareRootRemainder
    }

    fn generate_problem(&mut self, rng: &mut dyn RngCore) -> Problem {
        let x = rng.random_range(100_000..=999_999u64);
        Problem::new(x.to_string(), remainder(x).to_string())
    }
}

/// `x − ⌊10·√(x/100)⌋²`, computed with integer square roots.
fn remainder(x: u64) -> u64 {
    // 10·√(x/100) == √x, so the floor is the integer square root of x.
    let r = x.isqrt();
    x - r * r
}
