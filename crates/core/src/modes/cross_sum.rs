use rand::{Rng, RngCore};

use super::{PracticeMode, ProblemSource, stacked};
use crate::model::{Problem, ProblemRecord};

/// Sum of digit products pairing the first number left-to-right with the
/// second right-to-left: `Σ a[i] · b[n-1-i]`.
fn cross_sum(a: u64, b: u64, width: usize) -> u64 {
    let da = digits(a, width);
    let db = digits(b, width);
    (0..width).map(|i| da[i] * db[width - 1 - i]).sum()
}

fn digits(n: u64, width: usize) -> Vec<u64> {
    format!("{n:0width$}")
        .bytes()
        .map(|b| u64::from(b - b'0'))
        .collect()
}

fn build(a: u64, b: u64, width: usize) -> Problem {
    let layout = stacked(a, b);
    Problem::new(format!("{a} {b}"), cross_sum(a, b, width).to_string())
        .with_display(layout.clone())
        .with_vertical_layout(layout)
}

/// Rebuilds the stacked layout from a stored `"a b"` question.
fn replay(record: &ProblemRecord) -> Problem {
    let problem = Problem::new(record.problem_text.as_str(), record.correct_answer.as_str());
    match record.problem_text.split_once(' ') {
        Some((a, b)) => {
            let layout = stacked(a.trim(), b.trim());
            problem.with_display(layout.clone()).with_vertical_layout(layout)
        }
        None => problem.with_display(format!("{} = ", record.problem_text)),
    }
}

/// Cross sum of two four-digit numbers: `ah + bg + cf + de`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossSum4;

impl ProblemSource for CrossSum4 {
    fn mode(&self) -> PracticeMode {
        PracticeMode::CrossSum4
    }

    fn generate_problem(&mut self, rng: &mut dyn RngCore) -> Problem {
        let a = rng.random_range(1_000..=9_999u64);
        let b = rng.random_range(1_000..=9_999u64);
        build(a, b, 4)
    }

    fn replay_problem(&self, record: &ProblemRecord) -> Problem {
        replay(record)
    }
}

/// Cross sum of two eight-digit numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossSum8;

impl ProblemSource for CrossSum8 {
    fn mode(&self) -> PracticeMode {
        PracticeMode::CrossSum8
    }

    fn generate_problem(&mut self, rng: &mut dyn RngCore) -> Problem {
        let a = rng.random_range(10_000_000..=99_999_999u64);
        let b = rng.random_range(10_000_000..=99_999_999u64);
        build(a, b, 8)
    }

    fn replay_problem(&self, record: &ProblemRecord) -> Problem {
        replay(record)
    }
}
