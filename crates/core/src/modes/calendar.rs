use rand::{Rng, RngCore};

use super::{PracticeMode, ProblemSource};
use crate::model::Problem;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MIN_YEAR: i32 = 1600;
const MAX_YEAR: i32 = 2100;

/// Name the weekday of a random date; the answer is 0 for Sunday through 6.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calendar;

impl ProblemSource for Calendar {
    fn mode(&self) -> PracticeMode {
        PracticeMode::Calendar
    }

    fn generate_problem(&mut self, rng: &mut dyn RngCore) -> Problem {
        let year = rng.random_range(MIN_YEAR..=MAX_YEAR);
        let month = rng.random_range(1..=12u32);
        let day = rng.random_range(1..=days_in_month(year, month));

        let question = format!("{year} {} {day}", MONTHS[month as usize - 1]);
        Problem::new(question, weekday_from_sunday(year, month, day).to_string())
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Proleptic Gregorian weekday, Sunday = 0 (Sakamoto's method).
fn weekday_from_sunday(year: i32, month: u32, day: u32) -> u32 {
    const OFFSETS: [i32; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
    let y = if month < 3 { year - 1 } else { year };
    let m = month as usize - 1;
    let d = i32::try_from(day).unwrap_or(1);
    let w = (y + y / 4 - y / 100 + y / 400 + OFFSETS[m] + d).rem_euclid(7);
    w.unsigned_abs()
}

/// Doomsday anchor drill: given a two-digit `x`, answer `(2 + x + ⌊x/4⌋) mod 7`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarDay;

impl ProblemSource for CalendarDay {
    fn mode(&self) -> PracticeMode {
        PracticeMode::CalendarDay
    }

    fn generate_problem(&mut self, rng: &mut dyn RngCore) -> Problem {
        let x = rng.random_range(10..=99u32);
        Problem::new(x.to_string(), calendar_day_answer(x).to_string())
    }
}

fn calendar_day_answer(x: u32) -> u32 {
    (2 + x + x / 4) % 7
}
