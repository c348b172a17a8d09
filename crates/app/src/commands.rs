use std::time::Duration;

use drill_core::leaderboard::{DurationFilter, LeaderboardMetric};
use drill_core::model::Problem;
use drill_core::modes::PracticeMode;
use rand::SeedableRng;
use rand::rngs::StdRng;
use services::{AnswerVerdict, AppServices, AppState, RoundOutcome, RoundTimer, StartedRound};
use tokio::io::{AsyncBufReadExt, BufReader};

fn show_problem(problem: Option<&Problem>) {
    if let Some(problem) = problem {
        println!();
        println!("{}", problem.preferred_display());
    }
}

/// Run one timed round on stdin/stdout.
pub async fn play(
    services: &AppServices,
    mode: Option<PracticeMode>,
    duration: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = services.settings();
    let mut state = AppState::new(mode.unwrap_or(PracticeMode::Calendar));
    settings.load_into(&mut state).await;
    if let Some(seconds) = duration {
        state.round_duration = settings.set_round_duration(seconds).await?;
    }

    if state.debug {
        let probe = if services.probe_storage().await {
            "ok"
        } else {
            "failed"
        };
        println!(
            "[debug] storage: {} (write probe {probe})",
            services.storage_status()
        );
    }

    let drill = services.drill_loop();
    let StartedRound {
        mut round,
        advisory,
    } = drill
        .start_round(&mut state, Box::new(StdRng::from_os_rng()))
        .await?;

    println!(
        "{} round, {} seconds. Type an answer and press Enter; Ctrl-D ends early.",
        state.mode, state.round_duration
    );
    if let Some(advisory) = advisory {
        println!("Note: {advisory}");
    }

    let (timer, mut remaining) =
        RoundTimer::start(Duration::from_secs(u64::from(round.duration_seconds())));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    show_problem(round.current());

    loop {
        tokio::select! {
            changed = remaining.changed() => {
                if changed.is_err() || remaining.borrow_and_update().is_zero() {
                    println!();
                    println!("Time's up!");
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(input) = line? else { break };
                let verdict = drill.answer(&mut round, &input)?;
                match &verdict {
                    AnswerVerdict::NoAnswer => {
                        println!("Please enter an answer.");
                        continue;
                    }
                    AnswerVerdict::Correct if state.show_feedback => println!("Correct!"),
                    AnswerVerdict::Incorrect { expected } if state.show_feedback => {
                        println!("Wrong, the answer is {expected}.");
                    }
                    _ => {}
                }
                drill.next_problem(&mut round)?;
                show_problem(round.current());
            }
        }
    }

    timer.cancel();
    let outcome = drill.finish_round(&mut round).await?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &RoundOutcome) {
    println!();
    println!(
        "Score: {} / {} ({}% accuracy)",
        outcome.score(),
        outcome.total(),
        outcome.accuracy_percent()
    );

    if !outcome.slowest().is_empty() {
        println!("Slowest problems:");
        for record in outcome.slowest() {
            let secs = record.time_or_zero() as f64 / 1000.0;
            println!("  {} = {}  ({secs:.1}s)", record.problem_text, record.correct_answer);
        }
    }

    let mistakes = outcome.mistakes();
    if !mistakes.is_empty() {
        println!("Mistakes:");
        for record in mistakes {
            println!(
                "  {} = {}  (you answered {})",
                record.problem_text, record.correct_answer, record.user_answer
            );
        }
    }

    if let Some(smart) = outcome.smart() {
        let w = smart.weights;
        println!(
            "Smart mix: slow {:.0}%, mistakes {:.0}%, random {:.0}%{} from {} slow / {} mistake candidates",
            w.slow * 100.0,
            w.mistakes * 100.0,
            w.random * 100.0,
            if smart.scaled() { " (scaled)" } else { "" },
            smart.snapshot.slowest_pool,
            smart.snapshot.mistake_pool,
        );
    }
}

/// Print a ranked view; explicit options become the remembered selection.
pub async fn leaderboard(
    services: &AppServices,
    mode: Option<PracticeMode>,
    metric: Option<LeaderboardMetric>,
    filter: Option<DurationFilter>,
) {
    let settings = services.settings();
    let mut prefs = settings.leaderboard_prefs().await;
    if mode.is_some() || metric.is_some() || filter.is_some() {
        prefs.mode = mode.unwrap_or(prefs.mode);
        prefs.metric = metric.unwrap_or(prefs.metric);
        prefs.duration = filter.unwrap_or(prefs.duration);
        settings.save_leaderboard_prefs(prefs).await;
    }

    let board = services.leaderboard();
    let entries = board.rank(&prefs.query()).await;
    println!(
        "{} leaderboard, {} (durations: {})",
        prefs.mode, prefs.metric, prefs.duration
    );
    if entries.is_empty() {
        let offered = board.durations(prefs.mode.name()).await;
        println!("No ranked sessions yet. Recorded durations: {offered:?}");
        return;
    }

    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{:>2}. {:<12} {}  {}s{}",
            i + 1,
            entry.display_score(),
            entry.started_at.format("%Y-%m-%d %H:%M"),
            entry.duration_seconds,
            entry
                .difficulty
                .as_deref()
                .map(|d| format!("  [{d}]"))
                .unwrap_or_default(),
        );
    }
}

pub async fn history(services: &AppServices) {
    let groups = services.history().grouped_by_mode().await;
    if groups.is_empty() {
        println!("No sessions recorded.");
        return;
    }
    for group in groups {
        println!("{} ({} sessions)", group.mode, group.sessions.len());
        for item in group.sessions {
            println!(
                "  {}  {}/{}  {}%  {}s  {}",
                item.started_at.format("%Y-%m-%d %H:%M"),
                item.score,
                item.total,
                item.accuracy_percent,
                item.duration_seconds,
                item.id,
            );
        }
    }
}

pub async fn clear_history(services: &AppServices) {
    services.history().clear().await;
    println!("History cleared.");
}
