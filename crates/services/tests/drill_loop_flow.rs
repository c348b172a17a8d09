use std::sync::Arc;

use chrono::Duration;
use drill_core::history::PoolAdvisory;
use drill_core::model::{
    Problem, ProblemOrigin, ProblemRecord, Session, SessionId, SmartGeneratorDraft,
};
use drill_core::modes::PracticeMode;
use drill_core::time::{ManualClock, fixed_now};
use rand::SeedableRng;
use rand::rngs::StdRng;
use services::{AnswerVerdict, AppServices, AppState, Clock, RoundState};
use storage::{EphemeralStore, StorageGateway};

fn past_session(id: &str, days_ago: i64, question: &str, answer: &str) -> Session {
    let problem = Problem::new(question, answer);
    Session::from_records(
        SessionId::new(id),
        "Addition",
        fixed_now() - Duration::days(days_ago) - Duration::minutes(5),
        60,
        60,
        vec![ProblemRecord::answered(&problem, "1", 4000, false)],
        None,
        None,
    )
    .unwrap()
}

fn rng(seed: u64) -> Box<StdRng> {
    Box::new(StdRng::seed_from_u64(seed))
}

#[tokio::test]
async fn finished_round_is_persisted_and_listed() {
    let clock = ManualClock::starting_at(fixed_now());
    let services = AppServices::new_ephemeral(Clock::manual(clock.clone()), EphemeralStore::new()).await;
    let drill = services.drill_loop();
    let mut state = AppState::new(PracticeMode::Addition);

    let mut started = drill.start_round(&mut state, rng(1)).await.unwrap();
    assert!(state.settings_loaded());
    assert!(started.advisory.is_none());
    let round = &mut started.round;

    clock.advance(Duration::seconds(2));
    let answer = round.current().unwrap().answer().to_string();
    assert_eq!(drill.answer(round, &answer).unwrap(), AnswerVerdict::Correct);

    drill.next_problem(round).unwrap();
    clock.advance(Duration::seconds(3));
    assert_eq!(drill.answer(round, "").unwrap(), AnswerVerdict::NoAnswer);
    assert!(!drill.answer(round, "0").unwrap().is_correct());

    clock.advance(Duration::seconds(55));
    assert!(drill.is_expired(round));
    let outcome = drill.finish_round(round).await.unwrap();
    assert_eq!(round.state(), RoundState::Ended);
    assert_eq!(outcome.score(), 1);
    assert_eq!(outcome.total(), 2);
    assert_eq!(outcome.accuracy_percent(), 50);

    let groups = services.history().grouped_by_mode().await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].mode, "Addition");
    let stored = services
        .history()
        .get(&groups[0].sessions[0].id)
        .await
        .unwrap();
    let times: Vec<_> = stored.records().iter().map(|r| r.time_taken_ms).collect();
    assert_eq!(times, vec![Some(2000), Some(3000)]);
}

#[tokio::test]
async fn smart_round_replays_only_recent_mistakes() {
    let gateway = Arc::new(StorageGateway::ephemeral(EphemeralStore::new()));
    gateway
        .replace_sessions(&[
            past_session("recent", 0, "1234 + 4321", "5555"),
            past_session("stale", 2, "9999 + 1", "10000"),
        ])
        .await;
    let services = AppServices::from_gateway(gateway, Clock::fixed(fixed_now())).await;
    services
        .settings()
        .save_smart_config(SmartGeneratorDraft {
            enabled: true,
            lookback_days: 1,
            prob_slowest: 0.0,
            prob_mistakes: 1.0,
            ..SmartGeneratorDraft::default()
        })
        .await
        .unwrap();

    let drill = services.drill_loop();
    let mut state = AppState::new(PracticeMode::Addition);
    let mut started = drill.start_round(&mut state, rng(9)).await.unwrap();
    assert!(started.advisory.is_none());
    let round = &mut started.round;

    for _ in 0..25 {
        let problem = round.current().unwrap().clone();
        assert_eq!(problem.question(), "1234 + 4321");
        assert_eq!(problem.origin(), ProblemOrigin::Mistake);
        drill.answer(round, "5555").unwrap();
        drill.next_problem(round).unwrap();
    }

    let outcome = drill.finish_round(round).await.unwrap();
    let smart = outcome.smart().unwrap();
    assert_eq!(smart.snapshot.mistake_pool, 1);
    assert!((smart.weights.mistakes - 1.0).abs() < f64::EPSILON);
    assert_eq!(outcome.score(), 25);
}

#[tokio::test]
async fn empty_history_raises_an_advisory_and_still_plays() {
    let services = AppServices::new_ephemeral(
        Clock::fixed(fixed_now()),
        EphemeralStore::from_entries([("useSmartGenerator", "true")]),
    )
    .await;

    let mut state = AppState::new(PracticeMode::Calendar);
    let started = services
        .drill_loop()
        .start_round(&mut state, rng(4))
        .await
        .unwrap();

    assert_eq!(started.advisory, Some(PoolAdvisory::Both));
    let problem = started.round.current().unwrap();
    assert_eq!(problem.origin(), ProblemOrigin::Random);
}

#[tokio::test]
async fn stored_preferences_shape_the_round() {
    let services = AppServices::new_ephemeral(
        Clock::fixed(fixed_now()),
        EphemeralStore::from_entries([
            ("lastSelectedDuration", "30"),
            ("multiplicationDifficulty", "\"2x2\""),
        ]),
    )
    .await;

    let mut state = AppState::new(PracticeMode::Multiplication);
    let started = services
        .drill_loop()
        .start_round(&mut state, rng(5))
        .await
        .unwrap();

    assert_eq!(started.round.duration_seconds(), 30);
    assert_eq!(state.round_duration, 30);
    let question = started.round.current().unwrap().question().to_string();
    let operands: Vec<u32> = question
        .split(" × ")
        .map(|n| n.parse().unwrap())
        .collect();
    assert!(operands.iter().all(|n| (10..=99).contains(n)));
}
