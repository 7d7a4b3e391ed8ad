//! Unit tests for the ExecutionSession state machine.

use repflow::execution::plan::{WorkoutDefinition, WorkoutPlan};
use repflow::execution::progression::{Step, TransitionKind};
use repflow::execution::session::{ExecutionSession, SessionEvent, SKIPPED_RPE};
use repflow::execution::timer::TickOutcome;
use repflow::execution::types::{Block, ExecutionError, ExerciseUnit, Phase, Position};
use repflow::storage::config::EngineConfig;
use repflow::storage::sink::{PersistRequest, ProgressCheckpoint};

fn open(plan: WorkoutPlan) -> ExecutionSession {
    ExecutionSession::open("test-session", plan, &EngineConfig::default())
        .expect("Should open session")
}

fn sequential(exercises: Vec<ExerciseUnit>) -> ExecutionSession {
    open(WorkoutPlan::sequential("Test Workout", exercises).unwrap())
}

fn tick_n(session: &mut ExecutionSession, n: usize) {
    for _ in 0..n {
        session.tick();
    }
}

#[test]
fn test_open_rejects_nothing_to_run() {
    assert!(WorkoutPlan::sequential("Empty", Vec::new()).is_err());
    assert!(WorkoutPlan::blocks("Empty", vec![Block::new("b1", None, Vec::new())]).is_err());
}

#[test]
fn test_timed_exercise_signals_without_advancing() {
    let mut session = sequential(vec![
        ExerciseUnit::new("Plank", 1, 1).with_duration(3),
        ExerciseUnit::new("Squat", 1, 1),
    ]);
    let events = session.subscribe();

    session.start().unwrap();
    tick_n(&mut session, 3);
    assert_eq!(session.phase(), Phase::Active);
    assert_eq!(session.state().timed_remaining, Some(3));

    tick_n(&mut session, 2);
    assert_eq!(session.tick(), TickOutcome::TimedWorkFinished { elapsed: 3 });
    assert_eq!(session.state().timed_remaining, Some(0));

    // Stays on the plank until the athlete marks it done
    tick_n(&mut session, 2);
    assert_eq!(session.phase(), Phase::Active);
    assert_eq!(session.position().exercise_index, 0);
    assert_eq!(session.state().elapsed_seconds, 5);

    let finished: Vec<_> = events
        .try_iter()
        .filter(|e| matches!(e, SessionEvent::TimedWorkFinished { .. }))
        .collect();
    assert_eq!(finished, vec![SessionEvent::TimedWorkFinished { exercise_index: 0 }]);
}

#[test]
fn test_pause_only_stops_work_timer() {
    let mut session = sequential(vec![ExerciseUnit::new("Squat", 2, 1).with_rest(10)]);
    session.start().unwrap();
    tick_n(&mut session, 3);
    assert_eq!(session.session_seconds(), 3);

    session.pause();
    assert!(session.state().paused);
    tick_n(&mut session, 5);
    assert_eq!(session.state().elapsed_seconds, 0);
    assert_eq!(session.session_seconds(), 3);

    session.resume_timer();
    tick_n(&mut session, 2);
    assert_eq!(session.state().elapsed_seconds, 2);

    session.advance().unwrap();
    assert_eq!(session.phase(), Phase::Resting);

    // Rest keeps running while paused
    session.toggle_pause();
    assert_eq!(session.tick(), TickOutcome::RestTick { remaining: 9 });
}

#[test]
fn test_reset_timer_keeps_position() {
    let mut session = sequential(vec![ExerciseUnit::new("Squat", 2, 5)]);
    session.start().unwrap();
    tick_n(&mut session, 3);
    session.advance().unwrap();
    tick_n(&mut session, 3 + 4);
    assert_eq!(session.state().elapsed_seconds, 4);

    let before = session.position();
    session.reset_timer();

    assert_eq!(session.state().elapsed_seconds, 0);
    assert_eq!(session.position(), before);
    assert_eq!(session.phase(), Phase::Active);
}

#[test]
fn test_skip_rest_enters_active() {
    let mut session = sequential(vec![ExerciseUnit::new("Squat", 2, 1).with_rest(30)]);
    session.start().unwrap();
    session.advance().unwrap();
    assert_eq!(session.phase(), Phase::Resting);
    assert_eq!(session.state().rest_remaining, 30);

    assert!(session.skip_rest());
    assert_eq!(session.phase(), Phase::Active);
    assert_eq!(session.state().rest_remaining, 0);
    assert!(!session.skip_rest());
}

#[test]
fn test_countdown_after_rest_option() {
    let config = EngineConfig {
        countdown_after_rest: true,
        ..Default::default()
    };
    let plan =
        WorkoutPlan::sequential("W", vec![ExerciseUnit::new("Squat", 2, 1).with_rest(2)]).unwrap();
    let mut session = ExecutionSession::open("s", plan, &config).unwrap();

    session.start().unwrap();
    tick_n(&mut session, 3);
    session.advance().unwrap();
    tick_n(&mut session, 2);

    assert_eq!(session.phase(), Phase::Countdown);
    assert_eq!(session.state().countdown_remaining, 3);
}

#[test]
fn test_zero_countdown_starts_active() {
    let config = EngineConfig {
        countdown_seconds: 0,
        ..Default::default()
    };
    let plan = WorkoutPlan::sequential("W", vec![ExerciseUnit::new("Squat", 1, 2)]).unwrap();
    let mut session = ExecutionSession::open("s", plan, &config).unwrap();

    session.start().unwrap();
    assert_eq!(session.phase(), Phase::Active);
    session.advance().unwrap();
    assert_eq!(session.phase(), Phase::Active);
}

#[test]
fn test_block_boundary_events() {
    let warmup = Block::new("warm", Some("Warm-up"), vec![ExerciseUnit::new("Jog", 1, 1)]);
    let main = Block::new("main", Some("Main Set"), vec![ExerciseUnit::new("Squat", 1, 1)]);
    let mut session = open(WorkoutPlan::blocks("Session", vec![warmup, main]).unwrap());
    let events = session.subscribe();

    session.start().unwrap();
    assert_eq!(session.next_block_label().as_deref(), Some("Main Set"));
    let _: Vec<_> = events.try_iter().collect();

    session.advance().unwrap();
    let emitted: Vec<_> = events.try_iter().collect();
    assert_eq!(
        emitted,
        vec![
            SessionEvent::PositionChanged {
                position: Position {
                    exercise_index: 1,
                    set: 1,
                    rep: 1,
                    round: 1
                },
                kind: Some(TransitionKind::Exercise),
            },
            SessionEvent::NextBlock {
                label: "Main Set".to_string()
            },
            SessionEvent::PhaseChanged {
                from: Phase::Countdown,
                to: Phase::Resting
            },
            SessionEvent::RestStarted { seconds: 90 },
        ]
    );
    assert_eq!(session.next_block_label(), None);
}

#[test]
fn test_circuit_completed_exercises_and_progress() {
    let plan = WorkoutPlan::circuit(
        "Circuit",
        vec![ExerciseUnit::new("Burpee", 1, 10), ExerciseUnit::new("Row", 1, 1)],
        2,
    )
    .unwrap();
    let mut session = open(plan);
    session.start().unwrap();

    session.advance().unwrap();
    assert_eq!(session.phase(), Phase::Countdown);
    assert!(session.completed_exercises().is_empty());
    assert_eq!(session.progress().percentage_rounded(), 25);

    session.advance().unwrap();
    assert_eq!(session.state().current_round, 2);
    assert_eq!(session.phase(), Phase::Countdown);
    assert!(session.completed_exercises().is_empty());
    assert_eq!(session.progress().percentage_rounded(), 50);

    session.advance().unwrap();
    assert_eq!(session.completed_exercises(), vec![0]);
    assert_eq!(session.progress().percentage_rounded(), 75);

    assert_eq!(session.advance().unwrap(), Step::Complete);
    assert_eq!(session.phase(), Phase::Rpe);
    assert_eq!(session.completed_exercises(), vec![0, 1]);
    assert_eq!(session.progress().percentage, 100.0);
}

#[test]
fn test_resume_from_checkpoint() {
    let plan = WorkoutPlan::sequential(
        "W",
        vec![ExerciseUnit::new("A", 2, 2), ExerciseUnit::new("B", 3, 5)],
    )
    .unwrap();
    let checkpoint = ProgressCheckpoint {
        current_exercise_index: 1,
        current_set: 2,
        current_rep: 3,
        current_round: 1,
        completed_exercises: vec![0],
        completion_percentage: 57.9,
    };

    let mut session =
        ExecutionSession::resume("resumed", plan, &EngineConfig::default(), &checkpoint).unwrap();
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(
        session.position(),
        Position {
            exercise_index: 1,
            set: 2,
            rep: 3,
            round: 1
        }
    );
    assert_eq!(session.completed_exercises(), vec![0]);
    assert_eq!(session.checkpoint().current_rep, 3);

    session.start().unwrap();
    assert_eq!(session.phase(), Phase::Countdown);
    assert!(session.can_retreat());
}

#[test]
fn test_closed_session_rejects_actions() {
    let mut session = sequential(vec![ExerciseUnit::new("Squat", 1, 3)]);
    let events = session.subscribe();
    session.start().unwrap();
    session.close();

    assert!(session.is_closed());
    assert!(!session.is_finished());
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.start().unwrap_err(), ExecutionError::SessionClosed);
    assert_eq!(session.retreat().unwrap_err(), ExecutionError::SessionClosed);
    assert!(!session.skip_rest());
    assert!(events.try_iter().any(|e| e == SessionEvent::Closed));
}

#[test]
fn test_skip_rpe_keeps_selected_rating() {
    let plan = WorkoutPlan::sequential("W", vec![ExerciseUnit::new("Squat", 1, 1)])
        .unwrap()
        .with_category("strength");
    let mut session = open(plan);
    session.start().unwrap();
    assert_eq!(session.advance().unwrap(), Step::Complete);
    session.select_rpe(6).unwrap();
    session.take_persistence();

    let report = session.skip_rpe().unwrap();
    assert_eq!(report.rpe, Some(6));
    assert_eq!(report.completion_percentage, 100.0);

    let efforts: Vec<_> = session
        .take_persistence()
        .into_iter()
        .filter_map(|r| match r {
            PersistRequest::Effort { effort, .. } => Some(effort),
            _ => None,
        })
        .collect();
    assert_eq!(efforts.len(), 1);
    assert_eq!(efforts[0].rpe, 6);
    assert_eq!(efforts[0].category, "strength");
    assert_eq!(efforts[0].duration_minutes, 1);
}

#[test]
fn test_skip_rpe_without_rating_saves_stand_in_effort() {
    let mut session = sequential(vec![ExerciseUnit::new("Squat", 1, 1)]);
    session.start().unwrap();
    assert_eq!(session.advance().unwrap(), Step::Complete);

    let report = session.skip_rpe().unwrap();
    assert_eq!(report.rpe, None);

    let efforts: Vec<_> = session
        .take_persistence()
        .into_iter()
        .filter_map(|r| match r {
            PersistRequest::Effort { effort, .. } => Some(effort),
            _ => None,
        })
        .collect();
    assert_eq!(efforts.len(), 1);
    assert_eq!(efforts[0].rpe, SKIPPED_RPE);
    assert_eq!(efforts[0].training_load(), u32::from(SKIPPED_RPE));
}

#[test]
fn test_huge_set_and_rep_counts_do_not_overflow() {
    let json = r#"{
        "name": "Volume",
        "exercises": [
            { "name": "Squat", "sets": "100000", "reps": "100000" },
            { "name": "Lunge", "sets": 4294967295, "reps": 4294967295 }
        ]
    }"#;
    let plan = WorkoutPlan::try_from(WorkoutDefinition::from_json(json).unwrap()).unwrap();
    let mut session = open(plan);

    session.start().unwrap();
    let progress = session.progress();
    assert_eq!(progress.completed_units, 0);
    assert_eq!(
        progress.total_units,
        10_000_000_000 + u64::from(u32::MAX) * u64::from(u32::MAX)
    );
    assert_eq!(progress.percentage, 0.0);

    session.advance().unwrap();
    let progress = session.progress();
    assert_eq!(progress.completed_units, 1);
    assert!(progress.percentage >= 0.0 && progress.percentage < 1.0);
}
