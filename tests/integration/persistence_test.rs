//! Integration tests for session persistence.
//!
//! Storage failures never stall progression, checkpoints resume sessions,
//! and a full session lands in SQLite.

use repflow::execution::plan::WorkoutPlan;
use repflow::execution::progression::Step;
use repflow::execution::session::ExecutionSession;
use repflow::execution::types::{ExerciseUnit, Phase};
use repflow::storage::checkpoint::CheckpointWriter;
use repflow::storage::config::EngineConfig;
use repflow::storage::database::Database;
use repflow::storage::sink::{
    DatabaseSink, EffortEntry, ExerciseResult, MemorySink, ProgressCheckpoint, StorageError,
    WorkoutSink,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sink whose backend is always down.
#[derive(Default)]
struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    fn fail(&self) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Unavailable("offline".to_string()))
    }
}

impl WorkoutSink for FailingSink {
    fn save_progress(&self, _: &str, _: &ProgressCheckpoint) -> Result<(), StorageError> {
        self.fail()
    }

    fn save_exercise_result(
        &self,
        _: &str,
        _: usize,
        _: &ExerciseResult,
    ) -> Result<(), StorageError> {
        self.fail()
    }

    fn save_effort(&self, _: &str, _: &EffortEntry) -> Result<(), StorageError> {
        self.fail()
    }

    fn load_progress(&self, _: &str) -> Result<Option<ProgressCheckpoint>, StorageError> {
        Err(StorageError::Unavailable("offline".to_string()))
    }
}

fn plan() -> WorkoutPlan {
    WorkoutPlan::sequential(
        "Upper",
        vec![
            ExerciseUnit::new("Push-up", 2, 3).with_rest(45),
            ExerciseUnit::new("Row", 2, 2),
        ],
    )
    .unwrap()
    .with_category("strength")
}

fn open(id: &str) -> ExecutionSession {
    ExecutionSession::open(id, plan(), &EngineConfig::default()).unwrap()
}

#[test]
fn test_failing_sink_never_blocks_progression() {
    let sink = FailingSink::default();
    let mut session = open("offline");
    session.start().unwrap();
    session.drain_persistence(&sink);

    while session.advance().unwrap() != Step::Complete {
        session.tick();
        session.drain_persistence(&sink);
    }
    session.select_rpe(5).unwrap();
    let report = session.submit_rpe().unwrap();
    session.drain_persistence(&sink);

    assert_eq!(report.rpe, Some(5));
    assert_eq!(session.phase(), Phase::Idle);
    assert!(sink.attempts.load(Ordering::SeqCst) > 0);
}

#[test]
fn test_checkpoint_resumes_session() {
    let sink = MemorySink::new();
    let mut session = open("resume-me");
    session.start().unwrap();
    for _ in 0..4 {
        session.advance().unwrap();
    }
    let position = session.position();
    session.close();
    session.drain_persistence(&sink);

    let checkpoint = sink.load_progress("resume-me").unwrap().expect("Checkpoint saved");
    assert_eq!(checkpoint.current_exercise_index, position.exercise_index);
    assert_eq!(checkpoint.current_set, position.set);
    assert_eq!(checkpoint.current_rep, position.rep);

    let resumed =
        ExecutionSession::resume("resume-me", plan(), &EngineConfig::default(), &checkpoint)
            .unwrap();
    assert_eq!(resumed.position(), position);
    assert_eq!(resumed.progress(), session.progress());
}

#[test]
fn test_finished_checkpoint_restarts() {
    let sink = MemorySink::new();
    let mut session = open("done");
    session.start().unwrap();
    while session.advance().unwrap() != Step::Complete {}
    session.skip_rpe().unwrap();
    session.drain_persistence(&sink);

    let checkpoint = sink.load_progress("done").unwrap().unwrap();
    assert_eq!(checkpoint.completion_percentage, 100.0);
    assert_eq!(checkpoint.completed_exercises, vec![0, 1]);

    let resumed =
        ExecutionSession::resume("done", plan(), &EngineConfig::default(), &checkpoint).unwrap();
    assert!(resumed.position().is_start());
}

#[test]
fn test_full_session_lands_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repflow.db");

    {
        let db = Database::open(&path).expect("Should create database");
        let sink = DatabaseSink::new(Arc::new(Mutex::new(db)));
        let mut session = open("sqlite");
        session.start().unwrap();
        while session.advance().unwrap() != Step::Complete {
            session.drain_persistence(&sink);
        }
        session.select_rpe(9).unwrap();
        session.submit_rpe().unwrap();
        session.drain_persistence(&sink);
    }

    let db = Database::open(&path).expect("Should reopen database");
    let results = db.list_exercise_results("sqlite").unwrap();
    assert_eq!(results.len(), 10);
    assert_eq!(results[0].0, 0);
    assert_eq!(results[9].0, 1);

    let efforts = db.list_efforts("sqlite").unwrap();
    assert_eq!(efforts.len(), 1);
    assert_eq!(efforts[0].rpe, 9);
    assert_eq!(efforts[0].category, "strength");
    assert_eq!(efforts[0].training_load(), 9);

    let progress = db.get_progress("sqlite").unwrap().unwrap();
    assert_eq!(progress.completion_percentage, 100.0);
}

#[tokio::test]
async fn test_writer_survives_failing_sink() {
    let sink = Arc::new(FailingSink::default());
    let writer = CheckpointWriter::spawn(sink.clone(), Duration::from_secs(60));

    let mut session = open("writer");
    session.start().unwrap();
    for _ in 0..3 {
        session.advance().unwrap();
        writer.submit_all(session.take_persistence());
    }
    writer.shutdown().await;

    // Three results plus one coalesced checkpoint flushed at shutdown
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 4);
}
