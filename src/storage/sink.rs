//! Persistence boundary for workout sessions.
//!
//! The execution engine never waits on these calls: it queues
//! `PersistRequest`s and whoever drains them logs failures and moves on.

use crate::storage::database::Database;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Durable session position, upserted on every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressCheckpoint {
    pub current_exercise_index: usize,
    pub current_set: u32,
    pub current_rep: u32,
    #[serde(default = "first_round")]
    pub current_round: u32,
    pub completed_exercises: Vec<usize>,
    pub completion_percentage: f32,
}

fn first_round() -> u32 {
    1
}

/// Result of one completed unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseResult {
    pub reps_completed: Option<u32>,
    pub sets_completed: Option<u32>,
    pub time_minutes: Option<u32>,
    pub time_seconds: Option<u32>,
    pub time_hundredths: Option<u32>,
    pub notes: String,
}

impl ExerciseResult {
    /// Result for a rep/set based exercise.
    pub fn counts(reps: u32, sets: u32, notes: String) -> Self {
        Self {
            reps_completed: Some(reps),
            sets_completed: Some(sets),
            notes,
            ..Default::default()
        }
    }

    /// Result for a running-pattern exercise: a time of performance.
    ///
    /// Times beyond `u32::MAX` hundredths are clamped.
    pub fn timed(time: Duration, notes: String) -> Self {
        let hundredths = u32::try_from(time.as_millis() / 10).unwrap_or(u32::MAX);
        Self {
            time_minutes: Some(hundredths / 6000),
            time_seconds: Some((hundredths / 100) % 60),
            time_hundredths: Some(hundredths % 100),
            notes,
            ..Default::default()
        }
    }
}

/// Session effort rating feeding training-load calculations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortEntry {
    /// 1-10
    pub rpe: u8,
    /// Always >= 1
    pub duration_minutes: u32,
    pub category: String,
}

impl EffortEntry {
    /// Session-RPE training load (RPE x minutes).
    pub fn training_load(&self) -> u32 {
        u32::from(self.rpe).saturating_mul(self.duration_minutes)
    }
}

/// Errors from persistence backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Lock failed: {0}")]
    LockFailed(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Destination for session progress, results and effort.
pub trait WorkoutSink: Send + Sync {
    /// Idempotent upsert keyed by session id.
    fn save_progress(
        &self,
        session_id: &str,
        checkpoint: &ProgressCheckpoint,
    ) -> Result<(), StorageError>;

    fn save_exercise_result(
        &self,
        session_id: &str,
        exercise_index: usize,
        result: &ExerciseResult,
    ) -> Result<(), StorageError>;

    fn save_effort(&self, session_id: &str, effort: &EffortEntry) -> Result<(), StorageError>;

    /// Last checkpoint for a session, for resuming.
    fn load_progress(&self, session_id: &str) -> Result<Option<ProgressCheckpoint>, StorageError>;
}

/// A queued write produced by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistRequest {
    Progress {
        session_id: String,
        checkpoint: ProgressCheckpoint,
    },
    ExerciseResult {
        session_id: String,
        exercise_index: usize,
        result: ExerciseResult,
    },
    Effort {
        session_id: String,
        effort: EffortEntry,
    },
}

impl PersistRequest {
    /// Perform the write against a sink.
    pub fn apply(&self, sink: &dyn WorkoutSink) -> Result<(), StorageError> {
        match self {
            PersistRequest::Progress {
                session_id,
                checkpoint,
            } => sink.save_progress(session_id, checkpoint),
            PersistRequest::ExerciseResult {
                session_id,
                exercise_index,
                result,
            } => sink.save_exercise_result(session_id, *exercise_index, result),
            PersistRequest::Effort { session_id, effort } => sink.save_effort(session_id, effort),
        }
    }

    /// Perform the write, logging instead of failing.
    pub fn apply_logged(&self, sink: &dyn WorkoutSink) {
        if let Err(e) = self.apply(sink) {
            tracing::warn!("Failed to persist {}: {}", self.kind(), e);
        }
    }

    pub fn is_progress(&self) -> bool {
        matches!(self, PersistRequest::Progress { .. })
    }

    fn kind(&self) -> &'static str {
        match self {
            PersistRequest::Progress { .. } => "progress checkpoint",
            PersistRequest::ExerciseResult { .. } => "exercise result",
            PersistRequest::Effort { .. } => "effort entry",
        }
    }
}

/// Keep only the newest progress checkpoint, preserving the order of other writes.
pub fn coalesce_progress(requests: Vec<PersistRequest>) -> Vec<PersistRequest> {
    let last_progress = requests.iter().rposition(PersistRequest::is_progress);
    requests
        .into_iter()
        .enumerate()
        .filter(|(i, r)| !r.is_progress() || Some(*i) == last_progress)
        .map(|(_, r)| r)
        .collect()
}

#[derive(Debug, Default)]
struct MemoryRecords {
    progress: HashMap<String, ProgressCheckpoint>,
    results: Vec<(String, usize, ExerciseResult)>,
    efforts: Vec<(String, EffortEntry)>,
    progress_writes: usize,
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<MemoryRecords>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryRecords>, StorageError> {
        self.records
            .lock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))
    }

    /// Saved results for a session, in write order.
    pub fn results(&self, session_id: &str) -> Vec<(usize, ExerciseResult)> {
        self.lock()
            .map(|r| {
                r.results
                    .iter()
                    .filter(|(id, _, _)| id == session_id)
                    .map(|(_, index, result)| (*index, result.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Saved effort entries for a session.
    pub fn efforts(&self, session_id: &str) -> Vec<EffortEntry> {
        self.lock()
            .map(|r| {
                r.efforts
                    .iter()
                    .filter(|(id, _)| id == session_id)
                    .map(|(_, e)| e.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of progress upserts received.
    pub fn progress_writes(&self) -> usize {
        self.lock().map(|r| r.progress_writes).unwrap_or(0)
    }
}

impl WorkoutSink for MemorySink {
    fn save_progress(
        &self,
        session_id: &str,
        checkpoint: &ProgressCheckpoint,
    ) -> Result<(), StorageError> {
        let mut records = self.lock()?;
        records
            .progress
            .insert(session_id.to_string(), checkpoint.clone());
        records.progress_writes += 1;
        Ok(())
    }

    fn save_exercise_result(
        &self,
        session_id: &str,
        exercise_index: usize,
        result: &ExerciseResult,
    ) -> Result<(), StorageError> {
        self.lock()?
            .results
            .push((session_id.to_string(), exercise_index, result.clone()));
        Ok(())
    }

    fn save_effort(&self, session_id: &str, effort: &EffortEntry) -> Result<(), StorageError> {
        self.lock()?
            .efforts
            .push((session_id.to_string(), effort.clone()));
        Ok(())
    }

    fn load_progress(&self, session_id: &str) -> Result<Option<ProgressCheckpoint>, StorageError> {
        Ok(self.lock()?.progress.get(session_id).cloned())
    }
}

/// SQLite-backed sink sharing a database handle.
#[derive(Clone)]
pub struct DatabaseSink {
    db: Arc<Mutex<Database>>,
}

impl DatabaseSink {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let guard = self
            .db
            .lock()
            .map_err(|e| StorageError::LockFailed(format!("Database lock failed: {}", e)))?;
        f(&guard)
    }
}

impl WorkoutSink for DatabaseSink {
    fn save_progress(
        &self,
        session_id: &str,
        checkpoint: &ProgressCheckpoint,
    ) -> Result<(), StorageError> {
        self.with_db(|db| db.upsert_progress(session_id, checkpoint))
    }

    fn save_exercise_result(
        &self,
        session_id: &str,
        exercise_index: usize,
        result: &ExerciseResult,
    ) -> Result<(), StorageError> {
        self.with_db(|db| db.insert_exercise_result(session_id, exercise_index, result))
    }

    fn save_effort(&self, session_id: &str, effort: &EffortEntry) -> Result<(), StorageError> {
        self.with_db(|db| db.insert_effort(session_id, effort))
    }

    fn load_progress(&self, session_id: &str) -> Result<Option<ProgressCheckpoint>, StorageError> {
        self.with_db(|db| db.get_progress(session_id))
    }
}
