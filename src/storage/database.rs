//! Database operations using rusqlite.
//!
//! Stores session checkpoints, per-unit exercise results and training-load
//! entries.

use crate::storage::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE};
use crate::storage::sink::{EffortEntry, ExerciseResult, ProgressCheckpoint, StorageError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;
use uuid::Uuid;

/// Database wrapper for SQLite operations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::IoError(e.to_string()))?;
        }

        let conn =
            Connection::open(path).map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        let current_version = self.get_schema_version()?;

        if current_version < CURRENT_VERSION {
            self.migrate(current_version)?;
        }

        Ok(())
    }

    /// Get the current schema version.
    fn get_schema_version(&self) -> Result<i32, StorageError> {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(StorageError::QueryFailed(e.to_string())),
        }
    }

    /// Run database migrations.
    fn migrate(&self, from_version: i32) -> Result<(), StorageError> {
        if from_version < 1 {
            self.conn
                .execute_batch(SCHEMA)
                .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

            self.conn
                .execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
                    [CURRENT_VERSION],
                )
                .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

            tracing::info!("Database migrated to version {}", CURRENT_VERSION);
        }

        Ok(())
    }

    // ========== Session progress ==========

    /// Insert or replace the checkpoint for a session.
    pub fn upsert_progress(
        &self,
        session_id: &str,
        checkpoint: &ProgressCheckpoint,
    ) -> Result<(), StorageError> {
        let completed_json = serde_json::to_string(&checkpoint.completed_exercises)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO session_progress (session_id, current_exercise_index, current_set,
                 current_rep, current_round, completed_exercises_json, completion_percentage, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(session_id) DO UPDATE SET
                    current_exercise_index = excluded.current_exercise_index,
                    current_set = excluded.current_set,
                    current_rep = excluded.current_rep,
                    current_round = excluded.current_round,
                    completed_exercises_json = excluded.completed_exercises_json,
                    completion_percentage = excluded.completion_percentage,
                    updated_at = excluded.updated_at",
                params![
                    session_id,
                    checkpoint.current_exercise_index as i64,
                    checkpoint.current_set,
                    checkpoint.current_rep,
                    checkpoint.current_round,
                    completed_json,
                    checkpoint.completion_percentage as f64,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Get the checkpoint for a session.
    pub fn get_progress(&self, session_id: &str) -> Result<Option<ProgressCheckpoint>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT current_exercise_index, current_set, current_rep, current_round,
                 completed_exercises_json, completion_percentage
                 FROM session_progress WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, f64>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let Some((index, set, rep, round, completed_json, percentage)) = row else {
            return Ok(None);
        };

        let completed_exercises: Vec<usize> = serde_json::from_str(&completed_json)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        Ok(Some(ProgressCheckpoint {
            current_exercise_index: index.max(0) as usize,
            current_set: set,
            current_rep: rep,
            current_round: round,
            completed_exercises,
            completion_percentage: percentage as f32,
        }))
    }

    // ========== Exercise results ==========

    /// Insert a result for one completed unit of work.
    pub fn insert_exercise_result(
        &self,
        session_id: &str,
        exercise_index: usize,
        result: &ExerciseResult,
    ) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO exercise_results (id, session_id, exercise_index, reps_completed,
                 sets_completed, time_minutes, time_seconds, time_hundredths, notes, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    Uuid::new_v4().to_string(),
                    session_id,
                    exercise_index as i64,
                    result.reps_completed,
                    result.sets_completed,
                    result.time_minutes,
                    result.time_seconds,
                    result.time_hundredths,
                    result.notes,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// List results for a session in recording order.
    pub fn list_exercise_results(
        &self,
        session_id: &str,
    ) -> Result<Vec<(usize, ExerciseResult)>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT exercise_index, reps_completed, sets_completed, time_minutes,
                 time_seconds, time_hundredths, notes
                 FROM exercise_results WHERE session_id = ?1 ORDER BY rowid",
            )
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?.max(0) as usize,
                    ExerciseResult {
                        reps_completed: row.get(1)?,
                        sets_completed: row.get(2)?,
                        time_minutes: row.get(3)?,
                        time_seconds: row.get(4)?,
                        time_hundredths: row.get(5)?,
                        notes: row.get(6)?,
                    },
                ))
            })
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| StorageError::QueryFailed(e.to_string()))?);
        }
        Ok(results)
    }

    // ========== Training load ==========

    /// Insert a session effort entry.
    pub fn insert_effort(&self, session_id: &str, effort: &EffortEntry) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO training_load (id, session_id, rpe, duration_minutes, load, category, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    Uuid::new_v4().to_string(),
                    session_id,
                    effort.rpe,
                    effort.duration_minutes,
                    effort.training_load(),
                    effort.category,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// List effort entries for a session.
    pub fn list_efforts(&self, session_id: &str) -> Result<Vec<EffortEntry>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT rpe, duration_minutes, category FROM training_load
                 WHERE session_id = ?1 ORDER BY rowid",
            )
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(EffortEntry {
                    rpe: row.get(0)?,
                    duration_minutes: row.get(1)?,
                    category: row.get(2)?,
                })
            })
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let mut efforts = Vec::new();
        for row in rows {
            efforts.push(row.map_err(|e| StorageError::QueryFailed(e.to_string()))?);
        }
        Ok(efforts)
    }
}
