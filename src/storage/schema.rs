//! Database schema definitions for session persistence.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Session progress checkpoints (one row per session)
CREATE TABLE IF NOT EXISTS session_progress (
    session_id TEXT PRIMARY KEY,
    current_exercise_index INTEGER NOT NULL,
    current_set INTEGER NOT NULL,
    current_rep INTEGER NOT NULL,
    current_round INTEGER NOT NULL DEFAULT 1,
    completed_exercises_json TEXT NOT NULL,
    completion_percentage REAL NOT NULL,
    updated_at TEXT NOT NULL
);

-- Per-unit exercise results
CREATE TABLE IF NOT EXISTS exercise_results (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    exercise_index INTEGER NOT NULL,
    reps_completed INTEGER,
    sets_completed INTEGER,
    time_minutes INTEGER,
    time_seconds INTEGER,
    time_hundredths INTEGER,
    notes TEXT NOT NULL DEFAULT '',
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_exercise_results_session ON exercise_results(session_id);

-- Session RPE / training load
CREATE TABLE IF NOT EXISTS training_load (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    rpe INTEGER NOT NULL CHECK (rpe BETWEEN 1 AND 10),
    duration_minutes INTEGER NOT NULL CHECK (duration_minutes >= 1),
    load INTEGER NOT NULL,
    category TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_training_load_session ON training_load(session_id);
"#;

/// Schema version tracking table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;
