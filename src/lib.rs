//! RepFlow - Workout Execution Engine
//!
//! Runs structured strength and conditioning workouts: sets, reps, rounds
//! and blocks with get-ready countdowns, rest timers, progress tracking and
//! an effort rating at the end. Progress is checkpointed to SQLite so an
//! interrupted session can be resumed.

pub mod execution;
pub mod runtime;
pub mod storage;

// Re-export commonly used types
pub use execution::session::ExecutionSession;
pub use execution::plan::WorkoutPlan;
pub use runtime::SessionRunner;
pub use storage::config::AppConfig;
pub use storage::sink::WorkoutSink;
