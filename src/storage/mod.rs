//! Storage module for session persistence and configuration.

pub mod checkpoint;
pub mod config;
pub mod database;
pub mod schema;
pub mod sink;

pub use checkpoint::CheckpointWriter;
pub use config::{AppConfig, ConfigError, EngineConfig};
pub use database::Database;
pub use sink::{
    DatabaseSink, EffortEntry, ExerciseResult, MemorySink, PersistRequest, ProgressCheckpoint,
    StorageError, WorkoutSink,
};
