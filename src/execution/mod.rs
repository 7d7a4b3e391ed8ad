//! Workout execution engine.
//!
//! Turns a workout plan into a running session: the progression pointer,
//! the countdown/rest/active timers, progress reporting and the RPE gate.

pub mod catalog;
pub mod plan;
pub mod progress;
pub mod progression;
pub mod session;
pub mod timer;
pub mod types;

pub use catalog::{is_running_exercise, video_url};
pub use plan::{BlockContext, PlanShape, PlannedExercise, WorkoutDefinition, WorkoutPlan};
pub use progress::{compute_progress, Progress};
pub use progression::{FlowStrategy, Step, Transition, TransitionKind};
pub use session::{
    resume_position, CompletedUnit, CompletionReport, ExecutionSession, SessionEvent,
};
pub use timer::{TickOutcome, TimerController, TimerKind};
pub use types::{
    Block, ExecutionError, ExecutionState, ExerciseUnit, FlowType, Phase, Position,
};
