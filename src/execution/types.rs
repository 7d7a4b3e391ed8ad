//! Execution types and enums.
//!
//! Exercise and block definitions as authored by a coach, the mutable
//! per-session execution state, and the error type shared by the engine.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Flow type of a workout or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    /// All sets of one exercise before moving on
    #[default]
    Sequential,
    /// One pass through every exercise per round
    Circuit,
    /// Paired exercises, alternated
    Superset,
    /// Every minute on the minute
    Emom,
    /// As many rounds as possible
    Amrap,
}

impl std::fmt::Display for FlowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowType::Sequential => write!(f, "Sequential"),
            FlowType::Circuit => write!(f, "Circuit"),
            FlowType::Superset => write!(f, "Superset"),
            FlowType::Emom => write!(f, "EMOM"),
            FlowType::Amrap => write!(f, "AMRAP"),
        }
    }
}

/// One exercise occurrence within a workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseUnit {
    /// Display name, also used for running-pattern and media lookup
    pub name: String,
    /// Number of sets (always >= 1)
    #[serde(default = "one", deserialize_with = "lenient_positive")]
    pub sets: u32,
    /// Reps per set (always >= 1)
    #[serde(default = "one", deserialize_with = "lenient_positive")]
    pub reps: u32,
    /// Rest after completing a set
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub rest_seconds: Option<u32>,
    /// Rest after the whole exercise is finished
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub rest_between_exercises_seconds: Option<u32>,
    /// Rest between reps of the same set
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub rest_between_reps_seconds: Option<u32>,
    /// Fixed work duration; the active timer counts down from this value
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub duration_seconds: Option<u32>,
    /// Prescribed load
    #[serde(default)]
    pub weight: Option<String>,
    /// Prescribed distance
    #[serde(default)]
    pub distance: Option<String>,
    /// Coach notes
    #[serde(default)]
    pub notes: Option<String>,
}

impl ExerciseUnit {
    /// Create an exercise with the given sets and reps and no rest.
    pub fn new(name: impl Into<String>, sets: u32, reps: u32) -> Self {
        Self {
            name: name.into(),
            sets: sets.max(1),
            reps: reps.max(1),
            rest_seconds: None,
            rest_between_exercises_seconds: None,
            rest_between_reps_seconds: None,
            duration_seconds: None,
            weight: None,
            distance: None,
            notes: None,
        }
    }

    /// Set the rest after each set.
    pub fn with_rest(mut self, seconds: u32) -> Self {
        self.rest_seconds = Some(seconds);
        self
    }

    /// Set the rest after the exercise is finished.
    pub fn with_rest_between_exercises(mut self, seconds: u32) -> Self {
        self.rest_between_exercises_seconds = Some(seconds);
        self
    }

    /// Set the rest between reps.
    pub fn with_rest_between_reps(mut self, seconds: u32) -> Self {
        self.rest_between_reps_seconds = Some(seconds);
        self
    }

    /// Make this a timed exercise.
    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds).filter(|s| *s > 0);
        self
    }

    /// Total units of work (sets x reps).
    pub fn total_units(&self) -> u64 {
        u64::from(self.sets) * u64::from(self.reps)
    }
}

/// A named group of exercises sharing a flow type and rest defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exercises: Vec<ExerciseUnit>,
    #[serde(default)]
    pub flow: FlowType,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub rounds: Option<u32>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub rest_between_exercises: Option<u32>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub rest_between_rounds: Option<u32>,
    /// Carried for display; block boundaries do not change rest math
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub rest_after_block: Option<u32>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Block {
    /// Create a sequential block.
    pub fn new(id: impl Into<String>, name: Option<&str>, exercises: Vec<ExerciseUnit>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
            exercises,
            flow: FlowType::Sequential,
            rounds: None,
            rest_between_exercises: None,
            rest_between_rounds: None,
            rest_after_block: None,
            category: None,
        }
    }

    /// Label shown for this block, falling back to its id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Execution phase. Exactly one is current at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Session not running (before start or after close)
    #[default]
    Idle,
    /// Get-ready countdown before work
    Countdown,
    /// Working; the main timer runs
    Active,
    /// Rest countdown between units of work
    Resting,
    /// Waiting for an effort rating
    Rpe,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Countdown => write!(f, "Countdown"),
            Phase::Active => write!(f, "Active"),
            Phase::Resting => write!(f, "Resting"),
            Phase::Rpe => write!(f, "RPE"),
        }
    }
}

/// Pointer into the workout: which exercise, set, rep and round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub exercise_index: usize,
    pub set: u32,
    pub rep: u32,
    pub round: u32,
}

impl Position {
    /// The first unit of work.
    pub fn start() -> Self {
        Self {
            exercise_index: 0,
            set: 1,
            rep: 1,
            round: 1,
        }
    }

    /// Whether this is the very first unit of work.
    pub fn is_start(&self) -> bool {
        *self == Self::start()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

/// Mutable state of one in-progress workout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Index into the flattened exercise list
    pub global_exercise_index: usize,
    pub current_set: u32,
    pub current_rep: u32,
    /// Circuit workouts only; 1 otherwise
    pub current_round: u32,
    /// Active work timer for the current unit
    pub elapsed_seconds: u32,
    pub phase: Phase,
    pub countdown_remaining: u32,
    pub rest_remaining: u32,
    /// Remaining work time for timed exercises
    pub timed_remaining: Option<u32>,
    /// Manual pause of the active timer
    pub paused: bool,
    pub selected_rpe: Option<u8>,
}

impl ExecutionState {
    /// Fresh state at the start of the workout.
    pub fn new() -> Self {
        Self::at(Position::start())
    }

    /// Fresh state at the given position.
    pub fn at(position: Position) -> Self {
        Self {
            global_exercise_index: position.exercise_index,
            current_set: position.set,
            current_rep: position.rep,
            current_round: position.round,
            elapsed_seconds: 0,
            phase: Phase::Idle,
            countdown_remaining: 0,
            rest_remaining: 0,
            timed_remaining: None,
            paused: false,
            selected_rpe: None,
        }
    }

    /// Current pointer.
    pub fn position(&self) -> Position {
        Position {
            exercise_index: self.global_exercise_index,
            set: self.current_set,
            rep: self.current_rep,
            round: self.current_round,
        }
    }

    /// Move the pointer. A new unit of work always starts a fresh timer.
    pub fn move_to(&mut self, position: Position) {
        self.global_exercise_index = position.exercise_index;
        self.current_set = position.set;
        self.current_rep = position.rep;
        self.current_round = position.round;
        self.elapsed_seconds = 0;
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors related to workout execution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// Workout has no exercises or blocks
    #[error("Workout has no exercises")]
    NoExercises,

    /// Invalid workout structure
    #[error("Invalid workout: {0}")]
    InvalidWorkout(String),

    /// Session has not been started
    #[error("Session not started")]
    NotStarted,

    /// Session was closed
    #[error("Session closed")]
    SessionClosed,

    /// Session already started
    #[error("Session already started")]
    AlreadyStarted,

    /// Workout already finished; waiting for an effort rating
    #[error("Workout already complete")]
    WorkoutComplete,

    /// Effort rating outside 1-10
    #[error("Invalid RPE value: {0} (expected 1-10)")]
    InvalidRpe(u8),

    /// Effort action outside the RPE phase
    #[error("Not in RPE phase")]
    NotInRpePhase,

    /// Submit without a selected rating
    #[error("No RPE value selected")]
    RpeNotSelected,
}

fn one() -> u32 {
    1
}

/// Parse a positive integer from loosely typed source data.
///
/// Numbers and numeric strings are accepted; fractional values are
/// truncated. Anything else, zero or negative yields `None`.
pub fn parse_positive_int(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !number.is_finite() {
        return None;
    }

    let truncated = number.trunc();
    if truncated < 1.0 {
        None
    } else {
        Some(truncated.min(u32::MAX as f64) as u32)
    }
}

/// Parse a non-negative integer (rest/duration seconds) from loosely typed data.
pub fn parse_seconds(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) if n.as_f64() == Some(0.0) => Some(0),
        Value::String(s) if s.trim() == "0" => Some(0),
        other => parse_positive_int(other),
    }
}

fn lenient_positive<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_positive_int(&value).unwrap_or(1))
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_seconds(&value))
}
