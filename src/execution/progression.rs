//! Progression engine: next/previous unit of work for each workout shape.
//!
//! Strategies are pure: they read the current position and the plan and
//! return where to go next along with the rest that applies. Applying the
//! result (timers, events, persistence) is the session's job.

use crate::execution::plan::{PlanShape, PlannedExercise, WorkoutPlan};
use crate::execution::types::Position;

/// Rest after an exercise when nothing more specific is configured.
pub const DEFAULT_EXERCISE_REST_SECONDS: u32 = 90;

/// What kind of boundary an advance crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Next rep of the same set
    Rep,
    /// First rep of the next set
    Set,
    /// First unit of the next exercise
    Exercise,
    /// First exercise of the next circuit round
    Round,
}

/// A non-terminal advance.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub kind: TransitionKind,
    pub position: Position,
    /// Rest before the next unit; 0 goes straight to the countdown
    pub rest_seconds: u32,
    /// Label of the block being entered, when a block boundary was crossed
    pub next_block: Option<String>,
}

/// Result of an advance.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Continue(Transition),
    /// Last unit of the workout finished
    Complete,
}

/// Progression rules for one workout shape.
pub trait FlowStrategy: Send + Sync {
    /// Position after the current unit of work is done.
    fn advance(&self, position: &Position, plan: &WorkoutPlan, default_rest: u32) -> Step;

    /// Position before the current one, or `None` at the very first unit.
    fn retreat(&self, position: &Position, plan: &WorkoutPlan) -> Option<Position>;
}

/// Sequential flow, also used for block-based plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialFlow;

/// Circuit flow: one pass over every exercise per round.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitFlow;

static SEQUENTIAL: SequentialFlow = SequentialFlow;
static CIRCUIT: CircuitFlow = CircuitFlow;

/// Select the strategy for a plan.
pub fn strategy_for(plan: &WorkoutPlan) -> &'static dyn FlowStrategy {
    match plan.shape() {
        PlanShape::Circuit { .. } => &CIRCUIT,
        PlanShape::Sequential | PlanShape::Blocks => &SEQUENTIAL,
    }
}

/// Rest after finishing a set: the exercise's own value, else its block's.
fn set_rest(planned: &PlannedExercise) -> u32 {
    planned
        .unit
        .rest_seconds
        .or_else(|| planned.block.as_ref().and_then(|b| b.rest_between_exercises))
        .unwrap_or(0)
}

/// Rest after finishing an exercise: first configured value, else the default.
///
/// As with `set_rest`, an explicit 0 means no rest.
fn exercise_rest(planned: &PlannedExercise, default_rest: u32) -> u32 {
    [
        planned.unit.rest_between_exercises_seconds,
        planned.unit.rest_seconds,
        planned.block.as_ref().and_then(|b| b.rest_between_exercises),
    ]
    .into_iter()
    .flatten()
    .next()
    .unwrap_or(default_rest)
}

impl FlowStrategy for SequentialFlow {
    fn advance(&self, position: &Position, plan: &WorkoutPlan, default_rest: u32) -> Step {
        let Some(planned) = plan.exercise(position.exercise_index) else {
            return Step::Complete;
        };
        let unit = &planned.unit;

        if position.rep < unit.reps {
            return Step::Continue(Transition {
                kind: TransitionKind::Rep,
                position: Position {
                    rep: position.rep + 1,
                    ..*position
                },
                rest_seconds: unit.rest_between_reps_seconds.unwrap_or(0),
                next_block: None,
            });
        }

        if position.set < unit.sets {
            return Step::Continue(Transition {
                kind: TransitionKind::Set,
                position: Position {
                    set: position.set + 1,
                    rep: 1,
                    ..*position
                },
                rest_seconds: set_rest(planned),
                next_block: None,
            });
        }

        let next_index = position.exercise_index + 1;
        let Some(next) = plan.exercise(next_index) else {
            return Step::Complete;
        };

        let next_block = match (&next.block, planned.block_index()) {
            (Some(block), current) if Some(block.index) != current => Some(block.label.clone()),
            _ => None,
        };

        Step::Continue(Transition {
            kind: TransitionKind::Exercise,
            position: Position {
                exercise_index: next_index,
                set: 1,
                rep: 1,
                round: position.round,
            },
            rest_seconds: exercise_rest(planned, default_rest),
            next_block,
        })
    }

    fn retreat(&self, position: &Position, plan: &WorkoutPlan) -> Option<Position> {
        if position.rep > 1 {
            return Some(Position {
                rep: position.rep - 1,
                ..*position
            });
        }

        if position.set > 1 {
            let reps = plan
                .exercise(position.exercise_index)
                .map(|p| p.unit.reps)
                .unwrap_or(1);
            return Some(Position {
                set: position.set - 1,
                rep: reps,
                ..*position
            });
        }

        let previous_index = position.exercise_index.checked_sub(1)?;
        let previous = plan.exercise(previous_index)?;
        Some(Position {
            exercise_index: previous_index,
            set: previous.unit.sets,
            rep: previous.unit.reps,
            round: position.round,
        })
    }
}

impl FlowStrategy for CircuitFlow {
    fn advance(&self, position: &Position, plan: &WorkoutPlan, _default_rest: u32) -> Step {
        let next_index = position.exercise_index + 1;

        if next_index < plan.len() {
            let rest_seconds = plan
                .exercise(position.exercise_index)
                .and_then(|p| p.unit.rest_seconds)
                .unwrap_or(0);
            return Step::Continue(Transition {
                kind: TransitionKind::Exercise,
                position: Position {
                    exercise_index: next_index,
                    set: 1,
                    rep: 1,
                    round: position.round,
                },
                rest_seconds,
                next_block: None,
            });
        }

        if position.round < plan.rounds() {
            return Step::Continue(Transition {
                kind: TransitionKind::Round,
                position: Position {
                    exercise_index: 0,
                    set: 1,
                    rep: 1,
                    round: position.round + 1,
                },
                rest_seconds: 0,
                next_block: None,
            });
        }

        Step::Complete
    }

    fn retreat(&self, position: &Position, plan: &WorkoutPlan) -> Option<Position> {
        if position.exercise_index > 0 {
            return Some(Position {
                exercise_index: position.exercise_index - 1,
                set: 1,
                rep: 1,
                round: position.round,
            });
        }

        if position.round > 1 {
            return Some(Position {
                exercise_index: plan.len().saturating_sub(1),
                set: 1,
                rep: 1,
                round: position.round - 1,
            });
        }

        None
    }
}
