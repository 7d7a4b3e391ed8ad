//! Completion percentage for a workout in progress.
//!
//! A unit of work counts as completed once its "done" action has been
//! recorded, i.e. once the pointer has moved past it.

use crate::execution::plan::{PlanShape, WorkoutPlan};
use crate::execution::types::{ExecutionState, Phase};
use serde::{Deserialize, Serialize};

/// Completion of a workout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub completed_units: u64,
    pub total_units: u64,
    /// 0.0 to 100.0
    pub percentage: f32,
}

impl Progress {
    fn new(completed_units: u64, total_units: u64) -> Self {
        let percentage = if total_units == 0 {
            0.0
        } else {
            ((completed_units as f64 / total_units as f64 * 100.0) as f32).clamp(0.0, 100.0)
        };

        Self {
            completed_units: completed_units.min(total_units),
            total_units,
            percentage,
        }
    }

    fn complete(total_units: u64) -> Self {
        Self {
            completed_units: total_units,
            total_units,
            percentage: 100.0,
        }
    }

    /// Percentage rounded to a whole number.
    pub fn percentage_rounded(&self) -> u8 {
        self.percentage.round() as u8
    }

    pub fn is_complete(&self) -> bool {
        self.percentage >= 100.0
    }
}

/// Compute completion for a plan at the given state.
///
/// The RPE phase is always exactly 100%.
pub fn compute_progress(plan: &WorkoutPlan, state: &ExecutionState) -> Progress {
    let progress = match plan.shape() {
        PlanShape::Circuit { rounds } => circuit_progress(plan, state, rounds),
        PlanShape::Sequential | PlanShape::Blocks => sequential_progress(plan, state),
    };

    if state.phase == Phase::Rpe {
        Progress::complete(progress.total_units)
    } else {
        progress
    }
}

/// Progress for a workout that has finished.
pub fn completed_progress(plan: &WorkoutPlan) -> Progress {
    let total = match plan.shape() {
        PlanShape::Circuit { rounds } => (plan.len() as u64).saturating_mul(u64::from(rounds)),
        PlanShape::Sequential | PlanShape::Blocks => sum_units(plan, plan.len()),
    };
    Progress::complete(total)
}

/// Units in the first `count` exercises. Saturates instead of wrapping.
fn sum_units(plan: &WorkoutPlan, count: usize) -> u64 {
    plan.exercises()
        .iter()
        .take(count)
        .fold(0u64, |acc, e| acc.saturating_add(e.unit.total_units()))
}

fn sequential_progress(plan: &WorkoutPlan, state: &ExecutionState) -> Progress {
    let total = sum_units(plan, plan.len());
    let before = sum_units(plan, state.global_exercise_index);

    let current = plan
        .exercise(state.global_exercise_index)
        .map(|e| {
            u64::from(state.current_set.saturating_sub(1))
                .saturating_mul(u64::from(e.unit.reps))
                .saturating_add(u64::from(state.current_rep.saturating_sub(1)))
        })
        .unwrap_or(0);

    Progress::new(before.saturating_add(current), total)
}

fn circuit_progress(plan: &WorkoutPlan, state: &ExecutionState, rounds: u32) -> Progress {
    let count = plan.len() as u64;
    let total = count.saturating_mul(u64::from(rounds));
    let completed = u64::from(state.current_round.saturating_sub(1))
        .saturating_mul(count)
        .saturating_add(state.global_exercise_index as u64);
    Progress::new(completed, total)
}
