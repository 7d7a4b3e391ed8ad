//! Workout definitions and their validated, flattened execution plan.

use crate::execution::types::{parse_positive_int, Block, ExecutionError, ExerciseUnit, FlowType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default effort category when neither the workout nor its blocks name one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Workout as supplied by the caller (JSON-compatible).
///
/// Exactly one of `exercises` or `blocks` must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkoutDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub exercises: Option<Vec<ExerciseUnit>>,
    #[serde(default)]
    pub blocks: Option<Vec<Block>>,
    #[serde(default)]
    pub flow_type: FlowType,
    #[serde(default)]
    pub circuit_rounds: Option<Value>,
}

impl WorkoutDefinition {
    /// Parse a definition from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ExecutionError> {
        serde_json::from_str(json).map_err(|e| ExecutionError::InvalidWorkout(e.to_string()))
    }
}

/// Shape of a validated workout; selects the progression strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanShape {
    /// Flat list, all sets of an exercise before the next
    Sequential,
    /// Flat list cycled once per round
    Circuit { rounds: u32 },
    /// Blocks flattened in order, executed sequentially
    Blocks,
}

/// Block an exercise belongs to, as seen from the flattened list.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockContext {
    pub index: usize,
    pub id: String,
    pub label: String,
    pub rest_between_exercises: Option<u32>,
    pub category: Option<String>,
}

/// An exercise resolved through block flattening.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedExercise {
    pub unit: ExerciseUnit,
    pub block: Option<BlockContext>,
}

impl PlannedExercise {
    /// Index of the owning block, if any.
    pub fn block_index(&self) -> Option<usize> {
        self.block.as_ref().map(|b| b.index)
    }
}

/// A validated workout ready for execution.
#[derive(Debug, Clone)]
pub struct WorkoutPlan {
    name: String,
    category: Option<String>,
    shape: PlanShape,
    exercises: Vec<PlannedExercise>,
}

impl WorkoutPlan {
    /// Flat sequential workout.
    pub fn sequential(name: &str, exercises: Vec<ExerciseUnit>) -> Result<Self, ExecutionError> {
        Self::flat(name, exercises, PlanShape::Sequential)
    }

    /// Flat circuit workout.
    pub fn circuit(
        name: &str,
        exercises: Vec<ExerciseUnit>,
        rounds: u32,
    ) -> Result<Self, ExecutionError> {
        Self::flat(
            name,
            exercises,
            PlanShape::Circuit {
                rounds: rounds.max(1),
            },
        )
    }

    fn flat(name: &str, exercises: Vec<ExerciseUnit>, shape: PlanShape) -> Result<Self, ExecutionError> {
        if exercises.is_empty() {
            return Err(ExecutionError::NoExercises);
        }

        Ok(Self {
            name: name.to_string(),
            category: None,
            shape,
            exercises: exercises
                .into_iter()
                .map(|unit| PlannedExercise { unit, block: None })
                .collect(),
        })
    }

    /// Block-based workout; exercises are flattened in block order.
    pub fn blocks(name: &str, blocks: Vec<Block>) -> Result<Self, ExecutionError> {
        let exercises: Vec<PlannedExercise> = blocks
            .into_iter()
            .enumerate()
            .flat_map(|(index, block)| {
                let context = BlockContext {
                    index,
                    id: block.id.clone(),
                    label: block.label().to_string(),
                    rest_between_exercises: block.rest_between_exercises,
                    category: block.category.clone(),
                };
                block.exercises.into_iter().map(move |unit| PlannedExercise {
                    unit,
                    block: Some(context.clone()),
                })
            })
            .collect();

        if exercises.is_empty() {
            return Err(ExecutionError::NoExercises);
        }

        Ok(Self {
            name: name.to_string(),
            category: None,
            shape: PlanShape::Blocks,
            exercises,
        })
    }

    /// Set the effort category reported at completion.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> PlanShape {
        self.shape
    }

    /// Number of rounds (1 for non-circuit workouts).
    pub fn rounds(&self) -> u32 {
        match self.shape {
            PlanShape::Circuit { rounds } => rounds,
            _ => 1,
        }
    }

    /// Flattened exercise list.
    pub fn exercises(&self) -> &[PlannedExercise] {
        &self.exercises
    }

    pub fn exercise(&self, index: usize) -> Option<&PlannedExercise> {
        self.exercises.get(index)
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Effort category: workout category, else first block category, else "general".
    pub fn category(&self) -> String {
        self.category
            .clone()
            .or_else(|| {
                self.exercises
                    .iter()
                    .find_map(|e| e.block.as_ref().and_then(|b| b.category.clone()))
            })
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
    }
}

impl TryFrom<WorkoutDefinition> for WorkoutPlan {
    type Error = ExecutionError;

    fn try_from(definition: WorkoutDefinition) -> Result<Self, Self::Error> {
        let plan = match (definition.exercises, definition.blocks) {
            (Some(_), Some(_)) => {
                return Err(ExecutionError::InvalidWorkout(
                    "Workout defines both exercises and blocks".to_string(),
                ))
            }
            (None, None) => return Err(ExecutionError::NoExercises),
            (None, Some(blocks)) => Self::blocks(&definition.name, blocks)?,
            (Some(exercises), None) => match definition.flow_type {
                FlowType::Circuit => {
                    let rounds = definition
                        .circuit_rounds
                        .as_ref()
                        .and_then(parse_positive_int)
                        .unwrap_or(1);
                    Self::circuit(&definition.name, exercises, rounds)?
                }
                _ => Self::sequential(&definition.name, exercises)?,
            },
        };

        Ok(match definition.category {
            Some(category) => plan.with_category(category),
            None => plan,
        })
    }
}
