//! Unit tests for workout definitions and plan flattening.

use repflow::execution::plan::{PlanShape, WorkoutDefinition, WorkoutPlan};
use repflow::execution::types::ExecutionError;

fn parse(json: &str) -> Result<WorkoutPlan, ExecutionError> {
    WorkoutPlan::try_from(WorkoutDefinition::from_json(json)?)
}

#[test]
fn test_parse_circuit_with_loose_numbers() {
    let plan = parse(
        r#"{
            "name": "Conditioning",
            "flow_type": "circuit",
            "circuit_rounds": "3",
            "exercises": [
                { "name": "Burpee", "sets": "2", "reps": 10.8 },
                { "name": "Plank", "duration_seconds": "45" }
            ]
        }"#,
    )
    .expect("Should parse circuit");

    assert_eq!(plan.shape(), PlanShape::Circuit { rounds: 3 });
    assert_eq!(plan.rounds(), 3);
    assert_eq!(plan.len(), 2);

    let burpee = &plan.exercise(0).unwrap().unit;
    assert_eq!((burpee.sets, burpee.reps), (2, 10));

    let plank = &plan.exercise(1).unwrap().unit;
    assert_eq!((plank.sets, plank.reps), (1, 1));
    assert_eq!(plank.duration_seconds, Some(45));
}

#[test]
fn test_invalid_counts_fall_back_to_one() {
    let plan = parse(
        r#"{
            "name": "Sloppy",
            "flow_type": "circuit",
            "circuit_rounds": "many",
            "exercises": [{ "name": "Squat", "sets": 0, "reps": -4 }]
        }"#,
    )
    .unwrap();

    assert_eq!(plan.rounds(), 1);
    let squat = &plan.exercise(0).unwrap().unit;
    assert_eq!((squat.sets, squat.reps), (1, 1));
}

#[test]
fn test_blocks_are_flattened_in_order() {
    let plan = parse(
        r#"{
            "name": "Lower Body",
            "blocks": [
                {
                    "id": "b1",
                    "name": "Warm-up",
                    "category": "mobility",
                    "rest_between_exercises": 20,
                    "exercises": [{ "name": "Jog" }, { "name": "Leg Swing", "reps": 10 }]
                },
                {
                    "id": "b2",
                    "exercises": [{ "name": "Squat", "sets": 3, "reps": 5 }]
                }
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(plan.shape(), PlanShape::Blocks);
    assert_eq!(plan.len(), 3);
    assert_eq!(plan.rounds(), 1);

    let names: Vec<_> = plan.exercises().iter().map(|e| e.unit.name.as_str()).collect();
    assert_eq!(names, vec!["Jog", "Leg Swing", "Squat"]);

    assert_eq!(plan.exercise(1).unwrap().block_index(), Some(0));
    let squat_block = plan.exercise(2).unwrap().block.as_ref().unwrap();
    assert_eq!(squat_block.label, "b2");
    assert_eq!(squat_block.index, 1);

    // First block category is used when the workout names none
    assert_eq!(plan.category(), "mobility");
}

#[test]
fn test_workout_category_wins() {
    let plan = parse(r#"{ "name": "Push", "category": "strength", "exercises": [{ "name": "Bench" }] }"#)
        .unwrap();
    assert_eq!(plan.category(), "strength");

    let plain = parse(r#"{ "name": "Push", "exercises": [{ "name": "Bench" }] }"#).unwrap();
    assert_eq!(plain.category(), "general");
}

#[test]
fn test_rejects_missing_or_ambiguous_exercises() {
    assert_eq!(
        parse(r#"{ "name": "Empty" }"#).unwrap_err(),
        ExecutionError::NoExercises
    );
    assert_eq!(
        parse(r#"{ "name": "Empty", "exercises": [] }"#).unwrap_err(),
        ExecutionError::NoExercises
    );
    assert_eq!(
        parse(r#"{ "name": "Empty", "blocks": [{ "id": "b1" }] }"#).unwrap_err(),
        ExecutionError::NoExercises
    );
    assert!(matches!(
        parse(r#"{ "name": "Both", "exercises": [{ "name": "A" }], "blocks": [] }"#),
        Err(ExecutionError::InvalidWorkout(_))
    ));
}

#[test]
fn test_malformed_json() {
    assert!(matches!(
        WorkoutDefinition::from_json("{ not json"),
        Err(ExecutionError::InvalidWorkout(_))
    ));
}
