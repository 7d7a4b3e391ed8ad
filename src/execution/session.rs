//! Workout execution session.
//!
//! `ExecutionSession` is the single owner of an in-progress workout: it
//! applies progression steps, drives the timers, queues persistence and
//! runs the completion/RPE flow. UI layers hold it (or a runner around it)
//! and call its action methods; they never mutate the state directly.

use crate::execution::catalog::{is_running_exercise, video_url};
use crate::execution::plan::{PlanShape, PlannedExercise, WorkoutPlan};
use crate::execution::progress::{completed_progress, compute_progress, Progress};
use crate::execution::progression::{strategy_for, FlowStrategy, Step, TransitionKind};
use crate::execution::timer::{countdown_label, TickOutcome, TimerController};
use crate::execution::types::{ExecutionError, ExecutionState, Phase, Position};
use crate::storage::config::EngineConfig;
use crate::storage::sink::{
    coalesce_progress, EffortEntry, ExerciseResult, PersistRequest, ProgressCheckpoint,
    WorkoutSink,
};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::time::Duration;

/// Rating recorded for the training load when the athlete skips rating.
pub const SKIPPED_RPE: u8 = 5;

/// Called once when the RPE phase is left.
pub type CompletionCallback = Box<dyn FnOnce(&CompletionReport) + Send>;

/// Summary handed to the caller when a workout finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub session_id: String,
    /// Submitted rating, if any
    pub rpe: Option<u8>,
    pub duration_minutes: u32,
    pub completion_percentage: f32,
    pub completed_exercises: Vec<usize>,
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged { from: Phase, to: Phase },
    /// Pointer moved; `kind` is `None` when navigating backwards
    PositionChanged {
        position: Position,
        kind: Option<TransitionKind>,
    },
    CountdownStarted { seconds: u32, running: bool },
    RestStarted { seconds: u32 },
    RestSkipped,
    /// "Next Block: ..." label
    NextBlock { label: String },
    TimedWorkFinished { exercise_index: usize },
    TimerReset,
    PauseChanged { paused: bool },
    RpeSelected { rpe: u8 },
    Completed(CompletionReport),
    Closed,
}

/// Athlete-supplied details for the unit being completed.
#[derive(Debug, Clone, Default)]
pub struct CompletedUnit {
    /// Captured time of performance (running-pattern exercises)
    pub time: Option<Duration>,
    pub notes: Option<String>,
}

/// One in-progress workout session.
pub struct ExecutionSession {
    id: String,
    plan: WorkoutPlan,
    strategy: &'static dyn FlowStrategy,
    timer: TimerController,
    default_rest: u32,
    state: ExecutionState,
    started: bool,
    finished: bool,
    closed: bool,
    /// Seconds any timer has run during this session
    session_seconds: u32,
    outbox: Vec<PersistRequest>,
    events: Option<Sender<SessionEvent>>,
    on_complete: Option<CompletionCallback>,
}

impl ExecutionSession {
    /// Open a session at the start of the workout. The session stays idle until `start()`.
    pub fn open(
        session_id: impl Into<String>,
        plan: WorkoutPlan,
        config: &EngineConfig,
    ) -> Result<Self, ExecutionError> {
        Self::open_at(session_id.into(), plan, config, Position::start())
    }

    /// Open a session from a saved checkpoint.
    ///
    /// Checkpoints that do not fit the workout are clamped; a checkpoint of a
    /// finished workout restarts from the beginning.
    pub fn resume(
        session_id: impl Into<String>,
        plan: WorkoutPlan,
        config: &EngineConfig,
        checkpoint: &ProgressCheckpoint,
    ) -> Result<Self, ExecutionError> {
        let position = resume_position(&plan, checkpoint);
        tracing::info!(
            "Resuming session at exercise {} set {} rep {} round {}",
            position.exercise_index,
            position.set,
            position.rep,
            position.round
        );
        Self::open_at(session_id.into(), plan, config, position)
    }

    fn open_at(
        id: String,
        plan: WorkoutPlan,
        config: &EngineConfig,
        position: Position,
    ) -> Result<Self, ExecutionError> {
        if plan.is_empty() {
            return Err(ExecutionError::NoExercises);
        }

        tracing::info!("Opened session {} for workout '{}'", id, plan.name());

        Ok(Self {
            id,
            strategy: strategy_for(&plan),
            plan,
            timer: TimerController::new(config.countdown_seconds, config.countdown_after_rest),
            default_rest: config.default_exercise_rest_seconds,
            state: ExecutionState::at(position),
            started: false,
            finished: false,
            closed: false,
            session_seconds: 0,
            outbox: Vec::new(),
            events: None,
            on_complete: None,
        })
    }

    /// Send events to an existing channel.
    pub fn set_event_sender(&mut self, sender: Sender<SessionEvent>) {
        self.events = Some(sender);
    }

    /// Create an event channel and return its receiving end.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.events = Some(tx);
        rx
    }

    /// Register the completion callback.
    pub fn on_complete(&mut self, callback: impl FnOnce(&CompletionReport) + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    // ========== Actions ==========

    /// Leave idle and run the first get-ready countdown.
    pub fn start(&mut self) -> Result<(), ExecutionError> {
        if self.closed {
            return Err(ExecutionError::SessionClosed);
        }
        if self.started {
            return Err(ExecutionError::AlreadyStarted);
        }

        self.started = true;
        let before = self.state.phase;
        let timed = self.timed_duration();
        self.timer.arm_countdown(&mut self.state, timed);
        self.announce_phase(before);
        self.announce_timer();
        self.queue_checkpoint();
        Ok(())
    }

    /// Mark the current unit of work done.
    pub fn advance(&mut self) -> Result<Step, ExecutionError> {
        self.advance_with(CompletedUnit::default())
    }

    /// Mark the current unit of work done with athlete-supplied details.
    pub fn advance_with(&mut self, unit: CompletedUnit) -> Result<Step, ExecutionError> {
        self.ensure_running()?;

        let before = self.state.phase;
        let position = self.state.position();
        self.queue_result(position, unit);

        let step = self
            .strategy
            .advance(&position, &self.plan, self.default_rest);

        match &step {
            Step::Continue(transition) => {
                self.state.move_to(transition.position);
                let timed = self.timed_duration();

                if transition.kind == TransitionKind::Round {
                    self.timer.arm_countdown(&mut self.state, timed);
                } else {
                    self.timer
                        .arm_rest(&mut self.state, transition.rest_seconds, timed);
                }

                tracing::debug!(
                    "Advanced ({:?}) to exercise {} set {} rep {} round {}",
                    transition.kind,
                    transition.position.exercise_index,
                    transition.position.set,
                    transition.position.rep,
                    transition.position.round
                );

                self.emit(SessionEvent::PositionChanged {
                    position: transition.position,
                    kind: Some(transition.kind),
                });
                if let Some(label) = &transition.next_block {
                    self.emit(SessionEvent::NextBlock {
                        label: label.clone(),
                    });
                }
                self.announce_phase(before);
                self.announce_timer();
            }
            Step::Complete => {
                self.timer.arm_rpe(&mut self.state);
                tracing::info!("Workout '{}' finished, awaiting RPE", self.plan.name());
                self.announce_phase(before);
            }
        }

        self.queue_checkpoint();
        Ok(step)
    }

    /// Go back one unit of work. Returns `false` at the very first unit.
    pub fn retreat(&mut self) -> Result<bool, ExecutionError> {
        self.ensure_running()?;

        let Some(position) = self
            .strategy
            .retreat(&self.state.position(), &self.plan)
        else {
            return Ok(false);
        };

        let before = self.state.phase;
        self.state.move_to(position);
        let timed = self.timed_duration();
        self.timer.arm_active(&mut self.state, timed);

        tracing::debug!(
            "Retreated to exercise {} set {} rep {} round {}",
            position.exercise_index,
            position.set,
            position.rep,
            position.round
        );

        self.emit(SessionEvent::PositionChanged {
            position,
            kind: None,
        });
        self.announce_phase(before);
        self.queue_checkpoint();
        Ok(true)
    }

    /// End the current rest. No-op unless resting.
    pub fn skip_rest(&mut self) -> bool {
        if self.closed {
            return false;
        }

        let before = self.state.phase;
        let timed = self.timed_duration();
        if !self.timer.skip_rest(&mut self.state, timed) {
            return false;
        }

        tracing::debug!("Rest skipped");
        self.emit(SessionEvent::RestSkipped);
        self.announce_phase(before);
        true
    }

    /// Pause the work timer.
    pub fn pause(&mut self) {
        self.set_paused(true);
    }

    /// Resume the work timer.
    pub fn resume_timer(&mut self) {
        self.set_paused(false);
    }

    /// Toggle the work timer pause.
    pub fn toggle_pause(&mut self) {
        self.set_paused(!self.state.paused);
    }

    fn set_paused(&mut self, paused: bool) {
        if self.state.paused == paused || self.closed {
            return;
        }
        self.state.paused = paused;
        self.emit(SessionEvent::PauseChanged { paused });
    }

    /// Restart the work timer without moving the pointer.
    pub fn reset_timer(&mut self) {
        if self.closed {
            return;
        }
        self.state.elapsed_seconds = 0;
        if self.state.phase == Phase::Active {
            self.state.timed_remaining = self.timed_duration();
        }
        self.emit(SessionEvent::TimerReset);
    }

    /// Advance the running timer by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.closed || !self.started {
            return TickOutcome::Stopped;
        }

        let before = self.state.phase;
        let timed = self.timed_duration();
        let outcome = self.timer.tick(&mut self.state, timed);

        if outcome != TickOutcome::Stopped {
            self.session_seconds += 1;
        }
        self.announce_phase(before);

        match outcome {
            TickOutcome::TimedWorkFinished { .. } => self.emit(SessionEvent::TimedWorkFinished {
                exercise_index: self.state.global_exercise_index,
            }),
            TickOutcome::RestFinished => self.announce_timer(),
            _ => {}
        }

        outcome
    }

    /// Choose an effort rating (1-10).
    pub fn select_rpe(&mut self, rpe: u8) -> Result<(), ExecutionError> {
        if self.state.phase != Phase::Rpe {
            return Err(ExecutionError::NotInRpePhase);
        }
        if !(1..=10).contains(&rpe) {
            return Err(ExecutionError::InvalidRpe(rpe));
        }

        self.state.selected_rpe = Some(rpe);
        self.emit(SessionEvent::RpeSelected { rpe });
        Ok(())
    }

    /// Save the selected rating and finish the session.
    pub fn submit_rpe(&mut self) -> Result<CompletionReport, ExecutionError> {
        if self.state.phase != Phase::Rpe {
            return Err(ExecutionError::NotInRpePhase);
        }
        let rpe = self
            .state
            .selected_rpe
            .ok_or(ExecutionError::RpeNotSelected)?;

        self.queue_effort(rpe);
        Ok(self.finish(Some(rpe)))
    }

    /// Finish the session without submitting a rating.
    ///
    /// The training load is still saved: with the selected rating if there
    /// is one, otherwise with `SKIPPED_RPE`. The report carries only a
    /// rating the athlete actually selected.
    pub fn skip_rpe(&mut self) -> Result<CompletionReport, ExecutionError> {
        if self.state.phase != Phase::Rpe {
            return Err(ExecutionError::NotInRpePhase);
        }

        let selected = self.state.selected_rpe;
        self.queue_effort(selected.unwrap_or(SKIPPED_RPE));
        Ok(self.finish(selected))
    }

    /// Close the session, stopping every timer.
    ///
    /// Closing from the RPE phase counts as skipping the rating.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.state.phase == Phase::Rpe {
            // Cannot fail: phase checked above
            let _ = self.skip_rpe();
            return;
        }

        let before = self.state.phase;
        self.timer.disarm(&mut self.state);
        self.closed = true;
        self.queue_checkpoint();

        tracing::info!("Closed session {}", self.id);
        self.announce_phase(before);
        self.emit(SessionEvent::Closed);
    }

    fn finish(&mut self, rpe: Option<u8>) -> CompletionReport {
        let before = self.state.phase;
        self.finished = true;
        self.closed = true;
        self.timer.disarm(&mut self.state);
        self.queue_checkpoint();

        let report = CompletionReport {
            session_id: self.id.clone(),
            rpe,
            duration_minutes: self.duration_minutes(),
            completion_percentage: 100.0,
            completed_exercises: self.completed_exercises(),
        };

        tracing::info!(
            "Session {} complete ({} min, RPE {:?})",
            self.id,
            report.duration_minutes,
            rpe
        );

        self.announce_phase(before);
        self.emit(SessionEvent::Completed(report.clone()));
        if let Some(callback) = self.on_complete.take() {
            callback(&report);
        }
        report
    }

    // ========== Persistence ==========

    /// Take every queued write.
    pub fn take_persistence(&mut self) -> Vec<PersistRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Write queued requests to a sink, logging failures.
    pub fn drain_persistence(&mut self, sink: &dyn WorkoutSink) {
        for request in coalesce_progress(self.take_persistence()) {
            request.apply_logged(sink);
        }
    }

    /// Durable snapshot of the current position.
    pub fn checkpoint(&self) -> ProgressCheckpoint {
        let position = self.state.position();
        ProgressCheckpoint {
            current_exercise_index: position.exercise_index,
            current_set: position.set,
            current_rep: position.rep,
            current_round: position.round,
            completed_exercises: self.completed_exercises(),
            completion_percentage: self.progress().percentage,
        }
    }

    fn queue_checkpoint(&mut self) {
        self.outbox.push(PersistRequest::Progress {
            session_id: self.id.clone(),
            checkpoint: self.checkpoint(),
        });
    }

    fn queue_result(&mut self, position: Position, unit: CompletedUnit) {
        let Some(planned) = self.plan.exercise(position.exercise_index) else {
            return;
        };
        let notes = unit.notes.unwrap_or_default();

        let result = if is_running_exercise(&planned.unit.name) {
            let time = unit
                .time
                .unwrap_or_else(|| Duration::from_secs(self.state.elapsed_seconds as u64));
            ExerciseResult::timed(time, notes)
        } else if let PlanShape::Circuit { .. } = self.plan.shape() {
            ExerciseResult::counts(planned.unit.reps, position.round, notes)
        } else {
            ExerciseResult::counts(position.rep, position.set, notes)
        };

        self.outbox.push(PersistRequest::ExerciseResult {
            session_id: self.id.clone(),
            exercise_index: position.exercise_index,
            result,
        });
    }

    fn queue_effort(&mut self, rpe: u8) {
        self.outbox.push(PersistRequest::Effort {
            session_id: self.id.clone(),
            effort: EffortEntry {
                rpe,
                duration_minutes: self.duration_minutes(),
                category: self.plan.category(),
            },
        });
    }

    // ========== Queries ==========

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn plan(&self) -> &WorkoutPlan {
        &self.plan
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn position(&self) -> Position {
        self.state.position()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Seconds any timer has run so far.
    pub fn session_seconds(&self) -> u32 {
        self.session_seconds
    }

    /// Session length for effort reporting, at least one minute.
    pub fn duration_minutes(&self) -> u32 {
        ((self.session_seconds + 30) / 60).max(1)
    }

    /// Completion of the workout.
    pub fn progress(&self) -> Progress {
        if self.finished {
            completed_progress(&self.plan)
        } else {
            compute_progress(&self.plan, &self.state)
        }
    }

    pub fn current_exercise(&self) -> Option<&PlannedExercise> {
        self.plan.exercise(self.state.global_exercise_index)
    }

    /// Whether the current exercise captures a time instead of reps.
    pub fn is_running_exercise(&self) -> bool {
        self.current_exercise()
            .is_some_and(|e| is_running_exercise(&e.unit.name))
    }

    /// Demo video for the current exercise.
    pub fn video_url(&self) -> Option<&'static str> {
        self.current_exercise().map(|e| video_url(&e.unit.name))
    }

    /// Label for the get-ready countdown, while one is running.
    pub fn countdown_label(&self) -> Option<String> {
        (self.state.phase == Phase::Countdown)
            .then(|| countdown_label(self.state.countdown_remaining, self.is_running_exercise()))
    }

    /// Label of the block that follows the current exercise, when the
    /// current exercise is the last of its block.
    pub fn next_block_label(&self) -> Option<String> {
        let current = self.current_exercise()?;
        let next = self.plan.exercise(self.state.global_exercise_index + 1)?;
        let block = next.block.as_ref()?;
        (Some(block.index) != current.block_index()).then(|| block.label.clone())
    }

    /// Whether backwards navigation is available.
    pub fn can_retreat(&self) -> bool {
        self.ensure_running().is_ok()
            && self
                .strategy
                .retreat(&self.state.position(), &self.plan)
                .is_some()
    }

    /// Exercises fully finished, derived from the current position.
    pub fn completed_exercises(&self) -> Vec<usize> {
        if self.finished || self.state.phase == Phase::Rpe {
            return (0..self.plan.len()).collect();
        }

        let index = self.state.global_exercise_index.min(self.plan.len());
        match self.plan.shape() {
            PlanShape::Circuit { rounds } if self.state.current_round < rounds => Vec::new(),
            _ => (0..index).collect(),
        }
    }

    // ========== Internals ==========

    fn ensure_running(&self) -> Result<(), ExecutionError> {
        if self.closed {
            return Err(ExecutionError::SessionClosed);
        }
        if !self.started {
            return Err(ExecutionError::NotStarted);
        }
        if self.state.phase == Phase::Rpe {
            return Err(ExecutionError::WorkoutComplete);
        }
        Ok(())
    }

    fn timed_duration(&self) -> Option<u32> {
        self.current_exercise().and_then(|e| e.unit.duration_seconds)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn announce_phase(&self, before: Phase) {
        let after = self.state.phase;
        if before != after {
            tracing::debug!("Phase {} -> {}", before, after);
            self.emit(SessionEvent::PhaseChanged {
                from: before,
                to: after,
            });
        }
    }

    fn announce_timer(&self) {
        match self.state.phase {
            Phase::Resting => self.emit(SessionEvent::RestStarted {
                seconds: self.state.rest_remaining,
            }),
            Phase::Countdown => self.emit(SessionEvent::CountdownStarted {
                seconds: self.state.countdown_remaining,
                running: self.is_running_exercise(),
            }),
            _ => {}
        }
    }
}

/// Position to resume from, clamped to the workout.
pub fn resume_position(plan: &WorkoutPlan, checkpoint: &ProgressCheckpoint) -> Position {
    let total = plan.len();
    let all_completed =
        total > 0 && (0..total).all(|i| checkpoint.completed_exercises.contains(&i));

    if checkpoint.completion_percentage >= 100.0 || all_completed {
        tracing::info!("Checkpoint shows a finished workout, restarting from the beginning");
        return Position::start();
    }

    let mut index = checkpoint.current_exercise_index;
    if index >= total {
        tracing::warn!(
            "Checkpoint exercise {} beyond workout of {} exercises, clamping",
            index,
            total
        );
        index = total.saturating_sub(1);
    }

    let Some(planned) = plan.exercise(index) else {
        return Position::start();
    };

    match plan.shape() {
        PlanShape::Circuit { rounds } => Position {
            exercise_index: index,
            set: 1,
            rep: 1,
            round: checkpoint.current_round.clamp(1, rounds),
        },
        PlanShape::Sequential | PlanShape::Blocks => Position {
            exercise_index: index,
            set: checkpoint.current_set.clamp(1, planned.unit.sets),
            rep: checkpoint.current_rep.clamp(1, planned.unit.reps),
            round: 1,
        },
    }
}
