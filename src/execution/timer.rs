//! Countdown, rest and active timers.
//!
//! All three timers live on the execution state and are gated by its phase,
//! so at most one of them runs at a time. Every `arm_*` call disarms first;
//! `tick()` is the single phase-transition function driven once per second.

use crate::execution::types::{ExecutionState, Phase};

/// Default get-ready countdown in seconds.
pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 3;

/// Which timer is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Countdown,
    Rest,
    Active,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is running (idle, RPE, or active but paused)
    Stopped,
    CountdownTick { remaining: u32 },
    /// Countdown reached zero; now active
    CountdownFinished,
    RestTick { remaining: u32 },
    /// Rest reached zero; now active (or counting down again)
    RestFinished,
    ActiveTick { elapsed: u32 },
    /// Timed exercise reached zero this tick
    TimedWorkFinished { elapsed: u32 },
}

/// Drives the countdown, rest and active timers of an execution state.
#[derive(Debug, Clone)]
pub struct TimerController {
    countdown_seconds: u32,
    countdown_after_rest: bool,
}

impl TimerController {
    /// Create a controller.
    pub fn new(countdown_seconds: u32, countdown_after_rest: bool) -> Self {
        Self {
            countdown_seconds,
            countdown_after_rest,
        }
    }

    /// Stop every timer and return to idle.
    pub fn disarm(&self, state: &mut ExecutionState) {
        state.countdown_remaining = 0;
        state.rest_remaining = 0;
        state.timed_remaining = None;
        state.phase = Phase::Idle;
    }

    /// Start the get-ready countdown. A zero-length countdown goes straight to active.
    pub fn arm_countdown(&self, state: &mut ExecutionState, timed: Option<u32>) {
        self.disarm(state);
        if self.countdown_seconds == 0 {
            self.arm_active(state, timed);
            return;
        }
        state.phase = Phase::Countdown;
        state.countdown_remaining = self.countdown_seconds;
    }

    /// Start a rest period. Zero seconds skips resting entirely.
    pub fn arm_rest(&self, state: &mut ExecutionState, seconds: u32, timed: Option<u32>) {
        if seconds == 0 {
            self.arm_countdown(state, timed);
            return;
        }
        self.disarm(state);
        state.phase = Phase::Resting;
        state.rest_remaining = seconds;
    }

    /// Start the active work timer.
    pub fn arm_active(&self, state: &mut ExecutionState, timed: Option<u32>) {
        self.disarm(state);
        state.phase = Phase::Active;
        state.timed_remaining = timed;
    }

    /// Enter the RPE gate; nothing ticks there.
    pub fn arm_rpe(&self, state: &mut ExecutionState) {
        self.disarm(state);
        state.phase = Phase::Rpe;
    }

    /// End the rest immediately. No-op unless resting.
    pub fn skip_rest(&self, state: &mut ExecutionState, timed: Option<u32>) -> bool {
        if state.phase != Phase::Resting {
            return false;
        }
        state.rest_remaining = 0;
        self.arm_active(state, timed);
        true
    }

    /// Which timer is running, if any.
    pub fn running(state: &ExecutionState) -> Option<TimerKind> {
        match state.phase {
            Phase::Countdown => Some(TimerKind::Countdown),
            Phase::Resting => Some(TimerKind::Rest),
            Phase::Active if !state.paused => Some(TimerKind::Active),
            _ => None,
        }
    }

    /// Advance the running timer by one second.
    ///
    /// `timed` is the current exercise's fixed work duration, used when a
    /// countdown or rest hands over to the active phase.
    pub fn tick(&self, state: &mut ExecutionState, timed: Option<u32>) -> TickOutcome {
        match state.phase {
            Phase::Countdown => {
                state.countdown_remaining = state.countdown_remaining.saturating_sub(1);
                if state.countdown_remaining == 0 {
                    self.arm_active(state, timed);
                    TickOutcome::CountdownFinished
                } else {
                    TickOutcome::CountdownTick {
                        remaining: state.countdown_remaining,
                    }
                }
            }
            Phase::Resting => {
                state.rest_remaining = state.rest_remaining.saturating_sub(1);
                if state.rest_remaining > 0 {
                    return TickOutcome::RestTick {
                        remaining: state.rest_remaining,
                    };
                }
                if self.countdown_after_rest {
                    self.arm_countdown(state, timed);
                } else {
                    self.arm_active(state, timed);
                }
                TickOutcome::RestFinished
            }
            Phase::Active if !state.paused => {
                state.elapsed_seconds += 1;
                match state.timed_remaining {
                    Some(remaining) if remaining > 0 => {
                        state.timed_remaining = Some(remaining - 1);
                        if remaining == 1 {
                            return TickOutcome::TimedWorkFinished {
                                elapsed: state.elapsed_seconds,
                            };
                        }
                        TickOutcome::ActiveTick {
                            elapsed: state.elapsed_seconds,
                        }
                    }
                    _ => TickOutcome::ActiveTick {
                        elapsed: state.elapsed_seconds,
                    },
                }
            }
            _ => TickOutcome::Stopped,
        }
    }
}

impl Default for TimerController {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTDOWN_SECONDS, false)
    }
}

/// Label shown during the get-ready countdown.
///
/// Running-pattern exercises get the Ready/Set/Go three-count.
pub fn countdown_label(remaining: u32, running: bool) -> String {
    if running {
        match remaining {
            3 => return "Ready".to_string(),
            2 => return "Set".to_string(),
            1 | 0 => return "Go!".to_string(),
            _ => {}
        }
    }
    remaining.to_string()
}

/// Format seconds as `m:ss`.
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
