//! Async driver for an execution session.
//!
//! `SessionRunner` owns the one-second ticker and the persistence writer.
//! The ticker task holds at most one interval; every phase or pointer change
//! replaces it (the old interval is dropped before the new one is created),
//! so no two timers ever tick at once. Actions that leave both unchanged,
//! such as pausing, keep the running interval and its partial second.
//!
//! Each re-arming action bumps a generation counter while it holds the
//! session lock. A tick from an interval armed for an older generation is
//! dropped, so a tick that was already due never lands on the new phase.
//!
//! Closing the runner aborts the ticker and flushes pending writes; dropping
//! it ends the ticker once its control channel closes.

use crate::execution::session::{CompletedUnit, CompletionReport, ExecutionSession};
use crate::execution::progress::Progress;
use crate::execution::progression::Step;
use crate::execution::types::{ExecutionError, ExecutionState, Phase};
use crate::storage::checkpoint::CheckpointWriter;
use crate::storage::config::EngineConfig;
use crate::storage::sink::WorkoutSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Messages from user actions to the ticker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickerCommand {
    /// Phase or pointer changed; restart the interval
    Rearm,
}

/// Runs an `ExecutionSession` on the tokio runtime.
pub struct SessionRunner {
    session: Arc<Mutex<ExecutionSession>>,
    writer: Arc<CheckpointWriter>,
    control: UnboundedSender<TickerCommand>,
    /// Bumped under the session lock by every action that needs a re-arm
    generation: Arc<AtomicU64>,
    ticker: Option<JoinHandle<()>>,
}

impl SessionRunner {
    /// Spawn the ticker and writer for a session. Must be called inside a tokio runtime.
    pub fn spawn(session: ExecutionSession, sink: Arc<dyn WorkoutSink>, config: &EngineConfig) -> Self {
        let session = Arc::new(Mutex::new(session));
        let writer = Arc::new(CheckpointWriter::spawn(
            sink,
            Duration::from_millis(config.checkpoint_debounce_ms),
        ));
        let (control, control_rx) = unbounded_channel();
        let generation = Arc::new(AtomicU64::new(0));

        let ticker = tokio::spawn(run_ticker(
            session.clone(),
            writer.clone(),
            control_rx,
            generation.clone(),
            Duration::from_millis(config.tick_interval_ms.max(1)),
            Duration::from_millis(config.countdown_grace_ms),
        ));

        Self {
            session,
            writer,
            control,
            generation,
            ticker: Some(ticker),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExecutionSession> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run a user action, then forward queued writes.
    ///
    /// The ticker is restarted only if the action moved the phase or the pointer.
    fn act<T>(&self, action: impl FnOnce(&mut ExecutionSession) -> T) -> T {
        let (result, requests, rearm) = {
            let mut session = self.lock();
            let before = (session.phase(), session.position());
            let result = action(&mut session);
            let rearm = before != (session.phase(), session.position());
            if rearm {
                self.generation.fetch_add(1, Ordering::SeqCst);
            }
            (result, session.take_persistence(), rearm)
        };
        self.writer.submit_all(requests);
        if rearm {
            let _ = self.control.send(TickerCommand::Rearm);
        }
        result
    }

    pub fn start(&self) -> Result<(), ExecutionError> {
        self.act(|s| s.start())
    }

    pub fn advance(&self) -> Result<Step, ExecutionError> {
        self.act(|s| s.advance())
    }

    pub fn advance_with(&self, unit: CompletedUnit) -> Result<Step, ExecutionError> {
        self.act(|s| s.advance_with(unit))
    }

    pub fn retreat(&self) -> Result<bool, ExecutionError> {
        self.act(|s| s.retreat())
    }

    pub fn skip_rest(&self) -> bool {
        self.act(|s| s.skip_rest())
    }

    pub fn toggle_pause(&self) {
        self.act(|s| s.toggle_pause())
    }

    pub fn reset_timer(&self) {
        self.act(|s| s.reset_timer())
    }

    pub fn select_rpe(&self, rpe: u8) -> Result<(), ExecutionError> {
        self.act(|s| s.select_rpe(rpe))
    }

    pub fn submit_rpe(&self) -> Result<CompletionReport, ExecutionError> {
        self.act(|s| s.submit_rpe())
    }

    pub fn skip_rpe(&self) -> Result<CompletionReport, ExecutionError> {
        self.act(|s| s.skip_rpe())
    }

    /// Copy of the current execution state.
    pub fn snapshot(&self) -> ExecutionState {
        self.lock().state().clone()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase()
    }

    pub fn progress(&self) -> Progress {
        self.lock().progress()
    }

    /// Run a read-only query against the session.
    pub fn with_session<T>(&self, query: impl FnOnce(&ExecutionSession) -> T) -> T {
        query(&self.lock())
    }

    /// Whether the ticker task is still alive.
    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Close the session, stop the ticker and flush persistence.
    pub async fn close(mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
            let _ = handle.await;
        }

        let requests = {
            let mut session = self.lock();
            session.close();
            session.take_persistence()
        };
        self.writer.submit_all(requests);

        match Arc::try_unwrap(self.writer) {
            Ok(writer) => writer.shutdown().await,
            Err(_) => tracing::warn!("Checkpoint writer still shared at close"),
        }
    }
}

/// Build a fresh interval whose first tick is one period (plus `delay`) away.
fn arm(period: Duration, delay: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + delay + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn needs_ticker(phase: Phase, closed: bool) -> bool {
    !closed && matches!(phase, Phase::Countdown | Phase::Active | Phase::Resting)
}

async fn run_ticker(
    session: Arc<Mutex<ExecutionSession>>,
    writer: Arc<CheckpointWriter>,
    mut control: UnboundedReceiver<TickerCommand>,
    generation: Arc<AtomicU64>,
    period: Duration,
    grace: Duration,
) {
    let mut interval: Option<Interval> = None;
    // Generation the current interval was armed for
    let mut armed = generation.load(Ordering::SeqCst);

    loop {
        tokio::select! {
            command = control.recv() => match command {
                Some(TickerCommand::Rearm) => {
                    let (phase, closed) = {
                        let s = session.lock().unwrap_or_else(|p| p.into_inner());
                        armed = generation.load(Ordering::SeqCst);
                        (s.phase(), s.is_closed())
                    };
                    // Drop the old interval before arming a new one
                    interval = None;
                    if needs_ticker(phase, closed) {
                        interval = Some(arm(period, Duration::ZERO));
                    }
                }
                None => break,
            },
            _ = next_tick(&mut interval) => {
                let (before, after, closed, requests) = {
                    let mut s = session.lock().unwrap_or_else(|p| p.into_inner());
                    if generation.load(Ordering::SeqCst) != armed {
                        // Stale; the pending rearm replaces this interval
                        continue;
                    }
                    let before = s.phase();
                    s.tick();
                    (before, s.phase(), s.is_closed(), s.take_persistence())
                };
                writer.submit_all(requests);

                if before != after {
                    interval = None;
                    if needs_ticker(after, closed) {
                        let delay = if before == Phase::Countdown { grace } else { Duration::ZERO };
                        interval = Some(arm(period, delay));
                    }
                }
            }
        }
    }

    tracing::debug!("Session ticker stopped");
}
