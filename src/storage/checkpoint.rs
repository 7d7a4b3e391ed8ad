//! Background writer for session persistence.
//!
//! Progress checkpoints are debounced: a burst of transitions produces a
//! single upsert of the newest checkpoint once the window has been quiet.
//! Results and effort entries are written as they arrive. Store calls run on
//! the blocking pool since the backends are synchronous.

use crate::storage::sink::{PersistRequest, WorkoutSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Handle to the writer task.
pub struct CheckpointWriter {
    tx: UnboundedSender<PersistRequest>,
    handle: JoinHandle<()>,
}

impl CheckpointWriter {
    /// Spawn the writer on the current tokio runtime.
    pub fn spawn(sink: Arc<dyn WorkoutSink>, debounce: Duration) -> Self {
        let (tx, rx) = unbounded_channel();
        let handle = tokio::spawn(run_writer(sink, rx, debounce));
        Self { tx, handle }
    }

    /// Queue a request. Never blocks.
    pub fn submit(&self, request: PersistRequest) {
        if self.tx.send(request).is_err() {
            tracing::warn!("Checkpoint writer stopped, dropping persistence request");
        }
    }

    /// Queue several requests in order.
    pub fn submit_all(&self, requests: impl IntoIterator<Item = PersistRequest>) {
        for request in requests {
            self.submit(request);
        }
    }

    /// Flush pending writes and stop the task.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            tracing::error!("Checkpoint writer task failed: {}", e);
        }
    }
}

async fn run_writer(
    sink: Arc<dyn WorkoutSink>,
    mut rx: UnboundedReceiver<PersistRequest>,
    debounce: Duration,
) {
    let mut pending: Option<PersistRequest> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            request = rx.recv() => match request {
                Some(request) if request.is_progress() => {
                    pending = Some(request);
                    deadline = Some(Instant::now() + debounce);
                }
                Some(request) => write(&sink, request).await,
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                if let Some(request) = pending.take() {
                    write(&sink, request).await;
                }
            }
        }
    }

    if let Some(request) = pending.take() {
        write(&sink, request).await;
    }
    tracing::debug!("Checkpoint writer stopped");
}

async fn write(sink: &Arc<dyn WorkoutSink>, request: PersistRequest) {
    let sink = Arc::clone(sink);
    if let Err(e) =
        tokio::task::spawn_blocking(move || request.apply_logged(sink.as_ref())).await
    {
        tracing::warn!("Persistence task failed: {}", e);
    }
}
