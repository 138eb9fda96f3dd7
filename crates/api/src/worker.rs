//! Background outbox worker.
//!
//! Drives the notification relay: wakes when a handler signals a new commit
//! and also polls on a fixed interval, so commits from other processes are
//! relayed too. Requests never wait on notification delivery.

use std::sync::Arc;
use std::time::Duration;

use event_store::EventStore;
use projections::ProjectionProcessor;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct OutboxWorker<S: EventStore> {
    processor: Arc<ProjectionProcessor<S>>,
    wakeups: mpsc::Receiver<()>,
    poll_interval: Duration,
}

/// Handle to a running worker. Dropping it also stops the worker.
pub struct OutboxHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl OutboxHandle {
    /// Stops the worker after a last drain of the outbox.
    pub async fn shutdown(self) {
        if self.shutdown.send(()).is_err() {
            tracing::debug!("outbox worker already stopped");
        }
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "outbox worker panicked");
        }
    }
}

impl<S: EventStore + 'static> OutboxWorker<S> {
    pub fn new(
        processor: Arc<ProjectionProcessor<S>>,
        wakeups: mpsc::Receiver<()>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            processor,
            wakeups,
            poll_interval,
        }
    }

    pub fn spawn(self) -> OutboxHandle {
        let (shutdown, stop) = oneshot::channel();
        let task = tokio::spawn(self.run(stop));
        OutboxHandle { shutdown, task }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        tracing::info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "outbox worker started");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(()) = self.wakeups.recv() => {}
                _ = ticker.tick() => {}
            }
            self.drain().await;
        }

        self.drain().await;
        tracing::info!("outbox worker stopped");
    }

    /// Relays everything committed since the last drain.
    pub async fn drain(&self) {
        match self.processor.run_catch_up().await {
            Ok(0) => {}
            Ok(delivered) => tracing::debug!(delivered, "outbox drained"),
            Err(e) => tracing::error!(error = %e, "outbox catch-up failed"),
        }
    }
}
