//! The event worker.
//!
//! A single tokio task drains an mpsc channel, so events are resolved and
//! their requests registered strictly one at a time and in arrival order.
//! Zero-delay actions (including a merge gate that polls for minutes) run on
//! scheduler tasks, so the next event is not held up.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace};

use super::Engine;
use crate::effects::GitHubInterpreter;
use crate::types::{DeliveryId, Event};

/// Messages accepted by the event worker.
pub enum WorkerMessage<G> {
    /// A normalized event plus a client scoped to its repository.
    Event {
        event: Event,
        github: Arc<G>,
        delivery: DeliveryId,
    },

    /// Stop after the current event.
    Shutdown,
}

impl<G> std::fmt::Debug for WorkerMessage<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerMessage::Event {
                event, delivery, ..
            } => f
                .debug_struct("Event")
                .field("event", event)
                .field("delivery", delivery)
                .finish_non_exhaustive(),
            WorkerMessage::Shutdown => f.write_str("Shutdown"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("event worker is not running")]
    ChannelClosed,
}

/// Handle to a running [`EventWorker`].
pub struct WorkerHandle<G> {
    tx: mpsc::Sender<WorkerMessage<G>>,
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl<G> std::fmt::Debug for WorkerHandle<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl<G> WorkerHandle<G> {
    /// Queues an event. Waits if the queue is full.
    pub async fn submit(
        &self,
        event: Event,
        github: Arc<G>,
        delivery: DeliveryId,
    ) -> Result<(), WorkerError> {
        self.tx
            .send(WorkerMessage::Event {
                event,
                github,
                delivery,
            })
            .await
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// Tasks already registered with the scheduler keep running.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.tx.send(WorkerMessage::Shutdown).await;
        let _ = self.task.await;
    }
}

pub struct EventWorker<G> {
    engine: Engine,
    rx: mpsc::Receiver<WorkerMessage<G>>,
    cancel: CancellationToken,
}

impl<G> EventWorker<G>
where
    G: GitHubInterpreter + Send + Sync + 'static,
{
    /// Spawns a worker that stops when `shutdown` is cancelled.
    pub fn spawn(engine: Engine, capacity: usize, shutdown: &CancellationToken) -> WorkerHandle<G> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = shutdown.child_token();
        let worker = EventWorker {
            engine,
            rx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());
        WorkerHandle { tx, task, cancel }
    }

    async fn run(mut self) {
        info!("event worker started");
        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                message = self.rx.recv() => message,
            };
            match message {
                Some(WorkerMessage::Event {
                    event,
                    github,
                    delivery,
                }) => self.handle(event, github, delivery).await,
                Some(WorkerMessage::Shutdown) | None => break,
            }
        }
        info!("event worker stopped");
    }

    async fn handle(&self, event: Event, github: Arc<G>, delivery: DeliveryId) {
        let span = info_span!(
            "event",
            delivery = %delivery,
            repo = %event.repo,
            issue = %event.target,
            kind = ?event.kind()
        );

        let executor = self.engine.executor(github);
        let requests = self
            .engine
            .prepare(&event, &executor)
            .instrument(span.clone())
            .await;
        if requests.is_empty() {
            trace!(parent: &span, "nothing to do");
            return;
        }

        // Registered before the next event is read, whatever runs inline.
        span.in_scope(|| {
            debug!(count = requests.len(), "registering");
            self.engine.register(requests, &executor);
        });
    }
}
