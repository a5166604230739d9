//! Delayed, cancel-and-replace task scheduling.
//!
//! The scheduler owns the only shared mutable state in the engine: the table of
//! pending tasks, keyed by `(repo, target, action kind)`.
//!
//! # Guarantees
//!
//! - At most one pending task exists per key. Registering a new task for a key
//!   cancels the pending one first; its body never runs.
//! - Registration is synchronous. Whoever registers in some order gets that
//!   order, no matter how long earlier tasks take to run.
//! - A zero-delay task starts at once and cannot be cancelled.
//!   [`Scheduler::schedule`] waits for it before returning.
//! - Cancellation only affects tasks still waiting on their timer. Once a task
//!   has started it runs to completion.
//! - Tasks for the same key run one at a time, in registration order: each
//!   waits for its predecessor's turn to end. Tasks for different keys run
//!   concurrently.
//!
//! # Liveness caveat
//!
//! Nothing is persisted. A process restart silently drops every pending task.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::resolve::TaskKey;

/// How a scheduled task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task body ran to completion.
    Completed,
    /// Superseded, cancelled, or shut down before it started.
    Cancelled,
    /// The task body panicked.
    Panicked,
}

/// Handle to a registered task.
///
/// Dropping the handle does not cancel the task.
#[derive(Debug)]
pub struct PendingTask {
    key: TaskKey,
    handle: JoinHandle<TaskOutcome>,
}

impl PendingTask {
    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Waits for the task to run or be cancelled.
    pub async fn wait(self) -> TaskOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(key = %self.key, error = %e, "scheduled task panicked");
                TaskOutcome::Panicked
            }
        }
    }
}

/// Result of [`Scheduler::schedule`].
#[derive(Debug)]
pub enum Scheduled {
    /// Zero delay: the task already ran.
    Ran,
    /// The task will run after its delay unless superseded.
    Pending(PendingTask),
}

/// A point-in-time view of one pending task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSnapshot {
    #[serde(flatten)]
    pub key: TaskKey,
    pub delay_secs: u64,
    pub remaining_secs: u64,
}

struct PendingEntry {
    id: u64,
    cancel: CancellationToken,
    delay: Duration,
    fires_at: Instant,
}

/// The most recent registration for a key. The next registration waits on
/// `done`, which resolves once this task is finished with the key.
struct Tail {
    id: u64,
    done: oneshot::Receiver<()>,
}

struct Inner {
    pending: Mutex<HashMap<TaskKey, PendingEntry>>,
    tails: Mutex<HashMap<TaskKey, Tail>>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

/// The pending-task table. Cheap to clone; clones share the table.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Waits for the previous task on the same key to finish with it.
///
/// A dropped sender counts as finished.
async fn wait_turn(previous: Option<oneshot::Receiver<()>>) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }
}

impl Scheduler {
    /// Creates a scheduler. Cancelling `shutdown` cancels every pending task.
    pub fn new(shutdown: CancellationToken) -> Self {
        Scheduler {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                tails: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                shutdown,
            }),
        }
    }

    /// Registers `task` and, for a zero delay, waits for it to run.
    pub async fn schedule<F>(&self, key: TaskKey, delay: Duration, task: F) -> Scheduled
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let registered = self.register(key, delay, task);
        if delay.is_zero() {
            registered.wait().await;
            Scheduled::Ran
        } else {
            Scheduled::Pending(registered)
        }
    }

    /// Registers `task` to run after `delay`, replacing any pending task for
    /// `key`. Returns without waiting for anything.
    ///
    /// A zero delay also cancels the pending task for `key`, then runs as soon
    /// as the key's earlier tasks are done.
    pub fn register<F>(&self, key: TaskKey, delay: Duration, task: F) -> PendingTask
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (done, turn) = oneshot::channel::<()>();
        let previous = lock(&self.inner.tails)
            .insert(key.clone(), Tail { id, done: turn })
            .map(|tail| tail.done);

        let cancel = if delay.is_zero() {
            if self.cancel(&key) {
                debug!(%key, "zero-delay task superseded a pending task");
            }
            None
        } else {
            let cancel = self.inner.shutdown.child_token();
            let entry = PendingEntry {
                id,
                cancel: cancel.clone(),
                delay,
                fires_at: Instant::now() + delay,
            };
            if let Some(superseded) = lock(&self.inner.pending).insert(key.clone(), entry) {
                superseded.cancel.cancel();
                debug!(%key, "superseded pending task");
            }
            Some(cancel)
        };
        trace!(%key, ?delay, "task registered");

        let scheduler = self.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            // Held until this task is done with the key, including on panic.
            let _done = done;

            if let Some(cancel) = &cancel {
                let fired = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => false,
                    _ = tokio::time::sleep(delay) => true,
                };
                if !fired {
                    // Our successor may only start once everything before us is done.
                    wait_turn(previous).await;
                    scheduler.release_tail(&task_key, id);
                    return TaskOutcome::Cancelled;
                }
            }

            wait_turn(previous).await;
            // A newer registration may have replaced us while we waited.
            let outcome = if cancel.is_none() || scheduler.claim(&task_key, id) {
                task.await;
                TaskOutcome::Completed
            } else {
                TaskOutcome::Cancelled
            };
            scheduler.release_tail(&task_key, id);
            outcome
        });

        PendingTask { key, handle }
    }

    /// Cancels the pending task for `key`, if any.
    pub fn cancel(&self, key: &TaskKey) -> bool {
        match lock(&self.inner.pending).remove(key) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &TaskKey) -> bool {
        lock(&self.inner.pending).contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    /// Snapshot of every pending task, ordered by key.
    pub fn pending(&self) -> Vec<PendingSnapshot> {
        let now = Instant::now();
        let mut snapshot: Vec<_> = lock(&self.inner.pending)
            .iter()
            .map(|(key, entry)| PendingSnapshot {
                key: key.clone(),
                delay_secs: entry.delay.as_secs(),
                remaining_secs: entry.fires_at.saturating_duration_since(now).as_secs(),
            })
            .collect();
        snapshot.sort_by(|a, b| a.key.cmp(&b.key));
        snapshot
    }

    /// Cancels every pending task.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        lock(&self.inner.pending).clear();
    }

    /// Removes the entry for `key` if it still belongs to task `id`.
    fn claim(&self, key: &TaskKey, id: u64) -> bool {
        let mut pending = lock(&self.inner.pending);
        match pending.get(key) {
            Some(entry) if entry.id == id => {
                pending.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Forgets the tail for `key` if task `id` is still the latest
    /// registration.
    fn release_tail(&self, key: &TaskKey, id: u64) {
        let mut tails = lock(&self.inner.tails);
        if tails.get(key).is_some_and(|tail| tail.id == id) {
            tails.remove(key);
        }
    }
}
