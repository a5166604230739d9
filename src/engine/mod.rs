//! The engine: event in, scheduled actions out.
//!
//! ```text
//! Event ──prepare──▶ [ActionRequest] ──dispatch──▶ Scheduler ──▶ ActionExecutor
//!          │
//!          ├─ commit events: list the PR's commits first
//!          └─ WIP pull requests: drop merge-family requests, post one failing status
//! ```
//!
//! Preparation and registration are done one event at a time by the
//! [`worker`], so registrations for one key follow event order. Zero-delay
//! requests start as soon as they are registered but run on tasks of their
//! own.

pub mod config;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Span, debug, info, instrument, warn};

use crate::effects::GitHubInterpreter;
use crate::executor::{ActionExecutor, ExecutorConfig, is_work_in_progress};
use crate::resolve::{ActionRequest, resolve, resolve_commits};
use crate::rules::RuleSet;
use crate::scheduler::{PendingTask, Scheduled, Scheduler};
use crate::types::{Event, EventPayload};

pub use config::EngineConfig;
pub use worker::{EventWorker, WorkerError, WorkerHandle, WorkerMessage};

/// Resolves events against one rule set and schedules the results.
#[derive(Clone)]
pub struct Engine {
    rules: Arc<RuleSet>,
    scheduler: Scheduler,
    executor_config: Arc<ExecutorConfig>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("scheduler", &self.scheduler)
            .field("executor_config", &self.executor_config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(rules: Arc<RuleSet>, scheduler: Scheduler, executor_config: ExecutorConfig) -> Self {
        Engine {
            rules,
            scheduler,
            executor_config: Arc::new(executor_config),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// An executor bound to `github`.
    pub fn executor<G: GitHubInterpreter>(&self, github: Arc<G>) -> ActionExecutor<G> {
        ActionExecutor::new(github, Arc::clone(&self.executor_config))
    }

    /// Prepares and dispatches `event` in one go.
    ///
    /// Zero-delay requests have run by the time this returns.
    pub async fn handle_event<G>(&self, event: &Event, github: Arc<G>) -> Vec<Scheduled>
    where
        G: GitHubInterpreter + Send + Sync + 'static,
    {
        let executor = self.executor(github);
        let requests = self.prepare(event, &executor).await;
        self.dispatch(requests, executor).await
    }

    /// Resolves `event` into action requests.
    ///
    /// Failures to read commits are logged and resolve to nothing; the event
    /// is never retried.
    #[instrument(skip_all, fields(repo = %event.repo, issue = %event.target, kind = ?event.kind()))]
    pub async fn prepare<G: GitHubInterpreter>(
        &self,
        event: &Event,
        executor: &ActionExecutor<G>,
    ) -> Vec<ActionRequest> {
        let mut requests = match &event.payload {
            EventPayload::CommitPushed { .. } if self.rules.commits().is_empty() => Vec::new(),
            EventPayload::CommitPushed { .. } => match executor.list_commits(event.target).await {
                Ok(commits) => resolve_commits(&self.rules, event, &commits),
                Err(e) => {
                    warn!(error = %e, "could not list commits; skipping commit rules");
                    Vec::new()
                }
            },
            _ => resolve(&self.rules, event),
        };

        if let Some(pr) = event.pull_request()
            && is_work_in_progress(&pr.title, &pr.labels)
        {
            let before = requests.len();
            requests.retain(|request| !request.kind().is_merge_family());
            let dropped = before - requests.len();
            if dropped > 0 {
                info!(dropped, "pull request is work in progress; dropping merge actions");
                if let Err(e) = executor.report_work_in_progress(&pr.head_sha).await {
                    warn!(error = %e, "failed to post work-in-progress status");
                }
            }
        }

        debug!(count = requests.len(), "resolved action requests");
        requests
    }

    /// Registers `requests` with the scheduler, in order, without waiting
    /// for any of them to run.
    pub fn register<G>(
        &self,
        requests: Vec<ActionRequest>,
        executor: &ActionExecutor<G>,
    ) -> Vec<(Duration, PendingTask)>
    where
        G: GitHubInterpreter + Send + Sync + 'static,
    {
        requests
            .into_iter()
            .map(|request| {
                let key = request.key();
                let delay = request.delay;
                debug!(%key, ?delay, trigger = %request.trigger, "scheduling action");

                let executor = executor.clone();
                let task = async move {
                    // The executor logs every outcome.
                    let _ = executor.run(request).await;
                }
                .instrument(Span::current());
                (delay, self.scheduler.register(key, delay, task))
            })
            .collect()
    }

    /// Registers `requests`, then waits for the zero-delay ones to run.
    pub async fn dispatch<G>(
        &self,
        requests: Vec<ActionRequest>,
        executor: ActionExecutor<G>,
    ) -> Vec<Scheduled>
    where
        G: GitHubInterpreter + Send + Sync + 'static,
    {
        let mut scheduled = Vec::with_capacity(requests.len());
        for (delay, task) in self.register(requests, &executor) {
            if delay.is_zero() {
                task.wait().await;
                scheduled.push(Scheduled::Ran);
            } else {
                scheduled.push(Scheduled::Pending(task));
            }
        }
        scheduled
    }
}
