//! Action execution.
//!
//! Turns a resolved [`ActionRequest`] into GitHub effects. Each action kind
//! has its own precondition and a fixed side-effect order (a close comment is
//! always posted before the close).
//!
//! Failures stay inside the executor: [`ActionExecutor::run`] logs every
//! outcome, and callers are free to drop the returned result. The only
//! action-level retry is a single delayed retry of `lock`.

pub mod gate;
pub mod poll;
pub mod preconditions;

use chrono::{Datelike, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::effects::{
    CommitData, CommitState, GitHubEffect, GitHubInterpreter, GitHubResponse, IssueState,
    PullRequestData,
};
use crate::resolve::{Action, ActionRequest};
use crate::rules::{ActionKind, BranchFilter};
use crate::types::{CommentId, IssueNumber, Sha, TargetKind};

pub use gate::{GateStatus, MergeGate};
pub use poll::{PollOutcome, PollPolicy, Step, poll_until};
pub use preconditions::{SkipReason, is_work_in_progress};

/// Default delay before the one retry of a failed `lock`.
const LOCK_RETRY_DELAY_SECS: u64 = 60;

/// Default prefix for the commit status contexts we create.
pub const DEFAULT_STATUS_CONTEXT: &str = "triage-bot";

const WIP_STATUS_DESCRIPTION: &str = "Work in progress";
const BLOCK_STATUS_DESCRIPTION: &str = "Merging is blocked by a label";

/// Executor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub gate: PollPolicy,
    pub mergeability: PollPolicy,
    pub lock_retry_delay: Duration,
    /// Prefix for commit status contexts (`<context>/wip`, `<context>/block`).
    pub status_context: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            gate: PollPolicy::STATUS_GATE,
            mergeability: PollPolicy::MERGEABILITY,
            lock_retry_delay: Duration::from_secs(LOCK_RETRY_DELAY_SECS),
            status_context: DEFAULT_STATUS_CONTEXT.to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn wip_context(&self) -> String {
        format!("{}/wip", self.status_context)
    }

    pub fn block_context(&self) -> String {
        format!("{}/block", self.status_context)
    }
}

/// What happened to an action that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Performed,
    Skipped(SkipReason),
}

/// Why an action failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("{call} failed: {message}")]
    External { call: &'static str, message: String },

    #[error("{call} returned an unexpected response")]
    UnexpectedResponse { call: &'static str },

    #[error("status checks failed")]
    ChecksFailed,

    #[error("status checks still pending after {attempts} attempts")]
    GateTimeout { attempts: u32 },

    #[error("mergeability still unknown after {attempts} attempts")]
    NotMergeable { attempts: u32 },

    #[error("pull request has merge conflicts")]
    Conflicts,
}

/// The name of the tag created for a merged pull request:
/// `v<year>.<month>.<day>-<number>`, without zero padding.
pub fn tag_name(date: NaiveDate, pr: IssueNumber) -> String {
    format!("v{}.{}.{}-{}", date.year(), date.month(), date.day(), pr.0)
}

/// Executes action requests against one repository.
pub struct ActionExecutor<G> {
    github: Arc<G>,
    config: Arc<ExecutorConfig>,
}

impl<G> Clone for ActionExecutor<G> {
    fn clone(&self) -> Self {
        ActionExecutor {
            github: Arc::clone(&self.github),
            config: Arc::clone(&self.config),
        }
    }
}

impl<G> std::fmt::Debug for ActionExecutor<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<G: GitHubInterpreter> ActionExecutor<G> {
    pub fn new(github: Arc<G>, config: Arc<ExecutorConfig>) -> Self {
        ActionExecutor { github, config }
    }

    /// Executes `request` and logs the outcome.
    ///
    /// A `lock` that fails on an external call is retried once after
    /// `lock_retry_delay`.
    #[instrument(
        skip(self, request),
        fields(repo = %request.repo, issue = %request.target, action = %request.kind(), trigger = %request.trigger)
    )]
    pub async fn run(&self, request: ActionRequest) -> Result<ActionOutcome, ActionError> {
        let result = match self.execute(&request).await {
            Err(e @ ActionError::External { .. }) if request.kind() == ActionKind::Lock => {
                warn!(
                    error = %e,
                    retry_in = ?self.config.lock_retry_delay,
                    "lock failed; retrying once"
                );
                tokio::time::sleep(self.config.lock_retry_delay).await;
                self.execute(&request).await
            }
            other => other,
        };

        match &result {
            Ok(ActionOutcome::Performed) => info!("action performed"),
            Ok(ActionOutcome::Skipped(reason)) => info!(%reason, "action skipped"),
            Err(e @ (ActionError::External { .. } | ActionError::UnexpectedResponse { .. })) => {
                error!(error = %e, "action failed")
            }
            Err(e) => warn!(error = %e, "action abandoned"),
        }
        result
    }

    async fn execute(&self, request: &ActionRequest) -> Result<ActionOutcome, ActionError> {
        let target = request.target;
        match &request.action {
            Action::Close { comment } => self.close(target, comment.as_deref()).await,
            Action::Open => {
                self.set_state(target, IssueState::Open).await?;
                Ok(ActionOutcome::Performed)
            }
            Action::Comment { message } => {
                if message.trim().is_empty() {
                    return Ok(ActionOutcome::Skipped(SkipReason::EmptyMessage));
                }
                self.comment(target, message).await?;
                Ok(ActionOutcome::Performed)
            }
            Action::Lock { terminal, comment } => {
                self.lock(target, *terminal, comment.as_deref()).await
            }
            Action::Merge {
                label,
                protected,
                blocking_labels,
            } => {
                if request.target_kind != TargetKind::PullRequest {
                    return Ok(ActionOutcome::Skipped(SkipReason::NotPullRequest));
                }
                self.merge(target, label, protected, blocking_labels).await
            }
            Action::DeleteBranch {
                head_ref,
                base_ref,
                protected,
            } => self.delete_branch(head_ref, base_ref, protected).await,
            Action::Tag {
                merge_commit_sha,
                base_ref,
                unless,
            } => self.tag(target, merge_commit_sha.as_ref(), base_ref, unless).await,
            Action::Label { labels } => {
                if labels.is_empty() {
                    return Ok(ActionOutcome::Skipped(SkipReason::NoLabels));
                }
                self.call(GitHubEffect::AddLabels {
                    issue: target,
                    labels: labels.clone(),
                })
                .await?;
                Ok(ActionOutcome::Performed)
            }
            Action::DeleteComment { comment_id } => self.delete_comment(*comment_id).await,
            Action::BlockMerge { comment } => {
                if request.target_kind != TargetKind::PullRequest {
                    return Ok(ActionOutcome::Skipped(SkipReason::NotPullRequest));
                }
                self.block_merge(target, comment.as_deref()).await
            }
        }
    }

    /// Posts the failing `<context>/wip` status on `sha`.
    pub async fn report_work_in_progress(&self, sha: &Sha) -> Result<(), ActionError> {
        self.call(GitHubEffect::CreateCommitStatus {
            sha: sha.clone(),
            state: CommitState::Failure,
            context: self.config.wip_context(),
            description: WIP_STATUS_DESCRIPTION.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Reads every commit of a pull request.
    pub async fn list_commits(&self, pr: IssueNumber) -> Result<Vec<CommitData>, ActionError> {
        match self.call(GitHubEffect::ListCommits { pr }).await? {
            GitHubResponse::Commits(commits) => Ok(commits),
            _ => Err(ActionError::UnexpectedResponse {
                call: "list_commits",
            }),
        }
    }

    // ─── Actions ──────────────────────────────────────────────────────────────

    async fn close(
        &self,
        target: IssueNumber,
        comment: Option<&str>,
    ) -> Result<ActionOutcome, ActionError> {
        if let Some(body) = comment {
            self.comment(target, body).await?;
        }
        self.set_state(target, IssueState::Closed).await?;
        Ok(ActionOutcome::Performed)
    }

    async fn lock(
        &self,
        target: IssueNumber,
        terminal: bool,
        comment: Option<&str>,
    ) -> Result<ActionOutcome, ActionError> {
        if !terminal {
            return Ok(ActionOutcome::Skipped(SkipReason::NotTerminal));
        }
        self.call(GitHubEffect::LockConversation { issue: target }).await?;
        if let Some(body) = comment {
            self.comment(target, body).await?;
        }
        Ok(ActionOutcome::Performed)
    }

    async fn merge(
        &self,
        target: IssueNumber,
        label: &str,
        protected: &BranchFilter,
        blocking_labels: &[String],
    ) -> Result<ActionOutcome, ActionError> {
        let pr = self.pull_request(target).await?;
        if let Err(reason) = preconditions::check_merge(&pr, protected, blocking_labels) {
            if reason == SkipReason::WorkInProgress {
                self.report_work_in_progress(&pr.head_sha).await?;
            }
            return Ok(ActionOutcome::Skipped(reason));
        }

        let gate = MergeGate::run(self.github.as_ref(), &pr.head_sha, self.config.gate).await;
        match gate.status() {
            GateStatus::Success => {}
            GateStatus::Failure => return Err(ActionError::ChecksFailed),
            GateStatus::Polling | GateStatus::Timeout => {
                return Err(ActionError::GateTimeout {
                    attempts: gate.attempts_made(),
                });
            }
        }

        self.await_mergeable(target).await?;

        match self.call(GitHubEffect::MergePullRequest { pr: target }).await? {
            GitHubResponse::Merged { sha } => info!(sha = %sha.short(), "pull request merged"),
            _ => {
                return Err(ActionError::UnexpectedResponse {
                    call: "merge_pull_request",
                });
            }
        }

        // The merge stands even if the label lingers.
        if let Err(e) = self
            .call(GitHubEffect::RemoveLabel {
                issue: target,
                label: label.to_string(),
            })
            .await
        {
            warn!(error = %e, label, "merged, but failed to remove the triggering label");
        }
        Ok(ActionOutcome::Performed)
    }

    async fn await_mergeable(&self, target: IssueNumber) -> Result<(), ActionError> {
        let outcome: PollOutcome<(), ()> = poll_until(
            self.config.mergeability,
            move |attempt| self.mergeable(target, attempt),
            |mergeable| match mergeable {
                Some(true) => Step::Done(()),
                Some(false) => Step::Abort(()),
                None => Step::Pending,
            },
        )
        .await;

        match outcome {
            PollOutcome::Done { .. } => Ok(()),
            PollOutcome::Aborted { .. } => Err(ActionError::Conflicts),
            PollOutcome::Exhausted { attempts } => Err(ActionError::NotMergeable { attempts }),
        }
    }

    /// `None` while GitHub is still computing, or when the read failed.
    async fn mergeable(&self, target: IssueNumber, attempt: u32) -> Option<bool> {
        match self.pull_request(target).await {
            Ok(pr) => {
                debug!(attempt, mergeable = ?pr.mergeable, "polled mergeability");
                pr.mergeable
            }
            Err(e) => {
                warn!(attempt, error = %e, "mergeability poll failed");
                None
            }
        }
    }

    async fn delete_branch(
        &self,
        head_ref: &str,
        base_ref: &str,
        protected: &BranchFilter,
    ) -> Result<ActionOutcome, ActionError> {
        if let Err(reason) = preconditions::check_delete_branch(head_ref, base_ref, protected) {
            return Ok(ActionOutcome::Skipped(reason));
        }
        self.call(GitHubEffect::DeleteRef {
            ref_name: format!("heads/{head_ref}"),
        })
        .await?;
        Ok(ActionOutcome::Performed)
    }

    async fn tag(
        &self,
        target: IssueNumber,
        merge_commit_sha: Option<&Sha>,
        base_ref: &str,
        unless: &BranchFilter,
    ) -> Result<ActionOutcome, ActionError> {
        let Some(commit) = merge_commit_sha else {
            return Ok(ActionOutcome::Skipped(SkipReason::NoMergeCommit));
        };
        if unless.matches(base_ref) {
            return Ok(ActionOutcome::Skipped(SkipReason::ProtectedBranch {
                branch: base_ref.to_string(),
            }));
        }

        let name = tag_name(Utc::now().date_naive(), target);
        let response = self
            .call(GitHubEffect::CreateTag {
                tag: name.clone(),
                message: format!("Merged PR #{}", target.0),
                object: commit.clone(),
            })
            .await?;
        let GitHubResponse::TagCreated { sha: tag_sha } = response else {
            return Err(ActionError::UnexpectedResponse { call: "create_tag" });
        };

        self.call(GitHubEffect::CreateRef {
            ref_name: format!("refs/tags/{name}"),
            sha: tag_sha,
        })
        .await?;
        info!(tag = %name, "tagged merge commit");
        Ok(ActionOutcome::Performed)
    }

    async fn delete_comment(&self, comment_id: CommentId) -> Result<ActionOutcome, ActionError> {
        self.call(GitHubEffect::DeleteComment { comment_id }).await?;
        Ok(ActionOutcome::Performed)
    }

    async fn block_merge(
        &self,
        target: IssueNumber,
        comment: Option<&str>,
    ) -> Result<ActionOutcome, ActionError> {
        let pr = self.pull_request(target).await?;
        self.call(GitHubEffect::CreateCommitStatus {
            sha: pr.head_sha,
            state: CommitState::Failure,
            context: self.config.block_context(),
            description: BLOCK_STATUS_DESCRIPTION.to_string(),
        })
        .await?;
        if let Some(body) = comment {
            self.comment(target, body).await?;
        }
        Ok(ActionOutcome::Performed)
    }

    // ─── Effect helpers ───────────────────────────────────────────────────────

    async fn call(&self, effect: GitHubEffect) -> Result<GitHubResponse, ActionError> {
        let call = effect.name();
        self.github
            .interpret(effect)
            .await
            .map_err(|e| ActionError::External {
                call,
                message: e.to_string(),
            })
    }

    async fn comment(&self, target: IssueNumber, body: &str) -> Result<(), ActionError> {
        self.call(GitHubEffect::CreateComment {
            issue: target,
            body: body.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn set_state(&self, target: IssueNumber, state: IssueState) -> Result<(), ActionError> {
        self.call(GitHubEffect::SetIssueState {
            issue: target,
            state,
        })
        .await?;
        Ok(())
    }

    async fn pull_request(&self, target: IssueNumber) -> Result<PullRequestData, ActionError> {
        match self.call(GitHubEffect::GetPullRequest { pr: target }).await? {
            GitHubResponse::PullRequest(pr) => Ok(pr),
            _ => Err(ActionError::UnexpectedResponse {
                call: "get_pull_request",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::CombinedState;
    use crate::resolve::Trigger;
    use crate::test_utils::{FakeGitHub, TAG_SHA, pull_request};
    use crate::types::RepoId;
    use tokio::time::Instant;

    fn executor(github: FakeGitHub) -> (ActionExecutor<FakeGitHub>, Arc<FakeGitHub>) {
        let github = Arc::new(github);
        let executor = ActionExecutor::new(Arc::clone(&github), Arc::new(ExecutorConfig::default()));
        (executor, github)
    }

    fn request(target_kind: TargetKind, action: Action) -> ActionRequest {
        ActionRequest {
            repo: RepoId::new("octo", "widgets"),
            target: IssueNumber(5),
            target_kind,
            delay: Duration::ZERO,
            action,
            trigger: Trigger::Label("test".to_string()),
        }
    }

    fn merge_action() -> Action {
        Action::Merge {
            label: "automerge".to_string(),
            protected: BranchFilter::empty(),
            blocking_labels: vec!["do not merge".to_string()],
        }
    }

    fn filter(patterns: &[&str]) -> BranchFilter {
        BranchFilter::new(patterns.iter().copied()).unwrap()
    }

    #[test]
    fn tag_names_are_unpadded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(tag_name(date, IssueNumber(42)), "v2024.3.7-42");
        let date = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert_eq!(tag_name(date, IssueNumber(1)), "v2025.12.31-1");
    }

    // ─── close / open / comment ───────────────────────────────────────────────

    #[tokio::test]
    async fn close_posts_comment_before_closing() {
        let (executor, github) = executor(FakeGitHub::new());

        let outcome = executor
            .run(request(
                TargetKind::Issue,
                Action::Close {
                    comment: Some("Closing as stale.".to_string()),
                },
            ))
            .await;

        assert_eq!(outcome, Ok(ActionOutcome::Performed));
        assert_eq!(
            github.calls(),
            vec![
                GitHubEffect::CreateComment {
                    issue: IssueNumber(5),
                    body: "Closing as stale.".to_string(),
                },
                GitHubEffect::SetIssueState {
                    issue: IssueNumber(5),
                    state: IssueState::Closed,
                },
            ]
        );
    }

    #[tokio::test]
    async fn close_without_comment_only_closes() {
        let (executor, github) = executor(FakeGitHub::new());

        executor
            .run(request(TargetKind::Issue, Action::Close { comment: None }))
            .await
            .unwrap();

        assert_eq!(github.count("create_comment"), 0);
        assert_eq!(github.count("set_issue_state"), 1);
    }

    #[tokio::test]
    async fn failed_comment_prevents_close() {
        let (executor, github) = executor(FakeGitHub::new().fail("create_comment"));

        let outcome = executor
            .run(request(
                TargetKind::Issue,
                Action::Close {
                    comment: Some("bye".to_string()),
                },
            ))
            .await;

        assert!(matches!(
            outcome,
            Err(ActionError::External {
                call: "create_comment",
                ..
            })
        ));
        assert_eq!(github.count("set_issue_state"), 0);
    }

    #[tokio::test]
    async fn open_reopens() {
        let (executor, github) = executor(FakeGitHub::new());

        executor.run(request(TargetKind::Issue, Action::Open)).await.unwrap();

        assert_eq!(
            github.calls(),
            vec![GitHubEffect::SetIssueState {
                issue: IssueNumber(5),
                state: IssueState::Open,
            }]
        );
    }

    #[tokio::test]
    async fn empty_comment_is_skipped() {
        let (executor, github) = executor(FakeGitHub::new());

        let outcome = executor
            .run(request(
                TargetKind::Issue,
                Action::Comment {
                    message: "  ".to_string(),
                },
            ))
            .await;

        assert_eq!(outcome, Ok(ActionOutcome::Skipped(SkipReason::EmptyMessage)));
        assert!(github.calls().is_empty());
    }

    #[tokio::test]
    async fn external_failures_are_not_retried() {
        let (executor, github) = executor(FakeGitHub::new().fail("set_issue_state"));

        let outcome = executor.run(request(TargetKind::Issue, Action::Open)).await;

        assert!(outcome.is_err());
        assert_eq!(github.count("set_issue_state"), 1);
    }

    // ─── lock ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn lock_requires_terminal_target() {
        let (executor, github) = executor(FakeGitHub::new());

        let outcome = executor
            .run(request(
                TargetKind::Issue,
                Action::Lock {
                    terminal: false,
                    comment: None,
                },
            ))
            .await;

        assert_eq!(outcome, Ok(ActionOutcome::Skipped(SkipReason::NotTerminal)));
        assert!(github.calls().is_empty());
    }

    #[tokio::test]
    async fn lock_then_follow_up_comment() {
        let (executor, github) = executor(FakeGitHub::new());

        executor
            .run(request(
                TargetKind::Issue,
                Action::Lock {
                    terminal: true,
                    comment: Some("Locked.".to_string()),
                },
            ))
            .await
            .unwrap();

        let names: Vec<_> = github.calls().iter().map(GitHubEffect::name).collect();
        assert_eq!(names, vec!["lock_conversation", "create_comment"]);
    }

    #[tokio::test(start_paused = true)]
    async fn lock_is_retried_once_after_a_minute() {
        let (executor, github) = executor(FakeGitHub::new().fail_times("lock_conversation", 1));
        let start = Instant::now();

        let outcome = executor
            .run(request(
                TargetKind::Issue,
                Action::Lock {
                    terminal: true,
                    comment: None,
                },
            ))
            .await;

        assert_eq!(outcome, Ok(ActionOutcome::Performed));
        assert_eq!(github.count("lock_conversation"), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn lock_gives_up_after_one_retry() {
        let (executor, github) = executor(FakeGitHub::new().fail("lock_conversation"));

        let outcome = executor
            .run(request(
                TargetKind::Issue,
                Action::Lock {
                    terminal: true,
                    comment: None,
                },
            ))
            .await;

        assert!(outcome.is_err());
        assert_eq!(github.count("lock_conversation"), 2);
    }

    // ─── merge ────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn merge_waits_for_green_checks_then_merges() {
        let (executor, github) = executor(FakeGitHub::new().with_statuses([
            CombinedState::Pending,
            CombinedState::Pending,
            CombinedState::Success,
        ]));
        let start = Instant::now();

        let outcome = executor
            .run(request(TargetKind::PullRequest, merge_action()))
            .await;

        assert_eq!(outcome, Ok(ActionOutcome::Performed));
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        let names: Vec<_> = github.calls().iter().map(GitHubEffect::name).collect();
        assert_eq!(
            names,
            vec![
                "get_pull_request",
                "get_combined_status",
                "get_combined_status",
                "get_combined_status",
                "get_pull_request",
                "merge_pull_request",
                "remove_label",
            ]
        );
        assert!(github.calls().contains(&GitHubEffect::RemoveLabel {
            issue: IssueNumber(5),
            label: "automerge".to_string(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn gate_timeout_never_merges() {
        let (executor, github) =
            executor(FakeGitHub::new().with_statuses([CombinedState::Pending; 30]));

        let outcome = executor
            .run(request(TargetKind::PullRequest, merge_action()))
            .await;

        assert_eq!(outcome, Err(ActionError::GateTimeout { attempts: 30 }));
        assert_eq!(github.count("get_combined_status"), 30);
        assert_eq!(github.count("merge_pull_request"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_checks_never_merge() {
        let (executor, github) =
            executor(FakeGitHub::new().with_statuses([CombinedState::Failure]));

        let outcome = executor
            .run(request(TargetKind::PullRequest, merge_action()))
            .await;

        assert_eq!(outcome, Err(ActionError::ChecksFailed));
        assert_eq!(github.count("merge_pull_request"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mergeability_is_polled_until_known() {
        let mut unknown = pull_request(5);
        unknown.mergeable = None;
        let (executor, github) = executor(FakeGitHub::new().with_pull_requests([
            unknown.clone(),
            unknown,
            pull_request(5),
        ]));
        let start = Instant::now();

        let outcome = executor
            .run(request(TargetKind::PullRequest, merge_action()))
            .await;

        assert_eq!(outcome, Ok(ActionOutcome::Performed));
        assert_eq!(github.count("get_pull_request"), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_mergeability_aborts_after_five_attempts() {
        let mut unknown = pull_request(5);
        unknown.mergeable = None;
        let (executor, github) = executor(FakeGitHub::new().with_pull_requests([unknown]));

        let outcome = executor
            .run(request(TargetKind::PullRequest, merge_action()))
            .await;

        assert_eq!(outcome, Err(ActionError::NotMergeable { attempts: 5 }));
        // One precondition read plus five mergeability polls.
        assert_eq!(github.count("get_pull_request"), 6);
        assert_eq!(github.count("merge_pull_request"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn conflicts_abort_merge() {
        let mut conflicted = pull_request(5);
        conflicted.mergeable = Some(false);
        let (executor, github) = executor(FakeGitHub::new().with_pull_requests([conflicted]));

        let outcome = executor
            .run(request(TargetKind::PullRequest, merge_action()))
            .await;

        assert_eq!(outcome, Err(ActionError::Conflicts));
        assert_eq!(github.count("merge_pull_request"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wip_pull_request_gets_one_failing_status_and_no_merge() {
        let mut pr = pull_request(5);
        pr.title = "WIP: widgets".to_string();
        let (executor, github) = executor(FakeGitHub::new().with_pull_requests([pr.clone()]));

        let outcome = executor
            .run(request(TargetKind::PullRequest, merge_action()))
            .await;

        assert_eq!(outcome, Ok(ActionOutcome::Skipped(SkipReason::WorkInProgress)));
        assert_eq!(
            github.calls_named("create_commit_status"),
            vec![GitHubEffect::CreateCommitStatus {
                sha: pr.head_sha,
                state: CommitState::Failure,
                context: "triage-bot/wip".to_string(),
                description: WIP_STATUS_DESCRIPTION.to_string(),
            }]
        );
        assert_eq!(github.count("get_combined_status"), 0);
        assert_eq!(github.count("merge_pull_request"), 0);
    }

    #[tokio::test]
    async fn blocking_label_skips_merge() {
        let mut pr = pull_request(5);
        pr.labels = vec!["do not merge".to_string()];
        let (executor, github) = executor(FakeGitHub::new().with_pull_requests([pr]));

        let outcome = executor
            .run(request(TargetKind::PullRequest, merge_action()))
            .await;

        assert!(matches!(
            outcome,
            Ok(ActionOutcome::Skipped(SkipReason::BlockingLabel { .. }))
        ));
        assert_eq!(github.count("merge_pull_request"), 0);
    }

    #[tokio::test]
    async fn merge_into_protected_base_is_skipped() {
        let (executor, github) = executor(FakeGitHub::new());

        let outcome = executor
            .run(request(
                TargetKind::PullRequest,
                Action::Merge {
                    label: "automerge".to_string(),
                    protected: filter(&["main"]),
                    blocking_labels: vec![],
                },
            ))
            .await;

        assert!(matches!(
            outcome,
            Ok(ActionOutcome::Skipped(SkipReason::ProtectedBranch { .. }))
        ));
        assert_eq!(github.count("get_combined_status"), 0);
    }

    #[tokio::test]
    async fn merge_on_plain_issue_is_skipped() {
        let (executor, github) = executor(FakeGitHub::new());

        let outcome = executor.run(request(TargetKind::Issue, merge_action())).await;

        assert_eq!(outcome, Ok(ActionOutcome::Skipped(SkipReason::NotPullRequest)));
        assert!(github.calls().is_empty());
    }

    #[tokio::test]
    async fn label_removal_failure_does_not_fail_merge() {
        let (executor, github) = executor(FakeGitHub::new().fail("remove_label"));

        let outcome = executor
            .run(request(TargetKind::PullRequest, merge_action()))
            .await;

        assert_eq!(outcome, Ok(ActionOutcome::Performed));
        assert_eq!(github.count("merge_pull_request"), 1);
    }

    // ─── delete_branch / tag ──────────────────────────────────────────────────

    fn delete_branch(head: &str, base: &str, protected: &[&str]) -> Action {
        Action::DeleteBranch {
            head_ref: head.to_string(),
            base_ref: base.to_string(),
            protected: filter(protected),
        }
    }

    #[tokio::test]
    async fn delete_branch_deletes_head_ref() {
        let (executor, github) = executor(FakeGitHub::new());

        executor
            .run(request(TargetKind::PullRequest, delete_branch("feature", "main", &[])))
            .await
            .unwrap();

        assert_eq!(
            github.calls(),
            vec![GitHubEffect::DeleteRef {
                ref_name: "heads/feature".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn delete_branch_never_touches_base_or_protected_branches() {
        let (executor, github) = executor(FakeGitHub::new());

        let same = executor
            .run(request(TargetKind::PullRequest, delete_branch("main", "main", &[])))
            .await;
        let protected = executor
            .run(request(
                TargetKind::PullRequest,
                delete_branch("release/2.0", "main", &["release/*"]),
            ))
            .await;

        assert!(matches!(same, Ok(ActionOutcome::Skipped(SkipReason::SameBranch { .. }))));
        assert!(matches!(
            protected,
            Ok(ActionOutcome::Skipped(SkipReason::ProtectedBranch { .. }))
        ));
        assert_eq!(github.count("delete_ref"), 0);
    }

    #[tokio::test]
    async fn tag_creates_tag_object_then_ref() {
        let (executor, github) = executor(FakeGitHub::new());
        let merge_sha = Sha::new("c".repeat(40));

        executor
            .run(request(
                TargetKind::PullRequest,
                Action::Tag {
                    merge_commit_sha: Some(merge_sha.clone()),
                    base_ref: "main".to_string(),
                    unless: BranchFilter::empty(),
                },
            ))
            .await
            .unwrap();

        let calls = github.calls();
        assert_eq!(calls.len(), 2);
        let GitHubEffect::CreateTag {
            tag,
            message,
            object,
        } = &calls[0]
        else {
            panic!("expected create_tag first, got {:?}", calls[0]);
        };
        assert!(tag.starts_with('v') && tag.ends_with("-5"), "{tag}");
        assert_eq!(message, "Merged PR #5");
        assert_eq!(object, &merge_sha);
        assert_eq!(
            calls[1],
            GitHubEffect::CreateRef {
                ref_name: format!("refs/tags/{tag}"),
                sha: Sha::new(TAG_SHA),
            }
        );
    }

    #[tokio::test]
    async fn tag_needs_merge_commit_and_unprotected_base() {
        let (executor, github) = executor(FakeGitHub::new());

        let missing = executor
            .run(request(
                TargetKind::PullRequest,
                Action::Tag {
                    merge_commit_sha: None,
                    base_ref: "main".to_string(),
                    unless: BranchFilter::empty(),
                },
            ))
            .await;
        let excluded = executor
            .run(request(
                TargetKind::PullRequest,
                Action::Tag {
                    merge_commit_sha: Some(Sha::new("c".repeat(40))),
                    base_ref: "develop".to_string(),
                    unless: filter(&["develop"]),
                },
            ))
            .await;

        assert_eq!(missing, Ok(ActionOutcome::Skipped(SkipReason::NoMergeCommit)));
        assert!(matches!(
            excluded,
            Ok(ActionOutcome::Skipped(SkipReason::ProtectedBranch { .. }))
        ));
        assert!(github.calls().is_empty());
    }

    // ─── label / delete_comment / block_merge ─────────────────────────────────

    #[tokio::test]
    async fn label_adds_labels() {
        let (executor, github) = executor(FakeGitHub::new());

        executor
            .run(request(
                TargetKind::Issue,
                Action::Label {
                    labels: vec!["bug".to_string(), "triage".to_string()],
                },
            ))
            .await
            .unwrap();

        assert_eq!(
            github.calls(),
            vec![GitHubEffect::AddLabels {
                issue: IssueNumber(5),
                labels: vec!["bug".to_string(), "triage".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn delete_comment_deletes_by_id() {
        let (executor, github) = executor(FakeGitHub::new());

        executor
            .run(request(
                TargetKind::Issue,
                Action::DeleteComment {
                    comment_id: CommentId(77),
                },
            ))
            .await
            .unwrap();

        assert_eq!(
            github.calls(),
            vec![GitHubEffect::DeleteComment {
                comment_id: CommentId(77),
            }]
        );
    }

    #[tokio::test]
    async fn block_merge_posts_failing_status_then_comment() {
        let (executor, github) = executor(FakeGitHub::new());

        executor
            .run(request(
                TargetKind::PullRequest,
                Action::BlockMerge {
                    comment: Some("Blocked.".to_string()),
                },
            ))
            .await
            .unwrap();

        let calls = github.calls();
        let names: Vec<_> = calls.iter().map(GitHubEffect::name).collect();
        assert_eq!(
            names,
            vec!["get_pull_request", "create_commit_status", "create_comment"]
        );
        assert!(matches!(
            &calls[1],
            GitHubEffect::CreateCommitStatus {
                state: CommitState::Failure,
                context,
                ..
            } if context == "triage-bot/block"
        ));
    }
}
