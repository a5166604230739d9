//! GitHub API effect types.
//!
//! These types describe GitHub API operations as data, without executing them.
//! An interpreter (see `github::OctocrabClient`) executes them against the
//! actual API; tests use a recording fake instead.

use serde::{Deserialize, Serialize};

use crate::types::{CommentId, IssueNumber, Sha};

/// Open or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

/// The state of a single commit status we create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl CommitState {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        }
    }
}

/// The combined status of a commit, as the merge gate sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinedState {
    Success,
    Failure,
    Pending,
}

impl CombinedState {
    /// Maps GitHub's combined `state` string.
    ///
    /// `error` counts as a failure. Anything unrecognised is still pending.
    pub fn from_api_str(s: &str) -> Self {
        match s {
            "success" => CombinedState::Success,
            "failure" | "error" => CombinedState::Failure,
            _ => CombinedState::Pending,
        }
    }
}

/// A GitHub API effect.
///
/// Effects are repo-scoped: the interpreter is constructed with a `RepoId`, so
/// effects don't include it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GitHubEffect {
    // ─── Issues ───────────────────────────────────────────────────────────────
    /// Open or close an issue or pull request.
    SetIssueState {
        issue: IssueNumber,
        state: IssueState,
    },

    CreateComment { issue: IssueNumber, body: String },

    DeleteComment { comment_id: CommentId },

    AddLabels {
        issue: IssueNumber,
        labels: Vec<String>,
    },

    RemoveLabel { issue: IssueNumber, label: String },

    /// Lock the conversation with reason `resolved`.
    LockConversation { issue: IssueNumber },

    // ─── Git data ─────────────────────────────────────────────────────────────
    /// Delete a ref, e.g. `heads/feature`.
    DeleteRef { ref_name: String },

    /// Create an annotated tag object pointing at a commit.
    CreateTag {
        tag: String,
        message: String,
        object: Sha,
    },

    /// Create a ref, e.g. `refs/tags/v2024.1.2-7`.
    CreateRef { ref_name: String, sha: Sha },

    // ─── Pull requests ────────────────────────────────────────────────────────
    MergePullRequest { pr: IssueNumber },

    GetPullRequest { pr: IssueNumber },

    ListCommits { pr: IssueNumber },

    // ─── Statuses ─────────────────────────────────────────────────────────────
    /// Combined status for a ref.
    GetCombinedStatus { sha: Sha },

    CreateCommitStatus {
        sha: Sha,
        state: CommitState,
        context: String,
        description: String,
    },
}

impl GitHubEffect {
    /// A short name for logging and for scripting failures in tests.
    pub fn name(&self) -> &'static str {
        match self {
            GitHubEffect::SetIssueState { .. } => "set_issue_state",
            GitHubEffect::CreateComment { .. } => "create_comment",
            GitHubEffect::DeleteComment { .. } => "delete_comment",
            GitHubEffect::AddLabels { .. } => "add_labels",
            GitHubEffect::RemoveLabel { .. } => "remove_label",
            GitHubEffect::LockConversation { .. } => "lock_conversation",
            GitHubEffect::DeleteRef { .. } => "delete_ref",
            GitHubEffect::CreateTag { .. } => "create_tag",
            GitHubEffect::CreateRef { .. } => "create_ref",
            GitHubEffect::MergePullRequest { .. } => "merge_pull_request",
            GitHubEffect::GetPullRequest { .. } => "get_pull_request",
            GitHubEffect::ListCommits { .. } => "list_commits",
            GitHubEffect::GetCombinedStatus { .. } => "get_combined_status",
            GitHubEffect::CreateCommitStatus { .. } => "create_commit_status",
        }
    }

    /// Whether repeating the call after an ambiguous failure is harmless.
    ///
    /// Merging and creating tags or refs are not: a second attempt after a
    /// lost response fails with "already exists" or merges twice.
    pub fn is_retry_safe(&self) -> bool {
        !matches!(
            self,
            GitHubEffect::MergePullRequest { .. }
                | GitHubEffect::CreateTag { .. }
                | GitHubEffect::CreateRef { .. }
        )
    }
}

// ─── Response Types ───────────────────────────────────────────────────────────

/// Pull request data returned from the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestData {
    pub number: IssueNumber,
    pub title: String,
    pub state: IssueState,
    pub merged: bool,
    pub head_ref: String,
    pub head_sha: Sha,
    pub base_ref: String,
    pub labels: Vec<String>,
    /// `None` while GitHub is still computing mergeability.
    pub mergeable: Option<bool>,
}

/// A commit in a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitData {
    pub sha: Sha,
    pub message: String,
    /// Login of the linked GitHub account, if the author email maps to one.
    pub author_login: Option<String>,
    pub committer_login: Option<String>,
}

/// Response from a GitHub effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GitHubResponse {
    /// Response to `SetIssueState`.
    IssueStateSet,

    /// Response to `CreateComment`.
    CommentCreated { id: CommentId },

    /// Response to `DeleteComment`.
    CommentDeleted,

    /// Response to `AddLabels`.
    LabelsAdded,

    /// Response to `RemoveLabel`.
    LabelRemoved,

    /// Response to `LockConversation`.
    Locked,

    /// Response to `DeleteRef`.
    RefDeleted,

    /// Response to `CreateTag`: the SHA of the new tag object.
    TagCreated { sha: Sha },

    /// Response to `CreateRef`.
    RefCreated,

    /// Response to `MergePullRequest`.
    Merged { sha: Sha },

    /// Response to `GetPullRequest`.
    PullRequest(PullRequestData),

    /// Response to `ListCommits`.
    Commits(Vec<CommitData>),

    /// Response to `GetCombinedStatus`.
    CombinedStatus(CombinedState),

    /// Response to `CreateCommitStatus`.
    StatusCreated,
}
