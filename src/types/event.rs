//! The normalized event record handed to the engine.
//!
//! Events are produced by the webhook layer (see `webhooks::parse_webhook`) and
//! are read-only from then on. Nothing keeps them after resolution finishes.

use serde::{Deserialize, Serialize};

use super::ids::{CommentId, IssueNumber, RepoId, Sha};

/// Whether the event target is a plain issue or a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Issue,
    PullRequest,
}

/// The discriminant of an [`EventPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LabelAdded,
    CommentCreated,
    CommitPushed,
    IssueClosed,
    PullRequestClosed,
}

/// Why an issue was closed, as reported by GitHub's `state_reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateReason {
    Completed,
    NotPlanned,
    Other,
}

impl StateReason {
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => StateReason::Completed,
            "not_planned" => StateReason::NotPlanned,
            _ => StateReason::Other,
        }
    }
}

/// Pull request metadata carried by PR-related events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub title: String,
    pub head_ref: String,
    pub head_sha: Sha,
    pub base_ref: String,
    /// Only meaningful once the PR is closed.
    pub merged: bool,
    pub merge_commit_sha: Option<Sha>,
    pub labels: Vec<String>,
}

/// Kind-specific event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// One or more labels are present on the target.
    ///
    /// A `labeled` delivery carries exactly one label; an `opened` delivery
    /// surfaces the target's full label set.
    LabelAdded {
        labels: Vec<String>,
        /// Whether the target was already closed when the label arrived.
        closed: bool,
        pull_request: Option<PullRequestInfo>,
    },

    CommentCreated { comment_id: CommentId, body: String },

    /// New commits were pushed to a pull request (`synchronize`).
    CommitPushed { pull_request: PullRequestInfo },

    IssueClosed { state_reason: Option<StateReason> },

    PullRequestClosed { pull_request: PullRequestInfo },
}

/// A normalized repository event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub repo: RepoId,
    pub target: IssueNumber,
    pub target_kind: TargetKind,
    pub payload: EventPayload,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::LabelAdded { .. } => EventKind::LabelAdded,
            EventPayload::CommentCreated { .. } => EventKind::CommentCreated,
            EventPayload::CommitPushed { .. } => EventKind::CommitPushed,
            EventPayload::IssueClosed { .. } => EventKind::IssueClosed,
            EventPayload::PullRequestClosed { .. } => EventKind::PullRequestClosed,
        }
    }

    /// Returns the pull request metadata, if the payload carries any.
    pub fn pull_request(&self) -> Option<&PullRequestInfo> {
        match &self.payload {
            EventPayload::LabelAdded { pull_request, .. } => pull_request.as_ref(),
            EventPayload::CommitPushed { pull_request }
            | EventPayload::PullRequestClosed { pull_request } => Some(pull_request),
            EventPayload::CommentCreated { .. } | EventPayload::IssueClosed { .. } => None,
        }
    }
}
