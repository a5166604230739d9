//! Webhook payload normalization.
//!
//! Turns a raw delivery (the `X-GitHub-Event` header plus the JSON body) into
//! an [`Event`]. Deliveries the engine has no use for, whether an unknown event
//! type or an uninteresting action, come back as `Ok(None)`. Malformed bodies
//! are errors.
//!
//! | Header | Actions |
//! |---|---|
//! | `issues` | `labeled`, `opened`, `closed` |
//! | `pull_request` | `labeled`, `opened`, `synchronize`, `closed` |
//! | `issue_comment` | `created` |
//! | `pull_request_review_comment` | `created` |

use serde::Deserialize;
use thiserror::Error;

use crate::types::{
    CommentId, Event, EventPayload, IssueNumber, PullRequestInfo, RepoId, Sha, StateReason,
    TargetKind,
};

#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed, including missing required fields.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a delivery into a normalized event.
///
/// ```
/// use triage_bot::webhooks::parse_webhook;
///
/// let payload = br#"{
///     "action": "labeled",
///     "label": { "name": "wontfix" },
///     "issue": { "number": 42, "state": "open", "labels": [] },
///     "repository": { "owner": { "login": "octo" }, "name": "widgets" }
/// }"#;
///
/// let event = parse_webhook("issues", payload).unwrap().unwrap();
/// assert_eq!(event.target.0, 42);
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<Event>, ParseError> {
    match event_type {
        "issues" => parse_issues(payload),
        "pull_request" => parse_pull_request(payload),
        "issue_comment" => parse_issue_comment(payload),
        "pull_request_review_comment" => parse_review_comment(payload),
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawOwner,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

impl RawRepository {
    fn into_repo_id(self) -> RepoId {
        RepoId::new(self.owner.login, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

fn label_names(labels: Vec<RawLabel>) -> Vec<String> {
    labels.into_iter().map(|l| l.name).collect()
}

fn is_closed(state: &str) -> Result<bool, ParseError> {
    match state {
        "open" => Ok(false),
        "closed" => Ok(true),
        other => Err(ParseError::InvalidField {
            field: "state",
            value: other.to_string(),
        }),
    }
}

/// A `labeled` delivery carries one label; `opened` surfaces whatever the
/// target was created with.
fn added_labels(
    action: &str,
    label: Option<RawLabel>,
    existing: Vec<RawLabel>,
) -> Result<Vec<String>, ParseError> {
    match action {
        "labeled" => label
            .map(|l| vec![l.name])
            .ok_or(ParseError::InvalidField {
                field: "label",
                value: "missing".to_string(),
            }),
        _ => Ok(label_names(existing)),
    }
}

// ============================================================================
// issues
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawIssuesPayload {
    action: String,
    label: Option<RawLabel>,
    issue: RawIssue,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    state: String,
    state_reason: Option<String>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    // Present when the issue is actually a pull request.
    pull_request: Option<serde_json::Value>,
}

impl RawIssue {
    fn target_kind(&self) -> TargetKind {
        if self.pull_request.is_some() {
            TargetKind::PullRequest
        } else {
            TargetKind::Issue
        }
    }
}

fn parse_issues(payload: &[u8]) -> Result<Option<Event>, ParseError> {
    let raw: RawIssuesPayload = serde_json::from_slice(payload)?;
    let target_kind = raw.issue.target_kind();

    let payload = match raw.action.as_str() {
        "labeled" | "opened" => {
            let closed = is_closed(&raw.issue.state)?;
            let labels = added_labels(&raw.action, raw.label, raw.issue.labels)?;
            if labels.is_empty() {
                return Ok(None);
            }
            EventPayload::LabelAdded {
                labels,
                closed,
                pull_request: None,
            }
        }
        "closed" => EventPayload::IssueClosed {
            state_reason: raw.issue.state_reason.as_deref().map(StateReason::parse),
        },
        _ => return Ok(None),
    };

    Ok(Some(Event {
        repo: raw.repository.into_repo_id(),
        target: IssueNumber(raw.issue.number),
        target_kind,
        payload,
    }))
}

// ============================================================================
// pull_request
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    label: Option<RawLabel>,
    pull_request: RawPullRequest,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    state: String,
    title: Option<String>,
    merged: Option<bool>,
    merge_commit_sha: Option<String>,
    head: RawRef,
    base: RawRef,
    #[serde(default)]
    labels: Vec<RawLabel>,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    sha: String,
    #[serde(rename = "ref")]
    ref_name: String,
}

impl RawPullRequest {
    fn info(&self) -> PullRequestInfo {
        let merged = self.merged.unwrap_or(false);
        PullRequestInfo {
            title: self.title.clone().unwrap_or_default(),
            head_ref: self.head.ref_name.clone(),
            head_sha: Sha::new(&self.head.sha),
            base_ref: self.base.ref_name.clone(),
            merged,
            // GitHub fills this in speculatively for open PRs; it only names a
            // real commit after a merge.
            merge_commit_sha: self
                .merge_commit_sha
                .as_ref()
                .filter(|_| merged)
                .map(Sha::new),
            labels: self.labels.iter().map(|l| l.name.clone()).collect(),
        }
    }
}

fn parse_pull_request(payload: &[u8]) -> Result<Option<Event>, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;
    let pr = raw.pull_request;
    let info = pr.info();

    let payload = match raw.action.as_str() {
        "labeled" | "opened" => {
            let closed = is_closed(&pr.state)?;
            let labels = added_labels(&raw.action, raw.label, pr.labels)?;
            if labels.is_empty() {
                return Ok(None);
            }
            EventPayload::LabelAdded {
                labels,
                closed,
                pull_request: Some(info),
            }
        }
        "synchronize" => EventPayload::CommitPushed { pull_request: info },
        "closed" => EventPayload::PullRequestClosed { pull_request: info },
        _ => return Ok(None),
    };

    Ok(Some(Event {
        repo: raw.repository.into_repo_id(),
        target: IssueNumber(pr.number),
        target_kind: TargetKind::PullRequest,
        payload,
    }))
}

// ============================================================================
// issue_comment / pull_request_review_comment
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIssueCommentPayload {
    action: String,
    comment: RawComment,
    issue: RawIssue,
    repository: RawRepository,
}

fn parse_issue_comment(payload: &[u8]) -> Result<Option<Event>, ParseError> {
    let raw: RawIssueCommentPayload = serde_json::from_slice(payload)?;
    if raw.action != "created" {
        return Ok(None);
    }

    Ok(Some(Event {
        repo: raw.repository.into_repo_id(),
        target: IssueNumber(raw.issue.number),
        target_kind: raw.issue.target_kind(),
        payload: comment_payload(raw.comment),
    }))
}

#[derive(Debug, Deserialize)]
struct RawReviewCommentPayload {
    action: String,
    comment: RawComment,
    pull_request: RawPullRequestNumber,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestNumber {
    number: u64,
}

fn parse_review_comment(payload: &[u8]) -> Result<Option<Event>, ParseError> {
    let raw: RawReviewCommentPayload = serde_json::from_slice(payload)?;
    if raw.action != "created" {
        return Ok(None);
    }

    Ok(Some(Event {
        repo: raw.repository.into_repo_id(),
        target: IssueNumber(raw.pull_request.number),
        target_kind: TargetKind::PullRequest,
        payload: comment_payload(raw.comment),
    }))
}

fn comment_payload(comment: RawComment) -> EventPayload {
    EventPayload::CommentCreated {
        comment_id: CommentId(comment.id),
        body: comment.body.unwrap_or_default(),
    }
}
