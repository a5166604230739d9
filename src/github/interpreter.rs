//! GitHub effect interpreter using octocrab.
//!
//! Implements `GitHubInterpreter` for [`OctocrabClient`]. Typed octocrab
//! handlers are used where they cover the call; the rest go through the
//! generic REST helpers with local response structs.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::effects::{
    CombinedState, CommitData, CommitState, GitHubEffect, GitHubInterpreter, GitHubResponse,
    IssueState, PullRequestData,
};
use crate::types::{CommentId, IssueNumber, Sha};

use super::client::OctocrabClient;
use super::error::GitHubApiError;
use super::retry::{Backoff, with_backoff};

impl GitHubInterpreter for OctocrabClient {
    type Error = GitHubApiError;

    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
        let backoff = if effect.is_retry_safe() {
            Backoff::DEFAULT
        } else {
            Backoff::NONE
        };
        interpret_github_effect(self, effect, backoff).await
    }
}

/// Executes an effect against the API, retrying transient failures per
/// `backoff`.
pub async fn interpret_github_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
    backoff: Backoff,
) -> Result<GitHubResponse, GitHubApiError> {
    let name = effect.name();
    debug!(repo = %client.repo(), effect = name, "executing GitHub effect");
    with_backoff(name, backoff, || execute_effect(client, effect.clone())).await
}

async fn execute_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
) -> Result<GitHubResponse, GitHubApiError> {
    match effect {
        GitHubEffect::SetIssueState { issue, state } => set_issue_state(client, issue, state).await,
        GitHubEffect::CreateComment { issue, body } => create_comment(client, issue, body).await,
        GitHubEffect::DeleteComment { comment_id } => delete_comment(client, comment_id).await,
        GitHubEffect::AddLabels { issue, labels } => add_labels(client, issue, labels).await,
        GitHubEffect::RemoveLabel { issue, label } => remove_label(client, issue, label).await,
        GitHubEffect::LockConversation { issue } => lock_conversation(client, issue).await,
        GitHubEffect::DeleteRef { ref_name } => delete_ref(client, &ref_name).await,
        GitHubEffect::CreateTag {
            tag,
            message,
            object,
        } => create_tag(client, tag, message, object).await,
        GitHubEffect::CreateRef { ref_name, sha } => create_ref(client, ref_name, sha).await,
        GitHubEffect::MergePullRequest { pr } => merge_pull_request(client, pr).await,
        GitHubEffect::GetPullRequest { pr } => get_pull_request(client, pr).await,
        GitHubEffect::ListCommits { pr } => list_commits(client, pr).await,
        GitHubEffect::GetCombinedStatus { sha } => get_combined_status(client, sha).await,
        GitHubEffect::CreateCommitStatus {
            sha,
            state,
            context,
            description,
        } => create_commit_status(client, sha, state, context, description).await,
    }
}

// ─── Issues ───────────────────────────────────────────────────────────────────

async fn set_issue_state(
    client: &OctocrabClient,
    issue: IssueNumber,
    state: IssueState,
) -> Result<GitHubResponse, GitHubApiError> {
    let state = match state {
        IssueState::Open => octocrab::models::IssueState::Open,
        IssueState::Closed => octocrab::models::IssueState::Closed,
    };
    client
        .inner()
        .issues(client.owner(), client.repo_name())
        .update(issue.0)
        .state(state)
        .send()
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::IssueStateSet)
}

async fn create_comment(
    client: &OctocrabClient,
    issue: IssueNumber,
    body: String,
) -> Result<GitHubResponse, GitHubApiError> {
    let comment = client
        .inner()
        .issues(client.owner(), client.repo_name())
        .create_comment(issue.0, body)
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::CommentCreated {
        id: CommentId(comment.id.into_inner()),
    })
}

async fn delete_comment(
    client: &OctocrabClient,
    comment_id: CommentId,
) -> Result<GitHubResponse, GitHubApiError> {
    client
        .inner()
        .issues(client.owner(), client.repo_name())
        .delete_comment(octocrab::models::CommentId(comment_id.0))
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::CommentDeleted)
}

async fn add_labels(
    client: &OctocrabClient,
    issue: IssueNumber,
    labels: Vec<String>,
) -> Result<GitHubResponse, GitHubApiError> {
    client
        .inner()
        .issues(client.owner(), client.repo_name())
        .add_labels(issue.0, &labels)
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::LabelsAdded)
}

async fn remove_label(
    client: &OctocrabClient,
    issue: IssueNumber,
    label: String,
) -> Result<GitHubResponse, GitHubApiError> {
    client
        .inner()
        .issues(client.owner(), client.repo_name())
        .remove_label(issue.0, label)
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::LabelRemoved)
}

async fn lock_conversation(
    client: &OctocrabClient,
    issue: IssueNumber,
) -> Result<GitHubResponse, GitHubApiError> {
    client
        .inner()
        .issues(client.owner(), client.repo_name())
        .lock(issue.0, octocrab::params::LockReason::Resolved)
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::Locked)
}

// ─── Git data ─────────────────────────────────────────────────────────────────

/// Maps `heads/<branch>` or `tags/<tag>` onto octocrab's reference type.
fn reference_for(ref_name: &str) -> Result<octocrab::params::repos::Reference, GitHubApiError> {
    let ref_name = ref_name.strip_prefix("refs/").unwrap_or(ref_name);
    if let Some(branch) = ref_name.strip_prefix("heads/") {
        Ok(octocrab::params::repos::Reference::Branch(branch.to_string()))
    } else if let Some(tag) = ref_name.strip_prefix("tags/") {
        Ok(octocrab::params::repos::Reference::Tag(tag.to_string()))
    } else {
        Err(GitHubApiError::permanent_without_source(format!(
            "unsupported ref {ref_name:?}: expected heads/ or tags/"
        )))
    }
}

async fn delete_ref(
    client: &OctocrabClient,
    ref_name: &str,
) -> Result<GitHubResponse, GitHubApiError> {
    let reference = reference_for(ref_name)?;
    client
        .inner()
        .repos(client.owner(), client.repo_name())
        .delete_ref(&reference)
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::RefDeleted)
}

#[derive(Serialize)]
struct CreateTagRequest<'a> {
    tag: &'a str,
    message: &'a str,
    object: &'a str,
    #[serde(rename = "type")]
    object_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GitObjectResponse {
    sha: String,
}

async fn create_tag(
    client: &OctocrabClient,
    tag: String,
    message: String,
    object: Sha,
) -> Result<GitHubResponse, GitHubApiError> {
    let request = CreateTagRequest {
        tag: &tag,
        message: &message,
        object: object.as_str(),
        object_type: "commit",
    };
    let response: GitObjectResponse = client
        .inner()
        .post(client.repo_url("/git/tags"), Some(&request))
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::TagCreated {
        sha: Sha::new(response.sha),
    })
}

#[derive(Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    ref_name: &'a str,
    sha: &'a str,
}

async fn create_ref(
    client: &OctocrabClient,
    ref_name: String,
    sha: Sha,
) -> Result<GitHubResponse, GitHubApiError> {
    let request = CreateRefRequest {
        ref_name: &ref_name,
        sha: sha.as_str(),
    };
    let _: serde_json::Value = client
        .inner()
        .post(client.repo_url("/git/refs"), Some(&request))
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::RefCreated)
}

// ─── Pull requests ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MergeRequest {
    merge_method: &'static str,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    sha: Option<String>,
    merged: bool,
    message: Option<String>,
}

async fn merge_pull_request(
    client: &OctocrabClient,
    pr: IssueNumber,
) -> Result<GitHubResponse, GitHubApiError> {
    let response: MergeResponse = client
        .inner()
        .put(
            client.repo_url(&format!("/pulls/{}/merge", pr.0)),
            Some(&MergeRequest {
                merge_method: "merge",
            }),
        )
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    match (response.merged, response.sha) {
        (true, Some(sha)) => Ok(GitHubResponse::Merged { sha: Sha::new(sha) }),
        _ => Err(GitHubApiError::permanent_without_source(format!(
            "merge of PR {} returned merged=false: {}",
            pr,
            response.message.as_deref().unwrap_or("unknown reason")
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    #[serde(default)]
    title: String,
    state: String,
    #[serde(default)]
    merged: bool,
    mergeable: Option<bool>,
    head: BranchRef,
    base: BranchRef,
    #[serde(default)]
    labels: Vec<LabelName>,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    ref_field: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct LabelName {
    name: String,
}

fn pull_request_from_api(pull: PullResponse) -> PullRequestData {
    PullRequestData {
        number: IssueNumber(pull.number),
        title: pull.title,
        state: if pull.state == "closed" {
            IssueState::Closed
        } else {
            IssueState::Open
        },
        merged: pull.merged,
        head_ref: pull.head.ref_field,
        head_sha: Sha::new(pull.head.sha),
        base_ref: pull.base.ref_field,
        labels: pull.labels.into_iter().map(|l| l.name).collect(),
        mergeable: pull.mergeable,
    }
}

async fn get_pull_request(
    client: &OctocrabClient,
    pr: IssueNumber,
) -> Result<GitHubResponse, GitHubApiError> {
    let pull: PullResponse = client
        .inner()
        .get(client.repo_url(&format!("/pulls/{}", pr.0)), None::<&()>)
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::PullRequest(pull_request_from_api(pull)))
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitDetail,
    author: Option<Account>,
    committer: Option<Account>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

fn commit_from_api(commit: CommitResponse) -> CommitData {
    CommitData {
        sha: Sha::new(commit.sha),
        message: commit.commit.message,
        author_login: commit.author.map(|a| a.login),
        committer_login: commit.committer.map(|c| c.login),
    }
}

async fn list_commits(
    client: &OctocrabClient,
    pr: IssueNumber,
) -> Result<GitHubResponse, GitHubApiError> {
    // GitHub caps this endpoint at 250 commits.
    const PER_PAGE: usize = 100;
    let mut page = 1u32;
    let mut all_commits = Vec::new();

    loop {
        let url = client.repo_url(&format!(
            "/pulls/{}/commits?per_page={}&page={}",
            pr.0, PER_PAGE, page
        ));
        let items: Vec<CommitResponse> = client
            .inner()
            .get(url, None::<&()>)
            .await
            .map_err(GitHubApiError::from_octocrab)?;

        let is_last_page = items.len() < PER_PAGE;
        all_commits.extend(items.into_iter().map(commit_from_api));
        if is_last_page {
            break;
        }
        page += 1;
    }

    Ok(GitHubResponse::Commits(all_commits))
}

// ─── Statuses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CombinedStatusResponse {
    state: String,
}

async fn get_combined_status(
    client: &OctocrabClient,
    sha: Sha,
) -> Result<GitHubResponse, GitHubApiError> {
    let status: CombinedStatusResponse = client
        .inner()
        .get(
            client.repo_url(&format!("/commits/{}/status", sha.as_str())),
            None::<&()>,
        )
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::CombinedStatus(CombinedState::from_api_str(
        &status.state,
    )))
}

#[derive(Serialize)]
struct CreateStatusRequest<'a> {
    state: &'static str,
    context: &'a str,
    description: &'a str,
}

async fn create_commit_status(
    client: &OctocrabClient,
    sha: Sha,
    state: CommitState,
    context: String,
    description: String,
) -> Result<GitHubResponse, GitHubApiError> {
    let request = CreateStatusRequest {
        state: state.as_api_str(),
        context: &context,
        description: &description,
    };
    let _: serde_json::Value = client
        .inner()
        .post(
            client.repo_url(&format!("/statuses/{}", sha.as_str())),
            Some(&request),
        )
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(GitHubResponse::StatusCreated)
}
