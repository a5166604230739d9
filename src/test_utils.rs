//! Shared test utilities: a recording GitHub fake and fixture builders.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::effects::{
    CombinedState, CommitData, GitHubEffect, GitHubInterpreter, GitHubResponse, IssueState,
    PullRequestData,
};
use crate::types::{CommentId, IssueNumber, PullRequestInfo, Sha};

/// SHA returned for every created tag object.
pub const TAG_SHA: &str = "7a90c1d2e3f4a5b6c7d8e9f0a1b2c3d4e5f60718";

/// SHA returned for every merge.
pub const MERGE_SHA: &str = "9e8d7c6b5a49382716059f8e7d6c5b4a39281706";

/// Head SHA of [`pull_request`] fixtures.
pub const HEAD_SHA: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// An open, mergeable pull request from `feature` into `main`.
pub fn pull_request(number: u64) -> PullRequestData {
    PullRequestData {
        number: IssueNumber(number),
        title: "Add widgets".to_string(),
        state: IssueState::Open,
        merged: false,
        head_ref: "feature".to_string(),
        head_sha: Sha::new(HEAD_SHA),
        base_ref: "main".to_string(),
        labels: vec![],
        mergeable: Some(true),
    }
}

/// Event-side metadata matching [`pull_request`].
pub fn pull_request_info() -> PullRequestInfo {
    PullRequestInfo {
        title: "Add widgets".to_string(),
        head_ref: "feature".to_string(),
        head_sha: Sha::new(HEAD_SHA),
        base_ref: "main".to_string(),
        merged: false,
        merge_commit_sha: None,
        labels: vec![],
    }
}

pub fn commit(sha: &str, message: &str, author: Option<&str>) -> CommitData {
    CommitData {
        sha: Sha::new(sha),
        message: message.to_string(),
        author_login: author.map(str::to_string),
        committer_login: author.map(str::to_string),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("injected failure in {0}")]
pub struct FakeError(pub &'static str);

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<GitHubEffect>,
    statuses: VecDeque<CombinedState>,
    pull_requests: VecDeque<PullRequestData>,
    commits: Vec<CommitData>,
    /// Remaining failures per effect name; `None` fails forever.
    failures: HashMap<&'static str, Option<u32>>,
    next_comment_id: u64,
}

/// A recording [`GitHubInterpreter`].
///
/// - every effect is recorded, including failed ones
/// - combined statuses are served from a queue, then `success`
/// - pull requests are served from a queue whose last entry sticks; with an
///   empty queue, [`pull_request`] for the requested number is returned
/// - failures are injected per effect name (see [`GitHubEffect::name`])
#[derive(Debug, Default)]
pub struct FakeGitHub {
    state: Mutex<FakeState>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, statuses: impl IntoIterator<Item = CombinedState>) -> Self {
        self.state.lock().unwrap().statuses.extend(statuses);
        self
    }

    pub fn with_pull_requests(self, prs: impl IntoIterator<Item = PullRequestData>) -> Self {
        self.state.lock().unwrap().pull_requests.extend(prs);
        self
    }

    pub fn with_commits(self, commits: Vec<CommitData>) -> Self {
        self.state.lock().unwrap().commits = commits;
        self
    }

    /// Every call to `effect` fails.
    pub fn fail(self, effect: &'static str) -> Self {
        self.state.lock().unwrap().failures.insert(effect, None);
        self
    }

    /// The next `times` calls to `effect` fail.
    pub fn fail_times(self, effect: &'static str, times: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(effect, Some(times));
        self
    }

    pub fn calls(&self) -> Vec<GitHubEffect> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_named(&self, name: &str) -> Vec<GitHubEffect> {
        self.calls()
            .into_iter()
            .filter(|effect| effect.name() == name)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls_named(name).len()
    }

    fn respond(&self, effect: GitHubEffect) -> Result<GitHubResponse, FakeError> {
        let mut state = self.state.lock().unwrap();
        let name = effect.name();
        state.calls.push(effect.clone());

        match state.failures.get_mut(name) {
            Some(None) => return Err(FakeError(name)),
            Some(Some(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                return Err(FakeError(name));
            }
            _ => {}
        }

        let response = match effect {
            GitHubEffect::SetIssueState { .. } => GitHubResponse::IssueStateSet,
            GitHubEffect::CreateComment { .. } => {
                state.next_comment_id += 1;
                GitHubResponse::CommentCreated {
                    id: CommentId(state.next_comment_id),
                }
            }
            GitHubEffect::DeleteComment { .. } => GitHubResponse::CommentDeleted,
            GitHubEffect::AddLabels { .. } => GitHubResponse::LabelsAdded,
            GitHubEffect::RemoveLabel { .. } => GitHubResponse::LabelRemoved,
            GitHubEffect::LockConversation { .. } => GitHubResponse::Locked,
            GitHubEffect::DeleteRef { .. } => GitHubResponse::RefDeleted,
            GitHubEffect::CreateTag { .. } => GitHubResponse::TagCreated {
                sha: Sha::new(TAG_SHA),
            },
            GitHubEffect::CreateRef { .. } => GitHubResponse::RefCreated,
            GitHubEffect::MergePullRequest { .. } => GitHubResponse::Merged {
                sha: Sha::new(MERGE_SHA),
            },
            GitHubEffect::GetPullRequest { pr } => {
                let data = if state.pull_requests.len() > 1 {
                    state.pull_requests.pop_front()
                } else {
                    state.pull_requests.front().cloned()
                };
                GitHubResponse::PullRequest(data.unwrap_or_else(|| pull_request(pr.0)))
            }
            GitHubEffect::ListCommits { .. } => GitHubResponse::Commits(state.commits.clone()),
            GitHubEffect::GetCombinedStatus { .. } => GitHubResponse::CombinedStatus(
                state
                    .statuses
                    .pop_front()
                    .unwrap_or(CombinedState::Success),
            ),
            GitHubEffect::CreateCommitStatus { .. } => GitHubResponse::StatusCreated,
        };
        Ok(response)
    }
}

impl GitHubInterpreter for FakeGitHub {
    type Error = FakeError;

    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
        self.respond(effect)
    }
}
