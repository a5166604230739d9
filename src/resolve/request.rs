//! Resolved, ready-to-schedule action requests.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::rules::{ActionKind, BranchFilter};
use crate::types::{CommentId, IssueNumber, RepoId, Sha, TargetKind};

/// What triggered a request. Used for logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Label(String),
    Comment(CommentId),
    Commits,
    Close,
    Merge,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Label(label) => write!(f, "label {label:?}"),
            Trigger::Comment(id) => write!(f, "comment {id}"),
            Trigger::Commits => f.write_str("pushed commits"),
            Trigger::Close => f.write_str("close"),
            Trigger::Merge => f.write_str("merge"),
        }
    }
}

/// An action with exactly the parameters it needs.
///
/// Comment and message texts are already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Post `comment` (if any), then close.
    Close { comment: Option<String> },
    Open,
    /// Skipped at execution when `message` is empty.
    Comment { message: String },
    /// `terminal` records whether the target was closed or merged when the
    /// request was resolved.
    Lock {
        terminal: bool,
        comment: Option<String>,
    },
    Merge {
        /// The label that asked for the merge; removed once merged.
        label: String,
        /// Base branches this merge may not target.
        protected: BranchFilter,
        /// Labels configured as `block_merge`.
        blocking_labels: Vec<String>,
    },
    DeleteBranch {
        head_ref: String,
        base_ref: String,
        protected: BranchFilter,
    },
    Tag {
        merge_commit_sha: Option<Sha>,
        base_ref: String,
        unless: BranchFilter,
    },
    Label { labels: Vec<String> },
    DeleteComment { comment_id: CommentId },
    BlockMerge { comment: Option<String> },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Close { .. } => ActionKind::Close,
            Action::Open => ActionKind::Open,
            Action::Comment { .. } => ActionKind::Comment,
            Action::Lock { .. } => ActionKind::Lock,
            Action::Merge { .. } => ActionKind::Merge,
            Action::DeleteBranch { .. } => ActionKind::DeleteBranch,
            Action::Tag { .. } => ActionKind::Tag,
            Action::Label { .. } => ActionKind::Label,
            Action::DeleteComment { .. } => ActionKind::DeleteComment,
            Action::BlockMerge { .. } => ActionKind::BlockMerge,
        }
    }
}

/// The scheduler key: at most one pending task exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskKey {
    pub repo: RepoId,
    pub target: IssueNumber,
    pub action: ActionKind,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.repo, self.target, self.action)
    }
}

/// A fully resolved unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub repo: RepoId,
    pub target: IssueNumber,
    pub target_kind: TargetKind,
    pub delay: Duration,
    pub action: Action,
    pub trigger: Trigger,
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn key(&self) -> TaskKey {
        TaskKey {
            repo: self.repo.clone(),
            target: self.target,
            action: self.kind(),
        }
    }
}
