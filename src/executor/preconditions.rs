//! Precondition checks that decide whether an action is performed at all.
//!
//! A failed precondition is not an error: the action is skipped and logged at
//! info level.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::effects::{IssueState, PullRequestData};
use crate::rules::BranchFilter;

static WIP_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bWIP\b").expect("WIP title regex is valid"));

const WIP_LABEL: &str = "wip";

/// Why an action was not performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// `lock` on a target that was not closed or merged.
    NotTerminal,
    /// `comment` with nothing to say.
    EmptyMessage,
    /// `label` with no labels configured.
    NoLabels,
    /// A pull-request-only action targeted a plain issue.
    NotPullRequest,
    /// The pull request is already closed or merged.
    NotOpen,
    WorkInProgress,
    BlockingLabel { label: String },
    ProtectedBranch { branch: String },
    /// `delete_branch` where head and base are the same branch.
    SameBranch { branch: String },
    /// `tag` without a merge commit to point at.
    NoMergeCommit,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotTerminal => f.write_str("target is neither closed nor merged"),
            SkipReason::EmptyMessage => f.write_str("message is empty"),
            SkipReason::NoLabels => f.write_str("no labels to add"),
            SkipReason::NotPullRequest => f.write_str("target is not a pull request"),
            SkipReason::NotOpen => f.write_str("pull request is not open"),
            SkipReason::WorkInProgress => f.write_str("pull request is marked work in progress"),
            SkipReason::BlockingLabel { label } => write!(f, "blocked by label {label:?}"),
            SkipReason::ProtectedBranch { branch } => write!(f, "branch {branch:?} is protected"),
            SkipReason::SameBranch { branch } => {
                write!(f, "head and base are both {branch:?}")
            }
            SkipReason::NoMergeCommit => f.write_str("no merge commit"),
        }
    }
}

/// Whether a pull request is marked work in progress.
///
/// The title check is a case-sensitive whole-word `WIP`; the label check is
/// case-insensitive.
pub fn is_work_in_progress(title: &str, labels: &[String]) -> bool {
    WIP_TITLE.is_match(title) || labels.iter().any(|l| l.eq_ignore_ascii_case(WIP_LABEL))
}

/// Checks that `pr` may be merged.
pub fn check_merge(
    pr: &PullRequestData,
    protected: &BranchFilter,
    blocking_labels: &[String],
) -> Result<(), SkipReason> {
    if pr.merged || pr.state != IssueState::Open {
        return Err(SkipReason::NotOpen);
    }
    if protected.matches(&pr.base_ref) {
        return Err(SkipReason::ProtectedBranch {
            branch: pr.base_ref.clone(),
        });
    }
    if is_work_in_progress(&pr.title, &pr.labels) {
        return Err(SkipReason::WorkInProgress);
    }
    if let Some(label) = pr
        .labels
        .iter()
        .find(|l| blocking_labels.iter().any(|b| b.eq_ignore_ascii_case(l)))
    {
        return Err(SkipReason::BlockingLabel {
            label: label.clone(),
        });
    }
    Ok(())
}

/// Checks that the head branch of a merged pull request may be deleted.
pub fn check_delete_branch(
    head_ref: &str,
    base_ref: &str,
    protected: &BranchFilter,
) -> Result<(), SkipReason> {
    if head_ref == base_ref {
        return Err(SkipReason::SameBranch {
            branch: head_ref.to_string(),
        });
    }
    if protected.matches(head_ref) {
        return Err(SkipReason::ProtectedBranch {
            branch: head_ref.to_string(),
        });
    }
    Ok(())
}
