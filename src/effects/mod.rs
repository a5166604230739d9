//! Effects-as-data for GitHub operations.
//!
//! The executor describes every API call it wants as a [`GitHubEffect`] and
//! hands it to a [`GitHubInterpreter`]. This enables:
//! - Testability via recording fake interpreters
//! - Logging/tracing of intended operations by name
//! - A single place to decide which calls are safe to retry

pub mod github;
pub mod interpreter;

pub use github::{
    CombinedState, CommitData, CommitState, GitHubEffect, GitHubResponse, IssueState,
    PullRequestData,
};
pub use interpreter::GitHubInterpreter;
