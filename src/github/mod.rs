//! GitHub API client and effect interpreter.
//!
//! Executes `GitHubEffect`s through octocrab.
//!
//! Key features:
//! - Exponential backoff retry for transient failures
//! - Distinguishes transient, permanent and already-exists errors
//! - No retry for merges and tag/ref creation

mod client;
mod error;
mod interpreter;
mod retry;

pub use client::OctocrabClient;
pub use error::{GitHubApiError, GitHubErrorKind};
pub use interpreter::interpret_github_effect;
pub use retry::{Backoff, with_backoff};
