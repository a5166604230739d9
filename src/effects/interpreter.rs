//! The effect interpreter trait.
//!
//! The trait-based design enables:
//! - the octocrab-backed interpreter used in production
//! - recording fakes for testing

use std::future::Future;

use super::github::{GitHubEffect, GitHubResponse};

/// Interprets GitHub effects against the GitHub API.
///
/// Implementations are constructed with a `RepoId`, so all effects executed
/// through a single interpreter instance are scoped to that repository.
///
/// # Example (fake for testing)
///
/// ```ignore
/// struct AlwaysLocks;
///
/// impl GitHubInterpreter for AlwaysLocks {
///     type Error = std::convert::Infallible;
///
///     async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
///         match effect {
///             GitHubEffect::LockConversation { .. } => Ok(GitHubResponse::Locked),
///             other => unimplemented!("{other:?}"),
///         }
///     }
/// }
/// ```
pub trait GitHubInterpreter {
    /// The error type returned by this interpreter.
    type Error: std::fmt::Display;

    /// Execute a GitHub effect and return its response.
    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send;
}
