//! GitHub API error types.
//!
//! Errors are sorted into three kinds for retry decisions:
//!
//! - **Transient** errors are retriable (5xx, rate limits, network failures)
//! - **Permanent** errors need a human (most 4xx, merge conflicts, missing refs)
//! - **AlreadyExists** is the 422 GitHub returns when a tag or ref is created
//!   twice. It is terminal for the action that hit it.

use std::fmt;
use thiserror::Error;

/// The kind of GitHub API error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// Safe to retry with backoff.
    Transient,

    /// Retrying will fail the same way.
    Permanent,

    /// The object we tried to create is already there.
    AlreadyExists,
}

impl GitHubErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, GitHubErrorKind::Transient)
    }
}

/// A GitHub API error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    pub kind: GitHubErrorKind,

    /// The HTTP status code, if the failure came from an API response.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Categorizes an octocrab error.
    ///
    /// API responses carry their status code; anything else (connection
    /// resets, timeouts, body decoding) is classified by its message.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let (status_code, message) = match &err {
            octocrab::Error::GitHub { source, .. } => {
                (Some(source.status_code.as_u16()), source.message.clone())
            }
            other => (None, other.to_string()),
        };

        let kind = classify(status_code, &message);

        Self {
            kind,
            status_code,
            message,
            source: Some(err),
        }
    }
}

/// Picks the error kind from a status code and message.
fn classify(status_code: Option<u16>, message: &str) -> GitHubErrorKind {
    match status_code {
        Some(422) if is_already_exists(message) => GitHubErrorKind::AlreadyExists,
        Some(429) => GitHubErrorKind::Transient,
        Some(403) if is_rate_limit_error(message) => GitHubErrorKind::Transient,
        Some(code) if (500..600).contains(&code) => GitHubErrorKind::Transient,
        Some(_) => GitHubErrorKind::Permanent,
        None if is_network_error(message) => GitHubErrorKind::Transient,
        None => GitHubErrorKind::Permanent,
    }
}

fn is_already_exists(message: &str) -> bool {
    message.to_lowercase().contains("already exists")
}

fn is_rate_limit_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("rate limit")
        || message_lower.contains("secondary rate")
        || message_lower.contains("abuse detection")
}

fn is_network_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("timeout")
        || message_lower.contains("timed out")
        || message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("dns")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ref_is_already_exists() {
        assert_eq!(
            classify(Some(422), "Reference already exists"),
            GitHubErrorKind::AlreadyExists
        );
        assert_eq!(
            classify(Some(422), "Validation Failed"),
            GitHubErrorKind::Permanent
        );
    }

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert_eq!(classify(Some(502), "Bad Gateway"), GitHubErrorKind::Transient);
        assert_eq!(classify(Some(429), "slow down"), GitHubErrorKind::Transient);
        assert_eq!(
            classify(Some(403), "API rate limit exceeded"),
            GitHubErrorKind::Transient
        );
    }

    #[test]
    fn client_errors_are_permanent() {
        assert_eq!(classify(Some(403), "Resource not accessible"), GitHubErrorKind::Permanent);
        assert_eq!(classify(Some(404), "Not Found"), GitHubErrorKind::Permanent);
        assert_eq!(
            classify(Some(405), "Pull Request is not mergeable"),
            GitHubErrorKind::Permanent
        );
    }

    #[test]
    fn network_failures_without_status_are_transient() {
        assert_eq!(classify(None, "connection reset"), GitHubErrorKind::Transient);
        assert_eq!(classify(None, "request timed out"), GitHubErrorKind::Transient);
        assert_eq!(classify(None, "invalid JSON"), GitHubErrorKind::Permanent);
    }

    #[test]
    fn only_transient_is_retriable() {
        assert!(GitHubErrorKind::Transient.is_retriable());
        assert!(!GitHubErrorKind::Permanent.is_retriable());
        assert!(!GitHubErrorKind::AlreadyExists.is_retriable());
    }

    #[test]
    fn display_includes_status() {
        let err = GitHubApiError {
            kind: GitHubErrorKind::Permanent,
            status_code: Some(404),
            message: "Not Found".to_string(),
            source: None,
        };
        assert_eq!(err.to_string(), "GitHub API error (HTTP 404): Not Found");
    }
}
