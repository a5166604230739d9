//! Octocrab client wrapper scoped to a specific repository.

use octocrab::Octocrab;

use crate::types::RepoId;

/// A GitHub API client scoped to a specific repository.
///
/// `GitHubEffect` variants carry no repository, so the executor builds one of
/// these per event from the shared `Octocrab` handle.
#[derive(Clone)]
pub struct OctocrabClient {
    client: Octocrab,
    repo: RepoId,
}

impl OctocrabClient {
    pub fn new(client: Octocrab, repo: RepoId) -> Self {
        Self { client, repo }
    }

    /// Builds an authenticated `Octocrab` from a personal or installation token.
    pub fn build_octocrab(token: impl Into<String>) -> Result<Octocrab, octocrab::Error> {
        Octocrab::builder().personal_token(token.into()).build()
    }

    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub fn owner(&self) -> &str {
        &self.repo.owner
    }

    pub fn repo_name(&self) -> &str {
        &self.repo.repo
    }

    /// `/repos/{owner}/{repo}` followed by `path`.
    pub(super) fn repo_url(&self, path: &str) -> String {
        format!("/repos/{}/{}{}", self.owner(), self.repo_name(), path)
    }
}

impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}
