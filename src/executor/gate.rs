//! The merge readiness gate.
//!
//! Polls the combined status of a pull request's head commit:
//!
//! ```text
//! Polling ──success──▶ Success
//!    │ ──failure──▶ Failure      (not retried: a red check needs a human)
//!    │ ──pending / query error──▶ Polling, or Timeout once attempts run out
//! ```

use tracing::{debug, warn};

use super::poll::{PollOutcome, PollPolicy, Step, poll_until};
use crate::effects::{CombinedState, GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::types::Sha;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Polling,
    Success,
    Failure,
    Timeout,
}

impl GateStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GateStatus::Polling)
    }
}

/// State of one gate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeGate {
    attempts_made: u32,
    policy: PollPolicy,
    status: GateStatus,
}

impl MergeGate {
    pub fn new(policy: PollPolicy) -> Self {
        MergeGate {
            attempts_made: 0,
            policy,
            status: GateStatus::Polling,
        }
    }

    pub fn status(&self) -> GateStatus {
        self.status
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    /// Records one poll. `None` means the status query failed, which counts as
    /// a pending attempt.
    ///
    /// Observations after a terminal state are ignored.
    pub fn record(&mut self, observed: Option<CombinedState>) -> GateStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        self.attempts_made += 1;
        self.status = match observed {
            Some(CombinedState::Success) => GateStatus::Success,
            Some(CombinedState::Failure) => GateStatus::Failure,
            Some(CombinedState::Pending) | None
                if self.attempts_made >= self.policy.max_attempts =>
            {
                GateStatus::Timeout
            }
            Some(CombinedState::Pending) | None => GateStatus::Polling,
        };
        self.status
    }

    /// Drives a fresh gate to a terminal state against `sha`.
    pub async fn run<G: GitHubInterpreter>(github: &G, sha: &Sha, policy: PollPolicy) -> MergeGate {
        let mut gate = MergeGate::new(policy);
        if policy.max_attempts == 0 {
            gate.status = GateStatus::Timeout;
            return gate;
        }

        let outcome: PollOutcome<(), ()> = poll_until(
            policy,
            move |attempt| query(github, sha, attempt),
            |observed| match gate.record(observed) {
                GateStatus::Success => Step::Done(()),
                GateStatus::Failure => Step::Abort(()),
                GateStatus::Polling | GateStatus::Timeout => Step::Pending,
            },
        )
        .await;

        debug!(
            sha = %sha.short(),
            attempts = outcome.attempts(),
            status = ?gate.status,
            "merge gate settled"
        );
        gate
    }
}

async fn query<G: GitHubInterpreter>(github: &G, sha: &Sha, attempt: u32) -> Option<CombinedState> {
    let effect = GitHubEffect::GetCombinedStatus { sha: sha.clone() };
    match github.interpret(effect).await {
        Ok(GitHubResponse::CombinedStatus(state)) => Some(state),
        Ok(other) => {
            warn!(attempt, response = ?other, "unexpected response to combined status query");
            None
        }
        Err(e) => {
            warn!(attempt, error = %e, "combined status query failed; counting as pending");
            None
        }
    }
}
