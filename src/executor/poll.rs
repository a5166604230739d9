//! Bounded polling.
//!
//! Both the merge readiness gate and the mergeability check poll GitHub until
//! a condition settles. They share this loop:
//!
//! - attempt 1 fires immediately
//! - later attempts wait `interval` after the previous one
//! - after `max_attempts` unsettled attempts the loop gives up

use std::future::Future;
use std::time::Duration;

/// Default interval between combined-status polls.
const STATUS_GATE_INTERVAL_SECS: u64 = 10;

/// Default number of combined-status polls before timing out.
const STATUS_GATE_MAX_ATTEMPTS: u32 = 30;

const MERGEABILITY_INTERVAL_SECS: u64 = 2;
const MERGEABILITY_MAX_ATTEMPTS: u32 = 5;

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    /// Combined-status gate: 30 attempts, 10 seconds apart.
    pub const STATUS_GATE: PollPolicy = PollPolicy {
        max_attempts: STATUS_GATE_MAX_ATTEMPTS,
        interval: Duration::from_secs(STATUS_GATE_INTERVAL_SECS),
    };

    /// Mergeability: 5 attempts, 2 seconds apart.
    pub const MERGEABILITY: PollPolicy = PollPolicy {
        max_attempts: MERGEABILITY_MAX_ATTEMPTS,
        interval: Duration::from_secs(MERGEABILITY_INTERVAL_SECS),
    };

    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        PollPolicy {
            max_attempts,
            interval,
        }
    }
}

/// The verdict of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T, A> {
    /// The condition settled successfully.
    Done(T),
    /// The condition settled unsuccessfully; stop polling.
    Abort(A),
    /// Not settled yet.
    Pending,
}

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T, A> {
    Done { value: T, attempts: u32 },
    Aborted { reason: A, attempts: u32 },
    Exhausted { attempts: u32 },
}

impl<T, A> PollOutcome<T, A> {
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Done { attempts, .. }
            | PollOutcome::Aborted { attempts, .. }
            | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }
}

/// Fetches an observation with `fetch` (given the 1-based attempt number) and
/// lets `classify` decide whether it settles the loop, until it does or the
/// policy runs out.
///
/// There is no sleep after the final attempt.
pub async fn poll_until<O, T, A, F, Fut, C>(
    policy: PollPolicy,
    mut fetch: F,
    mut classify: C,
) -> PollOutcome<T, A>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = O>,
    C: FnMut(O) -> Step<T, A>,
{
    for n in 1..=policy.max_attempts {
        if n > 1 {
            tokio::time::sleep(policy.interval).await;
        }
        match classify(fetch(n).await) {
            Step::Done(value) => return PollOutcome::Done { value, attempts: n },
            Step::Abort(reason) => return PollOutcome::Aborted { reason, attempts: n },
            Step::Pending => {}
        }
    }
    PollOutcome::Exhausted {
        attempts: policy.max_attempts,
    }
}
