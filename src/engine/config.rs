//! Engine tuning from the environment.
//!
//! Only the status context and the merge gate are tunable; everything else
//! uses the executor defaults.
//!
//! | Variable | Default |
//! |---|---|
//! | `TRIAGE_BOT_STATUS_CONTEXT` | `triage-bot` |
//! | `TRIAGE_BOT_GATE_INTERVAL_SECS` | `10` |
//! | `TRIAGE_BOT_GATE_MAX_ATTEMPTS` | `30` |

use std::time::Duration;
use tracing::warn;

use crate::executor::ExecutorConfig;

pub const STATUS_CONTEXT_VAR: &str = "TRIAGE_BOT_STATUS_CONTEXT";
pub const GATE_INTERVAL_VAR: &str = "TRIAGE_BOT_GATE_INTERVAL_SECS";
pub const GATE_MAX_ATTEMPTS_VAR: &str = "TRIAGE_BOT_GATE_MAX_ATTEMPTS";

/// Channel buffer size for the event worker.
const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub executor: ExecutorConfig,
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            executor: ExecutorConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads overrides through `lookup`. Unparseable values are logged and
    /// ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = EngineConfig::default();

        if let Some(context) = lookup(STATUS_CONTEXT_VAR)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        {
            config.executor.status_context = context;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, GATE_INTERVAL_VAR) {
            config.executor.gate.interval = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, GATE_MAX_ATTEMPTS_VAR) {
            if attempts == 0 {
                warn!(var = GATE_MAX_ATTEMPTS_VAR, "must be at least 1; using default");
            } else {
                config.executor.gate.max_attempts = attempts;
            }
        }
        config
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparseable value");
            None
        }
    }
}
