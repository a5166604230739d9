//! triage-bot: a GitHub bot that applies declarative triage rules.
//!
//! Events (labels, comments, pushes, closes) are matched against a rule set
//! loaded from YAML. Each match becomes an action request that is scheduled
//! after its configured delay, replacing any earlier pending request for the
//! same issue and action. Merges wait on a readiness gate first.

pub mod config;
pub mod effects;
pub mod engine;
pub mod executor;
pub mod github;
pub mod resolve;
pub mod rules;
pub mod scheduler;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
