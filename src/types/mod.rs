//! Core domain types for the triage bot.

pub mod event;
pub mod ids;

pub use event::{Event, EventKind, EventPayload, PullRequestInfo, StateReason, TargetKind};
pub use ids::{CommentId, DeliveryId, IssueNumber, RepoId, Sha};
