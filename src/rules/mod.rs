//! Declarative rules: the configuration model and its compiled form.

pub mod branches;
pub mod config;
pub mod delay;
pub mod pattern;
pub mod ruleset;

pub use branches::BranchFilter;
pub use delay::{Delay, DelayError};
pub use pattern::{Pattern, PatternError};
pub use ruleset::{
    ActionKind, CloseRule, CommentAction, CommentRule, CommentSetting, CommitRule, ConfigError,
    Defaults, LabelAction, LabelRule, LockCondition, MergeAction, MergeRule, RuleError, RuleSet,
};
