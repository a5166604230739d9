//! The YAML shape of a rule file.
//!
//! This mirrors the configuration field-for-field. Individual rules are kept as
//! raw YAML values at this stage so that one malformed entry can be reported
//! and skipped without rejecting the whole file; [`super::RuleSet`] does the
//! per-rule conversion.
//!
//! ```yaml
//! labels:
//!   wontfix: close
//!   stale:
//!     action: close
//!     delay: 7 days
//!     comment: "Closing after $DELAY as $LABEL."
//! default:
//!   close:
//!     comment: "Closed by triage."
//! merges:
//!   - action: delete_branch
//!     unless:
//!       branches: ["main", "release/*"]
//! comments:
//!   - action: label
//!     pattern: "/\\/remind/i"
//!     labels: [reminder]
//! commits:
//!   - action: label
//!     pattern: "fix"
//!     user: dependabot[bot]
//!     labels: [dependencies]
//! closes:
//!   - action: lock
//!     delay: 30 days
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;

use super::delay::Delay;

/// The top-level rule file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleSetConfig {
    pub labels: BTreeMap<String, serde_yaml::Value>,
    pub default: BTreeMap<String, serde_yaml::Value>,
    pub merges: Vec<serde_yaml::Value>,
    pub comments: Vec<serde_yaml::Value>,
    pub commits: Vec<serde_yaml::Value>,
    pub closes: Vec<serde_yaml::Value>,
}

/// `labels.<name>`: either a bare action name or a detailed rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LabelRuleSpec {
    Shorthand(String),
    Detailed(DetailedLabelRule),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetailedLabelRule {
    pub action: String,
    #[serde(default)]
    pub delay: Option<Delay>,
    #[serde(default)]
    pub comment: Option<CommentSpec>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub unless: Option<UnlessSpec>,
}

/// A `comment` field: template text, or a boolean.
///
/// `false` suppresses the comment; `true` asks for the default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommentSpec {
    Enabled(bool),
    Text(String),
}

/// `unless: { branches: [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UnlessSpec {
    #[serde(default)]
    pub branches: Vec<String>,
}

/// `default.<action>`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DefaultSpec {
    #[serde(default)]
    pub delay: Option<Delay>,
    #[serde(default)]
    pub comment: Option<CommentSpec>,
}

/// `comments[]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommentRuleSpec {
    pub action: String,
    pub pattern: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub delay: Option<Delay>,
}

/// `commits[]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommitRuleSpec {
    pub action: String,
    pub pattern: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// `closes[]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloseRuleSpec {
    pub action: String,
    #[serde(default)]
    pub delay: Option<Delay>,
    #[serde(default)]
    pub comment: Option<CommentSpec>,
    #[serde(default)]
    pub when: Option<String>,
}

/// `merges[]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MergeRuleSpec {
    pub action: String,
    #[serde(default)]
    pub unless: Option<UnlessSpec>,
}
