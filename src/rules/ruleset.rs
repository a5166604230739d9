//! The compiled, immutable rule set.
//!
//! Rules are validated once, when the file is loaded. A rule that fails
//! validation (unknown action, bad pattern, bad glob, wrong shape) is logged
//! and dropped; the remaining rules still load. Only an unreadable file or
//! unparsable YAML is fatal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use super::branches::BranchFilter;
use super::config::{
    CloseRuleSpec, CommentRuleSpec, CommentSpec, CommitRuleSpec, DefaultSpec, LabelRuleSpec,
    MergeRuleSpec, RuleSetConfig,
};
use super::delay::Delay;
use super::pattern::{Pattern, PatternError};

/// Every action the engine knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Close,
    Open,
    Comment,
    Merge,
    Lock,
    DeleteBranch,
    Tag,
    Label,
    DeleteComment,
    BlockMerge,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::Close,
        ActionKind::Open,
        ActionKind::Comment,
        ActionKind::Merge,
        ActionKind::Lock,
        ActionKind::DeleteBranch,
        ActionKind::Tag,
        ActionKind::Label,
        ActionKind::DeleteComment,
        ActionKind::BlockMerge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Close => "close",
            ActionKind::Open => "open",
            ActionKind::Comment => "comment",
            ActionKind::Merge => "merge",
            ActionKind::Lock => "lock",
            ActionKind::DeleteBranch => "delete_branch",
            ActionKind::Tag => "tag",
            ActionKind::Label => "label",
            ActionKind::DeleteComment => "delete_comment",
            ActionKind::BlockMerge => "block_merge",
        }
    }

    /// Actions suppressed on a pull request marked work-in-progress.
    pub fn is_merge_family(self) -> bool {
        matches!(
            self,
            ActionKind::Merge | ActionKind::DeleteBranch | ActionKind::Tag
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RuleError::UnknownAction(s.to_string()))
    }
}

/// Fatal errors while loading a rule file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Why a single rule was rejected. Never fatal.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error("action {action} is not supported in {section}")]
    Unsupported {
        section: &'static str,
        action: ActionKind,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("invalid branch glob: {0}")]
    Glob(#[from] globset::Error),

    #[error("unknown lock condition {0:?} (expected closed, merged or completed)")]
    UnknownCondition(String),

    #[error("malformed rule: {0}")]
    Malformed(#[from] serde_yaml::Error),
}

/// How a rule asks for its comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentSetting {
    /// Use `default.<action>.comment`, if any.
    Inherit,
    /// `comment: false`.
    Suppressed,
    Text(String),
}

impl CommentSetting {
    fn from_spec(spec: Option<CommentSpec>) -> Self {
        match spec {
            None | Some(CommentSpec::Enabled(true)) => CommentSetting::Inherit,
            Some(CommentSpec::Enabled(false)) => CommentSetting::Suppressed,
            Some(CommentSpec::Text(text)) => CommentSetting::Text(text),
        }
    }
}

/// `default.<action>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defaults {
    pub delay: Option<Delay>,
    pub comment: Option<String>,
}

/// What a label rule does once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelAction {
    Close,
    Open,
    Comment { message: Option<String> },
    /// `protected` lists base branches this label may never merge into.
    Merge { protected: BranchFilter },
    Lock,
    BlockMerge,
    Label { labels: Vec<String> },
}

impl LabelAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            LabelAction::Close => ActionKind::Close,
            LabelAction::Open => ActionKind::Open,
            LabelAction::Comment { .. } => ActionKind::Comment,
            LabelAction::Merge { .. } => ActionKind::Merge,
            LabelAction::Lock => ActionKind::Lock,
            LabelAction::BlockMerge => ActionKind::BlockMerge,
            LabelAction::Label { .. } => ActionKind::Label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRule {
    pub label: String,
    pub action: LabelAction,
    pub delay: Option<Delay>,
    pub comment: CommentSetting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAction {
    Label { labels: Vec<String> },
    DeleteComment,
}

#[derive(Debug, Clone)]
pub struct CommentRule {
    pub pattern: Pattern,
    pub action: CommentAction,
    pub delay: Option<Delay>,
}

/// A commit rule. The only supported action is `label`.
#[derive(Debug, Clone)]
pub struct CommitRule {
    pub pattern: Pattern,
    pub user: Option<String>,
    pub labels: Vec<String>,
}

/// Which closes count as terminal for a `closes[]` lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockCondition {
    /// Any close.
    #[default]
    Closed,
    /// Merged pull requests only.
    Merged,
    /// Issues closed as completed, or merged pull requests.
    Completed,
}

impl FromStr for LockCondition {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closed" => Ok(LockCondition::Closed),
            "merged" => Ok(LockCondition::Merged),
            "completed" => Ok(LockCondition::Completed),
            other => Err(RuleError::UnknownCondition(other.to_string())),
        }
    }
}

/// A close rule. The only supported action is `lock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRule {
    pub when: LockCondition,
    pub delay: Option<Delay>,
    pub comment: CommentSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Not a post-merge action: `unless` lists base branches that no merge
    /// label may merge into.
    Merge,
    DeleteBranch,
    Tag,
}

/// A `merges` entry.
///
/// For `delete_branch`, `unless` protects head branches from deletion. For
/// `tag`, it skips merges into matching base branches. `merge` entries are
/// folded into the protected branches of every merge label and are not kept
/// as rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRule {
    pub action: MergeAction,
    pub unless: BranchFilter,
}

/// The loaded rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    labels: BTreeMap<String, LabelRule>,
    defaults: BTreeMap<ActionKind, Defaults>,
    comments: Vec<CommentRule>,
    commits: Vec<CommitRule>,
    closes: Vec<CloseRule>,
    merges: Vec<MergeRule>,
}

impl RuleSet {
    /// Reads and compiles a rule file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // An empty file is an empty rule set, not an error.
        if text.trim().is_empty() {
            return Ok(RuleSet::default());
        }
        let config: RuleSetConfig = serde_yaml::from_str(text)?;
        Ok(Self::from_config(config))
    }

    /// Compiles every rule, dropping (and logging) the ones that fail.
    pub fn from_config(config: RuleSetConfig) -> Self {
        let mut rules = RuleSet::default();

        for (name, value) in config.default {
            match compile_default(&name, value) {
                Ok((kind, defaults)) => {
                    rules.defaults.insert(kind, defaults);
                }
                Err(error) => warn!(action = %name, %error, "skipping default"),
            }
        }

        // Merge labels need the protected branches of `merges` entries.
        let mut merge_protection = BranchFilter::empty();
        for (index, value) in config.merges.into_iter().enumerate() {
            let rule = match compile_merge(value) {
                Ok(rule) => rule,
                Err(error) => {
                    warn!(index, %error, "skipping merge rule");
                    continue;
                }
            };
            if rule.action != MergeAction::Merge {
                rules.merges.push(rule);
                continue;
            }
            match merge_protection.union(&rule.unless) {
                Ok(union) => merge_protection = union,
                Err(error) => warn!(index, %error, "skipping merge rule"),
            }
        }

        for (name, value) in config.labels {
            let label = name.to_lowercase();
            match compile_label(&label, value, &merge_protection) {
                Ok(rule) => {
                    if rules.labels.insert(label.clone(), rule).is_some() {
                        warn!(%label, "label configured twice, keeping the last entry");
                    }
                }
                Err(error) => warn!(%label, %error, "skipping label rule"),
            }
        }

        for (index, value) in config.comments.into_iter().enumerate() {
            match compile_comment(value) {
                Ok(rule) => rules.comments.push(rule),
                Err(error) => warn!(index, %error, "skipping comment rule"),
            }
        }

        for (index, value) in config.commits.into_iter().enumerate() {
            match compile_commit(value) {
                Ok(rule) => rules.commits.push(rule),
                Err(error) => warn!(index, %error, "skipping commit rule"),
            }
        }

        for (index, value) in config.closes.into_iter().enumerate() {
            match compile_close(value) {
                Ok(rule) => rules.closes.push(rule),
                Err(error) => warn!(index, %error, "skipping close rule"),
            }
        }

        debug!(
            labels = rules.labels.len(),
            comments = rules.comments.len(),
            commits = rules.commits.len(),
            closes = rules.closes.len(),
            merges = rules.merges.len(),
            "rule set compiled"
        );
        rules
    }

    /// Looks up the rule for a label, case-insensitively.
    pub fn label_rule(&self, label: &str) -> Option<&LabelRule> {
        self.labels.get(&label.to_lowercase())
    }

    pub fn defaults(&self, kind: ActionKind) -> Option<&Defaults> {
        self.defaults.get(&kind)
    }

    pub fn comments(&self) -> &[CommentRule] {
        &self.comments
    }

    pub fn commits(&self) -> &[CommitRule] {
        &self.commits
    }

    pub fn closes(&self) -> &[CloseRule] {
        &self.closes
    }

    pub fn merges(&self) -> &[MergeRule] {
        &self.merges
    }

    /// Labels whose rule is `block_merge`. Their presence stops a merge.
    pub fn blocking_labels(&self) -> Vec<String> {
        self.labels
            .values()
            .filter(|rule| rule.action == LabelAction::BlockMerge)
            .map(|rule| rule.label.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
            && self.comments.is_empty()
            && self.commits.is_empty()
            && self.closes.is_empty()
            && self.merges.is_empty()
    }
}

fn compile_default(name: &str, value: serde_yaml::Value) -> Result<(ActionKind, Defaults), RuleError> {
    let kind: ActionKind = name.parse()?;
    let spec: DefaultSpec = serde_yaml::from_value(value)?;
    let comment = match spec.comment {
        Some(CommentSpec::Text(text)) => Some(text),
        _ => None,
    };
    Ok((
        kind,
        Defaults {
            delay: spec.delay,
            comment,
        },
    ))
}

/// `merge_protection` is added to the protected branches of a merge label.
fn compile_label(
    label: &str,
    value: serde_yaml::Value,
    merge_protection: &BranchFilter,
) -> Result<LabelRule, RuleError> {
    let detailed = match serde_yaml::from_value::<LabelRuleSpec>(value)? {
        LabelRuleSpec::Shorthand(action) => {
            return label_rule(
                label,
                action.parse()?,
                None,
                CommentSetting::Inherit,
                None,
                Vec::new(),
                merge_protection.clone(),
            );
        }
        LabelRuleSpec::Detailed(detailed) => detailed,
    };

    let protected = match detailed.unless {
        Some(unless) => BranchFilter::new(unless.branches)?.union(merge_protection)?,
        None => merge_protection.clone(),
    };

    label_rule(
        label,
        detailed.action.parse()?,
        detailed.delay,
        CommentSetting::from_spec(detailed.comment),
        detailed.message,
        detailed.labels,
        protected,
    )
}

fn label_rule(
    label: &str,
    kind: ActionKind,
    delay: Option<Delay>,
    comment: CommentSetting,
    message: Option<String>,
    labels: Vec<String>,
    protected: BranchFilter,
) -> Result<LabelRule, RuleError> {
    let action = match kind {
        ActionKind::Close => LabelAction::Close,
        ActionKind::Open => LabelAction::Open,
        ActionKind::Comment => LabelAction::Comment { message },
        ActionKind::Merge => LabelAction::Merge { protected },
        ActionKind::Lock => LabelAction::Lock,
        ActionKind::BlockMerge => LabelAction::BlockMerge,
        ActionKind::Label => LabelAction::Label { labels },
        other => {
            return Err(RuleError::Unsupported {
                section: "labels",
                action: other,
            });
        }
    };

    Ok(LabelRule {
        label: label.to_string(),
        action,
        delay,
        comment,
    })
}

fn compile_comment(value: serde_yaml::Value) -> Result<CommentRule, RuleError> {
    let spec: CommentRuleSpec = serde_yaml::from_value(value)?;
    let action = match spec.action.parse()? {
        ActionKind::Label => CommentAction::Label {
            labels: spec.labels,
        },
        ActionKind::DeleteComment => CommentAction::DeleteComment,
        other => {
            return Err(RuleError::Unsupported {
                section: "comments",
                action: other,
            });
        }
    };
    Ok(CommentRule {
        pattern: Pattern::compile(&spec.pattern)?,
        action,
        delay: spec.delay,
    })
}

fn compile_commit(value: serde_yaml::Value) -> Result<CommitRule, RuleError> {
    let spec: CommitRuleSpec = serde_yaml::from_value(value)?;
    match spec.action.parse()? {
        ActionKind::Label => Ok(CommitRule {
            pattern: Pattern::compile(&spec.pattern)?,
            user: spec.user,
            labels: spec.labels,
        }),
        other => Err(RuleError::Unsupported {
            section: "commits",
            action: other,
        }),
    }
}

fn compile_close(value: serde_yaml::Value) -> Result<CloseRule, RuleError> {
    let spec: CloseRuleSpec = serde_yaml::from_value(value)?;
    match spec.action.parse()? {
        ActionKind::Lock => Ok(CloseRule {
            when: spec.when.as_deref().map(str::parse).transpose()?.unwrap_or_default(),
            delay: spec.delay,
            comment: CommentSetting::from_spec(spec.comment),
        }),
        other => Err(RuleError::Unsupported {
            section: "closes",
            action: other,
        }),
    }
}

fn compile_merge(value: serde_yaml::Value) -> Result<MergeRule, RuleError> {
    let spec: MergeRuleSpec = serde_yaml::from_value(value)?;
    let action = match spec.action.parse()? {
        ActionKind::Merge => MergeAction::Merge,
        ActionKind::DeleteBranch => MergeAction::DeleteBranch,
        ActionKind::Tag => MergeAction::Tag,
        other => {
            return Err(RuleError::Unsupported {
                section: "merges",
                action: other,
            });
        }
    };
    let unless = match spec.unless {
        Some(unless) => BranchFilter::new(unless.branches)?,
        None => BranchFilter::empty(),
    };
    Ok(MergeRule { action, unless })
}
