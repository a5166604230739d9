//! Rule resolution: from an event to zero or more action requests.
//!
//! Resolution is pure. It reads the rule set and the event and never talks to
//! GitHub; commit rules take the already-fetched commit list as input.

pub mod request;
pub mod template;

use std::time::Duration;
use tracing::{debug, info};

use crate::effects::CommitData;
use crate::rules::{
    ActionKind, CommentAction, CommentSetting, Delay, LabelAction, LockCondition, MergeAction,
    RuleSet,
};
use crate::types::{Event, EventPayload, PullRequestInfo, StateReason};

pub use request::{Action, ActionRequest, TaskKey, Trigger};
pub use template::render;

/// Resolves every request an event asks for.
///
/// All `label` requests of one event are folded into the first of them. Other
/// requests of the same kind share a scheduler key, so when delayed the last
/// one wins.
///
/// `commit_pushed` events resolve to nothing here; see [`resolve_commits`].
pub fn resolve(rules: &RuleSet, event: &Event) -> Vec<ActionRequest> {
    coalesce_labels(resolve_each(rules, event))
}

fn resolve_each(rules: &RuleSet, event: &Event) -> Vec<ActionRequest> {
    match &event.payload {
        EventPayload::LabelAdded {
            labels,
            closed,
            pull_request,
        } => labels
            .iter()
            .filter_map(|label| resolve_label(rules, event, label, *closed, pull_request.as_ref()))
            .collect(),
        EventPayload::CommentCreated { comment_id, body } => {
            resolve_comment(rules, event, *comment_id, body)
        }
        EventPayload::CommitPushed { .. } => Vec::new(),
        EventPayload::IssueClosed { state_reason } => {
            resolve_closes(rules, event, |when| match when {
                LockCondition::Closed => true,
                LockCondition::Merged => false,
                LockCondition::Completed => *state_reason == Some(StateReason::Completed),
            })
        }
        EventPayload::PullRequestClosed { pull_request } => {
            let mut requests = resolve_closes(rules, event, |when| match when {
                LockCondition::Closed => true,
                LockCondition::Merged | LockCondition::Completed => pull_request.merged,
            });
            if pull_request.merged {
                requests.extend(resolve_merges(rules, event, pull_request));
            }
            requests
        }
    }
}

/// Resolves commit rules against the commits of a `commit_pushed` event.
///
/// Every (commit, rule) match contributes its labels. They are merged into a
/// single `label` request with duplicates removed, so a push touching many
/// commits costs one API call.
pub fn resolve_commits(
    rules: &RuleSet,
    event: &Event,
    commits: &[CommitData],
) -> Vec<ActionRequest> {
    let delay = default_delay(rules, ActionKind::Label);
    let mut labels: Vec<String> = Vec::new();

    for commit in commits {
        for rule in rules.commits() {
            if !rule.pattern.is_match(&commit.message) {
                continue;
            }
            if let Some(user) = &rule.user
                && !authored_by(commit, user)
            {
                debug!(sha = %commit.sha.short(), %user, "commit rule matched but user filter did not");
                continue;
            }
            for label in &rule.labels {
                if !labels.contains(label) {
                    labels.push(label.clone());
                }
            }
        }
    }

    if labels.is_empty() {
        return Vec::new();
    }

    vec![request(
        event,
        delay.duration(),
        Action::Label { labels },
        Trigger::Commits,
    )]
}

/// Folds every `label` request into the first one, keeping its delay and
/// trigger. Labels are unioned in order with duplicates removed.
///
/// The requests would otherwise share one scheduler key and supersede each
/// other.
fn coalesce_labels(requests: Vec<ActionRequest>) -> Vec<ActionRequest> {
    let mut coalesced: Vec<ActionRequest> = Vec::with_capacity(requests.len());
    let mut first_label: Option<usize> = None;

    for request in requests {
        if !matches!(request.action, Action::Label { .. }) {
            coalesced.push(request);
            continue;
        }
        let Some(index) = first_label else {
            first_label = Some(coalesced.len());
            coalesced.push(request);
            continue;
        };
        debug!(trigger = %request.trigger, "folding label request into an earlier one");
        let Action::Label { labels } = request.action else {
            continue;
        };
        if let Action::Label { labels: merged } = &mut coalesced[index].action {
            for label in labels {
                if !merged.contains(&label) {
                    merged.push(label);
                }
            }
        }
    }
    coalesced
}

/// Either the author or the committer login may satisfy a `user` filter.
fn authored_by(commit: &CommitData, user: &str) -> bool {
    [&commit.author_login, &commit.committer_login]
        .into_iter()
        .flatten()
        .any(|login| login.eq_ignore_ascii_case(user))
}

fn resolve_label(
    rules: &RuleSet,
    event: &Event,
    label: &str,
    closed: bool,
    pull_request: Option<&PullRequestInfo>,
) -> Option<ActionRequest> {
    let Some(rule) = rules.label_rule(label) else {
        debug!(%label, "no rule for label");
        return None;
    };

    let kind = rule.action.kind();
    let delay = rule
        .delay
        .clone()
        .unwrap_or_else(|| default_delay(rules, kind));
    let number = event.target.0.to_string();
    let vars = [
        ("DELAY", delay.as_str()),
        ("LABEL", label),
        ("ACTION", kind.as_str()),
        ("NUMBER", number.as_str()),
    ];
    let comment = resolve_comment_text(rules, kind, &rule.comment, &vars);

    let action = match &rule.action {
        LabelAction::Close => Action::Close { comment },
        LabelAction::Open => Action::Open,
        LabelAction::Comment { message } => Action::Comment {
            message: render(message.as_deref().unwrap_or_default(), &vars),
        },
        LabelAction::Merge { protected } => Action::Merge {
            label: label.to_string(),
            protected: protected.clone(),
            blocking_labels: rules.blocking_labels(),
        },
        LabelAction::Lock => Action::Lock {
            terminal: closed || pull_request.is_some_and(|pr| pr.merged),
            comment,
        },
        LabelAction::BlockMerge => Action::BlockMerge { comment },
        LabelAction::Label { labels } => Action::Label {
            labels: labels.clone(),
        },
    };

    Some(request(
        event,
        delay.duration(),
        action,
        Trigger::Label(label.to_string()),
    ))
}

fn resolve_comment(
    rules: &RuleSet,
    event: &Event,
    comment_id: crate::types::CommentId,
    body: &str,
) -> Vec<ActionRequest> {
    rules
        .comments()
        .iter()
        .filter(|rule| rule.pattern.is_match(body))
        .map(|rule| {
            let action = match &rule.action {
                CommentAction::Label { labels } => Action::Label {
                    labels: labels.clone(),
                },
                CommentAction::DeleteComment => Action::DeleteComment { comment_id },
            };
            let delay = rule
                .delay
                .clone()
                .unwrap_or_else(|| default_delay(rules, action.kind()));
            request(event, delay.duration(), action, Trigger::Comment(comment_id))
        })
        .collect()
}

fn resolve_closes(
    rules: &RuleSet,
    event: &Event,
    is_terminal: impl Fn(LockCondition) -> bool,
) -> Vec<ActionRequest> {
    let mut requests = Vec::new();
    for rule in rules.closes() {
        if !is_terminal(rule.when) {
            info!(issue = %event.target, when = ?rule.when, "close does not satisfy lock condition");
            continue;
        }
        let delay = rule
            .delay
            .clone()
            .unwrap_or_else(|| default_delay(rules, ActionKind::Lock));
        let number = event.target.0.to_string();
        let vars = [
            ("DELAY", delay.as_str()),
            ("ACTION", ActionKind::Lock.as_str()),
            ("NUMBER", number.as_str()),
        ];
        let comment = resolve_comment_text(rules, ActionKind::Lock, &rule.comment, &vars);
        requests.push(request(
            event,
            delay.duration(),
            Action::Lock {
                terminal: true,
                comment,
            },
            Trigger::Close,
        ));
    }
    requests
}

fn resolve_merges(rules: &RuleSet, event: &Event, pr: &PullRequestInfo) -> Vec<ActionRequest> {
    rules
        .merges()
        .iter()
        .filter_map(|rule| {
            let action = match rule.action {
                // Protection for merge labels, applied when they resolve.
                MergeAction::Merge => return None,
                MergeAction::DeleteBranch => Action::DeleteBranch {
                    head_ref: pr.head_ref.clone(),
                    base_ref: pr.base_ref.clone(),
                    protected: rule.unless.clone(),
                },
                MergeAction::Tag => Action::Tag {
                    merge_commit_sha: pr.merge_commit_sha.clone(),
                    base_ref: pr.base_ref.clone(),
                    unless: rule.unless.clone(),
                },
            };
            let delay = default_delay(rules, action.kind());
            Some(request(event, delay.duration(), action, Trigger::Merge))
        })
        .collect()
}

/// `default.<kind>.delay`, else zero.
fn default_delay(rules: &RuleSet, kind: ActionKind) -> Delay {
    rules
        .defaults(kind)
        .and_then(|defaults| defaults.delay.clone())
        .unwrap_or_else(Delay::zero)
}

/// Rule text, else `default.<kind>.comment`, unless suppressed.
fn resolve_comment_text(
    rules: &RuleSet,
    kind: ActionKind,
    setting: &CommentSetting,
    vars: &[(&str, &str)],
) -> Option<String> {
    let template = match setting {
        CommentSetting::Suppressed => return None,
        CommentSetting::Text(text) => Some(text.as_str()),
        CommentSetting::Inherit => rules
            .defaults(kind)
            .and_then(|defaults| defaults.comment.as_deref()),
    }?;
    let text = render(template, vars);
    (!text.trim().is_empty()).then_some(text)
}

fn request(event: &Event, delay: Duration, action: Action, trigger: Trigger) -> ActionRequest {
    ActionRequest {
        repo: event.repo.clone(),
        target: event.target,
        target_kind: event.target_kind,
        delay,
        action,
        trigger,
    }
}
