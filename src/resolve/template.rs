//! `$NAME` substitution in comment and message templates.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\w+)").expect("template variable regex is valid"));

/// Replaces every `$NAME` token with its value from `vars`.
///
/// Names are case-sensitive. Unknown names render as the empty string.
///
/// ```
/// use triage_bot::resolve::render;
///
/// let text = render("Closing in $DELAY ($LABEL)$UNKNOWN", &[("DELAY", "7 days"), ("LABEL", "stale")]);
/// assert_eq!(text, "Closing in 7 days (stale)");
/// ```
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    VARIABLE
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
                .unwrap_or_default()
        })
        .into_owned()
}
