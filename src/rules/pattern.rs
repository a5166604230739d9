//! Text patterns for comment and commit rules.
//!
//! A rule pattern is written in one of two forms:
//!
//! - `/<body>/<flags>`: a regular expression with trailing flags, e.g.
//!   `/\/remind/i`. A `\/` inside the body stands for a literal slash.
//! - anything else: a literal, matched as a case-insensitive substring.
//!   `duplicate of` matches `Duplicate of #12` but not `duplicate-of`.
//!
//! Patterns are compiled once when the rule set is loaded.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Error returned when a pattern cannot be compiled.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The regex body failed to parse.
    #[error("invalid regex in pattern {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A trailing flag is not understood by the regex engine.
    #[error("unsupported flag '{flag}' in pattern {pattern:?}")]
    UnknownFlag { pattern: String, flag: char },
}

/// A compiled rule pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern specification.
    ///
    /// # Examples
    ///
    /// ```
    /// use triage_bot::rules::Pattern;
    ///
    /// let literal = Pattern::compile("duplicate of").unwrap();
    /// assert!(literal.is_match("Duplicate of #12"));
    /// assert!(!literal.is_match("duplicate-of #12"));
    ///
    /// let regex = Pattern::compile(r"/\/remind/i").unwrap();
    /// assert!(regex.is_match("please /REMIND me"));
    /// ```
    pub fn compile(spec: &str) -> Result<Self, PatternError> {
        let regex = match split_delimited(spec) {
            Some((body, flags)) => compile_delimited(spec, body, flags)?,
            None => RegexBuilder::new(&regex::escape(spec))
                .case_insensitive(true)
                .build()
                .map_err(|source| PatternError::InvalidRegex {
                    pattern: spec.to_string(),
                    source,
                })?,
        };

        Ok(Pattern {
            source: spec.to_string(),
            regex,
        })
    }

    /// Returns true if the pattern matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Returns the pattern as written in the configuration.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Splits `/<body>/<flags>` into its parts.
///
/// Returns `None` when the spec is not in delimited form, so it is treated as
/// a literal. The flags must be ASCII letters; an empty flag list is allowed.
fn split_delimited(spec: &str) -> Option<(&str, &str)> {
    let rest = spec.strip_prefix('/')?;
    let close = rest.rfind('/')?;
    let (body, flags) = (&rest[..close], &rest[close + 1..]);
    if flags.chars().all(|c| c.is_ascii_alphabetic()) {
        Some((body, flags))
    } else {
        None
    }
}

fn compile_delimited(spec: &str, body: &str, flags: &str) -> Result<Regex, PatternError> {
    let body = unescape_slashes(body);
    let mut builder = RegexBuilder::new(&body);

    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'U' => builder.swap_greed(true),
            'u' => builder.unicode(true),
            'R' => builder.crlf(true),
            // Global and sticky only affect iteration, not a yes/no match.
            'g' | 'y' => &mut builder,
            other => {
                return Err(PatternError::UnknownFlag {
                    pattern: spec.to_string(),
                    flag: other,
                });
            }
        };
    }

    builder.build().map_err(|source| PatternError::InvalidRegex {
        pattern: spec.to_string(),
        source,
    })
}

/// Rewrites `\/` to `/`, leaving every other escape untouched.
fn unescape_slashes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => out.push('/'),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}
