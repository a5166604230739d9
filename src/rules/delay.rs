//! Rule delays.
//!
//! Delays are written in humantime notation (`"30s"`, `"7 days"`, `"1h 30m"`).
//! A bare integer, or a string of digits, is a number of milliseconds.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

/// A parsed delay, remembering how it was written.
///
/// The written form is what `$DELAY` renders as in comment templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delay {
    text: String,
    duration: Duration,
}

/// Error returned for a delay that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid delay {text:?}: {reason}")]
pub struct DelayError {
    pub text: String,
    pub reason: String,
}

impl Delay {
    /// The zero delay: run in the same resolution cycle.
    pub fn zero() -> Self {
        Delay {
            text: "0s".to_string(),
            duration: Duration::ZERO,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Delay {
            text: ms.to_string(),
            duration: Duration::from_millis(ms),
        }
    }

    /// Parses a delay string.
    ///
    /// ```
    /// use std::time::Duration;
    /// use triage_bot::rules::Delay;
    ///
    /// assert_eq!(Delay::parse("7 days").unwrap().duration(), Duration::from_secs(7 * 86_400));
    /// assert_eq!(Delay::parse("1500").unwrap().duration(), Duration::from_millis(1500));
    /// ```
    pub fn parse(text: &str) -> Result<Self, DelayError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DelayError {
                text: text.to_string(),
                reason: "empty".to_string(),
            });
        }

        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            let ms = trimmed.parse::<u64>().map_err(|e| DelayError {
                text: text.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Delay {
                text: trimmed.to_string(),
                duration: Duration::from_millis(ms),
            });
        }

        let duration =
            humantime::parse_duration(&join_units(trimmed)).map_err(|e| DelayError {
                text: text.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Delay {
            text: trimmed.to_string(),
            duration,
        })
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The delay as written in the configuration.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_zero(&self) -> bool {
        self.duration.is_zero()
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Drops whitespace between a number and its unit, so `7 days` reads as
/// `7days`. Whitespace between components (`1h 30m`) is kept.
fn join_units(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c.is_ascii_digit() {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
        }
    }
    out
}

/// The raw YAML forms a delay may take.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDelay {
    Millis(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for Delay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawDelay::deserialize(deserializer)? {
            RawDelay::Millis(ms) => Ok(Delay::from_millis(ms)),
            RawDelay::Text(text) => Delay::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}
