//! Process configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `GITHUB_TOKEN` | required |
//! | `WEBHOOK_SECRET` | required |
//! | `PORT` | `3000` |
//! | `TRIAGE_BOT_RULES` | `.github/standard.yaml` |

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineConfig;

pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const WEBHOOK_SECRET_VAR: &str = "WEBHOOK_SECRET";
pub const PORT_VAR: &str = "PORT";
pub const RULES_VAR: &str = "TRIAGE_BOT_RULES";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RULES_PATH: &str = ".github/standard.yaml";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is not valid: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub github_token: String,
    pub webhook_secret: String,
    pub port: u16,
    pub rules_path: PathBuf,
    pub engine: EngineConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("rules_path", &self.rules_path)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppConfigError> {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|value| !value.trim().is_empty())
                .ok_or(AppConfigError::Missing(var))
        };

        let github_token = required(GITHUB_TOKEN_VAR)?;
        let webhook_secret = required(WEBHOOK_SECRET_VAR)?;

        let port = match lookup(PORT_VAR) {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| AppConfigError::Invalid {
                    var: PORT_VAR,
                    value,
                })?,
            None => DEFAULT_PORT,
        };

        let rules_path = lookup(RULES_VAR)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_PATH));

        Ok(AppConfig {
            github_token,
            webhook_secret,
            port,
            rules_path,
            engine: EngineConfig::from_lookup(&lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [(GITHUB_TOKEN_VAR, "ghp_x"), (WEBHOOK_SECRET_VAR, "s3cret")];

    #[test]
    fn defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.github_token, "ghp_x");
        assert_eq!(config.webhook_secret, "s3cret");
        assert_eq!(config.port, 3000);
        assert_eq!(config.rules_path, PathBuf::from(".github/standard.yaml"));
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.push((PORT_VAR, "8080"));
        vars.push((RULES_VAR, "/etc/triage/rules.yaml"));
        vars.push(("TRIAGE_BOT_GATE_MAX_ATTEMPTS", "3"));

        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rules_path, PathBuf::from("/etc/triage/rules.yaml"));
        assert_eq!(config.engine.executor.gate.max_attempts, 3);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let result = AppConfig::from_lookup(lookup(&[(GITHUB_TOKEN_VAR, "ghp_x")]));
        assert_eq!(result.err(), Some(AppConfigError::Missing(WEBHOOK_SECRET_VAR)));
    }

    #[test]
    fn blank_token_is_missing() {
        let result =
            AppConfig::from_lookup(lookup(&[(GITHUB_TOKEN_VAR, " "), (WEBHOOK_SECRET_VAR, "s")]));
        assert_eq!(result.err(), Some(AppConfigError::Missing(GITHUB_TOKEN_VAR)));
    }

    #[test]
    fn bad_port_is_an_error() {
        let mut vars = REQUIRED.to_vec();
        vars.push((PORT_VAR, "http"));
        let result = AppConfig::from_lookup(lookup(&vars));
        assert_eq!(
            result.err(),
            Some(AppConfigError::Invalid {
                var: PORT_VAR,
                value: "http".to_string(),
            })
        );
    }

    #[test]
    fn debug_hides_credentials() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("ghp_x"));
        assert!(!rendered.contains("s3cret"));
    }
}
