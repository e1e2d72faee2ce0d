use std::{env, time::Duration};

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// What the quiz session does when an answer fails to reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnswerFailurePolicy {
    /// Keep the error for display and move on anyway.
    #[default]
    Continue,
    /// Stay on the question until `next()` succeeds.
    Block,
}

impl AnswerFailurePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Some(Self::Continue),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub timeout: Duration,
    pub answer_failures: AnswerFailurePolicy,
    pub identity: Option<IdentityConfig>,
}

/// Signed-in user handed to the terminal's local identity provider.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub uid: String,
    pub email: String,
    pub name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            timeout: Duration::from_secs(15),
            answer_failures: AnswerFailurePolicy::Continue,
            identity: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Config::default();

        if let Some(url) = get("QUIZDECK_API_URL").filter(|s| !s.trim().is_empty()) {
            cfg.api_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = get("QUIZDECK_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "QUIZDECK_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get("QUIZDECK_ANSWER_FAILURES") {
            cfg.answer_failures =
                AnswerFailurePolicy::parse(&raw).ok_or(ConfigError::Invalid {
                    var: "QUIZDECK_ANSWER_FAILURES",
                    value: raw.clone(),
                })?;
        }
        if let (Some(uid), Some(email)) = (get("QUIZDECK_UID"), get("QUIZDECK_EMAIL")) {
            cfg.identity = Some(IdentityConfig {
                uid,
                email,
                name: get("QUIZDECK_NAME"),
            });
        }
        Ok(cfg)
    }
}
