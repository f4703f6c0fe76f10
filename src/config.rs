//! Adapter configuration.
//!
//! Precedence: defaults, then an optional TOML file, then `TABLESHIM_*`
//! environment variables.

use crate::errors::AdapterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_CONNECTIONS: usize = 9;
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 5 * 60 * 1000;
/// Upper bound on `max_connections`.
pub const MAX_CONNECTIONS_LIMIT: usize = 1024;

pub const ENV_ACCOUNT: &str = "TABLESHIM_ACCOUNT";
pub const ENV_SECRET: &str = "TABLESHIM_SECRET";
pub const ENV_RETRY_POLICY: &str = "TABLESHIM_RETRY_POLICY";
pub const ENV_MAX_CONNECTIONS: &str = "TABLESHIM_MAX_CONNECTIONS";
pub const ENV_IDLE_TIMEOUT_MS: &str = "TABLESHIM_IDLE_TIMEOUT_MS";
pub const ENV_DEVELOPMENT: &str = "TABLESHIM_DEVELOPMENT";

/// How a connection retries transient backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetryPolicy {
    #[default]
    #[serde(rename = "ExponentialRetryPolicyFilter", alias = "exponential")]
    Exponential,
    #[serde(rename = "LinearRetryPolicyFilter", alias = "linear")]
    Linear,
    #[serde(rename = "NoRetry", alias = "none")]
    NoRetry,
}

impl RetryPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exponential => "ExponentialRetryPolicyFilter",
            Self::Linear => "LinearRetryPolicyFilter",
            Self::NoRetry => "NoRetry",
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetryPolicy {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exponentialretrypolicyfilter" | "exponential" => Ok(Self::Exponential),
            "linearretrypolicyfilter" | "linear" => Ok(Self::Linear),
            "noretry" | "none" => Ok(Self::NoRetry),
            other => Err(AdapterError::Config(format!("unknown retry policy: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub account: Option<String>,
    pub secret: Option<String>,
    pub retry_policy: RetryPolicy,
    pub max_connections: usize,
    pub idle_timeout_ms: u64,
    /// Forces the development store even when credentials are present.
    pub development: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            account: None,
            secret: None,
            retry_policy: RetryPolicy::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            development: false,
        }
    }
}

impl AdapterConfig {
    /// # Errors
    /// `Toml` for malformed input, `Config` for out-of-range values.
    pub fn from_toml_str(s: &str) -> Result<Self, AdapterError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads defaults, then `path` if given, then the environment.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Toml`/`Config` if it or an env value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, AdapterError> {
        let mut cfg = match path {
            Some(p) => {
                let s = std::fs::read_to_string(p)
                    .map_err(|e| AdapterError::Io(format!("{}: {e}", p.display())))?;
                Self::from_toml_str(&s)?
            }
            None => Self::default(),
        };
        cfg.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    /// Applies `TABLESHIM_*` values from `lookup` over the current settings.
    ///
    /// # Errors
    /// `Config` when a numeric, boolean or policy value does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AdapterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_ACCOUNT) {
            self.account = Some(v);
        }
        if let Some(v) = lookup(ENV_SECRET) {
            self.secret = Some(v);
        }
        if let Some(v) = lookup(ENV_RETRY_POLICY) {
            self.retry_policy = v.parse()?;
        }
        if let Some(v) = lookup(ENV_MAX_CONNECTIONS) {
            self.max_connections = v
                .trim()
                .parse()
                .map_err(|_| AdapterError::Config(format!("{ENV_MAX_CONNECTIONS}: not a number: {v}")))?;
        }
        if let Some(v) = lookup(ENV_IDLE_TIMEOUT_MS) {
            self.idle_timeout_ms = v
                .trim()
                .parse()
                .map_err(|_| AdapterError::Config(format!("{ENV_IDLE_TIMEOUT_MS}: not a number: {v}")))?;
        }
        if let Some(v) = lookup(ENV_DEVELOPMENT) {
            self.development = parse_flag(&v)
                .ok_or_else(|| AdapterError::Config(format!("{ENV_DEVELOPMENT}: not a boolean: {v}")))?;
        }
        self.validate()
    }

    /// # Errors
    /// `Config` when `max_connections` is outside `1..=MAX_CONNECTIONS_LIMIT` or
    /// `idle_timeout_ms` is zero.
    pub fn validate(&self) -> Result<(), AdapterError> {
        if !(1..=MAX_CONNECTIONS_LIMIT).contains(&self.max_connections) {
            return Err(AdapterError::Config(format!(
                "max_connections must be between 1 and {MAX_CONNECTIONS_LIMIT}, got {}",
                self.max_connections
            )));
        }
        if self.idle_timeout_ms == 0 {
            return Err(AdapterError::Config("idle_timeout_ms must be at least 1".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.account) && present(&self.secret)
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Copy safe to print: the secret is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        if out.secret.is_some() {
            out.secret = Some("***".to_string());
        }
        out
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let c = AdapterConfig::default();
        assert_eq!(c.max_connections, 9);
        assert_eq!(c.idle_timeout(), Duration::from_secs(300));
        assert_eq!(c.retry_policy, RetryPolicy::Exponential);
        assert!(!c.has_credentials());
    }

    #[test]
    fn toml_accepts_long_and_short_policy_names() {
        let c = AdapterConfig::from_toml_str("retry_policy = \"LinearRetryPolicyFilter\"\naccount = \"a\"").unwrap();
        assert_eq!(c.retry_policy, RetryPolicy::Linear);
        assert_eq!(c.max_connections, 9);
        let c = AdapterConfig::from_toml_str("retry_policy = \"none\"").unwrap();
        assert_eq!(c.retry_policy, RetryPolicy::NoRetry);
        assert!(AdapterConfig::from_toml_str("max_connections = 0").is_err());
        assert!(matches!(AdapterConfig::from_toml_str("max_connections = \"x\""), Err(AdapterError::Toml(_))));
    }

    #[test]
    fn overrides_win_over_file() {
        let mut c = AdapterConfig::from_toml_str("account = \"file\"\nmax_connections = 4").unwrap();
        let env: HashMap<&str, &str> =
            [(ENV_ACCOUNT, "env"), (ENV_SECRET, "s3cret"), (ENV_DEVELOPMENT, "yes"), (ENV_RETRY_POLICY, "linear")]
                .into_iter()
                .collect();
        c.apply_overrides(|k| env.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(c.account.as_deref(), Some("env"));
        assert_eq!(c.max_connections, 4);
        assert!(c.development);
        assert_eq!(c.retry_policy, RetryPolicy::Linear);
        assert!(c.has_credentials());
    }

    #[test]
    fn bad_override_is_config_error() {
        let mut c = AdapterConfig::default();
        let err = c.apply_overrides(|k| (k == ENV_MAX_CONNECTIONS).then(|| "many".to_string())).unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)));
    }

    #[test]
    fn connection_bounds_are_enforced() {
        let too_many = AdapterConfig { max_connections: usize::MAX, ..AdapterConfig::default() };
        assert!(matches!(too_many.validate(), Err(AdapterError::Config(_))));
        let at_limit = AdapterConfig { max_connections: MAX_CONNECTIONS_LIMIT, ..AdapterConfig::default() };
        assert!(at_limit.validate().is_ok());
        let mut c = AdapterConfig::default();
        let err = c.apply_overrides(|k| (k == ENV_MAX_CONNECTIONS).then(|| "1025".to_string())).unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)));
        let no_idle = AdapterConfig { idle_timeout_ms: 0, ..AdapterConfig::default() };
        assert!(no_idle.validate().is_err());
    }

    #[test]
    fn redacted_masks_secret() {
        let c = AdapterConfig { secret: Some("hunter2".into()), ..AdapterConfig::default() };
        assert_eq!(c.redacted().secret.as_deref(), Some("***"));
        assert_eq!(AdapterConfig::default().redacted().secret, None);
    }
}
