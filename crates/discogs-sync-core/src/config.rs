//! Runtime configuration.
//!
//! Loaded from an optional JSON file; every field has a default. Environment
//! variables override the file:
//!
//! | Variable | Fallback | Field |
//! |----------|----------|-------|
//! | `DISCOGS_SYNC_TOKEN` | `DISCOGS_TOKEN` | `token` |
//! | `DISCOGS_SYNC_STATE_PATH` | - | `state_path` |
//! | `DISCOGS_SYNC_API_BASE` | - | `api_base` |

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coordinator::{CoordinatorOptions, EndpointSchedule};
use crate::fetch::{DiscogsSource, DEFAULT_API_BASE, DEFAULT_USER_AGENT};
use crate::health::DEFAULT_AUTH_FAILURE_THRESHOLD;
use crate::http_client::{HttpAuth, HttpClient};
use crate::policy::{RequestPolicy, DEFAULT_PAGE_SIZE};
use crate::retry::{Backoff, RetryConfig};
use crate::{CoreError, ValidationError};

pub const ENV_TOKEN: &str = "DISCOGS_SYNC_TOKEN";
pub const ENV_TOKEN_FALLBACK: &str = "DISCOGS_TOKEN";
pub const ENV_STATE_PATH: &str = "DISCOGS_SYNC_STATE_PATH";
pub const ENV_API_BASE: &str = "DISCOGS_SYNC_API_BASE";

pub const DEFAULT_STATE_PATH: &str = "discogs_sync_state.json";

/// Limiter and retry tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum gap between requests; `0` disables spacing.
    pub min_spacing_ms: u64,
    /// Wait after a `429` before retrying.
    pub cooldown_secs: u64,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    /// Spread retry delays by up to half in either direction.
    pub jitter: bool,
    pub request_timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_spacing_ms: 5_000,
            cooldown_secs: 60,
            max_retries: 3,
            backoff_base_secs: 5,
            backoff_max_secs: 60,
            jitter: false,
            request_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub per_page: u32,
    pub cooldown_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PAGE_SIZE,
            cooldown_secs: 10,
        }
    }
}

/// Top-level configuration for one account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub token: Option<String>,
    pub api_base: String,
    pub user_agent: String,
    pub enable_scheduled_updates: bool,
    pub schedule: EndpointSchedule,
    pub rate_limit: RateLimitConfig,
    pub export: ExportConfig,
    pub auth_failure_threshold: u32,
    pub state_path: PathBuf,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("user_agent", &self.user_agent)
            .field("enable_scheduled_updates", &self.enable_scheduled_updates)
            .field("schedule", &self.schedule)
            .field("rate_limit", &self.rate_limit)
            .field("export", &self.export)
            .field("auth_failure_threshold", &self.auth_failure_threshold)
            .field("state_path", &self.state_path)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: String::from(DEFAULT_API_BASE),
            user_agent: String::from(DEFAULT_USER_AGENT),
            enable_scheduled_updates: true,
            schedule: EndpointSchedule::default(),
            rate_limit: RateLimitConfig::default(),
            export: ExportConfig::default(),
            auth_failure_threshold: DEFAULT_AUTH_FAILURE_THRESHOLD,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
        }
    }
}

impl SyncConfig {
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// File (when given) plus process environment overrides, validated.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|name| env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(token) = non_empty(ENV_TOKEN).or_else(|| non_empty(ENV_TOKEN_FALLBACK)) {
            self.token = Some(token);
        }
        if let Some(path) = non_empty(ENV_STATE_PATH) {
            self.state_path = PathBuf::from(path);
        }
        if let Some(api_base) = non_empty(ENV_API_BASE) {
            self.api_base = api_base;
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(ValidationError::InvalidApiBase {
                value: self.api_base.clone(),
            });
        }
        if self.export.per_page == 0 {
            return Err(ValidationError::NonPositive {
                field: "export.per_page",
            });
        }
        if self.rate_limit.request_timeout_ms == 0 {
            return Err(ValidationError::NonPositive {
                field: "rate_limit.request_timeout_ms",
            });
        }
        if self.auth_failure_threshold == 0 {
            return Err(ValidationError::NonPositive {
                field: "auth_failure_threshold",
            });
        }
        Ok(())
    }

    pub fn token(&self) -> Result<&str, ValidationError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ValidationError::MissingToken)
    }

    pub fn request_policy(&self) -> RequestPolicy {
        let limits = &self.rate_limit;
        RequestPolicy {
            min_spacing: Duration::from_millis(limits.min_spacing_ms),
            request_timeout: Duration::from_millis(limits.request_timeout_ms),
            page_size: self.export.per_page.max(1),
            retry: RetryConfig {
                enabled: limits.max_retries > 0,
                max_retries: limits.max_retries,
                backoff: Backoff::Exponential {
                    base: Duration::from_secs(limits.backoff_base_secs),
                    factor: 2.0,
                    max: Duration::from_secs(limits.backoff_max_secs),
                    jitter: limits.jitter,
                },
                rate_limit_cooldown: Duration::from_secs(limits.cooldown_secs),
            },
        }
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            schedule: self.schedule.clone(),
            scheduled_updates: self.enable_scheduled_updates,
            auth_failure_threshold: self.auth_failure_threshold,
            export_cooldown: Duration::from_secs(self.export.cooldown_secs),
        }
    }

    /// Live source over `http`. Requires a token.
    pub fn build_source(&self, http: Arc<dyn HttpClient>) -> Result<DiscogsSource, ValidationError> {
        let token = self.token()?;
        Ok(DiscogsSource::new(
            http,
            HttpAuth::DiscogsToken(token.to_owned()),
            self.request_policy(),
        )
        .with_api_base(self.api_base.as_str())
        .with_user_agent(self.user_agent.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::EndpointId;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (String::from(*name), String::from(*value)))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = SyncConfig::default();

        assert_eq!(config.api_base, "https://api.discogs.com");
        assert!(config.enable_scheduled_updates);
        assert_eq!(config.rate_limit.min_spacing_ms, 5_000);
        assert_eq!(config.export.per_page, 100);
        assert_eq!(config.auth_failure_threshold, 3);
        assert_eq!(config.state_path, PathBuf::from("discogs_sync_state.json"));
        assert_eq!(config.token(), Err(ValidationError::MissingToken));
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"token": "abc", "schedule": {"overrides": {"wantlist": 0}}, "rate_limit": {"min_spacing_ms": 0}}"#,
        )
        .expect("config");

        assert_eq!(config.token(), Ok("abc"));
        assert_eq!(config.schedule.global_minutes, 10);
        assert_eq!(config.schedule.minutes(EndpointId::Wantlist), 0);
        assert_eq!(config.rate_limit.min_spacing_ms, 0);
        assert_eq!(config.rate_limit.cooldown_secs, 60);
    }

    #[test]
    fn env_overrides_prefer_primary_token_variable() {
        let mut config = SyncConfig::default();
        config.apply_env_with(lookup(&[
            ("DISCOGS_TOKEN", "fallback"),
            ("DISCOGS_SYNC_TOKEN", "primary"),
            ("DISCOGS_SYNC_STATE_PATH", "/tmp/state.json"),
        ]));

        assert_eq!(config.token(), Ok("primary"));
        assert_eq!(config.state_path, PathBuf::from("/tmp/state.json"));

        let mut fallback = SyncConfig::default();
        fallback.apply_env_with(lookup(&[("DISCOGS_TOKEN", "fallback"), ("DISCOGS_SYNC_TOKEN", " ")]));
        assert_eq!(fallback.token(), Ok("fallback"));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = SyncConfig {
            api_base: String::from("ftp://example.com"),
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidApiBase { .. })
        ));

        config.api_base = String::from(DEFAULT_API_BASE);
        config.export.per_page = 0;
        assert_eq!(
            config.validate(),
            Err(ValidationError::NonPositive {
                field: "export.per_page"
            })
        );
    }

    #[test]
    fn request_policy_reflects_rate_limit_section() {
        let mut config = SyncConfig::default();
        config.rate_limit.min_spacing_ms = 250;
        config.rate_limit.max_retries = 0;

        let policy = config.request_policy();
        assert_eq!(policy.min_spacing, Duration::from_millis(250));
        assert!(!policy.retry.enabled);
        assert_eq!(policy.retry.backoff.delay(1), Duration::from_secs(10));
    }

    #[test]
    fn jitter_flag_reaches_retry_backoff() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"rate_limit": {"jitter": true}}"#).expect("config");
        assert!(matches!(
            config.request_policy().retry.backoff,
            Backoff::Exponential { jitter: true, .. }
        ));

        let plain = SyncConfig::default().request_policy();
        assert!(matches!(
            plain.retry.backoff,
            Backoff::Exponential { jitter: false, .. }
        ));
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = SyncConfig {
            token: Some(String::from("very-secret")),
            ..SyncConfig::default()
        };
        assert!(!format!("{config:?}").contains("very-secret"));
    }
}
