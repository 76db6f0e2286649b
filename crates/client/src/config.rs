//! Client configuration loaded from the environment.

use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_AVATAR_BUCKET: &str = "avatars";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROFILE_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the app server exposing `/api/auth/my-roles`.
    pub api_url: String,
    /// Base URL of the hosted storage service; bare avatar paths need it.
    pub storage_url: Option<String>,
    pub avatar_bucket: String,
    pub login_path: String,
    pub request_timeout: Duration,
    pub profile_cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            storage_url: None,
            avatar_bucket: DEFAULT_AVATAR_BUCKET.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            profile_cache_ttl: DEFAULT_PROFILE_CACHE_TTL,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match get(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{key} must be a whole number of seconds, got {raw:?}")),
                None => Ok(default),
            }
        };

        Ok(Self {
            api_url: get("GENERA_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            storage_url: get("GENERA_STORAGE_URL").map(|u| u.trim_end_matches('/').to_string()),
            avatar_bucket: get("GENERA_AVATAR_BUCKET").unwrap_or(defaults.avatar_bucket),
            login_path: get("GENERA_LOGIN_PATH").unwrap_or(defaults.login_path),
            request_timeout: nonzero(
                "GENERA_REQUEST_TIMEOUT_SECS",
                secs("GENERA_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            )?,
            profile_cache_ttl: secs("GENERA_PROFILE_CACHE_TTL_SECS", defaults.profile_cache_ttl)?,
        })
    }
}

fn nonzero(key: &str, value: Duration) -> anyhow::Result<Duration> {
    anyhow::ensure!(!value.is_zero(), "{key} must be at least one second");
    Ok(value)
}
