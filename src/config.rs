//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default backend origin when `CHORES_ORIGIN` is unset.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8000";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin used for the initial `/api/ip` lookup and as fallback base address.
    pub origin: String,
    /// Ask the backend for its public address on startup.
    pub resolve_ip: bool,
    /// Login name. Prompted for when absent.
    pub user: Option<String>,
    /// Login password. Prompted for when absent.
    pub password: Option<SecretString>,
    /// Connect to the push channel after login.
    pub push_enabled: bool,
    /// Socket.IO endpoint path on the backend.
    pub push_path: String,
    /// First reconnect delay of the push listener.
    pub push_initial_backoff: Duration,
    /// Upper bound on the push listener's reconnect delay.
    pub push_max_backoff: Duration,
    /// TCP connect timeout for REST calls.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            resolve_ip: true,
            user: None,
            password: None,
            push_enabled: true,
            push_path: "/socket.io/".to_string(),
            push_initial_backoff: Duration::from_secs(1),
            push_max_backoff: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let origin = get("CHORES_ORIGIN")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.origin);
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "CHORES_ORIGIN".into(),
                message: format!("expected an http(s) URL, got {origin}"),
            });
        }

        let resolve_ip = match get("CHORES_RESOLVE_IP") {
            Some(v) => parse_bool("CHORES_RESOLVE_IP", &v)?,
            None => defaults.resolve_ip,
        };
        let push_enabled = match get("CHORES_PUSH") {
            Some(v) => parse_bool("CHORES_PUSH", &v)?,
            None => defaults.push_enabled,
        };

        let mut push_path = get("CHORES_PUSH_PATH").unwrap_or(defaults.push_path);
        if !push_path.starts_with('/') {
            push_path.insert(0, '/');
        }

        let connect_timeout = match get("CHORES_CONNECT_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(v.trim().parse().map_err(|_| {
                ConfigError::InvalidValue {
                    key: "CHORES_CONNECT_TIMEOUT_SECS".into(),
                    message: format!("expected whole seconds, got {v}"),
                }
            })?),
            None => defaults.connect_timeout,
        };

        Ok(Self {
            origin,
            resolve_ip,
            user: get("CHORES_USER"),
            password: get("CHORES_PASSWORD").map(SecretString::from),
            push_enabled,
            push_path,
            connect_timeout,
            ..defaults
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other}"),
        }),
    }
}
