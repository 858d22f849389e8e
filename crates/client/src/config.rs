//! Client configuration from the environment.

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the remote authority, without a trailing slash.
    pub api_url: String,
    /// Bearer token of the current session, if there is one.
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            auth_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Read `LENDORA_API_URL`, `LENDORA_AUTH_TOKEN` and
    /// `LENDORA_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_url = lookup("LENDORA_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| {
                tracing::info!("LENDORA_API_URL not set; using {DEFAULT_API_URL}");
                DEFAULT_API_URL.to_string()
            });

        let auth_token = lookup("LENDORA_AUTH_TOKEN").filter(|token| !token.trim().is_empty());
        if auth_token.is_none() {
            tracing::info!("LENDORA_AUTH_TOKEN not set; requests will be unauthenticated");
        }

        let request_timeout = match lookup("LENDORA_REQUEST_TIMEOUT_SECS") {
            None => DEFAULT_REQUEST_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %raw, "invalid LENDORA_REQUEST_TIMEOUT_SECS; using default");
                    DEFAULT_REQUEST_TIMEOUT
                }
            },
        };

        Self {
            api_url,
            auth_token,
            request_timeout,
        }
    }
}
