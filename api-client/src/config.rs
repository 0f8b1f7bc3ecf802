use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://performance.musiconn.de/api";

/// Configuration for [`crate::ResilientClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Query endpoint all requests go to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Total number of attempts per request
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base of the linear backoff between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Deadline covering all attempts of one request
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retry 4xx responses other than 408/429 as well
    #[serde(default)]
    pub retry_client_errors: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    concat!("musiconn/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: default_timeout_ms(),
            retry_client_errors: false,
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("base_url must not be empty".to_string());
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(format!("base_url is not a valid URL: {}", self.base_url));
        }
        if self.retries == 0 {
            return Err("retries must be > 0".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("timeout_ms must be > 0".to_string());
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            delay_base: Duration::from_millis(self.retry_delay_ms),
            overall_timeout: Duration::from_millis(self.timeout_ms),
            retry_client_errors: self.retry_client_errors,
        }
    }
}

/// Retry parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay_base: Duration,
    pub overall_timeout: Duration,
    pub retry_client_errors: bool,
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt with 0-based index `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.delay_base.saturating_mul(attempt.saturating_add(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        ClientConfig::default().retry_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_retries_and_bad_url() {
        let mut config = ClientConfig {
            retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.retries = 1;
        config.base_url = "nope".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(3000));
    }

    #[test]
    fn test_partial_toml_like_input_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "retries": 5 }"#).expect("config should parse");
        assert_eq!(config.retries, 5);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
