use std::time::Duration;

/// Default status poller cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay before a resolved confirmation returns to idle.
pub const DEFAULT_CONFIRM_DISMISS: Duration = Duration::from_secs(5);

const DEFAULT_API_URL: &str = "http://localhost:8080/api";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local executor.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the executor HTTP surface, without a trailing slash.
    pub api_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// `None` disables auto-dismiss of resolved confirmations.
    pub confirm_dismiss: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            confirm_dismiss: Some(DEFAULT_CONFIRM_DISMISS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                     |
    /// |------------------------|-----------------------------|
    /// | `STRIKER_API_URL`      | `http://localhost:8080/api` |
    /// | `POLL_INTERVAL_MS`     | `5000`                      |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                        |
    /// | `CONFIRM_DISMISS_SECS` | `5` (`0` disables)          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = lookup("STRIKER_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_url);

        let poll_interval = match lookup("POLL_INTERVAL_MS") {
            Some(raw) => match parse_u64("POLL_INTERVAL_MS", &raw)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        var: "POLL_INTERVAL_MS",
                        expected: "a positive integer",
                        value: raw,
                    })
                }
                ms => Duration::from_millis(ms),
            },
            None => defaults.poll_interval,
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_u64("REQUEST_TIMEOUT_SECS", &raw)?),
            None => defaults.request_timeout,
        };

        let confirm_dismiss = match lookup("CONFIRM_DISMISS_SECS") {
            Some(raw) => match parse_u64("CONFIRM_DISMISS_SECS", &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => defaults.confirm_dismiss,
        };

        Ok(Self {
            api_url,
            poll_interval,
            request_timeout,
            confirm_dismiss,
        })
    }
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        expected: "a non-negative integer",
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.confirm_dismiss, Some(DEFAULT_CONFIRM_DISMISS));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("STRIKER_API_URL", "https://striker.example.com/api/"),
            ("POLL_INTERVAL_MS", "2500"),
            ("REQUEST_TIMEOUT_SECS", "10"),
            ("CONFIRM_DISMISS_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "https://striker.example.com/api");
        assert_eq!(config.poll_interval, Duration::from_millis(2500));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.confirm_dismiss, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("POLL_INTERVAL_MS", "soon")]).is_err());
        assert!(config_from(&[("POLL_INTERVAL_MS", "0")]).is_err());
        assert!(config_from(&[("REQUEST_TIMEOUT_SECS", "-1")]).is_err());
    }
}
