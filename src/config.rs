use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost/GitHub/Callback";
pub const DEFAULT_SCOPE: &str = "repo";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub verify_state: bool,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub per_millisecond: u64,
    pub burst: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub github: GitHubOAuthConfig,
    pub http_timeout: Duration,
    pub session: SessionSettings,
    pub rate_limit: RateLimitSettings,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok(); // Load .env file

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, so callers other
    /// than the process environment (tests, embedding apps) can supply values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let optional =
            |key: &'static str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let github = GitHubOAuthConfig {
            client_id: required("GITHUB_CLIENT_ID")?,
            client_secret: required("GITHUB_CLIENT_SECRET")?,
            redirect_uri: optional("GITHUB_REDIRECT_URI", DEFAULT_REDIRECT_URI),
            scope: optional("GITHUB_OAUTH_SCOPE", DEFAULT_SCOPE),
            authorize_url: optional("GITHUB_OAUTH_AUTHORIZE_URL", DEFAULT_AUTHORIZE_URL),
            token_url: optional("GITHUB_OAUTH_TOKEN_URL", DEFAULT_TOKEN_URL),
            api_base_url: optional("GITHUB_API_BASE_URL", DEFAULT_API_BASE_URL),
            verify_state: parse_or(&lookup, "GITHUB_VERIFY_STATE", true)?,
        };

        let bind_address = parse_or(
            &lookup,
            "BIND_ADDRESS",
            SocketAddr::from(([127, 0, 0, 1], 3000)),
        )?;
        let http_timeout = Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECONDS", 10u64)?);
        let session = SessionSettings {
            ttl: session_ttl(&lookup)?,
            cookie_secure: parse_or(&lookup, "SESSION_COOKIE_SECURE", false)?,
        };
        // Default: 200ms/token (~5 req/sec) with short bursts
        let rate_limit = RateLimitSettings {
            per_millisecond: parse_or(&lookup, "RATE_LIMITER_MILLISECONDS", 200u64)?,
            burst: parse_or(&lookup, "RATE_LIMITER_BURST", 20u32)?,
        };
        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            bind_address,
            github,
            http_timeout,
            session,
            rate_limit,
            log_format,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

/// The TTL is added to the current time on every session write, so it must
/// stay within the range an `OffsetDateTime` can hold.
fn session_ttl<F>(lookup: &F) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    const KEY: &str = "SESSION_TTL_MINUTES";
    let minutes: u64 = parse_or(lookup, KEY, 60)?;
    let invalid = || ConfigError::Invalid {
        key: KEY,
        value: lookup(KEY).unwrap_or_else(|| minutes.to_string()),
    };

    let ttl = minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(invalid)?;
    time::Duration::try_from(ttl)
        .ok()
        .and_then(|ttl| time::OffsetDateTime::now_utc().checked_add(ttl))
        .ok_or_else(invalid)?;
    Ok(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let config = Config::from_lookup(lookup_from(&[
            ("GITHUB_CLIENT_ID", "id"),
            ("GITHUB_CLIENT_SECRET", "secret"),
        ]))
        .expect("config should load");

        assert_eq!(config.github.client_id, "id");
        assert_eq!(config.github.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.github.scope, "repo");
        assert_eq!(config.github.authorize_url, DEFAULT_AUTHORIZE_URL);
        assert_eq!(config.github.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.github.api_base_url, DEFAULT_API_BASE_URL);
        assert!(config.github.verify_state);
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.session.ttl, Duration::from_secs(3600));
        assert!(!config.session.cookie_secure);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn missing_client_secret_is_reported() {
        let err = Config::from_lookup(lookup_from(&[("GITHUB_CLIENT_ID", "id")]))
            .expect_err("secret is required");
        assert_eq!(err, ConfigError::Missing("GITHUB_CLIENT_SECRET"));
    }

    #[test]
    fn blank_client_id_counts_as_missing() {
        let err = Config::from_lookup(lookup_from(&[
            ("GITHUB_CLIENT_ID", "  "),
            ("GITHUB_CLIENT_SECRET", "secret"),
        ]))
        .expect_err("blank id is rejected");
        assert_eq!(err, ConfigError::Missing("GITHUB_CLIENT_ID"));
    }

    #[test]
    fn invalid_numbers_name_the_offending_key() {
        let err = Config::from_lookup(lookup_from(&[
            ("GITHUB_CLIENT_ID", "id"),
            ("GITHUB_CLIENT_SECRET", "secret"),
            ("HTTP_TIMEOUT_SECONDS", "soon"),
        ]))
        .expect_err("timeout must be numeric");
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "HTTP_TIMEOUT_SECONDS",
                value: "soon".into()
            }
        );
    }

    #[test]
    fn session_ttl_must_fit_in_a_timestamp() {
        for minutes in ["100000000000", "18446744073709551615"] {
            let err = Config::from_lookup(lookup_from(&[
                ("GITHUB_CLIENT_ID", "id"),
                ("GITHUB_CLIENT_SECRET", "secret"),
                ("SESSION_TTL_MINUTES", minutes),
            ]))
            .expect_err("unrepresentable TTL is rejected");
            assert_eq!(
                err,
                ConfigError::Invalid {
                    key: "SESSION_TTL_MINUTES",
                    value: minutes.into()
                }
            );
        }
    }

    #[test]
    fn overrides_are_honoured() {
        let config = Config::from_lookup(lookup_from(&[
            ("GITHUB_CLIENT_ID", "id"),
            ("GITHUB_CLIENT_SECRET", "secret"),
            ("GITHUB_OAUTH_SCOPE", "repo read:user"),
            ("GITHUB_VERIFY_STATE", "false"),
            ("BIND_ADDRESS", "0.0.0.0:8080"),
            ("SESSION_TTL_MINUTES", "5"),
            ("LOG_FORMAT", "json"),
        ]))
        .expect("config should load");

        assert_eq!(config.github.scope, "repo read:user");
        assert!(!config.github.verify_state);
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8080");
        assert_eq!(config.session.ttl, Duration::from_secs(300));
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
