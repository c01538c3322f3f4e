use std::collections::HashMap;
use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Shared HS256 secret Supabase signs access tokens with.
    pub jwt_secret: String,
    pub jwt_audience: String,
    /// Expected `iss` claim; unchecked when `None`.
    pub jwt_issuer: Option<String>,
    pub auth_clock_skew: Duration,
    /// Outgoing mail goes to the relay when set, and to the log otherwise.
    pub mail_relay: Option<MailRelayConfig>,
    pub mail_from: String,
    pub rate_limit_window: Duration,
    pub notify_rate_limit_per_window: u32,
}

#[derive(Clone, PartialEq, Eq)]
pub struct MailRelayConfig {
    pub url: String,
    pub api_key: String,
}

impl fmt::Debug for MailRelayConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MailRelayConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_audience", &self.jwt_audience)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("auth_clock_skew", &self.auth_clock_skew)
            .field("mail_relay", &self.mail_relay)
            .field("mail_from", &self.mail_from)
            .field("rate_limit_window", &self.rate_limit_window)
            .field(
                "notify_rate_limit_per_window",
                &self.notify_rate_limit_per_window,
            )
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TROLLEY_API_BIND_ADDR", "127.0.0.1:8080");

        let jwt_secret = required_trimmed(&lookup, "SUPABASE_JWT_SECRET")?;
        let jwt_audience = value_or_default(&lookup, "SUPABASE_JWT_AUDIENCE", "authenticated");
        let jwt_issuer = match optional_trimmed(&lookup, "SUPABASE_JWT_ISSUER") {
            Some(issuer) => Some(issuer),
            None => optional_trimmed(&lookup, "SUPABASE_URL")
                .map(|url| format!("{}/auth/v1", trim_trailing(&url))),
        };
        if let Some(issuer) = jwt_issuer.as_deref() {
            if !is_http_url(issuer) {
                return Err(ConfigError::Invalid(
                    "SUPABASE_JWT_ISSUER must start with http:// or https://".to_string(),
                ));
            }
        }

        let auth_clock_skew_secs: u64 =
            bounded(&lookup, "AUTH_CLOCK_SKEW_SECS", "60", 0..=300)?;

        let mail_relay = parse_mail_relay(&lookup)?;
        let mail_from = value_or_default(&lookup, "MAIL_FROM", "Trolley <no-reply@trolley.app>");

        let rate_limit_window_secs: u64 =
            bounded(&lookup, "RATE_LIMIT_WINDOW_SECS", "60", 10..=3_600)?;
        let notify_rate_limit_per_window: u32 =
            bounded(&lookup, "NOTIFY_RATE_LIMIT_PER_WINDOW", "10", 1..=1_000)?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
            mail_relay,
            mail_from,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            notify_rate_limit_per_window,
        })
    }
}

fn parse_mail_relay(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<MailRelayConfig>, ConfigError> {
    let url = optional_trimmed(&lookup, "MAIL_RELAY_URL");
    let api_key = optional_trimmed(&lookup, "MAIL_RELAY_API_KEY");

    match (url, api_key) {
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::MissingVar("MAIL_RELAY_API_KEY")),
        (None, Some(_)) => Err(ConfigError::MissingVar("MAIL_RELAY_URL")),
        (Some(url), Some(api_key)) => {
            if !is_http_url(&url) {
                return Err(ConfigError::Invalid(
                    "MAIL_RELAY_URL must start with http:// or https://".to_string(),
                ));
            }
            Ok(Some(MailRelayConfig {
                url: trim_trailing(&url).to_string(),
                api_key,
            }))
        }
    }
}

/// Parse an integer setting and check it against `range`.
fn bounded<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + fmt::Display,
{
    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let value = value_or_default(lookup, name, default)
        .parse::<T>()
        .map_err(|_| invalid())?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid())
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn trim_trailing(value: &str) -> &str {
    value.trim_end_matches('/')
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        jwt_secret: "test-secret-with-enough-length".to_string(),
        jwt_audience: "authenticated".to_string(),
        jwt_issuer: Some("https://demo.supabase.co/auth/v1".to_string()),
        auth_clock_skew: Duration::from_secs(30),
        mail_relay: None,
        mail_from: "Trolley <no-reply@trolley.test>".to_string(),
        rate_limit_window: Duration::from_secs(60),
        notify_rate_limit_per_window: 2,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_map(map: &HashMap<&str, &str>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_requires_jwt_secret() {
        let err = from_map(&HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("SUPABASE_JWT_SECRET"));
    }

    #[test]
    fn defaults_apply_and_issuer_derives_from_supabase_url() {
        let map = HashMap::from([
            ("SUPABASE_JWT_SECRET", "secret"),
            ("SUPABASE_URL", "https://demo.supabase.co/"),
        ]);
        let config = from_map(&map).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.jwt_audience, "authenticated");
        assert_eq!(
            config.jwt_issuer.as_deref(),
            Some("https://demo.supabase.co/auth/v1")
        );
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.notify_rate_limit_per_window, 10);
        assert!(config.mail_relay.is_none());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let map = HashMap::from([
            ("SUPABASE_JWT_SECRET", "secret"),
            ("RATE_LIMIT_WINDOW_SECS", "5"),
        ]);
        let err = from_map(&map).unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_WINDOW_SECS"));

        let map = HashMap::from([
            ("SUPABASE_JWT_SECRET", "secret"),
            ("NOTIFY_RATE_LIMIT_PER_WINDOW", "lots"),
        ]);
        assert!(from_map(&map).is_err());
    }

    #[test]
    fn mail_relay_needs_url_and_key() {
        let map = HashMap::from([
            ("SUPABASE_JWT_SECRET", "secret"),
            ("MAIL_RELAY_URL", "https://mail.example.com/send"),
        ]);
        let err = from_map(&map).unwrap_err();
        assert!(err.to_string().contains("MAIL_RELAY_API_KEY"));
    }

    #[test]
    fn config_redacts_sensitive_debug_fields() {
        let map = HashMap::from([
            ("SUPABASE_JWT_SECRET", "sensitive-jwt-secret"),
            ("MAIL_RELAY_URL", "https://mail.example.com/send"),
            ("MAIL_RELAY_API_KEY", "sensitive-relay-key"),
        ]);
        let config = from_map(&map).unwrap();

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-jwt-secret"));
        assert!(!debug_output.contains("sensitive-relay-key"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
