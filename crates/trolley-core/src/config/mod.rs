//! Client configuration.
//!
//! `ClientConfig` holds the public endpoints and keys a Trolley client needs:
//! Supabase auth, the list database (a Turso URL and token for an embedded
//! replica, or nothing for local-only use), and the share-notification API.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::SyncConfig;
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_DATABASE_URL: &str = "TURSO_DATABASE_URL";
pub const ENV_DATABASE_AUTH_TOKEN: &str = "TURSO_AUTH_TOKEN";
pub const ENV_NOTIFY_API_BASE_URL: &str = "TROLLEY_API_BASE_URL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{field}' must include {expected}")]
    InvalidUrl {
        field: &'static str,
        expected: &'static str,
    },
    #[error("'{present}' is set but '{missing}' is not")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub database_auth_token: Option<String>,
    #[serde(default)]
    pub notify_api_base_url: Option<String>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &self.supabase_anon_key)
            .field("database_url", &self.database_url)
            .field(
                "database_auth_token",
                &self.database_auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("notify_api_base_url", &self.notify_api_base_url)
            .finish()
    }
}

impl ClientConfig {
    /// Read every field from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            supabase_url: normalize_text_option(lookup(ENV_SUPABASE_URL)),
            supabase_anon_key: normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY)),
            database_url: normalize_text_option(lookup(ENV_DATABASE_URL)),
            database_auth_token: normalize_text_option(lookup(ENV_DATABASE_AUTH_TOKEN)),
            notify_api_base_url: normalize_text_option(lookup(ENV_NOTIFY_API_BASE_URL)),
        }
    }

    /// Fields set in `overrides` win over fields set here.
    #[must_use]
    pub fn overlay(self, overrides: Self) -> Self {
        Self {
            supabase_url: overrides.supabase_url.or(self.supabase_url),
            supabase_anon_key: overrides.supabase_anon_key.or(self.supabase_anon_key),
            database_url: overrides.database_url.or(self.database_url),
            database_auth_token: overrides.database_auth_token.or(self.database_auth_token),
            notify_api_base_url: overrides.notify_api_base_url.or(self.notify_api_base_url),
        }
    }

    /// Trim values, drop empty ones, and check URL schemes.
    pub fn normalized(self) -> Result<Self, ConfigError> {
        let supabase_url = normalize_http_url(self.supabase_url, "supabase_url")?;
        let notify_api_base_url =
            normalize_http_url(self.notify_api_base_url, "notify_api_base_url")?;
        let database_url = match normalize_text_option(self.database_url) {
            Some(url) if url.starts_with("libsql://") || is_http_url(&url) => {
                Some(url.trim_end_matches('/').to_string())
            }
            Some(_) => {
                return Err(ConfigError::InvalidUrl {
                    field: "database_url",
                    expected: "libsql://, http://, or https://",
                })
            }
            None => None,
        };

        Ok(Self {
            supabase_url,
            supabase_anon_key: normalize_text_option(self.supabase_anon_key),
            database_url,
            database_auth_token: normalize_text_option(self.database_auth_token),
            notify_api_base_url,
        })
    }

    /// Supabase URL and anon key, when both are configured.
    pub fn supabase(&self) -> Result<Option<(String, String)>, ConfigError> {
        pair(
            ("supabase_url", self.supabase_url.clone()),
            ("supabase_anon_key", self.supabase_anon_key.clone()),
        )
    }

    /// Remote replica settings, when a database URL and token are configured.
    pub fn sync_config(&self) -> Result<Option<SyncConfig>, ConfigError> {
        Ok(pair(
            ("database_url", self.database_url.clone()),
            ("database_auth_token", self.database_auth_token.clone()),
        )?
        .map(|(url, token)| SyncConfig::new(url, token)))
    }
}

fn pair(
    (first_name, first): (&'static str, Option<String>),
    (second_name, second): (&'static str, Option<String>),
) -> Result<Option<(String, String)>, ConfigError> {
    match (normalize_text_option(first), normalize_text_option(second)) {
        (None, None) => Ok(None),
        (Some(first), Some(second)) => Ok(Some((first, second))),
        (Some(_), None) => Err(ConfigError::Incomplete {
            present: first_name,
            missing: second_name,
        }),
        (None, Some(_)) => Err(ConfigError::Incomplete {
            present: second_name,
            missing: first_name,
        }),
    }
}

fn normalize_http_url(
    raw: Option<String>,
    field: &'static str,
) -> Result<Option<String>, ConfigError> {
    match normalize_text_option(raw) {
        Some(url) if is_http_url(&url) => Ok(Some(url.trim_end_matches('/').to_string())),
        Some(_) => Err(ConfigError::InvalidUrl {
            field,
            expected: "http:// or https://",
        }),
        None => Ok(None),
    }
}
