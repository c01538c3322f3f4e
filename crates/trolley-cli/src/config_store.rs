//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trolley_core::config::ClientConfig;
use trolley_core::util::normalize_text_option;

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";
const DEFAULT_PROFILE: &str = "default";
const ENV_PROFILE: &str = "TROLLEY_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfilesFile {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ClientConfig>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("trolley").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("could not resolve the user config directory".into()))
}

impl ProfilesFile {
    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::Config(format!("Failed to read {}: {error}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|error| {
            CliError::Config(format!("Failed to parse {}: {error}", path.display()))
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Explicit flag, then `TROLLEY_PROFILE`, then the active profile.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_name_with(explicit, std::env::var(ENV_PROFILE).ok())
    }

    fn resolve_profile_name_with(&self, explicit: Option<&str>, from_env: Option<String>) -> String {
        normalize_text_option(explicit.map(str::to_string))
            .or_else(|| normalize_text_option(from_env))
            .or_else(|| normalize_text_option(self.active_profile.clone()))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&ClientConfig> {
        self.profiles.get(name)
    }

    pub fn set_profile(&mut self, name: &str, config: ClientConfig, activate: bool) {
        self.profiles.insert(name.to_string(), config);
        if activate || self.active_profile.is_none() {
            self.active_profile = Some(name.to_string());
        }
    }
}

/// Profile values overlaid with whatever the environment sets.
pub fn effective_config(
    stored: Option<&ClientConfig>,
    environment: ClientConfig,
) -> Result<ClientConfig, CliError> {
    let merged = stored.cloned().unwrap_or_default().overlay(environment);
    Ok(merged.normalized()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = ProfilesFile::load_from_path(&tmp.path().join("config.json")).unwrap();
        assert_eq!(loaded, ProfilesFile::default());
    }

    #[test]
    fn save_and_load_keeps_profiles() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");

        let mut file = ProfilesFile::default();
        file.set_profile(
            "work",
            ClientConfig {
                supabase_url: Some("https://demo.supabase.co".into()),
                ..ClientConfig::default()
            },
            false,
        );
        file.save_to_path(&path).unwrap();

        let loaded = ProfilesFile::load_from_path(&path).unwrap();
        assert_eq!(loaded.active_profile.as_deref(), Some("work"));
        assert_eq!(loaded, file);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ProfilesFile::load_from_path(&path),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn profile_name_precedence() {
        let file = ProfilesFile {
            active_profile: Some("home".into()),
            ..ProfilesFile::default()
        };
        assert_eq!(
            file.resolve_profile_name_with(Some(" work "), Some("env".into())),
            "work"
        );
        assert_eq!(file.resolve_profile_name_with(None, Some("env".into())), "env");
        assert_eq!(file.resolve_profile_name_with(Some(" "), None), "home");
        assert_eq!(
            ProfilesFile::default().resolve_profile_name_with(None, None),
            "default"
        );
    }

    #[test]
    fn activation_keeps_existing_choice_when_asked() {
        let mut file = ProfilesFile::default();
        file.set_profile("home", ClientConfig::default(), true);
        file.set_profile("work", ClientConfig::default(), false);
        assert_eq!(file.active_profile.as_deref(), Some("home"));
        file.set_profile("work", ClientConfig::default(), true);
        assert_eq!(file.active_profile.as_deref(), Some("work"));
    }

    #[test]
    fn environment_fills_and_overrides_profile() {
        let stored = ClientConfig {
            supabase_url: Some("https://stored.supabase.co".into()),
            database_url: Some("libsql://lists.turso.io".into()),
            ..ClientConfig::default()
        };
        let environment = ClientConfig {
            supabase_url: Some("https://env.supabase.co".into()),
            supabase_anon_key: Some("anon".into()),
            ..ClientConfig::default()
        };

        let merged = effective_config(Some(&stored), environment).unwrap();
        assert_eq!(merged.supabase_url.as_deref(), Some("https://env.supabase.co"));
        assert_eq!(merged.supabase_anon_key.as_deref(), Some("anon"));
        assert_eq!(merged.database_url.as_deref(), Some("libsql://lists.turso.io"));
    }

    #[test]
    fn effective_config_rejects_bad_urls() {
        let environment = ClientConfig {
            notify_api_base_url: Some("api.example.com".into()),
            ..ClientConfig::default()
        };
        assert!(matches!(
            effective_config(None, environment),
            Err(CliError::Config(_))
        ));
    }
}
