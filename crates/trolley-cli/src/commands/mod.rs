pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod create;
pub mod delete;
pub mod edit;
pub mod lists;
pub mod share;
pub mod toggle;
pub mod watch;

use std::path::PathBuf;

use trolley_core::config::ClientConfig;

use crate::config_store::{default_config_path, effective_config, ProfilesFile};
use crate::error::CliError;

/// Flags shared by every command, resolved once.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub data_dir: PathBuf,
    pub profile_name: String,
    pub config_path: PathBuf,
    pub offline: bool,
}

impl GlobalOptions {
    pub fn resolve(
        data_dir: Option<PathBuf>,
        profile: Option<String>,
        offline: bool,
    ) -> Result<Self, CliError> {
        let config_path = default_config_path()?;
        let profiles = ProfilesFile::load_from_path(&config_path)?;
        Ok(Self {
            data_dir: common::resolve_data_dir(data_dir)?,
            profile_name: profiles.resolve_profile_name(profile.as_deref()),
            config_path,
            offline,
        })
    }

    pub fn load_profiles(&self) -> Result<ProfilesFile, CliError> {
        ProfilesFile::load_from_path(&self.config_path)
    }

    /// The active profile's settings overlaid with the environment.
    pub fn client_config(&self) -> Result<ClientConfig, CliError> {
        let profiles = self.load_profiles()?;
        effective_config(
            profiles.profile(&self.profile_name),
            ClientConfig::from_env(),
        )
    }
}
