use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{}", .0.user_message())]
    Core(#[from] trolley_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Notification error: {0}")]
    Notify(String),
    #[error("List identifier cannot be empty")]
    EmptyListQuery,
    #[error("No list matches '{0}'")]
    ListNotFound(String),
    #[error("{0}")]
    AmbiguousList(String),
    #[error("Item numbers start at 1")]
    InvalidItemNumber,
    #[error("Not signed in. Run `trolley auth login` first.")]
    NotSignedIn,
}

impl From<trolley_core::auth::AuthError> for CliError {
    fn from(error: trolley_core::auth::AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}

impl From<trolley_core::config::ConfigError> for CliError {
    fn from(error: trolley_core::config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<trolley_core::notify::NotifyError> for CliError {
    fn from(error: trolley_core::notify::NotifyError) -> Self {
        Self::Notify(error.to_string())
    }
}
