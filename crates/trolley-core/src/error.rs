//! Error types for trolley-core

use thiserror::Error;

/// Result type alias using trolley-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in trolley-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad user input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Operation requires connectivity
    #[error("{0} requires a network connection")]
    Offline(&'static str),

    /// Ownership or visibility check failed
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Target user already has access to the list
    #[error("List {list_id} is already shared with {user_id}")]
    DuplicateShare { list_id: String, user_id: String },

    /// Subscription or query against the remote store failed
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Local cache read/write failed
    #[error("Cache error: {0}")]
    Cache(String),

    /// List not found
    #[error("List not found: {0}")]
    NotFound(String),

    /// The session this handle belongs to has ended
    #[error("Not signed in")]
    NotSignedIn,

    /// No user registered under the given e-mail
    #[error("No user found with the email: {0}")]
    UserNotFound(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Informational outcomes that should be shown but not treated as failures.
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::DuplicateShare { .. })
    }

    /// Message suitable for showing to the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Offline(operation) => {
                format!("You are offline. Reconnect to {operation}.")
            }
            Self::Permission(_) => "You can only change lists you own.".to_string(),
            Self::DuplicateShare { .. } => "This list is already shared with that user.".to_string(),
            Self::RemoteUnavailable(_) => {
                "Failed to load shopping lists. Showing saved copy if available.".to_string()
            }
            Self::Cache(_) => "Saved lists could not be read.".to_string(),
            Self::NotFound(_) => "That list no longer exists.".to_string(),
            Self::NotSignedIn => "Please sign in first.".to_string(),
            Self::UserNotFound(email) => format!("No user found with the email: {email}"),
            Self::Database(_) | Self::LibSql(_) | Self::Io(_) | Self::Serialization(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_share_is_benign() {
        let error = Error::DuplicateShare {
            list_id: "list".to_string(),
            user_id: "bob".to_string(),
        };
        assert!(error.is_benign());
        assert!(!Error::Offline("delete a list").is_benign());
    }

    #[test]
    fn offline_message_names_the_operation() {
        let message = Error::Offline("delete a list").user_message();
        assert_eq!(message, "You are offline. Reconnect to delete a list.");
    }
}
