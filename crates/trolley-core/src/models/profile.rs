//! User directory entry

use serde::{Deserialize, Serialize};

use super::UserId;

/// Public profile used to resolve share targets by e-mail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    /// Lower-cased e-mail address
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserProfile {
    pub fn new(id: UserId, email: &str, display_name: Option<String>) -> Self {
        Self {
            id,
            email: normalize_email(email),
            display_name,
        }
    }

    /// Name used in notifications; falls back to the e-mail address.
    pub fn sender_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// E-mail lookups are case-insensitive and ignore surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
