//! Identifier newtypes

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque list identifier assigned by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(String);

impl ListId {
    /// Generate a fresh, time-sortable identifier (UUID v7).
    ///
    /// Only stores call this; clients never mint list ids themselves.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ListId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of an authenticated user, as issued by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_list_ids_are_unique() {
        assert_ne!(ListId::generate(), ListId::generate());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&UserId::from("user-a")).unwrap();
        assert_eq!(json, "\"user-a\"");
    }
}
