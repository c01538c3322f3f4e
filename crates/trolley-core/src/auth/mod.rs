//! Authentication: identity, session persistence, and sign-in/sign-out events

mod supabase;

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::models::UserId;
use crate::util::unix_timestamp_now;

pub use supabase::{normalize_auth_url, SignUpOutcome, SupabaseAuthClient};

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where a signed-in session is kept between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Session persistence that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<Mutex<Option<AuthSession>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> AuthResult<std::sync::MutexGuard<'_, Option<AuthSession>>> {
        self.session
            .lock()
            .map_err(|_| AuthError::SecureStorage("session store poisoned".to_string()))
    }
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self.slot()?.clone())
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        *self.slot()? = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        *self.slot()? = None;
        Ok(())
    }
}

/// Current identity plus a stream of sign-in/sign-out transitions.
#[derive(Debug, Clone)]
pub struct AuthState {
    current: Arc<watch::Sender<Option<AuthUser>>>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current: Arc::new(current),
        }
    }

    pub fn current(&self) -> Option<AuthUser> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }

    pub fn signed_in(&self, user: AuthUser) {
        tracing::info!(user = %user.id, "Signed in");
        self.current.send_replace(Some(user));
    }

    pub fn signed_out(&self) {
        if self.current.send_replace(None).is_some() {
            tracing::info!("Signed out");
        }
    }
}
