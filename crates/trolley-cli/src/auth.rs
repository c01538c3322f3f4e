//! CLI Supabase auth/session helpers with secure keychain persistence.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use trolley_core::auth::{
    AuthResult, AuthState, SessionPersistence, SignUpOutcome, SupabaseAuthClient,
};
pub use trolley_core::auth::{AuthError, AuthSession};
use trolley_core::config::ClientConfig;

use crate::error::CliError;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "trolley-cli";

#[derive(Clone)]
struct SessionStore {
    username: String,
}

impl SessionStore {
    fn new(profile_name: &str) -> Self {
        Self {
            username: format!("supabase_session:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(AuthError::from)
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

#[derive(Clone)]
pub struct SupabaseAuthService {
    inner: SupabaseAuthClient<SessionStore>,
}

impl SupabaseAuthService {
    /// `None` when the profile has no Supabase settings.
    pub fn for_profile(
        profile_name: &str,
        config: &ClientConfig,
        state: AuthState,
    ) -> Result<Option<Self>, CliError> {
        let Some((url, anon_key)) = config.supabase()? else {
            return Ok(None);
        };
        let inner = SupabaseAuthClient::new(url, anon_key, SessionStore::new(profile_name), state)?;
        Ok(Some(Self { inner }))
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        self.inner.sign_up(email, password).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        self.inner.sign_in(email, password).await
    }

    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        self.inner.restore_session().await
    }

    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        self.inner.sign_out(access_token).await
    }
}

pub fn load_stored_session(profile_name: &str) -> AuthResult<Option<AuthSession>> {
    SessionStore::new(profile_name).load_session()
}

pub fn clear_stored_session(profile_name: &str) -> AuthResult<()> {
    SessionStore::new(profile_name).clear_session()
}
