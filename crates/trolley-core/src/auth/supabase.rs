//! Supabase GoTrue client

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use super::{AuthError, AuthResult, AuthSession, AuthState, AuthUser, SessionPersistence};
use crate::models::UserId;
use crate::util::unix_timestamp_now;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    /// The project requires e-mail confirmation before the first sign-in.
    ConfirmationRequired,
}

/// E-mail/password auth against a Supabase project.
///
/// Every successful sign-in (including a restored session) and every
/// sign-out is published on the attached [`AuthState`].
#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
    state: AuthState,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        store: S,
        state: AuthState,
    ) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().build()?,
            store,
            state,
        })
    }

    pub const fn state(&self) -> &AuthState {
        &self.state
    }

    /// Load the persisted session, refreshing it when expired.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };

        let session = if stored.is_expired() {
            match self.refresh_session(&stored.refresh_token).await {
                Ok(refreshed) => refreshed,
                Err(error) => {
                    tracing::warn!("Failed to refresh persisted session: {}", error);
                    self.store.clear_session()?;
                    return Ok(None);
                }
            }
        } else {
            stored
        };

        self.state.signed_in(session.user.clone());
        Ok(Some(session))
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/signup", self.auth_url))
                .json(&payload),
        );
        match self.send_auth_request(request).await?.into_session()? {
            Some(session) => {
                self.accept(&session)?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&payload),
        );

        let session = self
            .send_auth_request(request)
            .await?
            .into_session()?
            .ok_or_else(|| {
                AuthError::Api("Sign-in response did not include an active session".to_string())
            })?;

        self.accept(&session)?;
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({ "refresh_token": refresh_token });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&payload),
        );
        let session = self
            .send_auth_request(request)
            .await?
            .into_session()?
            .ok_or_else(|| {
                AuthError::Api("Refresh response did not include an active session".to_string())
            })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Revoke the session remotely and forget it locally. An already-expired
    /// token still counts as signed out.
    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        if !(status.is_success() || status == StatusCode::UNAUTHORIZED) {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        self.store.clear_session()?;
        self.state.signed_out();
        Ok(())
    }

    fn accept(&self, session: &AuthSession) -> AuthResult<()> {
        self.store.save_session(session)?;
        self.state.signed_in(session.user.clone());
        Ok(())
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<AuthResponse> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<AuthResponse>().await?)
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !crate::util::is_http_url(trimmed) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/auth/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/auth/v1"))
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

/// Token fields may arrive at the top level or nested under `session`.
#[derive(Debug, Default, Deserialize)]
struct TokenFields {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<RemoteUser>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(flatten)]
    top: TokenFields,
    session: Option<TokenFields>,
}

impl AuthResponse {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let top = self.top;
        let nested = self.session.unwrap_or_default();

        let access_token = top.access_token.or(nested.access_token);
        let refresh_token = top.refresh_token.or(nested.refresh_token);
        let expires_at = top.expires_at.or(nested.expires_at).or_else(|| {
            top.expires_in
                .or(nested.expires_in)
                .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
        });
        let user = top.user.or(nested.user).map(AuthUser::from);

        match (access_token, refresh_token, expires_at, user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    email: Option<String>,
}

impl From<RemoteUser> for AuthUser {
    fn from(value: RemoteUser) -> Self {
        Self {
            id: UserId::from(value.id),
            email: value.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", crate::util::compact_text(trimmed), status.as_u16())
    }
}
