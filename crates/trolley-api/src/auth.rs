use std::time::Duration;

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::AppError;

const AUTHENTICATED_ROLE: &str = "authenticated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub session_id: Option<String>,
}

/// Verifies Supabase access tokens signed with the project's shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
    audience: String,
    clock_skew: Duration,
}

impl JwtVerifier {
    pub fn new(config: &AppConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Audience and timestamps are checked below with the configured skew.
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        if let Some(issuer) = config.jwt_issuer.as_deref() {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            audience: config.jwt_audience.clone(),
            clock_skew: config.auth_clock_skew,
        }
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let decoded =
            decode::<SupabaseClaims>(token, &self.key, &self.validation).map_err(|error| {
                AppError::unauthorized(format!("Token validation failed: {}", sanitize(&error)))
            })?;
        let claims = decoded.claims;

        if !audience_matches(claims.aud.as_ref(), &self.audience) {
            return Err(AppError::unauthorized("Token audience is not allowed"));
        }
        if claims.sub.trim().is_empty() {
            return Err(AppError::unauthorized("Token subject is missing"));
        }
        if claims.role.as_deref() != Some(AUTHENTICATED_ROLE) {
            return Err(AppError::unauthorized("Token role is not allowed"));
        }
        validate_temporal_claims(&claims, self.clock_skew, chrono::Utc::now().timestamp())?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            session_id: claims.session_id.or(claims.jti),
        })
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

#[derive(Debug, Deserialize)]
struct SupabaseClaims {
    sub: String,
    aud: Option<Value>,
    role: Option<String>,
    exp: Option<i64>,
    iat: Option<i64>,
    nbf: Option<i64>,
    jti: Option<String>,
    session_id: Option<String>,
}

fn validate_temporal_claims(
    claims: &SupabaseClaims,
    clock_skew: Duration,
    now: i64,
) -> Result<(), AppError> {
    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(0);

    let exp = claims
        .exp
        .ok_or_else(|| AppError::unauthorized("Token missing `exp` claim"))?;
    if exp <= now.saturating_sub(skew) {
        return Err(AppError::unauthorized("Token is expired"));
    }

    let iat = claims
        .iat
        .ok_or_else(|| AppError::unauthorized("Token missing `iat` claim"))?;
    if iat > now.saturating_add(skew) {
        return Err(AppError::unauthorized("Token `iat` is in the future"));
    }

    if claims.nbf.is_some_and(|nbf| nbf > now.saturating_add(skew)) {
        return Err(AppError::unauthorized("Token is not yet valid"));
    }

    Ok(())
}

fn audience_matches(aud: Option<&Value>, expected: &str) -> bool {
    match aud {
        Some(Value::String(value)) => value == expected,
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .any(|value| value == expected),
        _ => false,
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
