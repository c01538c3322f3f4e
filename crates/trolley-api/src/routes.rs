use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, AuthenticatedUser, JwtVerifier};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::mail::{render_share_email, MailTransport, ShareEmailRequest};
use crate::rate_limit::{user_fingerprint, NotifyRateLimiter, RateLimitMetricsSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    jwt_verifier: Arc<JwtVerifier>,
    rate_limiter: Arc<NotifyRateLimiter>,
    mail: MailTransport,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self, AppError> {
        let mail = MailTransport::from_config(&config)?;
        Ok(Self::with_transport(config, mail))
    }

    fn with_transport(config: Arc<AppConfig>, mail: MailTransport) -> Self {
        Self {
            jwt_verifier: Arc::new(JwtVerifier::new(&config)),
            rate_limiter: Arc::new(NotifyRateLimiter::from_config(&config)),
            mail,
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/notify/share", post(notify_share))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.rate_limiter.metrics_snapshot(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let user = state.jwt_verifier.verify_access_token(token)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
struct NotifyResponse {
    sent: bool,
}

async fn notify_share(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<ShareEmailRequest>,
) -> Result<Json<NotifyResponse>, AppError> {
    state.rate_limiter.check(&user.user_id).await?;

    let request = request.validated()?;
    let email = render_share_email(&request, &state.config.mail_from)?;
    state.mail.send(email).await?;

    tracing::info!(
        endpoint = "notify_share",
        user = user_fingerprint(&user.user_id),
        session = user.session_id.as_deref().unwrap_or("none"),
        invitation = !request.user_exists,
        lists = request.public_lists.len(),
        "Sent share notification"
    );
    Ok(Json(NotifyResponse { sent: true }))
}
