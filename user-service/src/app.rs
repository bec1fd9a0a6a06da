use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::FromRef;
use axum::http::request::Parts;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use common_auth::{
    protect, AuthError, AuthGate, AuthLayerConfig, PathBypass, RejectUnauthorized,
    UnauthorizedHandler,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ServiceConfig;
use crate::metrics::UserMetrics;
use crate::middleware::{rate_limit, request_id, security_headers, RateLimiter, REQUEST_ID_HEADER};
use crate::passwords::PasswordService;
use crate::store::UserStore;
use crate::user_handlers::{
    create_user, delete_user, get_user, health, list_users, login_user, me, metrics_endpoint,
    update_user,
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub passwords: Arc<dyn PasswordService>,
    pub gate: Arc<AuthGate>,
    pub config: Arc<ServiceConfig>,
    pub metrics: Arc<UserMetrics>,
    pub limiter: Arc<RateLimiter>,
}

impl FromRef<AppState> for Arc<AuthGate> {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

impl FromRef<AppState> for Arc<ServiceConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

/// Counts every gate rejection by kind before answering with the stock 401.
#[derive(Clone)]
pub struct MeteredRejection {
    metrics: Arc<UserMetrics>,
}

impl UnauthorizedHandler for MeteredRejection {
    fn on_unauthorized(&self, parts: &Parts, error: &AuthError) -> Response {
        self.metrics.auth_rejection(error.kind());
        RejectUnauthorized.on_unauthorized(parts, error)
    }
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        users: Arc<dyn UserStore>,
        passwords: Arc<dyn PasswordService>,
    ) -> Result<Self> {
        let metrics = Arc::new(UserMetrics::new().context("Failed to register metrics")?);
        let gate = AuthLayerConfig::new()
            .with_bypass(PathBypass::unless_contains(config.protected_marker.clone()))
            .with_unauthorized(MeteredRejection {
                metrics: metrics.clone(),
            })
            .resolve(&config.jwt)
            .context("Failed to build auth gate")?;
        let limiter = Arc::new(RateLimiter::new(config.rate_limit));

        Ok(Self {
            users,
            passwords,
            gate: Arc::new(gate),
            config: Arc::new(config),
            metrics,
            limiter,
        })
    }

    pub fn record_login_metric(&self, outcome: &str) {
        self.metrics.login_attempt(outcome);
    }
}

pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/user", post(create_user))
        .route("/user/login", post(login_user))
        .route("/user/auth", get(list_users))
        .route("/user/auth/me", get(me))
        .route(
            "/user/auth/:id",
            get(get_user).put(update_user).delete(delete_user),
        );

    let router = protect(routes, state.gate.clone())
        .layer(from_fn(security_headers))
        .layer(from_fn_with_state(state.limiter.clone(), rate_limit))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http());

    let router = match cors_layer(&state.config.cors_allowed_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%origin, error = %err, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                request_id.clone(),
            ])
            // Login hands the token back in a header, so browsers must be allowed to read it.
            .expose_headers([header::AUTHORIZATION, request_id]),
    )
}
