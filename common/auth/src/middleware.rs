use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use axum::Router;
use tracing::debug;

use crate::claims::Claims;
use crate::codec::TokenCodec;
use crate::error::AuthResult;
use crate::extractors::AuthContext;
use crate::policy::{Bypass, UnauthorizedHandler};
use crate::verifier::Decoder;

/// Resolved interception settings, built by [`crate::AuthLayerConfig::resolve`].
pub struct AuthGate {
    codec: Arc<TokenCodec>,
    bypass: Arc<dyn Bypass>,
    decoder: Arc<dyn Decoder>,
    unauthorized: Arc<dyn UnauthorizedHandler>,
}

/// Result of running the gate over one request head.
#[derive(Debug)]
pub enum GateDecision {
    Bypassed,
    Authenticated(Claims),
}

impl AuthGate {
    pub(crate) fn from_parts(
        codec: Arc<TokenCodec>,
        bypass: Arc<dyn Bypass>,
        decoder: Arc<dyn Decoder>,
        unauthorized: Arc<dyn UnauthorizedHandler>,
    ) -> Self {
        Self {
            codec,
            bypass,
            decoder,
            unauthorized,
        }
    }

    /// Codec built from the effective secret; login handlers mint with it so
    /// issued tokens always verify against this gate.
    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    /// One decode attempt, no retries.
    pub fn evaluate(&self, parts: &Parts) -> AuthResult<GateDecision> {
        if self.bypass.should_bypass(parts) {
            return Ok(GateDecision::Bypassed);
        }
        self.decoder.decode(parts).map(GateDecision::Authenticated)
    }
}

/// Request gate for `axum::middleware::from_fn_with_state`.
///
/// On success the claims are stored as an [`AuthContext`] extension for
/// downstream handlers; on failure the configured unauthorized handler
/// answers and the inner service is never called.
pub async fn require_auth(
    State(gate): State<Arc<AuthGate>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    match gate.evaluate(&parts) {
        Ok(GateDecision::Bypassed) => next.run(Request::from_parts(parts, body)).await,
        Ok(GateDecision::Authenticated(claims)) => {
            parts.extensions.insert(AuthContext::new(claims));
            next.run(Request::from_parts(parts, body)).await
        }
        Err(err) => {
            debug!(
                kind = err.kind(),
                error = %err,
                method = %parts.method,
                path = parts.uri.path(),
                "rejected unauthenticated request"
            );
            gate.unauthorized.on_unauthorized(&parts, &err)
        }
    }
}

/// Wrap every route currently on `router` with [`require_auth`].
pub fn protect<S>(router: Router<S>, gate: Arc<AuthGate>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(gate, require_auth))
}
