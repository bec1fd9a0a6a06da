use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::claims::Claims;
use crate::error::AuthError;

/// Claims verified by [`crate::require_auth`] for the current request.
///
/// Stored in the request extensions and dropped with the request. Handlers
/// behind the gate take it as an extractor; a handler reached without the gate
/// having run gets a 401.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
}

impl AuthContext {
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    /// The numeric `id` claim minted at login.
    pub fn user_id(&self) -> Option<i64> {
        self.claims.get_i64("id")
    }

    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingCredentialHeader)
    }
}
