use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Why a token could not be parsed or verified.
///
/// Callers only ever see [`AuthError::MalformedToken`]; the reason is kept for
/// logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Structure, base64 or header JSON was unreadable.
    Parse(String),
    /// Signature did not match the configured secret.
    Signature,
    /// Header announced an algorithm outside the HMAC family.
    UnexpectedAlgorithm(String),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::Parse(detail) => write!(f, "unreadable token: {detail}"),
            MalformedReason::Signature => f.write_str("signature mismatch"),
            MalformedReason::UnexpectedAlgorithm(alg) => {
                write!(f, "unexpected signing method {alg}")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing auth header")]
    MissingCredentialHeader,
    #[error("error parsing token: {0}")]
    MalformedToken(MalformedReason),
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("jwt expired")]
    ExpiredToken,
    #[error("error creating a token: {0}")]
    TokenCreationFailed(String),
    #[error("signing secret must not be empty")]
    EmptySecret,
    #[error("invalid auth configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Stable label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredentialHeader => "missing_header",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::TokenCreationFailed(_) => "token_creation_failed",
            AuthError::EmptySecret | AuthError::InvalidConfig(_) => "config",
        }
    }

    /// True for every failure produced while checking an inbound credential.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredentialHeader
                | AuthError::MalformedToken(_)
                | AuthError::InvalidToken(_)
                | AuthError::ExpiredToken
        )
    }

    pub(crate) fn parse(detail: impl Into<String>) -> Self {
        AuthError::MalformedToken(MalformedReason::Parse(detail.into()))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match value.kind() {
            ErrorKind::InvalidSignature => AuthError::MalformedToken(MalformedReason::Signature),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::MalformedToken(MalformedReason::UnexpectedAlgorithm(value.to_string()))
            }
            // The signature has already been checked when the payload fails to
            // deserialize, so these are structurally invalid rather than forged.
            ErrorKind::Json(_) | ErrorKind::Utf8(_) => AuthError::InvalidToken(value.to_string()),
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::parse(value.to_string()),
        }
    }
}

/// Verification failures collapse to a bare 401 so nothing about the cause
/// reaches the caller; issuance and configuration faults are a bare 500.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = if self.is_verification_failure() {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        status.into_response()
    }
}
