use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::AuthError;

/// Decides whether a request skips token verification entirely.
pub trait Bypass: Send + Sync {
    fn should_bypass(&self, parts: &Parts) -> bool;
}

impl<F> Bypass for F
where
    F: Fn(&Parts) -> bool + Send + Sync,
{
    fn should_bypass(&self, parts: &Parts) -> bool {
        self(parts)
    }
}

/// Builds the response sent when verification fails.
pub trait UnauthorizedHandler: Send + Sync {
    fn on_unauthorized(&self, parts: &Parts, error: &AuthError) -> Response;
}

impl<F> UnauthorizedHandler for F
where
    F: Fn(&Parts, &AuthError) -> Response + Send + Sync,
{
    fn on_unauthorized(&self, parts: &Parts, error: &AuthError) -> Response {
        self(parts, error)
    }
}

/// Every request is verified.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverBypass;

impl Bypass for NeverBypass {
    fn should_bypass(&self, _parts: &Parts) -> bool {
        false
    }
}

/// Matches on the request target (path plus query).
#[derive(Debug, Clone)]
pub struct PathBypass {
    marker: String,
}

impl PathBypass {
    /// Verify only requests whose target contains `marker`; everything else
    /// passes straight through.
    pub fn unless_contains(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Bypass for PathBypass {
    fn should_bypass(&self, parts: &Parts) -> bool {
        let target = parts
            .uri
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or_else(|| parts.uri.path());
        !target.contains(self.marker.as_str())
    }
}

/// Bare 401 with an empty body, whatever went wrong.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectUnauthorized;

impl UnauthorizedHandler for RejectUnauthorized {
    fn on_unauthorized(&self, _parts: &Parts, _error: &AuthError) -> Response {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    #[test]
    fn unless_contains_gates_marked_paths_only() {
        let bypass = PathBypass::unless_contains("/auth");
        assert!(bypass.should_bypass(&parts("/user/login")));
        assert!(bypass.should_bypass(&parts("/user")));
        assert!(!bypass.should_bypass(&parts("/user/auth")));
        assert!(!bypass.should_bypass(&parts("/user/auth/7")));
    }

    #[test]
    fn marker_in_query_counts() {
        let bypass = PathBypass::unless_contains("/auth");
        assert!(!bypass.should_bypass(&parts("/user?next=/auth")));
    }

    #[test]
    fn default_rejection_is_empty_401() {
        let resp = RejectUnauthorized.on_unauthorized(&parts("/"), &AuthError::ExpiredToken);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
