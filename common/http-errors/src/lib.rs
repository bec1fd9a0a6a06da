use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

/// Handler-level failure rendered as `{code, message?}` plus an `X-Error-Code` header.
///
/// Token verification failures never come through here; the auth gate answers
/// those itself with an empty 401.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: Option<String> },
    Unauthorized { code: &'static str },
    NotFound { code: &'static str, message: Option<String> },
    Conflict { code: &'static str, message: Option<String> },
    Internal { message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self { Self::Internal { message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str) -> Self { Self::BadRequest { code, message: None } }
    pub fn not_found(code: &'static str) -> Self { Self::NotFound { code, message: None } }

    pub fn with_message(self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match self {
            ApiError::BadRequest { code, .. } => ApiError::BadRequest { code, message: text },
            ApiError::NotFound { code, .. } => ApiError::NotFound { code, message: text },
            ApiError::Conflict { code, .. } => ApiError::Conflict { code, message: text },
            ApiError::Internal { .. } => ApiError::Internal { message: text },
            other @ ApiError::Unauthorized { .. } => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. }
            | ApiError::Unauthorized { code }
            | ApiError::NotFound { code, .. }
            | ApiError::Conflict { code, .. } => code,
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let message = match self {
            ApiError::BadRequest { message, .. }
            | ApiError::NotFound { message, .. }
            | ApiError::Conflict { message, .. }
            | ApiError::Internal { message } => message,
            ApiError::Unauthorized { .. } => None,
        };
        let body = ErrorBody { code: error_code.into(), message };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
