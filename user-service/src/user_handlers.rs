use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common_auth::{AuthContext, Claims};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::passwords::PasswordError;
use crate::store::{NewUser, StoreError, UserDto, UserUpdate};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub existing_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub code: &'static str,
    pub message: String,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::not_found("user_not_found"),
            StoreError::DuplicateEmail => ApiError::Conflict {
                code: "email_taken",
                message: Some("A user with this email already exists".into()),
            },
            StoreError::Backend(detail) => {
                error!(error = %detail, "User store failure");
                ApiError::internal("storage failure")
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Empty => {
                ApiError::bad_request("invalid_password").with_message(err.to_string())
            }
            PasswordError::Hash(detail) => {
                error!(error = %detail, "Password hashing failed");
                ApiError::internal("password hashing failed")
            }
        }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request("invalid_body").with_message(rejection.body_text()))
}

/// Path ids are parsed by hand so a non-numeric id maps to `missing_params`.
fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::not_found("missing_params").with_message("id must be an integer"))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = ?err, "Failed to render metrics");
            ApiError::internal("metrics unavailable").into_response()
        }
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserDto>)> {
    let CreateUserRequest {
        name,
        email,
        password,
    } = json_body(payload)?;

    let password_hash = state.passwords.hash(&password)?;
    let user = state
        .users
        .create(NewUser {
            name,
            email,
            password_hash,
        })
        .await?;

    info!(user_id = user.id, "Created user");
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login_user(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let LoginRequest { email, password } = match json_body(payload) {
        Ok(body) => body,
        Err(err) => return err.into_response(),
    };

    let user = match state.users.find_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            state.record_login_metric("unknown_user");
            return ApiError::bad_request("user_not_found")
                .with_message("No user is registered with this email")
                .into_response();
        }
        Err(err) => return ApiError::from(err).into_response(),
    };

    if !state.passwords.verify(&password, &user.password_hash) {
        state.record_login_metric("bad_password");
        warn!(user_id = user.id, "Login rejected: password mismatch");
        return ApiError::bad_request("record_not_found")
            .with_message("Email and password do not match")
            .into_response();
    }

    let mut claims = Claims::new()
        .with("id", user.id)
        .with("name", user.name.clone());
    let token = match state
        .gate
        .codec()
        .encode(&mut claims, state.config.login_token_ttl_seconds)
    {
        Ok(token) => token,
        Err(err) => {
            state.record_login_metric("token_error");
            error!(user_id = user.id, error = %err, "Failed to issue token");
            return err.into_response();
        }
    };

    let bearer = match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(value) => value,
        Err(err) => {
            state.record_login_metric("token_error");
            error!(user_id = user.id, error = %err, "Issued token is not a valid header value");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    state.record_login_metric("success");
    let mut response = Json(UserDto::from(user)).into_response();
    response.headers_mut().insert(header::AUTHORIZATION, bearer);
    response
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserDto>>> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<UserDto>> {
    let id = auth
        .user_id()
        .ok_or(ApiError::Unauthorized { code: "missing_subject" })?;
    let user = state
        .users
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("user_not_found"))?;
    Ok(Json(user.into()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<UserDto>> {
    let id = parse_id(&raw_id)?;
    let user = state
        .users
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("user_not_found"))?;
    Ok(Json(user.into()))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserDto>)> {
    let id = parse_id(&raw_id)?;
    let UpdateUserRequest {
        name,
        email,
        existing_password,
        new_password,
    } = json_body(payload)?;

    let current = state
        .users
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("user_not_found"))?;

    if !state
        .passwords
        .verify(&existing_password, &current.password_hash)
    {
        warn!(user_id = id, "Update rejected: existing password mismatch");
        return Err(ApiError::bad_request("invalid_credentials")
            .with_message("Existing password is incorrect"));
    }

    let password_hash = state.passwords.hash(&new_password)?;
    let updated = state
        .users
        .update(
            id,
            UserUpdate {
                name,
                email,
                password_hash,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("user_not_found"))?;

    info!(user_id = id, "Updated user");
    Ok((StatusCode::ACCEPTED, Json(updated.into())))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<(StatusCode, Json<DeleteResponse>)> {
    let id = parse_id(&raw_id)?;
    let removed = state.users.delete(id).await?;
    if removed == 0 {
        return Err(ApiError::not_found("user_not_found"));
    }

    info!(user_id = id, "Deleted user");
    Ok((
        StatusCode::ACCEPTED,
        Json(DeleteResponse {
            code: "deleted",
            message: format!("Success {removed} record removed"),
        }),
    ))
}
