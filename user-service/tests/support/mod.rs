#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use user_service::passwords::Argon2Passwords;
use user_service::store::InMemoryUserStore;
use user_service::{build_router, AppState, ServiceConfig};

pub const TEST_SECRET: &str = "user-service-test-secret";

pub fn test_config(overrides: &[(&str, &str)]) -> Result<ServiceConfig> {
    let mut values: HashMap<String, String> = HashMap::from([
        ("JWT_SECRET".to_string(), TEST_SECRET.to_string()),
        ("JWT_ISS_NAME".to_string(), "users-api".to_string()),
        ("RATE_LIMIT_MAX".to_string(), "1000".to_string()),
    ]);
    for (key, value) in overrides {
        values.insert(key.to_string(), value.to_string());
    }
    ServiceConfig::from_lookup(|key| values.get(key).cloned())
}

pub fn test_state(overrides: &[(&str, &str)]) -> Result<AppState> {
    AppState::new(
        test_config(overrides)?,
        Arc::new(InMemoryUserStore::new()),
        Arc::new(Argon2Passwords::new()),
    )
}

pub fn test_app(overrides: &[(&str, &str)]) -> Result<(Router, AppState)> {
    let state = test_state(overrides)?;
    Ok((build_router(state.clone()), state))
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

pub async fn body_bytes(response: Response) -> Result<Vec<u8>> {
    Ok(response.into_body().collect().await?.to_bytes().to_vec())
}

pub async fn body_json(response: Response) -> Result<Value> {
    Ok(serde_json::from_slice(&body_bytes(response).await?)?)
}
