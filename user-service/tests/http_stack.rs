mod support;

use anyhow::Result;
use axum::http::{header, StatusCode};
use support::{body_bytes, empty_request, test_app};
use tower::ServiceExt;

#[tokio::test]
async fn health_and_metrics_skip_the_gate() -> Result<()> {
    let (app, _) = test_app(&[])?;

    let response = app.clone().oneshot(empty_request("GET", "/healthz", None)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await?, b"ok");

    // Trigger one rejection so the counter shows up in the exposition.
    app.clone()
        .oneshot(empty_request("GET", "/user/auth", None))
        .await?;

    let response = app.oneshot(empty_request("GET", "/metrics", None)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await?)?;
    assert!(text.contains("auth_rejections_total{kind=\"missing_header\"} 1"));
    Ok(())
}

#[tokio::test]
async fn security_headers_are_set_even_on_rejections() -> Result<()> {
    let (app, _) = test_app(&[])?;
    for uri in ["/healthz", "/user/auth"] {
        let response = app.clone().oneshot(empty_request("GET", uri, None)).await?;
        let headers = response.headers();
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN", "{uri}");
        assert_eq!(headers[header::X_XSS_PROTECTION], "1; mode=block", "{uri}");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff", "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn request_id_is_generated_or_echoed() -> Result<()> {
    let (app, _) = test_app(&[])?;

    let response = app.clone().oneshot(empty_request("GET", "/healthz", None)).await?;
    let generated = response
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(generated.len(), 36);

    let mut request = empty_request("GET", "/healthz", None);
    request
        .headers_mut()
        .insert("x-request-id", "caller-supplied".parse()?);
    let response = app.oneshot(request).await?;
    assert_eq!(response.headers()["x-request-id"], "caller-supplied");
    Ok(())
}

#[tokio::test]
async fn rate_limit_returns_429_with_retry_after() -> Result<()> {
    let (app, _) = test_app(&[("RATE_LIMIT_MAX", "2"), ("RATE_LIMIT_WINDOW_SECONDS", "60")])?;

    for _ in 0..2 {
        let response = app.clone().oneshot(empty_request("GET", "/healthz", None)).await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(empty_request("GET", "/healthz", None)).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER].to_str()?.parse()?;
    assert!((1..=60).contains(&retry_after));
    assert!(response.headers().contains_key("x-request-id"));
    Ok(())
}

#[tokio::test]
async fn cors_exposes_authorization_when_configured() -> Result<()> {
    let (app, _) = test_app(&[("CORS_ALLOWED_ORIGINS", "http://localhost:5173")])?;
    let mut request = empty_request("GET", "/healthz", None);
    request
        .headers_mut()
        .insert(header::ORIGIN, "http://localhost:5173".parse()?);

    let response = app.oneshot(request).await?;
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS].to_str()?;
    assert!(exposed.contains("authorization"));
    Ok(())
}
