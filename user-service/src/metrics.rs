use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct UserMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    auth_rejections: IntCounterVec,
}

impl UserMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "user_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let auth_rejections = IntCounterVec::new(
            Opts::new(
                "auth_rejections_total",
                "Requests refused by the token gate grouped by failure kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(auth_rejections.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            auth_rejections,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn auth_rejection(&self, kind: &str) {
        self.auth_rejections.with_label_values(&[kind]).inc();
    }

    pub fn login_attempts(&self, outcome: &str) -> u64 {
        self.login_attempts.with_label_values(&[outcome]).get()
    }

    pub fn auth_rejections(&self, kind: &str) -> u64 {
        self.auth_rejections.with_label_values(&[kind]).get()
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
