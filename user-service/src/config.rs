use anyhow::{anyhow, Context, Result};
use common_auth::{JwtConfig, DEFAULT_EXPIRATION_SECONDS, MAX_EXPIRATION_SECONDS};
use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// Window the login handler asks the codec for.
pub const DEFAULT_LOGIN_TOKEN_TTL_SECONDS: i64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub jwt: JwtConfig,
    pub login_token_ttl_seconds: i64,
    /// Only request targets containing this marker go through the token gate.
    pub protected_marker: String,
    pub host: IpAddr,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
    pub database_url: Option<String>,
    pub cors_allowed_origins: Vec<String>,
}

pub fn load_service_config() -> Result<ServiceConfig> {
    ServiceConfig::from_lookup(|key| env::var(key).ok())
}

impl ServiceConfig {
    /// Build from any key/value source; `load_service_config` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .and_then(|value| normalize_optional(&value))
            .ok_or_else(|| anyhow!("JWT_SECRET must be set to a non-empty value"))?;
        let issuer = lookup("JWT_ISS_NAME").unwrap_or_default();
        let expiration = parse_or(&lookup, "JWT_EXPIRATION_SECONDS", DEFAULT_EXPIRATION_SECONDS)?;

        let jwt = JwtConfig::new(secret, issuer)
            .and_then(|config| config.with_expiration(expiration))
            .context("Invalid JWT configuration")?;

        let login_token_ttl_seconds = parse_or(
            &lookup,
            "LOGIN_TOKEN_TTL_SECONDS",
            DEFAULT_LOGIN_TOKEN_TTL_SECONDS,
        )?;
        if !(1..=MAX_EXPIRATION_SECONDS).contains(&login_token_ttl_seconds) {
            return Err(anyhow!(
                "LOGIN_TOKEN_TTL_SECONDS must be between 1 and {MAX_EXPIRATION_SECONDS}, got {login_token_ttl_seconds}"
            ));
        }

        let protected_marker = lookup("AUTH_PROTECTED_MARKER")
            .and_then(|value| normalize_optional(&value))
            .unwrap_or_else(|| "/auth".to_string());

        let host = parse_or(&lookup, "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port = parse_or(&lookup, "PORT", 8080u16)?;

        let defaults = RateLimitConfig::default();
        let max_requests = parse_or(&lookup, "RATE_LIMIT_MAX", defaults.max_requests)?;
        let window_secs = parse_or(
            &lookup,
            "RATE_LIMIT_WINDOW_SECONDS",
            defaults.window.as_secs(),
        )?;
        let rate_limit = RateLimitConfig {
            max_requests: max_requests.max(1),
            window: Duration::from_secs(window_secs.max(1)),
        };

        let database_url = lookup("DATABASE_URL").and_then(|value| normalize_optional(&value));
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|value| parse_list(&value))
            .unwrap_or_default();

        Ok(Self {
            jwt,
            login_token_ttl_seconds,
            protected_marker,
            host,
            port,
            rate_limit,
            database_url,
            cors_allowed_origins,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).and_then(|value| normalize_optional(&value)) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| anyhow!("Failed to parse {key}='{raw}': {err}")),
        None => Ok(default),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
