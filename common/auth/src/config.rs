use std::fmt;
use std::sync::Arc;

use crate::codec::TokenCodec;
use crate::error::{AuthError, AuthResult};
use crate::middleware::AuthGate;
use crate::policy::{Bypass, NeverBypass, RejectUnauthorized, UnauthorizedHandler};
use crate::verifier::{BearerDecoder, Decoder};

/// Token window applied when neither the caller nor the config picks one.
pub const DEFAULT_EXPIRATION_SECONDS: i64 = 60;

/// Largest configurable token window (ten years).
pub const MAX_EXPIRATION_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Signing configuration shared by the codec and the default decoder.
///
/// Built once at startup; there is no way to mutate it afterwards.
#[derive(Clone)]
pub struct JwtConfig {
    secret: Arc<[u8]>,
    issuer: String,
    expiration_seconds: i64,
    leeway_seconds: u32,
}

impl JwtConfig {
    /// Fails with [`AuthError::EmptySecret`] for an empty secret.
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>) -> AuthResult<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        Ok(Self {
            secret: Arc::from(secret),
            issuer: issuer.into(),
            expiration_seconds: DEFAULT_EXPIRATION_SECONDS,
            leeway_seconds: 0,
        })
    }

    /// Default token window in seconds, in `1..=MAX_EXPIRATION_SECONDS`.
    pub fn with_expiration(mut self, seconds: i64) -> AuthResult<Self> {
        self.expiration_seconds = check_expiration(seconds)?;
        Ok(self)
    }

    /// Allowed clock skew when comparing `exp`.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn expiration_seconds(&self) -> i64 {
        self.expiration_seconds
    }

    pub fn leeway_seconds(&self) -> u32 {
        self.leeway_seconds
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("expiration_seconds", &self.expiration_seconds)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

/// Per-gate overrides resolved against a [`JwtConfig`].
///
/// Any field left unset (or empty/zero) inherits the default when
/// [`AuthLayerConfig::resolve`] runs.
#[derive(Clone, Default)]
pub struct AuthLayerConfig {
    pub secret: Option<String>,
    pub expiration_seconds: i64,
    pub bypass: Option<Arc<dyn Bypass>>,
    pub decoder: Option<Arc<dyn Decoder>>,
    pub unauthorized: Option<Arc<dyn UnauthorizedHandler>>,
}

impl AuthLayerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_expiration(mut self, seconds: i64) -> Self {
        self.expiration_seconds = seconds;
        self
    }

    pub fn with_bypass(mut self, bypass: impl Bypass + 'static) -> Self {
        self.bypass = Some(Arc::new(bypass));
        self
    }

    pub fn with_decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    pub fn with_unauthorized(mut self, handler: impl UnauthorizedHandler + 'static) -> Self {
        self.unauthorized = Some(Arc::new(handler));
        self
    }

    /// Merge onto `defaults` and build the gate. This is the only place the
    /// effective secret is chosen, so the empty-secret guard lives here too.
    pub fn resolve(self, defaults: &JwtConfig) -> AuthResult<AuthGate> {
        let mut effective = match self.secret.as_deref() {
            Some(secret) if !secret.is_empty() => {
                JwtConfig::new(secret, defaults.issuer())?.with_leeway(defaults.leeway_seconds())
            }
            _ => defaults.clone(),
        };
        if effective.secret().is_empty() {
            return Err(AuthError::EmptySecret);
        }
        effective.expiration_seconds = if self.expiration_seconds == 0 {
            defaults.expiration_seconds()
        } else {
            check_expiration(self.expiration_seconds)?
        };

        let codec = Arc::new(TokenCodec::new(&effective));
        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(BearerDecoder::new(codec.clone())));
        let bypass = self.bypass.unwrap_or_else(|| Arc::new(NeverBypass));
        let unauthorized = self
            .unauthorized
            .unwrap_or_else(|| Arc::new(RejectUnauthorized));

        Ok(AuthGate::from_parts(codec, bypass, decoder, unauthorized))
    }
}

fn check_expiration(seconds: i64) -> AuthResult<i64> {
    if !(1..=MAX_EXPIRATION_SECONDS).contains(&seconds) {
        return Err(AuthError::InvalidConfig(format!(
            "expiration must be between 1 and {MAX_EXPIRATION_SECONDS} seconds, got {seconds}"
        )));
    }
    Ok(seconds)
}
