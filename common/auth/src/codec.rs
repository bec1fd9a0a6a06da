use std::collections::HashSet;

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::{Claims, EXPIRATION, ISSUER};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult, MalformedReason};

/// Algorithm used for every token this codec mints.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// The only header algorithms accepted on decode. Anything else, including
/// asymmetric algorithms verified against the shared secret, is refused.
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Mints and verifies HMAC-signed session tokens under one shared secret.
pub struct TokenCodec {
    config: JwtConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        // exp is checked by hand so tokens without it stay valid and float
        // timestamps are tolerated.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            encoding: EncodingKey::from_secret(config.secret()),
            decoding: DecodingKey::from_secret(config.secret()),
            config: config.clone(),
            validation,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Sign `claims` into a compact token.
    ///
    /// `expire_after` overrides the configured window when positive. This
    /// writes `exp` and `iss` into the caller's map, so `claims` is not the
    /// same after the call.
    pub fn encode(&self, claims: &mut Claims, expire_after: i64) -> AuthResult<String> {
        self.encode_at(claims, expire_after, Utc::now().timestamp())
    }

    pub(crate) fn encode_at(
        &self,
        claims: &mut Claims,
        expire_after: i64,
        now: i64,
    ) -> AuthResult<String> {
        let window = if expire_after > 0 {
            expire_after
        } else {
            self.config.expiration_seconds()
        };
        let expires_at = now.checked_add(window).ok_or_else(|| {
            AuthError::TokenCreationFailed(format!("expiration window {window}s overflows"))
        })?;
        claims.set(EXPIRATION, expires_at);
        claims.set(ISSUER, self.config.issuer());

        encode(&Header::new(SIGNING_ALGORITHM), &*claims, &self.encoding)
            .map_err(|err| AuthError::TokenCreationFailed(err.to_string()))
    }

    /// Verify a bare token (no scheme prefix) and return its claims.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub(crate) fn verify_at(&self, token: &str, now: i64) -> AuthResult<Claims> {
        let header = decode_header(token).map_err(|err| AuthError::parse(err.to_string()))?;
        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::MalformedToken(
                MalformedReason::UnexpectedAlgorithm(format!("{:?}", header.alg)),
            ));
        }

        let data = decode::<Value>(token, &self.decoding, &self.validation)?;
        let claims = Claims::try_from(data.claims)?;

        if let Some(expires_at) = claims.expires_at() {
            let expires_at = expires_at?;
            if expires_at < now - i64::from(self.config.leeway_seconds()) {
                return Err(AuthError::ExpiredToken);
            }
        }

        debug!(alg = ?header.alg, "verified session token");
        Ok(claims)
    }
}
