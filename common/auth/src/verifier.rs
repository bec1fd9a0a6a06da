use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::claims::Claims;
use crate::codec::TokenCodec;
use crate::error::{AuthError, AuthResult};

/// Width of the `Bearer ` scheme prefix removed from the header.
pub const BEARER_PREFIX_LEN: usize = 7;

/// Turns an inbound request head into verified claims.
pub trait Decoder: Send + Sync {
    fn decode(&self, parts: &Parts) -> AuthResult<Claims>;
}

impl<F> Decoder for F
where
    F: Fn(&Parts) -> AuthResult<Claims> + Send + Sync,
{
    fn decode(&self, parts: &Parts) -> AuthResult<Claims> {
        self(parts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemeCheck {
    /// Drop the first seven bytes whatever they are.
    FixedOffset,
    /// Require a case-insensitive `Bearer ` prefix.
    Strict,
}

/// Default decoder: reads `Authorization`, strips the scheme and hands the
/// rest to the codec.
///
/// The default mode strips a fixed seven bytes and never looks at the scheme
/// word, so `Token abc.def.ghi` is read the same as `Bearer abc.def.ghi`.
/// Existing clients depend on that; use [`BearerDecoder::strict`] where they
/// do not.
#[derive(Clone)]
pub struct BearerDecoder {
    codec: Arc<TokenCodec>,
    scheme: SchemeCheck,
}

impl BearerDecoder {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self {
            codec,
            scheme: SchemeCheck::FixedOffset,
        }
    }

    pub fn strict(codec: Arc<TokenCodec>) -> Self {
        Self {
            codec,
            scheme: SchemeCheck::Strict,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    fn token_from_header<'a>(&self, raw: &'a str) -> AuthResult<&'a str> {
        match self.scheme {
            SchemeCheck::FixedOffset => raw
                .get(BEARER_PREFIX_LEN..)
                .ok_or_else(|| AuthError::parse("authorization header shorter than scheme prefix")),
            SchemeCheck::Strict => {
                let (scheme, token) = raw
                    .get(..BEARER_PREFIX_LEN)
                    .zip(raw.get(BEARER_PREFIX_LEN..))
                    .ok_or_else(|| AuthError::parse("authorization header shorter than scheme prefix"))?;
                if !scheme.eq_ignore_ascii_case("bearer ") {
                    return Err(AuthError::parse("authorization scheme is not Bearer"));
                }
                Ok(token)
            }
        }
    }
}

impl Decoder for BearerDecoder {
    fn decode(&self, parts: &Parts) -> AuthResult<Claims> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredentialHeader)?;
        if header.is_empty() {
            return Err(AuthError::MissingCredentialHeader);
        }
        let raw = header
            .to_str()
            .map_err(|_| AuthError::parse("authorization header is not visible ASCII"))?;

        let token = self.token_from_header(raw)?;
        self.codec.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::error::MalformedReason;
    use axum::http::{HeaderValue, Request};

    fn codec() -> Arc<TokenCodec> {
        let config = JwtConfig::new("decoder-secret", "users-api").unwrap();
        Arc::new(TokenCodec::new(&config))
    }

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/user/auth");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn issue(codec: &TokenCodec) -> String {
        let mut claims = Claims::new().with("id", 42);
        codec.encode(&mut claims, 0).unwrap()
    }

    #[test]
    fn missing_header_is_reported() {
        let decoder = BearerDecoder::new(codec());
        let err = decoder.decode(&parts_with(None)).expect_err("no header");
        assert!(matches!(err, AuthError::MissingCredentialHeader));
    }

    #[test]
    fn empty_header_is_reported_as_missing() {
        let decoder = BearerDecoder::new(codec());
        let err = decoder.decode(&parts_with(Some(""))).expect_err("empty header");
        assert!(matches!(err, AuthError::MissingCredentialHeader));
    }

    #[test]
    fn bearer_token_decodes() {
        let codec = codec();
        let token = issue(&codec);
        let decoder = BearerDecoder::new(codec);
        let claims = decoder
            .decode(&parts_with(Some(&format!("Bearer {token}"))))
            .unwrap();
        assert_eq!(claims.get_i64("id"), Some(42));
    }

    #[test]
    fn fixed_offset_ignores_scheme_word() {
        let codec = codec();
        let token = issue(&codec);
        let decoder = BearerDecoder::new(codec);
        assert!(decoder.decode(&parts_with(Some(&format!("Token! {token}")))).is_ok());
    }

    #[test]
    fn short_header_does_not_panic() {
        let decoder = BearerDecoder::new(codec());
        let err = decoder.decode(&parts_with(Some("Bear"))).expect_err("short header");
        assert!(matches!(err, AuthError::MalformedToken(MalformedReason::Parse(_))));
    }

    #[test]
    fn prefix_only_header_is_malformed() {
        let decoder = BearerDecoder::new(codec());
        let err = decoder.decode(&parts_with(Some("Bearer "))).expect_err("no token");
        assert!(matches!(err, AuthError::MalformedToken(_)));
    }

    #[test]
    fn strict_mode_checks_scheme() {
        let codec = codec();
        let token = issue(&codec);
        let decoder = BearerDecoder::strict(codec);
        assert!(decoder.decode(&parts_with(Some(&format!("bearer {token}")))).is_ok());
        let err = decoder
            .decode(&parts_with(Some(&format!("Basic! {token}"))))
            .expect_err("wrong scheme");
        assert!(matches!(err, AuthError::MalformedToken(MalformedReason::Parse(_))));
    }

    #[test]
    fn opaque_header_bytes_are_malformed() {
        let decoder = BearerDecoder::new(codec());
        let mut parts = parts_with(None);
        parts.headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
        );
        let err = decoder.decode(&parts).expect_err("non ascii");
        assert!(matches!(err, AuthError::MalformedToken(_)));
    }

    #[test]
    fn closures_are_decoders() {
        let decoder = |_: &Parts| -> AuthResult<Claims> { Ok(Claims::new().with("id", 1)) };
        assert_eq!(decoder.decode(&parts_with(None)).unwrap().get_i64("id"), Some(1));
    }
}
