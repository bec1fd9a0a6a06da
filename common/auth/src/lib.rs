pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod policy;
pub mod verifier;

pub use claims::Claims;
pub use codec::TokenCodec;
pub use config::{AuthLayerConfig, JwtConfig, DEFAULT_EXPIRATION_SECONDS, MAX_EXPIRATION_SECONDS};
pub use error::{AuthError, AuthResult, MalformedReason};
pub use extractors::AuthContext;
pub use middleware::{protect, require_auth, AuthGate, GateDecision};
pub use policy::{Bypass, NeverBypass, PathBypass, RejectUnauthorized, UnauthorizedHandler};
pub use verifier::{BearerDecoder, Decoder};
