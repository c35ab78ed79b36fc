//! A JOSE (JWS/JWE) compact-serialization token handler.
//!
//! Builds and validates JSON Web Tokens (RFC 7519) using JWS Compact
//! Serialization (RFC 7515) for signing and JWE Compact Serialization
//! (RFC 7516) for encryption. Five pieces cooperate:
//!
//! - [`token::reader`] parses a compact string into a [`token::CompactToken`]
//!   without attempting decryption.
//! - [`header_cache`] caches the encoded JWS header for a given
//!   [`credentials::SigningCredentials`], so the hot signing path skips
//!   repeated JSON serialization.
//! - [`token::builder`] assembles a JWS and, when encryption is requested,
//!   wraps it into a JWE (direct or key-wrap mode).
//! - [`validation::key_resolver`] picks a verification key (or a fallback
//!   list of candidates) from a token's `kid`/`x5t` header hints.
//! - [`validation::validator`] orchestrates signature verification and
//!   semantic claim validation (lifetime, audience, issuer, replay, actor
//!   chains).
//!
//! Concrete cryptography lives behind the [`crypto::CryptoProviderFactory`]
//! trait; [`crypto::DefaultCryptoProviderFactory`] ships HMAC signing,
//! AES-CBC+HMAC authenticated encryption, and AES key wrap, but any of the
//! three capability traits can be swapped out independently (RSA/ECDSA
//! signing, an HSM-backed signer, ...).
//!
//! ```
//! use jwt_handler::claims::Claims;
//! use jwt_handler::credentials::{Key, SigningCredentials};
//! use jwt_handler::token::TokenBuilder;
//! use jwt_handler::validation::{Validator, ValidationParameters};
//!
//! let key = Key::symmetric(b"a-very-long-shared-secret-value".to_vec()).with_key_id("k1");
//! let signing = SigningCredentials::new(key.clone(), "HS256");
//!
//! let claims = Claims::new().set_issuer("issuer.example").set_claim("sub", "alice");
//! let token = TokenBuilder::default().build(&claims, Some(&signing), None)?;
//!
//! let params = ValidationParameters::new().with_issuer_signing_key(key);
//! let result = Validator::new().validate(&token, &params)?;
//! assert_eq!(result.token.header().alg, "HS256");
//! # Ok::<(), jwt_handler::error::HandlerError>(())
//! ```

pub mod claims;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod header_cache;
pub mod token;
pub mod validation;

pub use claims::Claims;
pub use credentials::{EncryptingCredentials, Key, SigningCredentials};
pub use error::{HandlerError, Result};
pub use header_cache::HeaderCache;
pub use token::{can_read, read, CompactToken, ProtectedHeader, TokenBuilder};
pub use validation::{ValidationParameters, ValidationResult, Validator};

/// Re-exports the whole public surface under one path, for callers who
/// prefer a single glob import over naming each module.
pub mod prelude {
    pub use crate::claims::Claims;
    pub use crate::credentials::{EncryptingCredentials, Key, SigningCredentials};
    pub use crate::crypto::{
        AeadOutput, AuthenticatedEncryptionProvider, CryptoProviderFactory,
        DefaultCryptoProviderFactory, KeyWrapProvider, SignatureProvider,
    };
    pub use crate::error::{HandlerError, Result};
    pub use crate::header_cache::HeaderCache;
    pub use crate::token::{can_read, read, CompactToken, ProtectedHeader, TokenBuilder};
    pub use crate::validation::{
        InMemoryReplayCache, ReplayCache, SigningKeyResolver, ValidationParameters,
        ValidationResult, Validator,
    };
}
