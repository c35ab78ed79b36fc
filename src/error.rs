//! Error taxonomy for the handler.
//!
//! Each variant corresponds to one of the error kinds named by the pipeline
//! design: a phase either succeeds or fails with exactly one of these. Multi-
//! key signature trial is the one place faults are accumulated instead of
//! propagated immediately (see [`HandlerError::InvalidSignature`]).

use thiserror::Error;

/// Top-level error produced by any handler operation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A precondition on the call itself was violated (empty token, null
    /// params, oversize input, exhausted actor-recursion budget, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The compact string could not be split into a well-formed JWS/JWE, or
    /// a segment failed to base64url-decode / parse as JSON.
    #[error("malformed token: {0}")]
    MalformedToken(#[source] MalformedTokenCause),

    /// Signature verification failed for every attempted key, or the caller
    /// requires signed tokens but none was present.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The header names a `kid`/`x5t` that did not match any configured key.
    #[error("signature key not found for kid/x5t hint")]
    SignatureKeyNotFound,

    /// JWE construction failed (unsupported `enc`, provider fault, RNG
    /// failure, ...).
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// `exp`/`nbf` placed the token outside its validity window.
    #[error("invalid lifetime: {0}")]
    InvalidLifetime(String),

    /// `aud` did not intersect `valid_audiences`.
    #[error("invalid audience: {0}")]
    InvalidAudience(String),

    /// `iss` was not among `valid_issuers`.
    #[error("invalid issuer: {0}")]
    InvalidIssuer(String),

    /// The key that verified the signature is not an acceptable signing key
    /// for the resolved issuer.
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    /// The replay cache has already seen this exact token.
    #[error("token replay detected")]
    TokenReplayDetected,

    /// The requested operation (XML read/write, a non-compact
    /// serialization, ...) is not implemented.
    #[error("not supported: {0}")]
    NotSupported(String),
}

/// Sub-cause of a [`HandlerError::MalformedToken`], kept distinct so callers
/// can tell a base64 problem from a JSON problem without string matching.
#[derive(Debug, Error)]
pub enum MalformedTokenCause {
    #[error("wrong segment count: expected 3 (JWS) or 5 (JWE), got {0}")]
    WrongSegmentCount(usize),

    #[error("segment contains characters outside the base64url alphabet")]
    InvalidAlphabet,

    #[error("base64url decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("header/claims did not parse as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("header JSON was not an object")]
    HeaderNotAnObject,

    #[error("header is missing the required 'alg' field")]
    MissingAlg,
}

pub type Result<T> = std::result::Result<T, HandlerError>;
