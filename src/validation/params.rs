//! Validation configuration surface (spec §3, §6): `ValidationParameters` and
//! the override traits a caller can supply to replace built-in behavior at
//! each seam ("every override function, when present, is tried before
//! built-in behavior").

use std::sync::Arc;

use chrono::Duration;

use crate::credentials::Key;
use crate::crypto::CryptoProviderFactory;
use crate::error::Result;
use crate::token::CompactToken;

use super::key_resolver::SigningKeyResolver;
use super::replay::ReplayCache;

/// Overrides Phase 1 of the validator entirely: given the raw compact
/// string, produce a verified `CompactToken`, or `None` to signal
/// `InvalidSignature`.
pub trait SignatureValidator: Send + Sync {
    fn validate(&self, raw_token: &str, params: &ValidationParameters) -> Option<CompactToken>;
}

/// Overrides the built-in [`crate::token::read`] call used by the validator.
pub trait TokenReaderOverride: Send + Sync {
    fn read(&self, raw_token: &str, params: &ValidationParameters) -> Result<CompactToken>;
}

/// Default default: 2 MiB, matching [`crate::token::reader::DEFAULT_MAXIMUM_TOKEN_SIZE`].
pub const DEFAULT_MAXIMUM_TOKEN_SIZE: usize = crate::token::reader::DEFAULT_MAXIMUM_TOKEN_SIZE;

/// Inputs to a single `validate` call (spec §3).
pub struct ValidationParameters {
    pub issuer_signing_key: Option<Key>,
    pub issuer_signing_keys: Vec<Key>,
    pub issuer_signing_key_resolver: Option<Arc<dyn SigningKeyResolver>>,
    /// Candidate key(s) for unwrapping/serving as a JWE's CEK (spec §1's
    /// "decrypt if needed" step); tried in the same `kid`-first, then-all
    /// order as the signing-key fields (see
    /// [`key_resolver::resolve_decryption_candidates`](super::key_resolver::resolve_decryption_candidates)).
    pub token_decryption_key: Option<Key>,
    pub token_decryption_keys: Vec<Key>,
    pub signature_validator: Option<Arc<dyn SignatureValidator>>,
    pub token_reader: Option<Arc<dyn TokenReaderOverride>>,
    pub require_signed_tokens: bool,
    pub validate_actor: bool,
    pub actor_validation_parameters: Option<Box<ValidationParameters>>,
    /// Bounds recursive actor-chain validation depth (spec §9 open question;
    /// the recommended cap of 10 is the default here).
    pub actor_validation_depth: u32,
    pub crypto_provider_factory: Option<Arc<dyn CryptoProviderFactory>>,
    pub valid_issuers: Vec<String>,
    pub valid_audiences: Vec<String>,
    pub clock_skew: Duration,
    pub token_replay_cache: Option<Arc<dyn ReplayCache>>,
    pub maximum_token_size_in_bytes: usize,
}

impl Default for ValidationParameters {
    fn default() -> Self {
        Self {
            issuer_signing_key: None,
            issuer_signing_keys: Vec::new(),
            issuer_signing_key_resolver: None,
            token_decryption_key: None,
            token_decryption_keys: Vec::new(),
            signature_validator: None,
            token_reader: None,
            require_signed_tokens: true,
            validate_actor: false,
            actor_validation_parameters: None,
            actor_validation_depth: 10,
            crypto_provider_factory: None,
            valid_issuers: Vec::new(),
            valid_audiences: Vec::new(),
            clock_skew: Duration::zero(),
            token_replay_cache: None,
            maximum_token_size_in_bytes: DEFAULT_MAXIMUM_TOKEN_SIZE,
        }
    }
}

impl ValidationParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issuer_signing_key(mut self, key: Key) -> Self {
        self.issuer_signing_key = Some(key);
        self
    }

    pub fn with_issuer_signing_keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.issuer_signing_keys = keys.into_iter().collect();
        self
    }

    pub fn with_issuer_signing_key_resolver(mut self, resolver: Arc<dyn SigningKeyResolver>) -> Self {
        self.issuer_signing_key_resolver = Some(resolver);
        self
    }

    pub fn with_token_decryption_key(mut self, key: Key) -> Self {
        self.token_decryption_key = Some(key);
        self
    }

    pub fn with_token_decryption_keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.token_decryption_keys = keys.into_iter().collect();
        self
    }

    pub fn with_signature_validator(mut self, validator: Arc<dyn SignatureValidator>) -> Self {
        self.signature_validator = Some(validator);
        self
    }

    pub fn with_token_reader(mut self, reader: Arc<dyn TokenReaderOverride>) -> Self {
        self.token_reader = Some(reader);
        self
    }

    pub fn require_signed_tokens(mut self, require: bool) -> Self {
        self.require_signed_tokens = require;
        self
    }

    pub fn validate_actor(mut self, validate: bool) -> Self {
        self.validate_actor = validate;
        self
    }

    pub fn with_actor_validation_parameters(mut self, params: ValidationParameters) -> Self {
        self.actor_validation_parameters = Some(Box::new(params));
        self
    }

    pub fn with_actor_validation_depth(mut self, depth: u32) -> Self {
        self.actor_validation_depth = depth;
        self
    }

    pub fn with_crypto_provider_factory(mut self, factory: Arc<dyn CryptoProviderFactory>) -> Self {
        self.crypto_provider_factory = Some(factory);
        self
    }

    pub fn with_valid_issuers(mut self, issuers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.valid_issuers = issuers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_valid_audiences(mut self, audiences: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.valid_audiences = audiences.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    pub fn with_token_replay_cache(mut self, cache: Arc<dyn ReplayCache>) -> Self {
        self.token_replay_cache = Some(cache);
        self
    }

    pub fn with_maximum_token_size_in_bytes(mut self, max: usize) -> Self {
        self.maximum_token_size_in_bytes = max;
        self
    }
}

/// Output of a successful `validate` call (spec §3).
pub struct ValidationResult {
    pub token: CompactToken,
    /// The key that verified the signature; populated only when the
    /// built-in or overridden signature trial actually ran one (spec §9
    /// open question: when `signatureValidator` short-circuits signature
    /// trial, this is `None` and `validateIssuerSecurityKey` is skipped).
    pub signing_key: Option<Key>,
}
