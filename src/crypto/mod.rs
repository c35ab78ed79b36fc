//! The crypto provider facade (spec §6, "inbound collaborator contracts").
//!
//! This module defines the narrow capability interfaces the rest of the
//! crate consumes — it never reaches for a concrete cipher itself outside of
//! [`default`]. Swap in RSA/ECDSA/HSM-backed providers by implementing
//! [`CryptoProviderFactory`]; nothing else in the crate needs to change.

mod aes_kw;
mod cbc_hmac;
mod factory;
mod hmac_signature;

pub use aes_kw::AesKeyWrapProvider;
pub use cbc_hmac::CbcHmacEncryptionProvider;
pub use factory::DefaultCryptoProviderFactory;
pub use hmac_signature::HmacSignatureProvider;

use std::sync::Arc;

use async_trait::async_trait;

use crate::credentials::Key;
use crate::error::{HandlerError, Result};

/// Output of an authenticated-encryption operation: IV, ciphertext, and tag,
/// kept as three segments because JWE compact serialization transmits them
/// as three distinct base64url fields.
#[derive(Clone)]
pub struct AeadOutput {
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Produces and checks signatures for one (key, algorithm) pair.
///
/// `verify_async` exists so a provider backed by a remote HSM or KMS can
/// suspend without blocking a worker thread; the default implementation
/// simply calls the synchronous [`verify`](SignatureProvider::verify).
#[async_trait]
pub trait SignatureProvider: Send + Sync {
    /// The `alg` identifier this provider was created for.
    fn algorithm(&self) -> &str;

    /// Signs `data`, returning the raw (unencoded) signature bytes.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Verifies `signature` over `data`. `Ok(false)` means "checked, did not
    /// match"; `Err` means the provider itself faulted.
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool>;

    /// Suspension-capable signing; see [`verify_async`](SignatureProvider::verify_async).
    async fn sign_async(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.sign(data)
    }

    /// Suspension-capable verification. See the crate-level concurrency
    /// notes: this is the one suspension point signature trial may hit.
    async fn verify_async(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        self.verify(data, signature)
    }
}

/// Performs AEAD encryption/decryption for one (key, `enc`) pair.
pub trait AuthenticatedEncryptionProvider: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<AeadOutput>;
    fn decrypt(&self, iv: &[u8], ciphertext: &[u8], tag: &[u8], aad: &[u8]) -> Result<Vec<u8>>;
}

/// Wraps/unwraps a content-encryption key for one (key, `alg`) pair.
pub trait KeyWrapProvider: Send + Sync {
    fn wrap_key(&self, cek: &[u8]) -> Result<Vec<u8>>;
    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>>;
}

/// Creates and releases providers for a (key, algorithm) pair.
///
/// Implementations are expected to be cheap to clone/share (`Arc` it) and
/// safe to call concurrently; the default implementation is entirely
/// stateless so `release_*` is a no-op there, but a caching or
/// connection-pooling factory would use `release_*` to return a handle to
/// its pool.
pub trait CryptoProviderFactory: Send + Sync {
    /// Whether this factory can produce a provider for `(algorithm, key)`.
    fn is_supported_algorithm(&self, algorithm: &str, key: &Key) -> bool;

    fn create_signature_provider(
        &self,
        key: &Key,
        algorithm: &str,
    ) -> Result<Arc<dyn SignatureProvider>>;

    fn create_authenticated_encryption_provider(
        &self,
        key: &[u8],
        enc: &str,
    ) -> Result<Arc<dyn AuthenticatedEncryptionProvider>>;

    fn create_key_wrap_provider(&self, key: &Key, alg: &str) -> Result<Arc<dyn KeyWrapProvider>>;

    /// Called on every exit path once a provider is no longer needed.
    /// Stateless providers ignore this; pooling factories use it to return
    /// the handle.
    fn release_signature_provider(&self, _provider: Arc<dyn SignatureProvider>) {}
    fn release_encryption_provider(&self, _provider: Arc<dyn AuthenticatedEncryptionProvider>) {}
    fn release_key_wrap_provider(&self, _provider: Arc<dyn KeyWrapProvider>) {}
}

/// RAII handle around a signature provider: guarantees
/// [`CryptoProviderFactory::release_signature_provider`] runs on every exit
/// path, including an early return via `?`, matching the "every provider
/// obtained from a factory must be released on every exit path" requirement.
pub struct SignatureProviderHandle<'f> {
    factory: &'f dyn CryptoProviderFactory,
    provider: Option<Arc<dyn SignatureProvider>>,
}

impl<'f> SignatureProviderHandle<'f> {
    pub fn acquire(
        factory: &'f dyn CryptoProviderFactory,
        key: &Key,
        algorithm: &str,
    ) -> Result<Self> {
        let provider = factory.create_signature_provider(key, algorithm)?;
        Ok(Self {
            factory,
            provider: Some(provider),
        })
    }

    pub fn provider(&self) -> &Arc<dyn SignatureProvider> {
        self.provider.as_ref().expect("provider released")
    }
}

impl Drop for SignatureProviderHandle<'_> {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            self.factory.release_signature_provider(provider);
        }
    }
}

/// RAII handle around an AEAD provider; see [`SignatureProviderHandle`].
pub struct AeadProviderHandle<'f> {
    factory: &'f dyn CryptoProviderFactory,
    provider: Option<Arc<dyn AuthenticatedEncryptionProvider>>,
}

impl<'f> AeadProviderHandle<'f> {
    pub fn acquire(factory: &'f dyn CryptoProviderFactory, key: &[u8], enc: &str) -> Result<Self> {
        let provider = factory.create_authenticated_encryption_provider(key, enc)?;
        Ok(Self {
            factory,
            provider: Some(provider),
        })
    }

    pub fn provider(&self) -> &Arc<dyn AuthenticatedEncryptionProvider> {
        self.provider.as_ref().expect("provider released")
    }
}

impl Drop for AeadProviderHandle<'_> {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            self.factory.release_encryption_provider(provider);
        }
    }
}

/// RAII handle around a key-wrap provider; see [`SignatureProviderHandle`].
pub struct KeyWrapProviderHandle<'f> {
    factory: &'f dyn CryptoProviderFactory,
    provider: Option<Arc<dyn KeyWrapProvider>>,
}

impl<'f> KeyWrapProviderHandle<'f> {
    pub fn acquire(factory: &'f dyn CryptoProviderFactory, key: &Key, alg: &str) -> Result<Self> {
        let provider = factory.create_key_wrap_provider(key, alg)?;
        Ok(Self {
            factory,
            provider: Some(provider),
        })
    }

    pub fn provider(&self) -> &Arc<dyn KeyWrapProvider> {
        self.provider.as_ref().expect("provider released")
    }
}

impl Drop for KeyWrapProviderHandle<'_> {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            self.factory.release_key_wrap_provider(provider);
        }
    }
}

/// Bit length of the CEK required by a content-encryption algorithm, per
/// the JWE key-wrap sub-protocol (spec §4.4). `None` means the `enc` value
/// is not one this crate's default providers recognize.
pub fn cek_bit_length(enc: &str) -> Option<usize> {
    match enc {
        "A128CBC-HS256" => Some(256),
        "A192CBC-HS384" => Some(384),
        "A256CBC-HS512" => Some(512),
        _ => None,
    }
}

pub(crate) fn encryption_failed(msg: impl Into<String>) -> HandlerError {
    HandlerError::EncryptionFailed(msg.into())
}
