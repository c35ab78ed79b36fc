//! Stateless default [`CryptoProviderFactory`] wiring the three provider
//! families this crate ships (HMAC signing, AES-CBC+HMAC AEAD, AES key
//! wrap) together. A production deployment that needs RSA/ECDSA or an
//! HSM-backed signer implements the same trait instead of extending this
//! one.

use std::sync::Arc;

use crate::credentials::Key;
use crate::error::{HandlerError, Result};

use super::{
    AesKeyWrapProvider, AuthenticatedEncryptionProvider, CbcHmacEncryptionProvider,
    CryptoProviderFactory, HmacSignatureProvider, KeyWrapProvider, SignatureProvider,
};

const HMAC_ALGORITHMS: &[&str] = &["HS256", "HS384", "HS512"];
const KEY_WRAP_ALGORITHMS: &[&str] = &["A128KW", "A192KW", "A256KW"];
const CBC_HMAC_ENC_ALGORITHMS: &[&str] = &["A128CBC-HS256", "A192CBC-HS384", "A256CBC-HS512"];

/// The factory used when a [`SigningCredentials`](crate::credentials::SigningCredentials)
/// or [`EncryptingCredentials`](crate::credentials::EncryptingCredentials) does not supply
/// its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCryptoProviderFactory;

impl CryptoProviderFactory for DefaultCryptoProviderFactory {
    fn is_supported_algorithm(&self, algorithm: &str, key: &Key) -> bool {
        let is_symmetric = key.symmetric_secret().is_some();
        is_symmetric
            && (HMAC_ALGORITHMS.contains(&algorithm)
                || KEY_WRAP_ALGORITHMS.contains(&algorithm)
                || CBC_HMAC_ENC_ALGORITHMS.contains(&algorithm)
                || algorithm == "dir")
    }

    fn create_signature_provider(
        &self,
        key: &Key,
        algorithm: &str,
    ) -> Result<Arc<dyn SignatureProvider>> {
        if !HMAC_ALGORITHMS.contains(&algorithm) {
            return Err(HandlerError::InvalidArgument(format!(
                "default factory does not support signature algorithm '{algorithm}'"
            )));
        }
        let secret = key.symmetric_secret().ok_or_else(|| {
            HandlerError::InvalidArgument(format!(
                "algorithm '{algorithm}' requires a symmetric key"
            ))
        })?;
        Ok(Arc::new(HmacSignatureProvider::new(algorithm, secret)?))
    }

    fn create_authenticated_encryption_provider(
        &self,
        key: &[u8],
        enc: &str,
    ) -> Result<Arc<dyn AuthenticatedEncryptionProvider>> {
        Ok(Arc::new(CbcHmacEncryptionProvider::new(enc, key)?))
    }

    fn create_key_wrap_provider(&self, key: &Key, alg: &str) -> Result<Arc<dyn KeyWrapProvider>> {
        if !KEY_WRAP_ALGORITHMS.contains(&alg) {
            return Err(HandlerError::InvalidArgument(format!(
                "default factory does not support key-wrap algorithm '{alg}'"
            )));
        }
        let secret = key
            .symmetric_secret()
            .ok_or_else(|| HandlerError::InvalidArgument("key wrap requires a symmetric key".into()))?;
        Ok(Arc::new(AesKeyWrapProvider::new(alg, secret)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_support_for_symmetric_hmac() {
        let factory = DefaultCryptoProviderFactory;
        let key = Key::symmetric(vec![0u8; 32]);
        assert!(factory.is_supported_algorithm("HS256", &key));
        assert!(!factory.is_supported_algorithm("RS256", &key));
    }

    #[test]
    fn unsupported_signature_algorithm_errors_without_panicking() {
        let factory = DefaultCryptoProviderFactory;
        let key = Key::symmetric(vec![0u8; 32]);
        assert!(factory.create_signature_provider(&key, "RS256").is_err());
    }
}
