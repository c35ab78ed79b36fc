//! Key material and the credential bundles the builder/validator are handed.
//!
//! Keys are represented as a small tagged union rather than a trait object
//! hierarchy (design note: dynamic dispatch over crypto providers is
//! replaced by a capability-interface set; key *types* only need to carry
//! enough shape to support `kid`/`x5t` resolution and to be handed to a
//! provider factory, so a closed enum suffices).

use std::sync::Arc;

use crate::crypto::CryptoProviderFactory;

/// Verification/signing/encryption key material.
#[derive(Clone)]
pub enum Key {
    /// A raw symmetric secret, used for HMAC signing and for `dir`-mode or
    /// key-wrap-mode JWE.
    Symmetric {
        key_id: Option<String>,
        secret: Arc<[u8]>,
    },
    /// An asymmetric key pair. Either half may be absent (e.g. a verifier
    /// only needs `public`).
    Asymmetric {
        key_id: Option<String>,
        public: Option<Arc<[u8]>>,
        private: Option<Arc<[u8]>>,
    },
    /// An asymmetric key bound to an X.509 certificate, carrying a
    /// thumbprint for `x5t` resolution.
    X509 {
        key_id: Option<String>,
        certificate_der: Arc<[u8]>,
        thumbprint: String,
        public: Option<Arc<[u8]>>,
        private: Option<Arc<[u8]>>,
    },
}

impl Key {
    /// Builds a symmetric key from raw secret bytes.
    pub fn symmetric(secret: impl Into<Arc<[u8]>>) -> Self {
        Key::Symmetric {
            key_id: None,
            secret: secret.into(),
        }
    }

    /// Attaches a `kid` to this key, overwriting any existing one.
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        let key_id = Some(key_id.into());
        match &mut self {
            Key::Symmetric { key_id: k, .. }
            | Key::Asymmetric { key_id: k, .. }
            | Key::X509 { key_id: k, .. } => *k = key_id,
        }
        self
    }

    /// The `kid` this key advertises, if any.
    pub fn key_id(&self) -> Option<&str> {
        match self {
            Key::Symmetric { key_id, .. }
            | Key::Asymmetric { key_id, .. }
            | Key::X509 { key_id, .. } => key_id.as_deref(),
        }
    }

    /// The X.509 thumbprint this key advertises, if it is an X.509 key.
    pub fn thumbprint(&self) -> Option<&str> {
        match self {
            Key::X509 { thumbprint, .. } => Some(thumbprint.as_str()),
            _ => None,
        }
    }

    /// Raw symmetric secret bytes, if this is a symmetric key.
    pub fn symmetric_secret(&self) -> Option<&[u8]> {
        match self {
            Key::Symmetric { secret, .. } => Some(secret),
            _ => None,
        }
    }

    /// Checks that `now` (seconds since the epoch) falls within this key's
    /// X.509 certificate's `notBefore`/`notAfter` window. `Ok(())` for
    /// non-X.509 keys, since there is no certificate to bound. This is the
    /// date-validity supplement spec.md §1 leaves room for ("certificate
    /// path validation beyond thumbprint matching" is out of scope; a
    /// single certificate's own validity window is not a path check).
    pub fn check_x509_validity_window(&self, now: i64) -> crate::error::Result<()> {
        let Key::X509 { certificate_der, .. } = self else {
            return Ok(());
        };
        let (_, cert) = x509_parser::parse_x509_certificate(certificate_der)
            .map_err(|e| crate::error::HandlerError::InvalidSigningKey(format!(
                "failed to parse X.509 certificate: {e}"
            )))?;
        let validity = cert.validity();
        let not_before = validity.not_before.timestamp();
        let not_after = validity.not_after.timestamp();
        if now < not_before {
            return Err(crate::error::HandlerError::InvalidSigningKey(format!(
                "signing certificate is not valid until {not_before}, current time is {now}"
            )));
        }
        if now > not_after {
            return Err(crate::error::HandlerError::InvalidSigningKey(format!(
                "signing certificate expired at {not_after}, current time is {now}"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        match self {
            Key::Symmetric { key_id, .. } => f
                .debug_struct("Key::Symmetric")
                .field("key_id", key_id)
                .finish(),
            Key::Asymmetric { key_id, .. } => f
                .debug_struct("Key::Asymmetric")
                .field("key_id", key_id)
                .finish(),
            Key::X509 {
                key_id, thumbprint, ..
            } => f
                .debug_struct("Key::X509")
                .field("key_id", key_id)
                .field("thumbprint", thumbprint)
                .finish(),
        }
    }
}

/// Credentials used to sign an outgoing token.
#[derive(Clone)]
pub struct SigningCredentials {
    pub key: Key,
    pub algorithm: String,
    pub crypto_provider_factory: Option<Arc<dyn CryptoProviderFactory>>,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("key", &self.key)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl SigningCredentials {
    pub fn new(key: Key, algorithm: impl Into<String>) -> Self {
        Self {
            key,
            algorithm: algorithm.into(),
            crypto_provider_factory: None,
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn CryptoProviderFactory>) -> Self {
        self.crypto_provider_factory = Some(factory);
        self
    }
}

/// Credentials used to encrypt an outgoing token into a JWE.
#[derive(Clone)]
pub struct EncryptingCredentials {
    pub key: Key,
    /// Key-management algorithm (`"dir"`, `"A128KW"`, `"A192KW"`, `"A256KW"`, ...).
    pub alg: String,
    /// Content-encryption algorithm (`"A128CBC-HS256"`, ...).
    pub enc: String,
    pub crypto_provider_factory: Option<Arc<dyn CryptoProviderFactory>>,
}

impl std::fmt::Debug for EncryptingCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptingCredentials")
            .field("key", &self.key)
            .field("alg", &self.alg)
            .field("enc", &self.enc)
            .finish()
    }
}

impl EncryptingCredentials {
    pub fn new(key: Key, alg: impl Into<String>, enc: impl Into<String>) -> Self {
        Self {
            key,
            alg: alg.into(),
            enc: enc.into(),
            crypto_provider_factory: None,
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn CryptoProviderFactory>) -> Self {
        self.crypto_provider_factory = Some(factory);
        self
    }

    /// `true` when this is direct-key mode (the key directly serves as CEK).
    pub fn is_direct(&self) -> bool {
        self.alg == "dir"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_x509_keys_have_no_validity_window_to_check() {
        let symmetric = Key::symmetric(vec![1, 2, 3]);
        assert!(symmetric.check_x509_validity_window(0).is_ok());

        let asymmetric = Key::Asymmetric {
            key_id: None,
            public: None,
            private: None,
        };
        assert!(asymmetric.check_x509_validity_window(0).is_ok());
    }

    #[test]
    fn x509_key_with_unparseable_certificate_is_rejected() {
        let key = Key::X509 {
            key_id: None,
            certificate_der: Arc::from(vec![0xde, 0xad, 0xbe, 0xef].into_boxed_slice()),
            thumbprint: "deadbeef".into(),
            public: None,
            private: None,
        };
        assert!(key.check_x509_validity_window(0).is_err());
    }
}
