//! Token Builder (spec §4.3) and JWE wrapping (spec §4.4).

use std::sync::{Arc, OnceLock};

use base64::engine::Engine;
use serde_json::{Map, Value};
use zeroize::Zeroize;

use crate::claims::Claims;
use crate::credentials::EncryptingCredentials;
use crate::credentials::SigningCredentials;
use crate::crypto::{
    cek_bit_length, encryption_failed, AeadProviderHandle, CryptoProviderFactory,
    DefaultCryptoProviderFactory, KeyWrapProviderHandle, SignatureProviderHandle,
};
use crate::error::{HandlerError, Result};
use crate::header_cache::{jws_header_json, HeaderCache};

use super::reader::B64;

fn default_header_cache() -> &'static HeaderCache {
    static CACHE: OnceLock<HeaderCache> = OnceLock::new();
    CACHE.get_or_init(HeaderCache::new)
}

fn encode_json(value: &Map<String, Value>) -> Result<String> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| HandlerError::InvalidArgument(format!("failed to serialize header: {e}")))?;
    Ok(B64.encode(bytes))
}

fn encode_claims(claims: &Claims) -> Result<String> {
    let bytes = serde_json::to_vec(&claims.0)
        .map_err(|e| HandlerError::InvalidArgument(format!("failed to serialize claims: {e}")))?;
    Ok(B64.encode(bytes))
}

fn factory_for(explicit: Option<&Arc<dyn CryptoProviderFactory>>) -> Arc<dyn CryptoProviderFactory> {
    explicit
        .cloned()
        .unwrap_or_else(|| Arc::new(DefaultCryptoProviderFactory) as Arc<dyn CryptoProviderFactory>)
}

fn jwe_header_json(ec: &EncryptingCredentials) -> Map<String, Value> {
    let mut header = Map::new();
    header.insert("alg".into(), Value::String(ec.alg.clone()));
    header.insert("enc".into(), Value::String(ec.enc.clone()));
    if let Some(kid) = ec.key.key_id() {
        header.insert("kid".into(), Value::String(kid.to_owned()));
    }
    header.insert("typ".into(), Value::String("JWT".into()));
    header
}

/// Assembles JWS/JWE compact tokens. Holds a reference to a [`HeaderCache`]
/// rather than owning one, so tests can supply a fresh cache per case while
/// ordinary callers share the process-wide default (spec §9 design note:
/// "Process-wide Header Cache is modelled as an injected concurrent map").
pub struct TokenBuilder<'c> {
    header_cache: &'c HeaderCache,
}

impl Default for TokenBuilder<'static> {
    fn default() -> Self {
        Self {
            header_cache: default_header_cache(),
        }
    }
}

impl<'c> TokenBuilder<'c> {
    pub fn with_cache(header_cache: &'c HeaderCache) -> Self {
        Self { header_cache }
    }

    fn signed_header_encoded(&self, sc: &SigningCredentials) -> Result<String> {
        let fingerprint = HeaderCache::fingerprint(sc);
        let encoded = self
            .header_cache
            .get_or_insert_with(fingerprint, || encode_json(&jws_header_json(sc)))?;
        Ok(encoded.to_string())
    }

    fn header_for(
        &self,
        signing: Option<&SigningCredentials>,
        header_override: Option<&str>,
    ) -> Result<String> {
        if let Some(header) = header_override {
            return Ok(header.to_owned());
        }
        match signing {
            Some(sc) => self.signed_header_encoded(sc),
            None => encode_json(&Map::new()),
        }
    }

    /// spec §4.3: builds `header.payload.signature`, then (if `encrypting`
    /// is present) wraps it into a JWE per §4.4.
    pub fn build(
        &self,
        claims: &Claims,
        signing: Option<&SigningCredentials>,
        encrypting: Option<&EncryptingCredentials>,
    ) -> Result<String> {
        let encoded_header = self.header_for(signing, None)?;
        let encoded_payload = encode_claims(claims)?;
        let signed_bytes = format!("{encoded_header}.{encoded_payload}");

        let signature = match signing {
            Some(sc) => {
                let factory = factory_for(sc.crypto_provider_factory.as_ref());
                let handle = SignatureProviderHandle::acquire(factory.as_ref(), &sc.key, &sc.algorithm)?;
                let sig = handle.provider().sign(signed_bytes.as_bytes())?;
                B64.encode(sig)
            }
            None => String::new(),
        };

        let jws = format!("{signed_bytes}.{signature}");
        match encrypting {
            Some(ec) => wrap_jwe(&jws, ec),
            None => Ok(jws),
        }
    }

    /// Suspension-capable variant of [`build`](Self::build). Only signing
    /// suspends (spec §5); encryption/key-wrap run synchronously beneath it.
    pub async fn build_async(
        &self,
        claims: &Claims,
        signing: Option<&SigningCredentials>,
        encrypting: Option<&EncryptingCredentials>,
    ) -> Result<String> {
        let encoded_header = self.header_for(signing, None)?;
        let encoded_payload = encode_claims(claims)?;
        let signed_bytes = format!("{encoded_header}.{encoded_payload}");

        let signature = match signing {
            Some(sc) => {
                let factory = factory_for(sc.crypto_provider_factory.as_ref());
                let handle = SignatureProviderHandle::acquire(factory.as_ref(), &sc.key, &sc.algorithm)?;
                let sig = handle.provider().sign_async(signed_bytes.as_bytes()).await?;
                B64.encode(sig)
            }
            None => String::new(),
        };

        let jws = format!("{signed_bytes}.{signature}");
        match encrypting {
            Some(ec) => wrap_jwe(&jws, ec),
            None => Ok(jws),
        }
    }

    /// The testing-oriented overload (spec §4.3): skips header-cache lookup
    /// and AD-hoc header construction, using `encoded_header` verbatim,
    /// including as JWE AAD.
    pub fn build_with_header(
        &self,
        claims: &Claims,
        signing: Option<&SigningCredentials>,
        encrypting: Option<&EncryptingCredentials>,
        encoded_header: impl Into<String>,
    ) -> Result<String> {
        let encoded_header = encoded_header.into();
        let encoded_payload = encode_claims(claims)?;
        let signed_bytes = format!("{encoded_header}.{encoded_payload}");

        let signature = match signing {
            Some(sc) => {
                let factory = factory_for(sc.crypto_provider_factory.as_ref());
                let handle = SignatureProviderHandle::acquire(factory.as_ref(), &sc.key, &sc.algorithm)?;
                let sig = handle.provider().sign(signed_bytes.as_bytes())?;
                B64.encode(sig)
            }
            None => String::new(),
        };

        let jws = format!("{signed_bytes}.{signature}");
        match encrypting {
            Some(ec) => wrap_jwe_with_header(&jws, ec, Some(encoded_header)),
            None => Ok(jws),
        }
    }
}

/// spec §4.4: wraps an already-assembled inner JWS into a JWE compact
/// string, selecting direct or key-wrap mode by `encrypting.alg`.
fn wrap_jwe(inner_jws: &str, encrypting: &EncryptingCredentials) -> Result<String> {
    wrap_jwe_with_header(inner_jws, encrypting, None)
}

fn wrap_jwe_with_header(
    inner_jws: &str,
    ec: &EncryptingCredentials,
    header_override: Option<String>,
) -> Result<String> {
    let factory = factory_for(ec.crypto_provider_factory.as_ref());

    if ec.is_direct() {
        if !factory.is_supported_algorithm(&ec.enc, &ec.key) {
            return Err(encryption_failed(format!(
                "crypto provider factory does not support enc '{}' for the given key in direct mode",
                ec.enc
            )));
        }
        let encoded_header = match header_override {
            Some(h) => h,
            None => encode_json(&jwe_header_json(ec))?,
        };
        let cek = ec.key.symmetric_secret().ok_or_else(|| {
            encryption_failed("direct-mode JWE requires a symmetric key to serve as the CEK")
        })?;
        let aead = AeadProviderHandle::acquire(factory.as_ref(), cek, &ec.enc)?;
        let out = aead.provider().encrypt(inner_jws.as_bytes(), encoded_header.as_bytes())?;
        Ok(format!(
            "{encoded_header}..{}.{}.{}",
            B64.encode(out.iv),
            B64.encode(out.ciphertext),
            B64.encode(out.tag)
        ))
    } else {
        if !factory.is_supported_algorithm(&ec.alg, &ec.key) {
            return Err(encryption_failed(format!(
                "crypto provider factory does not support key-wrap algorithm '{}' for the given key",
                ec.alg
            )));
        }
        let bits = cek_bit_length(&ec.enc).ok_or_else(|| {
            encryption_failed(format!(
                "unsupported content encryption algorithm '{}', expected one of \
                 A128CBC-HS256, A192CBC-HS384, A256CBC-HS512",
                ec.enc
            ))
        })?;
        let mut cek = vec![0u8; bits / 8];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut cek);

        let wrap_handle = KeyWrapProviderHandle::acquire(factory.as_ref(), &ec.key, &ec.alg)?;
        let wrapped_key = wrap_handle.provider().wrap_key(&cek);
        let wrapped_key = match wrapped_key {
            Ok(w) => w,
            Err(e) => {
                cek.zeroize();
                return Err(e);
            }
        };

        let encoded_header = match header_override {
            Some(h) => h,
            None => encode_json(&jwe_header_json(ec))?,
        };
        let aead = AeadProviderHandle::acquire(factory.as_ref(), &cek, &ec.enc)?;
        let out = aead.provider().encrypt(inner_jws.as_bytes(), encoded_header.as_bytes());
        cek.zeroize();
        let out = out?;

        Ok(format!(
            "{encoded_header}.{}.{}.{}.{}",
            B64.encode(wrapped_key),
            B64.encode(out.iv),
            B64.encode(out.ciphertext),
            B64.encode(out.tag)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Key;

    fn symmetric(secret: &[u8]) -> Key {
        Key::symmetric(secret.to_vec())
    }

    #[test]
    fn unsigned_build_has_empty_signature_segment() {
        let builder = TokenBuilder::default();
        let claims = Claims::new().set_claim("sub", "a");
        let token = builder.build(&claims, None, None).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert!(segments[2].is_empty());
    }

    #[test]
    fn signed_build_has_nonempty_signature_segment() {
        let builder = TokenBuilder::default();
        let claims = Claims::new().set_claim("sub", "a");
        let sc = SigningCredentials::new(symmetric(b"0123456789abcdef").with_key_id("k1"), "HS256");
        let token = builder.build(&claims, Some(&sc), None).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert!(!segments[2].is_empty());
    }

    #[test]
    fn header_cache_reuses_identical_header_bytes() {
        let cache = HeaderCache::new();
        let builder = TokenBuilder::with_cache(&cache);
        let sc = SigningCredentials::new(symmetric(b"0123456789abcdef").with_key_id("k1"), "HS256");
        let claims = Claims::new().set_claim("sub", "a");

        let token1 = builder.build(&claims, Some(&sc), None).unwrap();
        let token2 = builder
            .build(&claims.clone().set_claim("sub", "b"), Some(&sc), None)
            .unwrap();

        let header1 = token1.split('.').next().unwrap();
        let header2 = token2.split('.').next().unwrap();
        assert_eq!(header1, header2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn direct_mode_jwe_has_empty_second_segment() {
        let builder = TokenBuilder::default();
        let claims = Claims::new().set_claim("sub", "a");
        let cek = vec![1u8; 32];
        let ec = EncryptingCredentials::new(symmetric(&cek), "dir", "A128CBC-HS256");
        let token = builder.build(&claims, None, Some(&ec)).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 5);
        assert!(segments[1].is_empty());
    }

    #[test]
    fn key_wrap_mode_jwe_wraps_a_32_byte_cek_into_54_chars() {
        let builder = TokenBuilder::default();
        let claims = Claims::new().set_claim("sub", "a");
        let kek = vec![2u8; 16];
        let ec = EncryptingCredentials::new(symmetric(&kek), "A128KW", "A128CBC-HS256");
        let token = builder.build(&claims, None, Some(&ec)).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 5);
        assert!(!segments.iter().any(|s| s.is_empty()));
        assert_eq!(segments[1].len(), 54);
    }

    #[test]
    fn build_with_header_uses_injected_header_verbatim() {
        let builder = TokenBuilder::default();
        let claims = Claims::new().set_claim("sub", "a");
        let token = builder
            .build_with_header(&claims, None, None, "custom-header")
            .unwrap();
        assert!(token.starts_with("custom-header."));
    }
}
