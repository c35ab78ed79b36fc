//! Validator (spec §4.6): `ValidateJWS(token, params) → Read →
//! ValidateSignature → ValidateTokenPayload → Result`.

use std::sync::Arc;

use base64::engine::Engine;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::claims::Claims;
use crate::credentials::Key;
use crate::crypto::{
    AeadProviderHandle, CryptoProviderFactory, DefaultCryptoProviderFactory, KeyWrapProviderHandle,
    SignatureProviderHandle,
};
use crate::error::{HandlerError, Result};
use crate::token::reader::B64;
use crate::token::{read, CompactToken, JweToken};

use super::key_resolver::{resolve_candidates, resolve_decryption_candidates};
use super::params::{ValidationParameters, ValidationResult};

/// Stateless; all configuration travels through [`ValidationParameters`] on
/// each call, matching spec §5's "thread-safe for concurrent calls".
#[derive(Debug, Default, Clone, Copy)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// The synchronous call style.
    pub fn validate(&self, raw_token: &str, params: &ValidationParameters) -> Result<ValidationResult> {
        self.validate_at_depth(raw_token, params, 0)
    }

    /// The suspension-capable call style: suspends only at signature
    /// verification and recursive actor-token validation (spec §5).
    pub async fn validate_async(
        &self,
        raw_token: &str,
        params: &ValidationParameters,
    ) -> Result<ValidationResult> {
        self.validate_async_at_depth(raw_token, params, 0).await
    }

    fn validate_at_depth(
        &self,
        raw_token: &str,
        params: &ValidationParameters,
        depth: u32,
    ) -> Result<ValidationResult> {
        check_preconditions(raw_token, params)?;
        let (token, signing_key) = self.validate_signature(raw_token, params)?;
        self.validate_payload(&token, signing_key.as_ref(), params, depth)?;
        Ok(ValidationResult { token, signing_key })
    }

    fn validate_async_at_depth<'a>(
        &'a self,
        raw_token: &'a str,
        params: &'a ValidationParameters,
        depth: u32,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<ValidationResult>> + 'a>> {
        Box::pin(async move {
            check_preconditions(raw_token, params)?;
            let (token, signing_key) = self.validate_signature_async(raw_token, params).await?;
            self.validate_payload_async(&token, signing_key.as_ref(), params, depth).await?;
            Ok(ValidationResult { token, signing_key })
        })
    }

    /// Phase 1 (spec §4.6): signature validation.
    fn validate_signature(
        &self,
        raw_token: &str,
        params: &ValidationParameters,
    ) -> Result<(CompactToken, Option<Key>)> {
        if let Some(validator) = &params.signature_validator {
            return match validator.validate(raw_token, params) {
                Some(token) => Ok((token, None)),
                None => Err(HandlerError::InvalidSignature(
                    "signatureValidator returned no token".into(),
                )),
            };
        }

        let token = read_token(raw_token, params)?;
        let token = decrypt_if_needed(token, params)?;
        let jws = jws_or_fault(&token)?;

        if jws.raw_signature.is_empty() {
            return if params.require_signed_tokens {
                Err(HandlerError::InvalidSignature("token is unsigned".into()))
            } else {
                Ok((token, None))
            };
        }

        let signed_bytes = format!("{}.{}", jws.raw_header, jws.raw_payload);
        let signature_bytes = decode_signature(&jws.raw_signature)?;
        let candidates = resolve_candidates(&token, params);
        let header_kid = jws.header.kid.clone();

        let mut attempted_any = false;
        let mut key_matched_kid = false;
        let mut faults = Vec::new();

        for key in &candidates {
            attempted_any = true;
            if header_kid.is_some() && key.key_id() == header_kid.as_deref() {
                key_matched_kid = true;
            }
            let factory = factory_for(params);
            let handle = match SignatureProviderHandle::acquire(factory.as_ref(), key, &jws.header.alg) {
                Ok(h) => h,
                Err(e) => {
                    warn!(kid = ?key.key_id(), error = %e, "candidate key unsupported for algorithm");
                    faults.push(e.to_string());
                    continue;
                }
            };
            match handle.provider().verify(signed_bytes.as_bytes(), &signature_bytes) {
                Ok(true) => {
                    debug!(kid = ?key.key_id(), "signature verified");
                    return Ok((token, Some(key.clone())));
                }
                Ok(false) => faults.push(format!("key {:?} did not verify", key.key_id())),
                Err(e) => {
                    warn!(kid = ?key.key_id(), error = %e, "signature provider faulted");
                    faults.push(e.to_string());
                }
            }
        }

        Err(classify_signature_failure(
            header_kid.is_some(),
            key_matched_kid,
            attempted_any,
            &faults,
        ))
    }

    async fn validate_signature_async(
        &self,
        raw_token: &str,
        params: &ValidationParameters,
    ) -> Result<(CompactToken, Option<Key>)> {
        if let Some(validator) = &params.signature_validator {
            return match validator.validate(raw_token, params) {
                Some(token) => Ok((token, None)),
                None => Err(HandlerError::InvalidSignature(
                    "signatureValidator returned no token".into(),
                )),
            };
        }

        let token = read_token(raw_token, params)?;
        let token = decrypt_if_needed(token, params)?;
        let jws = jws_or_fault(&token)?;

        if jws.raw_signature.is_empty() {
            return if params.require_signed_tokens {
                Err(HandlerError::InvalidSignature("token is unsigned".into()))
            } else {
                Ok((token, None))
            };
        }

        let signed_bytes = format!("{}.{}", jws.raw_header, jws.raw_payload);
        let signature_bytes = decode_signature(&jws.raw_signature)?;
        let candidates = resolve_candidates(&token, params);
        let header_kid = jws.header.kid.clone();

        let mut attempted_any = false;
        let mut key_matched_kid = false;
        let mut faults = Vec::new();

        for key in &candidates {
            attempted_any = true;
            if header_kid.is_some() && key.key_id() == header_kid.as_deref() {
                key_matched_kid = true;
            }
            let factory = factory_for(params);
            let handle = match SignatureProviderHandle::acquire(factory.as_ref(), key, &jws.header.alg) {
                Ok(h) => h,
                Err(e) => {
                    warn!(kid = ?key.key_id(), error = %e, "candidate key unsupported for algorithm");
                    faults.push(e.to_string());
                    continue;
                }
            };
            match handle.provider().verify_async(signed_bytes.as_bytes(), &signature_bytes).await {
                Ok(true) => {
                    debug!(kid = ?key.key_id(), "signature verified");
                    return Ok((token, Some(key.clone())));
                }
                Ok(false) => faults.push(format!("key {:?} did not verify", key.key_id())),
                Err(e) => {
                    warn!(kid = ?key.key_id(), error = %e, "signature provider faulted");
                    faults.push(e.to_string());
                }
            }
        }

        Err(classify_signature_failure(
            header_kid.is_some(),
            key_matched_kid,
            attempted_any,
            &faults,
        ))
    }

    /// Phase 2 (spec §4.6): semantic claim validation.
    fn validate_payload(
        &self,
        token: &CompactToken,
        signing_key: Option<&Key>,
        params: &ValidationParameters,
        depth: u32,
    ) -> Result<()> {
        let claims = claims_or_fault(token)?;

        validate_lifetime(claims, params)?;
        validate_audience(claims, params)?;
        validate_issuer(claims, params)?;
        validate_token_replay(claims, token.raw(), params)?;

        if params.validate_actor {
            if let Some(act) = claims.act() {
                let actor_params = next_actor_params(params, depth)?;
                let actor_token = actor_token_string(act)?;
                self.validate_at_depth(actor_token, actor_params, depth + 1)?;
            }
        }

        validate_issuer_security_key(signing_key)
    }

    async fn validate_payload_async(
        &self,
        token: &CompactToken,
        signing_key: Option<&Key>,
        params: &ValidationParameters,
        depth: u32,
    ) -> Result<()> {
        let claims = claims_or_fault(token)?;

        validate_lifetime(claims, params)?;
        validate_audience(claims, params)?;
        validate_issuer(claims, params)?;
        validate_token_replay(claims, token.raw(), params)?;

        if params.validate_actor {
            if let Some(act) = claims.act() {
                let actor_params = next_actor_params(params, depth)?;
                let actor_token = actor_token_string(act)?;
                self.validate_async_at_depth(actor_token, actor_params, depth + 1).await?;
            }
        }

        validate_issuer_security_key(signing_key)
    }
}

fn factory_for(params: &ValidationParameters) -> Arc<dyn CryptoProviderFactory> {
    params
        .crypto_provider_factory
        .clone()
        .unwrap_or_else(|| Arc::new(DefaultCryptoProviderFactory) as Arc<dyn CryptoProviderFactory>)
}

fn check_preconditions(raw_token: &str, params: &ValidationParameters) -> Result<()> {
    if raw_token.trim().is_empty() {
        return Err(HandlerError::InvalidArgument("token is empty".into()));
    }
    if raw_token.len() > params.maximum_token_size_in_bytes {
        return Err(HandlerError::InvalidArgument(format!(
            "token of {} bytes exceeds the {}-byte limit",
            raw_token.len(),
            params.maximum_token_size_in_bytes
        )));
    }
    Ok(())
}

fn read_token(raw_token: &str, params: &ValidationParameters) -> Result<CompactToken> {
    match &params.token_reader {
        Some(reader) => reader.read(raw_token, params),
        None => read(raw_token, params.maximum_token_size_in_bytes),
    }
}

/// spec §1's "decrypt if needed" step: when `token` is a JWE, resolves the
/// CEK (direct, or key-wrap via [`KeyWrapProviderHandle::unwrap_key`]), runs
/// the AEAD provider, and re-[`read`]s the resulting inner JWS bytes as a
/// fresh [`CompactToken`]. A `Jws` token passes through untouched.
fn decrypt_if_needed(token: CompactToken, params: &ValidationParameters) -> Result<CompactToken> {
    let jwe = match &token {
        CompactToken::Jws(_) => return Ok(token),
        CompactToken::Jwe(jwe) => jwe,
    };

    let enc = jwe.header.enc.as_deref().ok_or_else(|| {
        HandlerError::EncryptionFailed("JWE header is missing the required 'enc' field".into())
    })?;
    let candidates = resolve_decryption_candidates(&jwe.header, params);
    let factory = factory_for(params);

    let mut attempted_any = false;
    let mut faults = Vec::new();

    for key in &candidates {
        attempted_any = true;
        let cek = match resolve_cek(jwe, key, factory.as_ref()) {
            Ok(cek) => cek,
            Err(e) => {
                warn!(kid = ?key.key_id(), error = %e, "candidate key failed to resolve a content-encryption key");
                faults.push(e.to_string());
                continue;
            }
        };

        let decrypted = decrypt_with_cek(jwe, &cek, enc, factory.as_ref());
        match decrypted {
            Ok(plaintext) => {
                let inner = String::from_utf8(plaintext).map_err(|e| {
                    HandlerError::EncryptionFailed(format!("decrypted payload is not valid UTF-8: {e}"))
                })?;
                debug!(kid = ?key.key_id(), "JWE decrypted");
                return read(&inner, params.maximum_token_size_in_bytes);
            }
            Err(e) => {
                warn!(kid = ?key.key_id(), error = %e, "decryption faulted");
                faults.push(e.to_string());
            }
        }
    }

    if attempted_any {
        Err(HandlerError::EncryptionFailed(format!(
            "no configured decryption key produced a valid plaintext: {}",
            faults.join("; ")
        )))
    } else {
        Err(HandlerError::EncryptionFailed("no decryption keys configured".into()))
    }
}

/// Resolves the content-encryption key for `jwe` under `key`: the key
/// itself in direct mode, or the unwrapped key in key-wrap mode.
fn resolve_cek(jwe: &JweToken, key: &Key, factory: &dyn CryptoProviderFactory) -> Result<Vec<u8>> {
    if jwe.header.alg == "dir" {
        let secret = key.symmetric_secret().ok_or_else(|| {
            HandlerError::InvalidArgument("direct-mode JWE requires a symmetric key".into())
        })?;
        return Ok(secret.to_vec());
    }

    let wrapped_key = B64.decode(&jwe.raw_encrypted_key).map_err(|e| {
        HandlerError::MalformedToken(crate::error::MalformedTokenCause::Base64(e))
    })?;
    let handle = KeyWrapProviderHandle::acquire(factory, key, &jwe.header.alg)?;
    handle.provider().unwrap_key(&wrapped_key)
}

fn decrypt_with_cek(jwe: &JweToken, cek: &[u8], enc: &str, factory: &dyn CryptoProviderFactory) -> Result<Vec<u8>> {
    let iv = B64
        .decode(&jwe.raw_iv)
        .map_err(|e| HandlerError::MalformedToken(crate::error::MalformedTokenCause::Base64(e)))?;
    let ciphertext = B64
        .decode(&jwe.raw_ciphertext)
        .map_err(|e| HandlerError::MalformedToken(crate::error::MalformedTokenCause::Base64(e)))?;
    let tag = B64
        .decode(&jwe.raw_tag)
        .map_err(|e| HandlerError::MalformedToken(crate::error::MalformedTokenCause::Base64(e)))?;

    let aead = AeadProviderHandle::acquire(factory, cek, enc)?;
    aead.provider().decrypt(&iv, &ciphertext, &tag, jwe.raw_header.as_bytes())
}

fn jws_or_fault(token: &CompactToken) -> Result<&crate::token::JwsToken> {
    match token {
        CompactToken::Jws(t) => Ok(t),
        CompactToken::Jwe(_) => Err(HandlerError::InvalidSignature(
            "signature validation requires a JWS; decrypt the JWE and re-read it first".into(),
        )),
    }
}

fn claims_or_fault(token: &CompactToken) -> Result<&Claims> {
    match token {
        CompactToken::Jws(t) => Ok(&t.claims),
        CompactToken::Jwe(_) => Err(HandlerError::InvalidArgument(
            "payload validation requires decrypted claims; decrypt the JWE before validating".into(),
        )),
    }
}

fn decode_signature(raw_signature: &str) -> Result<Vec<u8>> {
    B64.decode(raw_signature)
        .map_err(|e| HandlerError::InvalidSignature(format!("signature segment failed to decode: {e}")))
}

fn classify_signature_failure(
    had_kid: bool,
    key_matched_kid: bool,
    attempted_any: bool,
    faults: &[String],
) -> HandlerError {
    if had_kid && !key_matched_kid {
        HandlerError::SignatureKeyNotFound
    } else if attempted_any {
        HandlerError::InvalidSignature(format!(
            "no configured key verified the signature: {}",
            faults.join("; ")
        ))
    } else {
        HandlerError::InvalidSignature("no keys configured".into())
    }
}

fn validate_lifetime(claims: &Claims, params: &ValidationParameters) -> Result<()> {
    let now = Utc::now().timestamp();
    let skew = params.clock_skew.num_seconds().abs();

    if let Some(nbf) = claims.nbf() {
        if now + skew < nbf {
            return Err(HandlerError::InvalidLifetime(format!(
                "token not valid until {nbf}, current time is {now}"
            )));
        }
    }
    if let Some(exp) = claims.exp() {
        if now - skew >= exp {
            return Err(HandlerError::InvalidLifetime(format!(
                "token expired at {exp}, current time is {now}"
            )));
        }
    }
    if let (Some(nbf), Some(exp)) = (claims.nbf(), claims.exp()) {
        if nbf > exp {
            return Err(HandlerError::InvalidLifetime(
                "'nbf' is after 'exp'".into(),
            ));
        }
    }
    Ok(())
}

fn validate_audience(claims: &Claims, params: &ValidationParameters) -> Result<()> {
    if params.valid_audiences.is_empty() {
        return Ok(());
    }
    let aud = claims.aud();
    if aud.iter().any(|a| params.valid_audiences.iter().any(|v| v == a)) {
        Ok(())
    } else {
        Err(HandlerError::InvalidAudience(format!(
            "token audiences {aud:?} do not intersect the configured valid audiences"
        )))
    }
}

fn validate_issuer(claims: &Claims, params: &ValidationParameters) -> Result<()> {
    if params.valid_issuers.is_empty() {
        return Ok(());
    }
    match claims.iss() {
        Some(iss) if params.valid_issuers.iter().any(|v| v == iss) => Ok(()),
        Some(iss) => Err(HandlerError::InvalidIssuer(format!(
            "issuer '{iss}' is not among the configured valid issuers"
        ))),
        None => Err(HandlerError::InvalidIssuer(
            "token has no 'iss' claim but valid issuers were configured".into(),
        )),
    }
}

fn validate_token_replay(claims: &Claims, raw: &str, params: &ValidationParameters) -> Result<()> {
    let Some(cache) = &params.token_replay_cache else {
        return Ok(());
    };
    if cache.check_and_record(raw, claims.exp()) {
        Ok(())
    } else {
        Err(HandlerError::TokenReplayDetected)
    }
}

/// spec §9 open question: when the signature-validation override short-
/// circuits signature trial, no `signingKey` is available. We treat that
/// as "nothing to bind" rather than a validation failure; a caller who
/// wants stricter behavior should not use `signatureValidator`.
///
/// For an X.509-backed signing key, this also checks the certificate's own
/// `notBefore`/`notAfter` window (SPEC_FULL §5's x5t/x5c date-check
/// supplement) — a narrower check than full chain validation, which
/// remains out of scope per spec.md §1.
fn validate_issuer_security_key(signing_key: Option<&Key>) -> Result<()> {
    match signing_key {
        Some(key) => key.check_x509_validity_window(Utc::now().timestamp()),
        None => Ok(()),
    }
}

fn next_actor_params(params: &ValidationParameters, depth: u32) -> Result<&ValidationParameters> {
    if depth + 1 >= params.actor_validation_depth {
        return Err(HandlerError::InvalidArgument(format!(
            "actor-chain recursion exceeded the configured depth of {}",
            params.actor_validation_depth
        )));
    }
    Ok(params.actor_validation_parameters.as_deref().unwrap_or(params))
}

fn actor_token_string(act: &Value) -> Result<&str> {
    act.as_str().ok_or_else(|| {
        HandlerError::InvalidArgument("'act' claim must be a compact token string for actor validation".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{EncryptingCredentials, Key, SigningCredentials};
    use crate::token::TokenBuilder;

    fn build_signed(claims: Claims, sc: &SigningCredentials) -> String {
        TokenBuilder::default().build(&claims, Some(sc), None).unwrap()
    }

    #[test]
    fn direct_mode_jwe_decrypts_and_validates() {
        let cek = Key::symmetric(vec![1u8; 32]);
        let ec = EncryptingCredentials::new(cek.clone(), "dir", "A128CBC-HS256");
        let token = TokenBuilder::default()
            .build(&Claims::new().set_claim("sub", "a"), None, Some(&ec))
            .unwrap();

        let params = ValidationParameters::new()
            .with_token_decryption_key(cek)
            .require_signed_tokens(false);
        let result = Validator::new().validate(&token, &params).unwrap();
        assert!(matches!(result.token, CompactToken::Jws(_)));
    }

    #[test]
    fn key_wrap_mode_jwe_decrypts_and_validates() {
        let kek = Key::symmetric(vec![2u8; 16]);
        let ec = EncryptingCredentials::new(kek.clone(), "A128KW", "A128CBC-HS256");
        let token = TokenBuilder::default()
            .build(&Claims::new().set_claim("sub", "a"), None, Some(&ec))
            .unwrap();

        let params = ValidationParameters::new()
            .with_token_decryption_key(kek)
            .require_signed_tokens(false);
        let result = Validator::new().validate(&token, &params).unwrap();
        assert!(matches!(result.token, CompactToken::Jws(_)));
    }

    #[test]
    fn jwe_without_any_decryption_key_configured_fails_closed() {
        let cek = Key::symmetric(vec![1u8; 32]);
        let ec = EncryptingCredentials::new(cek, "dir", "A128CBC-HS256");
        let token = TokenBuilder::default()
            .build(&Claims::new().set_claim("sub", "a"), None, Some(&ec))
            .unwrap();

        let params = ValidationParameters::new().require_signed_tokens(false);
        assert_matches::assert_matches!(
            Validator::new().validate(&token, &params),
            Err(HandlerError::EncryptionFailed(_))
        );
    }

    #[test]
    fn unsigned_acceptance_when_not_required() {
        let builder = TokenBuilder::default();
        let token = builder.build(&Claims::new().set_claim("sub", "a"), None, None).unwrap();
        let params = ValidationParameters::new().require_signed_tokens(false);
        let result = Validator::new().validate(&token, &params).unwrap();
        assert!(matches!(result.token, CompactToken::Jws(_)));
        assert!(result.signing_key.is_none());
    }

    #[test]
    fn unsigned_rejection_when_required() {
        let builder = TokenBuilder::default();
        let token = builder.build(&Claims::new().set_claim("sub", "a"), None, None).unwrap();
        let params = ValidationParameters::new();
        assert_matches::assert_matches!(
            Validator::new().validate(&token, &params),
            Err(HandlerError::InvalidSignature(_))
        );
    }

    #[test]
    fn kid_mismatch_yields_signature_key_not_found() {
        let sc = SigningCredentials::new(Key::symmetric(b"secret-key-a".to_vec()).with_key_id("A"), "HS256");
        let token = build_signed(Claims::new().set_claim("sub", "a"), &sc);
        let params = ValidationParameters::new()
            .with_issuer_signing_key(Key::symmetric(b"secret-key-b".to_vec()).with_key_id("B"));
        assert_matches::assert_matches!(
            Validator::new().validate(&token, &params),
            Err(HandlerError::SignatureKeyNotFound)
        );
    }

    #[test]
    fn multi_key_trial_succeeds_on_second_key() {
        let secret = b"shared-secret-value".to_vec();
        let sc = SigningCredentials::new(Key::symmetric(secret.clone()), "HS256");
        let token = build_signed(Claims::new().set_claim("sub", "a"), &sc);

        let params = ValidationParameters::new().with_issuer_signing_keys([
            Key::symmetric(b"wrong-secret-value-".to_vec()),
            Key::symmetric(secret),
        ]);
        let result = Validator::new().validate(&token, &params).unwrap();
        assert!(result.signing_key.is_some());
    }

    #[test]
    fn expired_token_is_rejected() {
        let sc = SigningCredentials::new(Key::symmetric(b"secret".to_vec()), "HS256");
        let claims = Claims::new().set_expiration(0);
        let token = build_signed(claims, &sc);
        let params = ValidationParameters::new().with_issuer_signing_key(sc.key.clone());
        assert_matches::assert_matches!(
            Validator::new().validate(&token, &params),
            Err(HandlerError::InvalidLifetime(_))
        );
    }

    #[test]
    fn audience_mismatch_is_rejected() {
        let sc = SigningCredentials::new(Key::symmetric(b"secret".to_vec()), "HS256");
        let claims = Claims::new().set_audience("svc-a");
        let token = build_signed(claims, &sc);
        let params = ValidationParameters::new()
            .with_issuer_signing_key(sc.key.clone())
            .with_valid_audiences(["svc-b"]);
        assert_matches::assert_matches!(
            Validator::new().validate(&token, &params),
            Err(HandlerError::InvalidAudience(_))
        );
    }

    #[test]
    fn replay_cache_rejects_second_presentation() {
        use super::super::replay::InMemoryReplayCache;
        use std::sync::Arc as StdArc;

        let sc = SigningCredentials::new(Key::symmetric(b"secret".to_vec()), "HS256");
        let token = build_signed(Claims::new().set_claim("sub", "a"), &sc);
        let params = ValidationParameters::new()
            .with_issuer_signing_key(sc.key.clone())
            .with_token_replay_cache(StdArc::new(InMemoryReplayCache::new(10)));

        Validator::new().validate(&token, &params).unwrap();
        assert_matches::assert_matches!(
            Validator::new().validate(&token, &params),
            Err(HandlerError::TokenReplayDetected)
        );
    }
}
