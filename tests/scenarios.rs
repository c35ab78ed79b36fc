//! End-to-end exercises of the public builder/validator API against the
//! literal scenarios this crate's handler pipeline is expected to satisfy.

use jwt_handler::claims::Claims;
use jwt_handler::credentials::{EncryptingCredentials, Key, SigningCredentials};
use jwt_handler::error::HandlerError;
use jwt_handler::header_cache::HeaderCache;
use jwt_handler::token::{can_read, TokenBuilder};
use jwt_handler::validation::{ValidationParameters, Validator};

fn symmetric(secret: &[u8]) -> Key {
    Key::symmetric(secret.to_vec())
}

#[test]
fn unsigned_acceptance() {
    let builder = TokenBuilder::default();
    let claims = Claims::new().set_claim("sub", "a");
    let token = builder.build(&claims, None, None).unwrap();

    let segments: Vec<&str> = token.split('.').collect();
    assert_eq!(segments.len(), 3);
    assert!(segments[2].is_empty());
    assert!(can_read(&token, 2 * 1024 * 1024));

    let params = ValidationParameters::new().require_signed_tokens(false);
    let result = Validator::new().validate(&token, &params).unwrap();
    assert!(result.signing_key.is_none());
}

#[test]
fn unsigned_rejection() {
    let builder = TokenBuilder::default();
    let claims = Claims::new().set_claim("sub", "a");
    let token = builder.build(&claims, None, None).unwrap();

    let params = ValidationParameters::new();
    assert_matches::assert_matches!(
        Validator::new().validate(&token, &params),
        Err(HandlerError::InvalidSignature(_))
    );
}

#[test]
fn kid_mismatch_raises_signature_key_not_found() {
    let builder = TokenBuilder::default();
    let sc = SigningCredentials::new(symmetric(b"secret-for-issuer-a").with_key_id("A"), "HS256");
    let token = builder
        .build(&Claims::new().set_claim("sub", "a"), Some(&sc), None)
        .unwrap();

    let params = ValidationParameters::new()
        .with_issuer_signing_key(symmetric(b"secret-for-issuer-b").with_key_id("B"));
    assert_matches::assert_matches!(
        Validator::new().validate(&token, &params),
        Err(HandlerError::SignatureKeyNotFound)
    );
}

#[test]
fn multi_key_trial_succeeds_on_second_candidate() {
    let builder = TokenBuilder::default();
    let secret = b"the-actual-signing-secret".to_vec();
    let sc = SigningCredentials::new(Key::symmetric(secret.clone()), "HS256");
    let token = builder
        .build(&Claims::new().set_claim("sub", "a"), Some(&sc), None)
        .unwrap();

    let params = ValidationParameters::new().with_issuer_signing_keys([
        symmetric(b"not-the-right-secret-at-all"),
        Key::symmetric(secret),
    ]);
    let result = Validator::new().validate(&token, &params).unwrap();
    assert!(result.signing_key.is_some());
}

#[test]
fn jwe_direct_mode_round_trips() {
    let builder = TokenBuilder::default();
    let cek = vec![9u8; 32];
    let ec = EncryptingCredentials::new(symmetric(&cek), "dir", "A128CBC-HS256");
    let claims = Claims::new().set_claim("sub", "a");

    let token = builder.build(&claims, None, Some(&ec)).unwrap();
    let segments: Vec<&str> = token.split('.').collect();
    assert_eq!(segments.len(), 5);
    assert!(segments[1].is_empty());

    let params = ValidationParameters::new()
        .with_token_decryption_key(ec.key.clone())
        .require_signed_tokens(false);
    let result = Validator::new().validate(&token, &params).unwrap();
    match result.token {
        jwt_handler::token::CompactToken::Jws(t) => assert_eq!(t.claims.0.get("sub").unwrap(), "a"),
        jwt_handler::token::CompactToken::Jwe(_) => panic!("expected the decrypted inner JWS"),
    }
}

#[test]
fn jwe_key_wrap_mode_round_trips_with_40_byte_wrapped_key() {
    let builder = TokenBuilder::default();
    let kek = vec![4u8; 16];
    let ec = EncryptingCredentials::new(symmetric(&kek), "A128KW", "A128CBC-HS256");
    let claims = Claims::new().set_claim("sub", "a");

    let token = builder.build(&claims, None, Some(&ec)).unwrap();
    let segments: Vec<&str> = token.split('.').collect();
    assert_eq!(segments.len(), 5);
    assert_eq!(segments[1].len(), 54);
    assert!(segments.iter().all(|s| !s.is_empty()));

    let params = ValidationParameters::new()
        .with_token_decryption_key(ec.key.clone())
        .require_signed_tokens(false);
    let result = Validator::new().validate(&token, &params).unwrap();
    match result.token {
        jwt_handler::token::CompactToken::Jws(t) => assert_eq!(t.claims.0.get("sub").unwrap(), "a"),
        jwt_handler::token::CompactToken::Jwe(_) => panic!("expected the decrypted inner JWS"),
    }
}

#[test]
fn jwe_signed_then_encrypted_round_trips_through_decrypt_and_signature_validation() {
    let builder = TokenBuilder::default();
    let sc = SigningCredentials::new(symmetric(b"nested-jws-signing-secret").with_key_id("sign-1"), "HS256");
    let kek = vec![7u8; 32];
    let ec = EncryptingCredentials::new(symmetric(&kek).with_key_id("enc-1"), "A256KW", "A256CBC-HS512");
    let claims = Claims::new().set_issuer("issuer.example").set_claim("sub", "alice");

    let token = builder.build(&claims, Some(&sc), Some(&ec)).unwrap();
    assert_eq!(token.split('.').count(), 5);

    let params = ValidationParameters::new()
        .with_token_decryption_key(ec.key.clone())
        .with_issuer_signing_key(sc.key.clone())
        .with_valid_issuers(["issuer.example"]);
    let result = Validator::new().validate(&token, &params).unwrap();
    assert!(result.signing_key.is_some());
    match result.token {
        jwt_handler::token::CompactToken::Jws(t) => assert_eq!(t.claims.iss(), Some("issuer.example")),
        jwt_handler::token::CompactToken::Jwe(_) => panic!("expected the decrypted inner JWS"),
    }
}

#[test]
fn jwe_with_wrong_decryption_key_fails_closed() {
    let builder = TokenBuilder::default();
    let cek = vec![9u8; 32];
    let ec = EncryptingCredentials::new(symmetric(&cek), "dir", "A128CBC-HS256");
    let claims = Claims::new().set_claim("sub", "a");
    let token = builder.build(&claims, None, Some(&ec)).unwrap();

    let params = ValidationParameters::new()
        .with_token_decryption_key(symmetric(&vec![1u8; 32]))
        .require_signed_tokens(false);
    assert_matches::assert_matches!(
        Validator::new().validate(&token, &params),
        Err(HandlerError::EncryptionFailed(_))
    );
}

#[test]
fn oversize_token_is_rejected() {
    let huge = "a".repeat(3 * 1024 * 1024);
    assert!(!can_read(&huge, 2 * 1024 * 1024));
    assert_matches::assert_matches!(
        jwt_handler::token::read(&huge, 2 * 1024 * 1024),
        Err(HandlerError::InvalidArgument(_))
    );
}

#[test]
fn seven_segment_input_cannot_be_read() {
    assert!(!can_read("a.b.c.d.e.f.g", 2 * 1024 * 1024));
}

#[test]
fn signed_build_validates_with_the_same_key_and_equivalent_claims() {
    let builder = TokenBuilder::default();
    let sc = SigningCredentials::new(symmetric(b"round-trip-secret-value").with_key_id("k1"), "HS256");
    let claims = Claims::new()
        .set_issuer("issuer.example")
        .set_audience("aud.example")
        .set_claim("sub", "alice");

    let token = builder.build(&claims, Some(&sc), None).unwrap();
    let params = ValidationParameters::new()
        .with_issuer_signing_key(sc.key.clone())
        .with_valid_issuers(["issuer.example"])
        .with_valid_audiences(["aud.example"]);

    let result = Validator::new().validate(&token, &params).unwrap();
    match result.token {
        jwt_handler::token::CompactToken::Jws(t) => {
            assert_eq!(t.claims.iss(), Some("issuer.example"));
            assert_eq!(t.claims.aud(), vec!["aud.example"]);
        }
        jwt_handler::token::CompactToken::Jwe(_) => panic!("expected JWS"),
    }
}

#[test]
fn tampered_signature_bit_is_rejected() {
    let builder = TokenBuilder::default();
    let sc = SigningCredentials::new(symmetric(b"tamper-detection-secret").with_key_id("k1"), "HS256");
    let claims = Claims::new().set_claim("sub", "a");
    let token = builder.build(&claims, Some(&sc), None).unwrap();

    let mut segments: Vec<String> = token.split('.').map(str::to_owned).collect();
    let mut sig_bytes: Vec<u8> = segments[2].bytes().collect();
    sig_bytes[0] ^= 0xff;
    segments[2] = String::from_utf8(sig_bytes).unwrap_or_else(|_| "!!!!".repeat(8));
    let tampered = segments.join(".");

    let params = ValidationParameters::new().with_issuer_signing_key(sc.key.clone());
    assert!(Validator::new().validate(&tampered, &params).is_err());
}

#[test]
fn header_cache_is_idempotent_across_builds() {
    let cache = HeaderCache::new();
    let builder = TokenBuilder::with_cache(&cache);
    let sc = SigningCredentials::new(symmetric(b"idempotent-header-secret").with_key_id("k1"), "HS256");

    let first = builder
        .build(&Claims::new().set_claim("sub", "one"), Some(&sc), None)
        .unwrap();
    let second = builder
        .build(&Claims::new().set_claim("sub", "two"), Some(&sc), None)
        .unwrap();

    assert_eq!(first.split('.').next(), second.split('.').next());
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn async_build_and_validate_round_trip() {
    let builder = TokenBuilder::default();
    let sc = SigningCredentials::new(symmetric(b"async-path-secret-value").with_key_id("k1"), "HS256");
    let claims = Claims::new().set_claim("sub", "a");

    let token = builder.build_async(&claims, Some(&sc), None).await.unwrap();
    let params = ValidationParameters::new().with_issuer_signing_key(sc.key.clone());
    let result = Validator::new().validate_async(&token, &params).await.unwrap();
    assert!(result.signing_key.is_some());
}
