//! Signing-Key Resolver (spec §4.5).

use crate::credentials::Key;
use crate::token::{CompactToken, ProtectedHeader};

use super::params::ValidationParameters;

/// Overrides the built-in resolution order entirely. Returning `None` is
/// the "degenerate case": the validator falls back to trying every
/// configured key.
pub trait SigningKeyResolver: Send + Sync {
    fn resolve(&self, token: &CompactToken, params: &ValidationParameters) -> Option<Vec<Key>>;
}

/// Built-in resolution order (first match wins):
/// 1. `kid` in the header: `issuer_signing_key` then `issuer_signing_keys`.
/// 2. Else `x5t`: `issuer_signing_key`'s `key_id` or thumbprint, then
///    `issuer_signing_keys`'s `key_id`.
/// 3. Else: unresolved.
fn resolve_single(header: &ProtectedHeader, params: &ValidationParameters) -> Option<Key> {
    if let Some(kid) = &header.kid {
        if let Some(key) = &params.issuer_signing_key {
            if key.key_id() == Some(kid.as_str()) {
                return Some(key.clone());
            }
        }
        return params
            .issuer_signing_keys
            .iter()
            .find(|k| k.key_id() == Some(kid.as_str()))
            .cloned();
    }
    if let Some(x5t) = &header.x5t {
        if let Some(key) = &params.issuer_signing_key {
            if key.key_id() == Some(x5t.as_str()) || key.thumbprint() == Some(x5t.as_str()) {
                return Some(key.clone());
            }
        }
        return params
            .issuer_signing_keys
            .iter()
            .find(|k| k.key_id() == Some(x5t.as_str()))
            .cloned();
    }
    None
}

fn all_configured_keys(params: &ValidationParameters) -> Vec<Key> {
    let mut keys = Vec::with_capacity(params.issuer_signing_keys.len() + 1);
    keys.extend(params.issuer_signing_key.clone());
    keys.extend(params.issuer_signing_keys.iter().cloned());
    keys
}

/// Produces the ordered list of candidate keys the validator's multi-key
/// trial should attempt.
pub fn resolve_candidates(token: &CompactToken, params: &ValidationParameters) -> Vec<Key> {
    if let Some(resolver) = &params.issuer_signing_key_resolver {
        return match resolver.resolve(token, params) {
            Some(keys) => keys,
            None => all_configured_keys(params),
        };
    }
    match resolve_single(token.header(), params) {
        Some(key) => vec![key],
        None => all_configured_keys(params),
    }
}

fn all_configured_decryption_keys(params: &ValidationParameters) -> Vec<Key> {
    let mut keys = Vec::with_capacity(params.token_decryption_keys.len() + 1);
    keys.extend(params.token_decryption_key.clone());
    keys.extend(params.token_decryption_keys.iter().cloned());
    keys
}

/// Candidate decryption keys for a JWE's CEK step (direct or key-wrap),
/// mirroring [`resolve_candidates`]'s `kid`-based order but against
/// `token_decryption_key`/`token_decryption_keys` rather than the signing-key
/// fields.
pub fn resolve_decryption_candidates(header: &ProtectedHeader, params: &ValidationParameters) -> Vec<Key> {
    if let Some(kid) = &header.kid {
        if let Some(key) = &params.token_decryption_key {
            if key.key_id() == Some(kid.as_str()) {
                return vec![key.clone()];
            }
        }
        if let Some(key) = params
            .token_decryption_keys
            .iter()
            .find(|k| k.key_id() == Some(kid.as_str()))
        {
            return vec![key.clone()];
        }
    }
    all_configured_decryption_keys(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::read;

    fn token_with_header(header_json: &str) -> CompactToken {
        use base64::engine::Engine;
        let header = crate::token::reader::B64.encode(header_json);
        let payload = crate::token::reader::B64.encode("{}");
        let raw = format!("{header}.{payload}.");
        read(&raw, 1024 * 1024).unwrap()
    }

    #[test]
    fn kid_resolves_to_matching_issuer_signing_keys_entry() {
        let token = token_with_header(r#"{"alg":"HS256","kid":"B"}"#);
        let params = ValidationParameters::new().with_issuer_signing_keys([
            Key::symmetric(vec![1]).with_key_id("A"),
            Key::symmetric(vec![2]).with_key_id("B"),
        ]);
        let candidates = resolve_candidates(&token, &params);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key_id(), Some("B"));
    }

    #[test]
    fn kid_with_no_match_falls_back_to_all_configured_keys() {
        let token = token_with_header(r#"{"alg":"HS256","kid":"missing"}"#);
        let params = ValidationParameters::new()
            .with_issuer_signing_key(Key::symmetric(vec![1]).with_key_id("A"));
        let candidates = resolve_candidates(&token, &params);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key_id(), Some("A"));
    }

    #[test]
    fn no_kid_or_x5t_falls_back_to_all_configured_keys() {
        let token = token_with_header(r#"{"alg":"HS256"}"#);
        let params = ValidationParameters::new().with_issuer_signing_keys([
            Key::symmetric(vec![1]).with_key_id("A"),
            Key::symmetric(vec![2]).with_key_id("B"),
        ]);
        let candidates = resolve_candidates(&token, &params);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn decryption_kid_resolves_to_matching_token_decryption_keys_entry() {
        let token = token_with_header(r#"{"alg":"A128KW","enc":"A128CBC-HS256","kid":"B"}"#);
        let params = ValidationParameters::new().with_token_decryption_keys([
            Key::symmetric(vec![1; 16]).with_key_id("A"),
            Key::symmetric(vec![2; 16]).with_key_id("B"),
        ]);
        let candidates = resolve_decryption_candidates(token.header(), &params);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key_id(), Some("B"));
    }

    #[test]
    fn decryption_without_kid_falls_back_to_all_configured_decryption_keys() {
        let token = token_with_header(r#"{"alg":"dir","enc":"A128CBC-HS256"}"#);
        let params = ValidationParameters::new()
            .with_token_decryption_key(Key::symmetric(vec![1; 32]));
        let candidates = resolve_decryption_candidates(token.header(), &params);
        assert_eq!(candidates.len(), 1);
    }
}
