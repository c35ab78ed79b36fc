//! Default `SignatureProvider` for the three HMAC-SHA2 algorithms (RFC 7518
//! §3.2). Grounded on the teacher's own `Hs256`/`Hs384`/`Hs512` algorithms
//! and the `hmac`/`sha2` usage pattern in
//! `other_examples/.../cyrup-ai-cryypt__jwt-src-crypto.rs`.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

use crate::error::{HandlerError, Result};

use super::SignatureProvider;

/// HMAC-SHA256/384/512 signing and verification.
pub struct HmacSignatureProvider {
    algorithm: &'static str,
    secret: Vec<u8>,
}

impl HmacSignatureProvider {
    pub fn new(algorithm: &str, secret: &[u8]) -> Result<Self> {
        let algorithm = match algorithm {
            "HS256" => "HS256",
            "HS384" => "HS384",
            "HS512" => "HS512",
            other => {
                return Err(HandlerError::InvalidArgument(format!(
                    "unsupported HMAC algorithm '{other}'"
                )))
            }
        };
        Ok(Self {
            algorithm,
            secret: secret.to_vec(),
        })
    }
}

impl SignatureProvider for HmacSignatureProvider {
    fn algorithm(&self) -> &str {
        self.algorithm
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            "HS256" => Ok(sign::<Hmac<Sha256>>(&self.secret, data)?),
            "HS384" => Ok(sign::<Hmac<Sha384>>(&self.secret, data)?),
            "HS512" => Ok(sign::<Hmac<Sha512>>(&self.secret, data)?),
            _ => unreachable!("validated in new()"),
        }
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        match self.algorithm {
            "HS256" => Ok(verify::<Hmac<Sha256>>(&self.secret, data, signature)),
            "HS384" => Ok(verify::<Hmac<Sha384>>(&self.secret, data, signature)),
            "HS512" => Ok(verify::<Hmac<Sha512>>(&self.secret, data, signature)),
            _ => unreachable!("validated in new()"),
        }
    }
}

fn sign<M: Mac + hmac::digest::KeyInit>(secret: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = M::new_from_slice(secret)
        .map_err(|e| HandlerError::EncryptionFailed(format!("bad HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify<M: Mac + hmac::digest::KeyInit>(secret: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let Ok(mut mac) = M::new_from_slice(secret) else {
        return false;
    };
    mac.update(data);
    // `verify_slice` performs a constant-time comparison internally.
    mac.verify_slice(signature).is_ok()
}
