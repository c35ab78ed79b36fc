//! Default `KeyWrapProvider` for AES Key Wrap (RFC 3394 / RFC 7518 §4.4),
//! grounded on the `aes-kw` usage in
//! `other_examples/.../BetterbaseHQ-betterbase__crates-less-auth-src-jwe.rs`.

use aes_kw::{Kek, KekAes128, KekAes192, KekAes256};

use crate::error::{HandlerError, Result};

use super::KeyWrapProvider;

/// AES-128/192/256 key wrap, keyed by a key-encryption key (KEK).
pub enum AesKeyWrapProvider {
    Aes128(KekAes128),
    Aes192(KekAes192),
    Aes256(KekAes256),
}

impl AesKeyWrapProvider {
    pub fn new(alg: &str, kek: &[u8]) -> Result<Self> {
        match alg {
            "A128KW" => {
                let kek: [u8; 16] = kek.try_into().map_err(|_| {
                    HandlerError::EncryptionFailed("A128KW requires a 16-byte key".into())
                })?;
                Ok(Self::Aes128(Kek::from(kek)))
            }
            "A192KW" => {
                let kek: [u8; 24] = kek.try_into().map_err(|_| {
                    HandlerError::EncryptionFailed("A192KW requires a 24-byte key".into())
                })?;
                Ok(Self::Aes192(Kek::from(kek)))
            }
            "A256KW" => {
                let kek: [u8; 32] = kek.try_into().map_err(|_| {
                    HandlerError::EncryptionFailed("A256KW requires a 32-byte key".into())
                })?;
                Ok(Self::Aes256(Kek::from(kek)))
            }
            other => Err(HandlerError::EncryptionFailed(format!(
                "unsupported key-wrap algorithm '{other}'"
            ))),
        }
    }
}

impl KeyWrapProvider for AesKeyWrapProvider {
    fn wrap_key(&self, cek: &[u8]) -> Result<Vec<u8>> {
        let mut wrapped = vec![0u8; cek.len() + 8];
        let result = match self {
            Self::Aes128(kek) => kek.wrap(cek, &mut wrapped),
            Self::Aes192(kek) => kek.wrap(cek, &mut wrapped),
            Self::Aes256(kek) => kek.wrap(cek, &mut wrapped),
        };
        result.map_err(|e| HandlerError::EncryptionFailed(format!("AES key wrap failed: {e}")))?;
        Ok(wrapped)
    }

    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>> {
        if wrapped.len() < 8 {
            return Err(HandlerError::EncryptionFailed(
                "wrapped key too short".into(),
            ));
        }
        let mut cek = vec![0u8; wrapped.len() - 8];
        let result = match self {
            Self::Aes128(kek) => kek.unwrap(wrapped, &mut cek),
            Self::Aes192(kek) => kek.unwrap(wrapped, &mut cek),
            Self::Aes256(kek) => kek.unwrap(wrapped, &mut cek),
        };
        result
            .map_err(|e| HandlerError::EncryptionFailed(format!("AES key unwrap failed: {e}")))?;
        Ok(cek)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_then_unwrap_round_trips() {
        let kek = [9u8; 16];
        let provider = AesKeyWrapProvider::new("A128KW", &kek).unwrap();
        let cek = vec![1u8; 32];
        let wrapped = provider.wrap_key(&cek).unwrap();
        assert_eq!(wrapped.len(), 40);
        let unwrapped = provider.unwrap_key(&wrapped).unwrap();
        assert_eq!(unwrapped, cek);
    }

    #[test]
    fn wrong_kek_size_is_rejected() {
        assert!(AesKeyWrapProvider::new("A128KW", &[0u8; 10]).is_err());
    }
}
