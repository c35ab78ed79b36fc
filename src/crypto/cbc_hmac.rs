//! Default `AuthenticatedEncryptionProvider` for the three composite
//! AES-CBC + HMAC-SHA2 algorithms (RFC 7518 §5.2), the only `enc` values
//! spec.md's JWE sub-protocol names. CEK layout and lengths are grounded on
//! the `enc`-to-key-length table exercised in
//! `other_examples/.../naftulikay-josekit-rs__src-jwe.rs` (32/40/48-byte
//! keys for A128CBC-HS256/A192CBC-HS384/A256CBC-HS512 respectively).

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

use crate::error::{HandlerError, Result};

use super::{AeadOutput, AuthenticatedEncryptionProvider};

const IV_LEN: usize = 16;

/// AES-CBC + HMAC-SHA2 composite authenticated encryption, keyed by a
/// single content-encryption key split in half: the first half is the MAC
/// key, the second half is the AES key (RFC 7518 §5.2.2.1).
pub struct CbcHmacEncryptionProvider {
    enc: &'static str,
    mac_key: Vec<u8>,
    enc_key: Vec<u8>,
    tag_len: usize,
}

impl CbcHmacEncryptionProvider {
    pub fn new(enc: &str, cek: &[u8]) -> Result<Self> {
        let (enc, half, tag_len) = match enc {
            "A128CBC-HS256" => ("A128CBC-HS256", 16, 16),
            "A192CBC-HS384" => ("A192CBC-HS384", 24, 24),
            "A256CBC-HS512" => ("A256CBC-HS512", 32, 32),
            other => {
                return Err(HandlerError::EncryptionFailed(format!(
                    "unsupported content encryption algorithm '{other}', expected one of \
                     A128CBC-HS256, A192CBC-HS384, A256CBC-HS512"
                )))
            }
        };
        if cek.len() != half * 2 {
            return Err(HandlerError::EncryptionFailed(format!(
                "{enc} requires a {}-byte key, got {}",
                half * 2,
                cek.len()
            )));
        }
        Ok(Self {
            enc,
            mac_key: cek[..half].to_vec(),
            enc_key: cek[half..].to_vec(),
            tag_len,
        })
    }

    fn mac_input(aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
        let al = (aad.len() as u64) * 8;
        let mut input = Vec::with_capacity(aad.len() + iv.len() + ciphertext.len() + 8);
        input.extend_from_slice(aad);
        input.extend_from_slice(iv);
        input.extend_from_slice(ciphertext);
        input.extend_from_slice(&al.to_be_bytes());
        input
    }

    fn compute_tag(&self, aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let input = Self::mac_input(aad, iv, ciphertext);
        let full = match self.enc {
            "A128CBC-HS256" => mac::<Hmac<Sha256>>(&self.mac_key, &input)?,
            "A192CBC-HS384" => mac::<Hmac<Sha384>>(&self.mac_key, &input)?,
            "A256CBC-HS512" => mac::<Hmac<Sha512>>(&self.mac_key, &input)?,
            _ => unreachable!("validated in new()"),
        };
        Ok(full[..self.tag_len].to_vec())
    }

    fn verify_tag(&self, aad: &[u8], iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> bool {
        let input = Self::mac_input(aad, iv, ciphertext);
        match self.enc {
            "A128CBC-HS256" => verify_truncated::<Hmac<Sha256>>(&self.mac_key, &input, tag),
            "A192CBC-HS384" => verify_truncated::<Hmac<Sha384>>(&self.mac_key, &input, tag),
            "A256CBC-HS512" => verify_truncated::<Hmac<Sha512>>(&self.mac_key, &input, tag),
            _ => unreachable!("validated in new()"),
        }
    }
}

fn mac<M: Mac + hmac::digest::KeyInit>(key: &[u8], input: &[u8]) -> Result<Vec<u8>> {
    let mut mac = M::new_from_slice(key)
        .map_err(|e| HandlerError::EncryptionFailed(format!("bad HMAC key: {e}")))?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify_truncated<M: Mac + hmac::digest::KeyInit>(key: &[u8], input: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = M::new_from_slice(key) else {
        return false;
    };
    mac.update(input);
    mac.verify_truncated_left(tag).is_ok()
}

impl AuthenticatedEncryptionProvider for CbcHmacEncryptionProvider {
    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<AeadOutput> {
        let mut iv = [0u8; IV_LEN];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut iv);

        let ciphertext = match self.enc {
            "A128CBC-HS256" => cbc_encrypt::<Aes128>(&self.enc_key, &iv, plaintext)?,
            "A192CBC-HS384" => cbc_encrypt::<Aes192>(&self.enc_key, &iv, plaintext)?,
            "A256CBC-HS512" => cbc_encrypt::<Aes256>(&self.enc_key, &iv, plaintext)?,
            _ => unreachable!("validated in new()"),
        };
        let tag = self.compute_tag(aad, &iv, &ciphertext)?;

        Ok(AeadOutput {
            iv: iv.to_vec(),
            ciphertext,
            tag,
        })
    }

    fn decrypt(&self, iv: &[u8], ciphertext: &[u8], tag: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if iv.len() != IV_LEN {
            return Err(HandlerError::EncryptionFailed(format!(
                "expected a {IV_LEN}-byte IV, got {}",
                iv.len()
            )));
        }
        if !self.verify_tag(aad, iv, ciphertext, tag) {
            return Err(HandlerError::EncryptionFailed(
                "authentication tag mismatch".into(),
            ));
        }
        match self.enc {
            "A128CBC-HS256" => cbc_decrypt::<Aes128>(&self.enc_key, iv, ciphertext),
            "A192CBC-HS384" => cbc_decrypt::<Aes192>(&self.enc_key, iv, ciphertext),
            "A256CBC-HS512" => cbc_decrypt::<Aes256>(&self.enc_key, iv, ciphertext),
            _ => unreachable!("validated in new()"),
        }
    }
}

fn cbc_encrypt<C>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>
where
    C: cbc::cipher::BlockCipher
        + cbc::cipher::BlockSizeUser
        + cbc::cipher::KeyInit
        + cbc::cipher::BlockEncryptMut,
{
    let encryptor = cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| HandlerError::EncryptionFailed(format!("bad CBC key/IV: {e}")))?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>
where
    C: cbc::cipher::BlockCipher
        + cbc::cipher::BlockSizeUser
        + cbc::cipher::KeyInit
        + cbc::cipher::BlockDecryptMut,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| HandlerError::EncryptionFailed(format!("bad CBC key/IV: {e}")))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| HandlerError::EncryptionFailed("CBC padding check failed".into()))
}
