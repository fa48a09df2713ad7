//! AES-256-GCM with a detached authentication tag
//!
//! ```text
//! encrypt(plaintext, key, iv) -> (ciphertext, tag)     |ciphertext| == |plaintext|
//! decrypt(ciphertext, key, iv, tag) -> plaintext       tag checked before anything is returned
//! ```
//!
//! No associated data is bound. Every failure on the decrypt side maps to the
//! same [`EnvxError::Integrity`] so callers cannot tell a wrong password from
//! a flipped bit.

use aes_gcm::{
    aead::{generic_array::GenericArray, AeadInPlace, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use envx_core::{EnvxError, EnvxResult};

use crate::kdf::DerivedKey;
use crate::{NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// Identifier recorded in container metadata for this cipher
pub const ALGORITHM_AES_256_GCM: &str = "aes-256-gcm";

/// Fresh random nonce. Never reuse one with the same key.
pub fn generate_iv() -> [u8; NONCE_SIZE] {
    let mut iv = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Fresh random KDF salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Encrypt `plaintext`, returning `(ciphertext, tag)`.
pub fn encrypt(
    plaintext: &[u8],
    key: &DerivedKey,
    iv: &[u8],
) -> EnvxResult<(Vec<u8>, [u8; TAG_SIZE])> {
    check_iv(iv)?;
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut buffer)
        .map_err(|e| anyhow::anyhow!("AES-256-GCM encryption failed: {e}"))?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);
    Ok((buffer, tag_bytes))
}

/// Decrypt and authenticate. No plaintext is returned unless the tag verifies.
pub fn decrypt(ciphertext: &[u8], key: &DerivedKey, iv: &[u8], tag: &[u8]) -> EnvxResult<Vec<u8>> {
    check_iv(iv)?;
    if tag.len() != TAG_SIZE {
        return Err(EnvxError::Format(format!(
            "authentication tag must be {TAG_SIZE} bytes, got {}",
            tag.len()
        )));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(iv),
            b"",
            &mut buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| EnvxError::Integrity)?;
    Ok(buffer)
}

fn check_iv(iv: &[u8]) -> EnvxResult<()> {
    if iv.len() != NONCE_SIZE {
        return Err(EnvxError::Format(format!(
            "{ALGORITHM_AES_256_GCM} requires a {NONCE_SIZE}-byte IV, got {}",
            iv.len()
        )));
    }
    Ok(())
}
