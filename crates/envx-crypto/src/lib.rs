//! envx-crypto: password-based encryption for env files
//!
//! Pipeline: password + random salt → Argon2id → AES-256-GCM key → seal
//!
//! ```text
//! whole file:   .env            → [container]                .env.enc
//! per value:    KEY=plain       → KEY=envx:enc:<base64(container)>
//! ```
//!
//! Every encryption draws a fresh salt and IV, so encrypting the same input
//! twice never yields the same bytes.

pub mod cipher;
pub mod container;
pub mod engine;
pub mod file;
pub mod kdf;

pub use container::{ContainerMetadata, EncryptedContainer};
pub use engine::{
    decrypt_bytes, decrypt_value, decrypt_values, encrypt_bytes, encrypt_value, encrypt_values,
    is_inline_encrypted, ValueDecryption, ValueEncryption, ValueFailure, INLINE_MARKER,
};
pub use file::{
    check_decrypt, check_encrypt, decrypt_file, encrypt_file, CryptoMode, DecryptOptions,
    DecryptOutcome, EncryptOptions, EncryptOutcome,
};
pub use kdf::{derive_key, DerivedKey, KdfParams};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a freshly generated KDF salt
pub const SALT_SIZE: usize = 32;
