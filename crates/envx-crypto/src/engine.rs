//! Value-scoped encryption: whole-file bytes, or every value inside a body
//!
//! Whole-file mode turns the exact input bytes into one container, which
//! becomes the entire output. Targeted mode rewrites each assignment line to
//!
//! ```text
//! KEY=envx:enc:<base64(container bytes)>
//! ```
//!
//! and leaves comments, blank lines and any other text untouched.
//!
//! Targeted encryption rewrites *every* assignment, not only the named key;
//! the key is checked for existence up front and nothing more. Files written
//! by earlier releases depend on this, so it is kept as is.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::SecretString;

use envx_core::{EnvxError, EnvxResult, KeyValueBody, Line};

use crate::cipher;
use crate::container::{ContainerMetadata, EncryptedContainer};
use crate::kdf::{derive_key, KdfParams};

/// Literal prefix of an inline encrypted value
pub const INLINE_MARKER: &str = "envx:enc:";

/// Encrypt a plaintext unit into a fresh container (new salt, new IV).
pub fn seal(
    plaintext: &[u8],
    password: &SecretString,
    params: &KdfParams,
) -> EnvxResult<EncryptedContainer> {
    // never write a container that decode would refuse
    params.check_bounds()?;
    let salt = cipher::generate_salt();
    let iv = cipher::generate_iv();
    let key = derive_key(password, &salt, params)?;
    let (ciphertext, tag) = cipher::encrypt(plaintext, &key, &iv)?;

    Ok(EncryptedContainer {
        metadata: ContainerMetadata::new(params.clone()),
        salt: salt.to_vec(),
        iv: iv.to_vec(),
        tag: tag.to_vec(),
        ciphertext,
    })
}

/// Decrypt a container, re-deriving the key from its recorded salt and KDF params.
pub fn open(container: &EncryptedContainer, password: &SecretString) -> EnvxResult<Vec<u8>> {
    let key = derive_key(password, &container.salt, &container.metadata.kdf)?;
    cipher::decrypt(&container.ciphertext, &key, &container.iv, &container.tag)
}

/// Whole-file mode: encrypt the exact input bytes.
pub fn encrypt_bytes(
    plaintext: &[u8],
    password: &SecretString,
    params: &KdfParams,
) -> EnvxResult<Vec<u8>> {
    seal(plaintext, password, params)?.encode()
}

/// Whole-file mode: decode and decrypt, returning the original bytes verbatim.
pub fn decrypt_bytes(data: &[u8], password: &SecretString) -> EnvxResult<Vec<u8>> {
    let container = EncryptedContainer::decode(data)?;
    open(&container, password)
}

pub fn is_inline_encrypted(value: &str) -> bool {
    value.trim_start().starts_with(INLINE_MARKER)
}

/// Encrypt one value into its inline form (`envx:enc:<base64>`).
pub fn encrypt_value(
    value: &str,
    password: &SecretString,
    params: &KdfParams,
) -> EnvxResult<String> {
    let bytes = encrypt_bytes(value.as_bytes(), password, params)?;
    Ok(format!("{INLINE_MARKER}{}", STANDARD.encode(bytes)))
}

/// Decrypt one inline value. The input must carry [`INLINE_MARKER`].
pub fn decrypt_value(inline: &str, password: &SecretString) -> EnvxResult<String> {
    let encoded = inline
        .trim()
        .strip_prefix(INLINE_MARKER)
        .ok_or_else(|| EnvxError::Format("value does not carry the inline marker".into()))?;
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| EnvxError::Format(format!("inline value is not valid base64: {e}")))?;
    let plaintext = decrypt_bytes(&bytes, password)?;
    String::from_utf8(plaintext)
        .map_err(|_| EnvxError::Format("decrypted value is not valid UTF-8".into()))
}

/// Result of targeted encryption
#[derive(Debug, Clone)]
pub struct ValueEncryption {
    pub body: String,
    /// Keys whose values were encrypted, in file order
    pub encrypted: Vec<String>,
    /// Keys already carrying the inline marker, left as they were
    pub already_encrypted: Vec<String>,
}

/// Targeted mode: encrypt every assignment value in `text`.
///
/// Fails with [`EnvxError::KeyNotFound`] before encrypting anything when
/// `target_key` is not assigned in the body.
pub fn encrypt_values(
    text: &str,
    target_key: &str,
    password: &SecretString,
    params: &KdfParams,
) -> EnvxResult<ValueEncryption> {
    let mut body = KeyValueBody::parse(text);
    if !body.contains_key(target_key) {
        return Err(EnvxError::KeyNotFound {
            key: target_key.to_string(),
        });
    }

    let mut encrypted = Vec::new();
    let mut already_encrypted = Vec::new();
    for line in body.lines.iter_mut() {
        if let Line::Assignment { key, value, .. } = line {
            if is_inline_encrypted(value) {
                already_encrypted.push(key.clone());
                continue;
            }
            *value = encrypt_value(value, password, params)?;
            encrypted.push(key.clone());
        }
    }

    tracing::debug!(
        target_key,
        encrypted = encrypted.len(),
        skipped = already_encrypted.len(),
        "encrypted inline values"
    );

    Ok(ValueEncryption {
        body: body.render(),
        encrypted,
        already_encrypted,
    })
}

/// A single inline value that could not be decrypted
#[derive(Debug)]
pub struct ValueFailure {
    /// 1-based line number
    pub line: usize,
    pub key: String,
    pub error: EnvxError,
}

/// Result of targeted decryption
#[derive(Debug)]
pub struct ValueDecryption {
    pub body: String,
    /// Keys whose values were decrypted, in file order
    pub decrypted: Vec<String>,
    /// Values left in their encrypted form
    pub failures: Vec<ValueFailure>,
}

impl ValueDecryption {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Targeted mode: decrypt every marker-carrying value independently.
///
/// A value that fails to decrypt stays encrypted in the output and is
/// reported in [`ValueDecryption::failures`]; the rest still go through.
pub fn decrypt_values(text: &str, password: &SecretString) -> ValueDecryption {
    let mut body = KeyValueBody::parse(text);
    let mut decrypted = Vec::new();
    let mut failures = Vec::new();

    for (idx, line) in body.lines.iter_mut().enumerate() {
        let Line::Assignment { key, value, .. } = line else {
            continue;
        };
        if !is_inline_encrypted(value) {
            continue;
        }
        match decrypt_value(value, password) {
            Ok(plain) => {
                *value = plain;
                decrypted.push(key.clone());
            }
            Err(error) => {
                tracing::warn!(
                    line = idx + 1,
                    key = %key,
                    kind = error.kind(),
                    "inline value not decrypted"
                );
                failures.push(ValueFailure {
                    line: idx + 1,
                    key: key.clone(),
                    error,
                });
            }
        }
    }

    ValueDecryption {
        body: body.render(),
        decrypted,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pw(s: &str) -> SecretString {
        SecretString::from(s)
    }

    fn fast() -> KdfParams {
        KdfParams::insecure_fast()
    }

    #[test]
    fn test_whole_file_scenario() {
        let plaintext = b"A=1\nB=2\n";
        let sealed = encrypt_bytes(plaintext, &pw("pw"), &fast()).unwrap();

        assert_eq!(decrypt_bytes(&sealed, &pw("pw")).unwrap(), plaintext);

        let err = decrypt_bytes(&sealed, &pw("wrong")).unwrap_err();
        assert!(matches!(err, EnvxError::Integrity));
    }

    #[test]
    fn test_same_input_never_same_container() {
        let a = seal(b"same", &pw("pw"), &fast()).unwrap();
        let b = seal(b"same", &pw("pw"), &fast()).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn test_every_ciphertext_and_tag_bit_is_authenticated() {
        let container = seal(b"KEY=value", &pw("pw"), &fast()).unwrap();
        let key = derive_key(&pw("pw"), &container.salt, &container.metadata.kdf).unwrap();
        let bits = (container.ciphertext.len() + container.tag.len()) * 8;

        for bit in 0..bits {
            let mut ciphertext = container.ciphertext.clone();
            let mut tag = container.tag.clone();
            let (byte, mask) = (bit / 8, 1u8 << (bit % 8));
            if byte < ciphertext.len() {
                ciphertext[byte] ^= mask;
            } else {
                tag[byte - ciphertext.len()] ^= mask;
            }
            let err = cipher::decrypt(&ciphertext, &key, &container.iv, &tag).unwrap_err();
            assert!(matches!(err, EnvxError::Integrity), "bit {bit} not detected");
        }

        let mut tampered = container.clone();
        tampered.ciphertext[0] ^= 1;
        assert!(matches!(open(&tampered, &pw("pw")), Err(EnvxError::Integrity)));
    }

    #[test]
    fn test_not_a_container() {
        let err = decrypt_bytes(b"A=1\n", &pw("pw")).unwrap_err();
        assert_eq!(err.kind(), "format");
    }

    #[test]
    fn test_targeted_encrypts_every_value() {
        let text = "# database\nA=1\n\nB=2\n";
        let out = encrypt_values(text, "A", &pw("pw"), &fast()).unwrap();
        let lines: Vec<&str> = out.body.split('\n').collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "# database");
        assert!(lines[1].starts_with("A=envx:enc:"));
        assert_eq!(lines[2], "");
        assert!(lines[3].starts_with("B=envx:enc:"));
        assert_eq!(lines[4], "");
        assert_eq!(out.encrypted, vec!["A", "B"]);

        let back = decrypt_values(&out.body, &pw("pw"));
        assert!(back.is_complete());
        assert_eq!(back.body, text);
        assert_eq!(back.decrypted, vec!["A", "B"]);
    }

    #[test]
    fn test_targeted_missing_key() {
        let err = encrypt_values("A=1\n", "MISSING", &pw("pw"), &fast()).unwrap_err();
        assert!(matches!(err, EnvxError::KeyNotFound { ref key } if key == "MISSING"));
    }

    #[test]
    fn test_targeted_skips_already_encrypted() {
        let once = encrypt_values("A=1\n", "A", &pw("pw"), &fast()).unwrap();
        let twice = encrypt_values(&once.body, "A", &pw("pw"), &fast()).unwrap();
        assert_eq!(twice.body, once.body);
        assert_eq!(twice.already_encrypted, vec!["A"]);

        assert_eq!(decrypt_values(&twice.body, &pw("pw")).body, "A=1\n");
    }

    #[test]
    fn test_partial_decrypt_keeps_failed_line() {
        let a = encrypt_value("1", &pw("right"), &fast()).unwrap();
        let b = encrypt_value("2", &pw("other"), &fast()).unwrap();
        let text = format!("A={a}\n# keep\nB={b}\nC=plain\n");

        let out = decrypt_values(&text, &pw("right"));
        assert_eq!(out.decrypted, vec!["A"]);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].key, "B");
        assert_eq!(out.failures[0].line, 3);
        assert!(matches!(out.failures[0].error, EnvxError::Integrity));
        assert_eq!(out.body, format!("A=1\n# keep\nB={b}\nC=plain\n"));
    }

    #[test]
    fn test_corrupt_inline_value_is_a_format_failure() {
        let out = decrypt_values("A=envx:enc:!!!not-base64\n", &pw("pw"));
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].error.kind(), "format");
        assert_eq!(out.body, "A=envx:enc:!!!not-base64\n");
    }

    #[test]
    fn test_hostile_kdf_cost_is_a_per_value_failure() {
        let mut container = seal(b"1", &pw("pw"), &fast()).unwrap();
        container.metadata.kdf.mem_cost_kib = u32::MAX;
        let hostile = format!("{INLINE_MARKER}{}", STANDARD.encode(container.encode().unwrap()));
        let good = encrypt_value("2", &pw("pw"), &fast()).unwrap();
        let text = format!("A={hostile}\nB={good}\n");

        let out = decrypt_values(&text, &pw("pw"));
        assert_eq!(out.decrypted, vec!["B"]);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].key, "A");
        assert_eq!(out.failures[0].error.kind(), "format");
        assert_eq!(out.body, format!("A={hostile}\nB=2\n"));
    }

    #[test]
    fn test_seal_refuses_costs_decode_would_reject() {
        let params = KdfParams {
            time_cost: 64,
            ..fast()
        };
        let err = encrypt_bytes(b"A=1\n", &pw("pw"), &params).unwrap_err();
        assert_eq!(err.kind(), "format");
    }

    #[test]
    fn test_mixed_line_endings_survive_roundtrip() {
        let text = "A=1\n# keep\r\nB=2\n\r\nC=3";
        let out = encrypt_values(text, "A", &pw("pw"), &fast()).unwrap();
        assert!(out.body.contains("\n# keep\r\n"));
        assert_eq!(decrypt_values(&out.body, &pw("pw")).body, text);
    }

    #[test]
    fn test_export_prefix_and_spacing_survive() {
        let text = "export TOKEN = abc\r\n";
        let out = encrypt_values(text, "TOKEN", &pw("pw"), &fast()).unwrap();
        assert!(out.body.starts_with("export TOKEN =envx:enc:"));
        assert_eq!(decrypt_values(&out.body, &pw("pw")).body, text);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn roundtrip_any_bytes(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            password in ".{0,16}",
        ) {
            let sealed = encrypt_bytes(&data, &pw(&password), &fast()).unwrap();
            let opened = decrypt_bytes(&sealed, &pw(&password)).unwrap();
            prop_assert_eq!(opened, data);
        }
    }
}
