//! Encrypted container format
//!
//! Binary layout (all lengths are big-endian u32):
//! ```text
//! [len][metadata JSON][len][salt][len][iv][len][tag][ciphertext .. end]
//! ```
//!
//! The ciphertext has no length prefix and runs to the end of the buffer.
//! Decoders must honour the declared lengths instead of assuming offsets, so
//! salt/IV sizes and algorithm ids can change without breaking old files.

use serde::{Deserialize, Serialize};

use envx_core::{EnvxError, EnvxResult};

use crate::cipher::ALGORITHM_AES_256_GCM;
use crate::kdf::KdfParams;

/// Current metadata version written by [`ContainerMetadata::new`]
pub const METADATA_VERSION: &str = "1";

const LEN_PREFIX: usize = 4;
const SALT_RANGE: std::ops::RangeInclusive<usize> = 16..=32;
const IV_RANGE: std::ops::RangeInclusive<usize> = 12..=16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    pub version: String,
    pub algorithm: String,
    /// ISO-8601 / RFC 3339, UTC
    pub encrypted_at: String,
    /// Absent in containers that used the default KDF cost
    #[serde(default)]
    pub kdf: KdfParams,
}

impl ContainerMetadata {
    pub fn new(kdf: KdfParams) -> Self {
        Self {
            version: METADATA_VERSION.to_string(),
            algorithm: ALGORITHM_AES_256_GCM.to_string(),
            encrypted_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            kdf,
        }
    }
}

/// One ciphertext unit. Immutable once built: any edit means re-encrypting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedContainer {
    pub metadata: ContainerMetadata,
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl EncryptedContainer {
    /// Serialize to the on-disk framing.
    pub fn encode(&self) -> EnvxResult<Vec<u8>> {
        let metadata = serde_json::to_vec(&self.metadata)
            .map_err(|e| anyhow::anyhow!("container metadata serialization: {e}"))?;

        let mut out = Vec::with_capacity(
            4 * LEN_PREFIX
                + metadata.len()
                + self.salt.len()
                + self.iv.len()
                + self.tag.len()
                + self.ciphertext.len(),
        );
        for field in [&metadata, &self.salt, &self.iv, &self.tag] {
            let len = u32::try_from(field.len())
                .map_err(|_| EnvxError::Format("container field exceeds 4 GiB".into()))?;
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(field);
        }
        out.extend_from_slice(&self.ciphertext);
        Ok(out)
    }

    /// Parse the on-disk framing. Never panics on malformed input.
    pub fn decode(data: &[u8]) -> EnvxResult<Self> {
        let mut reader = FieldReader { data, pos: 0 };

        let metadata_bytes = reader.field("metadata")?;
        let salt = reader.field("salt")?.to_vec();
        let iv = reader.field("iv")?.to_vec();
        let tag = reader.field("tag")?.to_vec();
        let ciphertext = reader.rest().to_vec();

        let metadata: ContainerMetadata = serde_json::from_slice(metadata_bytes)
            .map_err(|e| EnvxError::Format(format!("metadata is not valid JSON: {e}")))?;

        if metadata.algorithm != ALGORITHM_AES_256_GCM {
            return Err(EnvxError::Format(format!(
                "unsupported algorithm '{}'",
                metadata.algorithm
            )));
        }
        if !SALT_RANGE.contains(&salt.len()) {
            return Err(EnvxError::Format(format!(
                "salt length {} outside {SALT_RANGE:?}",
                salt.len()
            )));
        }
        if !IV_RANGE.contains(&iv.len()) {
            return Err(EnvxError::Format(format!(
                "iv length {} outside {IV_RANGE:?}",
                iv.len()
            )));
        }
        metadata.kdf.check_bounds()?;

        Ok(Self {
            metadata,
            salt,
            iv,
            tag,
            ciphertext,
        })
    }
}

struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn field(&mut self, name: &str) -> EnvxResult<&'a [u8]> {
        if self.remaining() < LEN_PREFIX {
            return Err(EnvxError::Format(format!(
                "truncated before {name} length ({} bytes left)",
                self.remaining()
            )));
        }
        let mut prefix = [0u8; LEN_PREFIX];
        prefix.copy_from_slice(&self.data[self.pos..self.pos + LEN_PREFIX]);
        self.pos += LEN_PREFIX;

        let len = u32::from_be_bytes(prefix) as usize;
        if len > self.remaining() {
            return Err(EnvxError::Format(format!(
                "{name} length {len} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        let field = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(field)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}
