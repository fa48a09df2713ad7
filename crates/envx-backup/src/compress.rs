//! Per-file zstd compression for compressed-mode backups
//!
//! Each captured file becomes one independent zstd stream stored flat in the
//! backup area:
//!
//! ```text
//! <backups>/<backup name>_<original file name>.zst
//! ```
//!
//! The separator is `_` followed by the active file name, which backup names
//! are not allowed to contain, so the first occurrence always splits the two.

use std::path::Path;

use envx_core::{EnvxError, EnvxResult};

/// Extension of compressed backup members
pub const COMPRESSED_EXT: &str = ".zst";

/// Compress one file's bytes.
pub fn compress(data: &[u8], level: i32) -> EnvxResult<Vec<u8>> {
    zstd::encode_all(data, level).map_err(|e| anyhow::anyhow!("zstd compress: {e}").into())
}

/// Read and decompress one backup member.
pub fn decompress_file(path: &Path) -> EnvxResult<Vec<u8>> {
    let compressed = std::fs::read(path).map_err(|e| EnvxError::io(path, e))?;
    zstd::decode_all(compressed.as_slice()).map_err(|e| EnvxError::io(path, e))
}

/// `<backup>_<file>.zst`
pub fn member_name(backup: &str, file: &str) -> String {
    format!("{backup}_{file}{COMPRESSED_EXT}")
}

/// Split a member name back into `(backup, file)`.
///
/// Returns `None` for anything that is not a compressed member for the given
/// active file name.
pub fn parse_member_name<'a>(name: &'a str, active: &str) -> Option<(&'a str, &'a str)> {
    let stem = name.strip_suffix(COMPRESSED_EXT)?;
    let split = stem.find(&format!("_{active}"))?;
    let (backup, file) = (&stem[..split], &stem[split + 1..]);
    if backup.is_empty() {
        return None;
    }
    Some((backup, file))
}
