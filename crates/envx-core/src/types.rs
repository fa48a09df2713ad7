use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a backup is laid out in the backup area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    /// `<backups>/<name>/<file>` byte-for-byte copies
    Directory,
    /// `<backups>/<name>_<file>.zst`, one zstd stream per file
    Compressed,
}

impl std::fmt::Display for BackupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupKind::Directory => f.write_str("directory"),
            BackupKind::Compressed => f.write_str("compressed"),
        }
    }
}

/// One point-in-time snapshot of a project's env files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub kind: BackupKind,
    /// Captured file names, sorted. Never empty.
    pub files: Vec<String>,
    pub total_size_bytes: u64,
    /// BLAKE3 hex digest of each captured file's original bytes.
    /// Empty for backups written without a metadata sidecar.
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
}

/// Result of replaying a backup onto the working directory
#[derive(Debug, Clone, Default)]
pub struct RestoreOutcome {
    pub backup: String,
    /// Every file written, in manifest order
    pub restored: Vec<String>,
    /// Subset of `restored` that replaced an existing file
    pub overwritten: Vec<String>,
    /// Safety backup taken before the restore, if any
    pub pre_restore_backup: Option<String>,
}
