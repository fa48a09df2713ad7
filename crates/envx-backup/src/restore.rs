//! Restore engine: resolve a backup reference and replay it
//!
//! Replay order is fixed:
//!
//! 1. verify (optional): directory backups must be complete and match their
//!    recorded checksums
//! 2. overwrite pre-flight: refuse before any write unless forced
//! 3. safety backup of the current state (optional)
//! 4. load every file into memory, then write them all
//!
//! A failure in steps 1, 2 or 4's load phase leaves the working directory
//! untouched.

use envx_core::error::MAX_SUGGESTIONS;
use envx_core::{BackupKind, BackupRecord, EnvxError, EnvxResult, RestoreOutcome};

use crate::compress;
use crate::store::{BackupStore, CreateOptions};

#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    /// Replace existing working files
    pub force: bool,
    /// Check completeness and checksums before writing
    pub verify: bool,
    /// Snapshot the current env files first
    pub backup_current_first: bool,
}

/// Resolve a user-supplied reference to one backup.
///
/// Exact name first. A reference starting with `YYYY-MM-DD` then matches
/// names containing it, and finally backups created on that day; the newest
/// match wins.
pub fn resolve(store: &BackupStore<'_>, reference: &str) -> EnvxResult<BackupRecord> {
    let records = store.list()?;

    if let Some(record) = records.iter().find(|r| r.name == reference) {
        return Ok(record.clone());
    }

    if let Some(date) = date_prefix(reference) {
        // newest first, so the first hit is the newest match
        let matched = records
            .iter()
            .find(|r| r.name.contains(reference))
            .or_else(|| {
                records
                    .iter()
                    .find(|r| r.created_at.format("%Y-%m-%d").to_string() == date)
            });
        if let Some(record) = matched {
            tracing::debug!(reference, backup = %record.name, "resolved backup by date");
            return Ok(record.clone());
        }
    }

    Err(EnvxError::BackupNotFound {
        reference: reference.to_string(),
        available: records
            .iter()
            .take(MAX_SUGGESTIONS)
            .map(|r| r.name.clone())
            .collect(),
    })
}

fn date_prefix(reference: &str) -> Option<&str> {
    let date = reference.get(..10)?;
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(date)
}

/// Check a backup without touching the working directory.
///
/// Directory backups: every manifest file must exist, and match its checksum
/// when one was recorded. Compressed backups are only checked on load.
pub fn verify(store: &BackupStore<'_>, record: &BackupRecord) -> EnvxResult<()> {
    check_manifest(record)?;
    if record.kind == BackupKind::Compressed {
        return Ok(());
    }

    let dir = store.directory_path(&record.name);
    let mut problems = Vec::new();
    for file in &record.files {
        let path = dir.join(file);
        match std::fs::read(&path) {
            Ok(data) => {
                if let Some(expected) = record.checksums.get(file) {
                    if blake3::hash(&data).to_hex().as_str() != expected {
                        problems.push(format!("{file}: checksum mismatch"));
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                problems.push(format!("{file}: missing from backup"));
            }
            Err(e) => return Err(EnvxError::io(&path, e)),
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(EnvxError::Verification { problems })
    }
}

/// Replay `record` onto the project root.
pub fn restore(
    store: &BackupStore<'_>,
    record: &BackupRecord,
    opts: &RestoreOptions,
) -> EnvxResult<RestoreOutcome> {
    check_manifest(record)?;
    if opts.verify {
        verify(store, record)?;
    }

    let root = store.project().root();
    let existing: Vec<String> = record
        .files
        .iter()
        .filter(|file| root.join(file).exists())
        .cloned()
        .collect();
    if !existing.is_empty() && !opts.force {
        return Err(EnvxError::OverwriteRefused { files: existing });
    }

    let pre_restore_backup = if opts.backup_current_first {
        match store.create(&CreateOptions::default()) {
            Ok(safety) => Some(safety.name),
            Err(EnvxError::NoFilesFound { .. }) => {
                tracing::info!("no current env files, skipping pre-restore backup");
                None
            }
            Err(e) => return Err(e),
        }
    } else {
        None
    };

    let contents = load(store, record, opts.verify)?;
    for (file, data) in &contents {
        let path = root.join(file);
        std::fs::write(&path, data).map_err(|e| EnvxError::io(&path, e))?;
    }

    tracing::info!(
        backup = %record.name,
        restored = contents.len(),
        overwritten = existing.len(),
        "restored backup"
    );

    Ok(RestoreOutcome {
        backup: record.name.clone(),
        restored: record.files.clone(),
        overwritten: existing,
        pre_restore_backup,
    })
}

/// Manifest entries become paths under the project root; keep them flat.
fn check_manifest(record: &BackupRecord) -> EnvxResult<()> {
    let problems: Vec<String> = record
        .files
        .iter()
        .filter(|f| f.is_empty() || f.contains('/') || f.contains('\\') || *f == "..")
        .map(|f| format!("{f:?}: not a plain file name"))
        .collect();
    if record.files.is_empty() {
        return Err(EnvxError::Verification {
            problems: vec!["backup manifest is empty".into()],
        });
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(EnvxError::Verification { problems })
    }
}

fn load(
    store: &BackupStore<'_>,
    record: &BackupRecord,
    verify_checksums: bool,
) -> EnvxResult<Vec<(String, Vec<u8>)>> {
    let mut contents = Vec::with_capacity(record.files.len());
    for file in &record.files {
        let data = match record.kind {
            BackupKind::Directory => {
                let path = store.directory_path(&record.name).join(file);
                std::fs::read(&path).map_err(|e| EnvxError::io(&path, e))?
            }
            BackupKind::Compressed => {
                compress::decompress_file(&store.member_path(&record.name, file))?
            }
        };
        if verify_checksums {
            if let Some(expected) = record.checksums.get(file) {
                if blake3::hash(&data).to_hex().as_str() != expected {
                    return Err(EnvxError::Verification {
                        problems: vec![format!("{file}: checksum mismatch")],
                    });
                }
            }
        }
        contents.push((file.clone(), data));
    }
    Ok(contents)
}
