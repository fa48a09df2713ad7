//! Backup store: create, list and look up snapshots of a project's env files
//!
//! Layout under the backup area (`.envx/backups` by default):
//!
//! ```text
//! <name>/                      directory mode: byte-for-byte copies
//!   .env
//!   .env.local
//!   .envx-backup.json          metadata sidecar (not part of the manifest)
//! <name>_.env.zst              compressed mode: one zstd stream per file
//! <name>_.env.local.zst
//! <name>.backup.json           metadata sidecar
//! ```
//!
//! Sidecars carry the full [`BackupRecord`] with sub-second creation time and
//! BLAKE3 checksums. Backups without one are reconstructed from the files on
//! disk and dated by modification time.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use envx_core::{BackupKind, BackupRecord, EnvxError, EnvxResult, Project};

use crate::compress;

/// Sidecar file inside a directory-mode backup
pub const DIRECTORY_SIDECAR: &str = ".envx-backup.json";

/// Suffix of the sidecar next to a compressed-mode backup's members
pub const COMPRESSED_SIDECAR_SUFFIX: &str = ".backup.json";

/// Auto-generated names: UTC, second granularity, sorts chronologically
pub const AUTO_NAME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Explicit name; auto-generated from the current time when `None`
    pub name: Option<String>,
    pub compress: bool,
}

/// The backup area of one project
#[derive(Debug, Clone, Copy)]
pub struct BackupStore<'a> {
    project: &'a Project,
}

impl<'a> BackupStore<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self { project }
    }

    pub fn project(&self) -> &'a Project {
        self.project
    }

    pub fn dir(&self) -> PathBuf {
        self.project.backups_dir()
    }

    /// Where a directory-mode backup keeps its copies.
    pub fn directory_path(&self, name: &str) -> PathBuf {
        self.dir().join(name)
    }

    /// Path of one compressed member.
    pub fn member_path(&self, name: &str, file: &str) -> PathBuf {
        self.dir().join(compress::member_name(name, file))
    }

    fn sidecar_path(&self, name: &str, kind: BackupKind) -> PathBuf {
        match kind {
            BackupKind::Directory => self.directory_path(name).join(DIRECTORY_SIDECAR),
            BackupKind::Compressed => self
                .dir()
                .join(format!("{name}{COMPRESSED_SIDECAR_SUFFIX}")),
        }
    }

    /// Snapshot every discovered env file.
    ///
    /// Fails with [`EnvxError::NoFilesFound`] without touching the disk when
    /// there is nothing to capture.
    pub fn create(&self, opts: &CreateOptions) -> EnvxResult<BackupRecord> {
        let files = self.project.discover_env_files()?;
        if files.is_empty() {
            return Err(EnvxError::NoFilesFound {
                dir: self.project.root().to_path_buf(),
            });
        }

        let mut contents = Vec::with_capacity(files.len());
        for file in &files {
            let path = self.project.root().join(file);
            let data = std::fs::read(&path).map_err(|e| EnvxError::io(&path, e))?;
            contents.push((file.clone(), data));
        }

        let created_at = Utc::now();
        let name = match &opts.name {
            Some(name) => {
                validate_name(name, self.project.active_name())?;
                if self.name_taken(name)? {
                    return Err(EnvxError::BackupExists { name: name.clone() });
                }
                name.clone()
            }
            None => self.auto_name(created_at)?,
        };
        let kind = if opts.compress {
            BackupKind::Compressed
        } else {
            BackupKind::Directory
        };

        let record = BackupRecord {
            name,
            created_at,
            kind,
            files,
            total_size_bytes: contents.iter().map(|(_, data)| data.len() as u64).sum(),
            checksums: contents
                .iter()
                .map(|(file, data)| (file.clone(), blake3::hash(data).to_hex().to_string()))
                .collect(),
        };

        match kind {
            BackupKind::Directory => {
                let target = self.directory_path(&record.name);
                std::fs::create_dir_all(&target).map_err(|e| EnvxError::io(&target, e))?;
                for (file, data) in &contents {
                    let path = target.join(file);
                    std::fs::write(&path, data).map_err(|e| EnvxError::io(&path, e))?;
                }
            }
            BackupKind::Compressed => {
                let dir = self.dir();
                std::fs::create_dir_all(&dir).map_err(|e| EnvxError::io(&dir, e))?;
                let level = self.project.config().backup.compression_level;
                for (file, data) in &contents {
                    let path = self.member_path(&record.name, file);
                    let packed = compress::compress(data, level)?;
                    std::fs::write(&path, packed).map_err(|e| EnvxError::io(&path, e))?;
                }
            }
        }
        self.write_sidecar(&record)?;

        tracing::info!(
            backup = %record.name,
            kind = %record.kind,
            files = record.files.len(),
            bytes = record.total_size_bytes,
            "created backup"
        );
        Ok(record)
    }

    /// All backups, newest first (ties broken by name, descending).
    pub fn list(&self) -> EnvxResult<Vec<BackupRecord>> {
        let dir = self.dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EnvxError::io(&dir, e)),
        };

        let active = self.project.active_name();
        let mut records = Vec::new();
        let mut members: BTreeMap<String, Vec<(String, std::fs::Metadata)>> = BTreeMap::new();
        let mut compressed_sidecars: HashMap<String, PathBuf> = HashMap::new();

        for entry in entries {
            let entry = entry.map_err(|e| EnvxError::io(&dir, e))?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().map_err(|e| EnvxError::io(&path, e))?;

            if meta.is_dir() {
                if let Some(record) = self.load_directory_backup(&file_name, &path)? {
                    records.push(record);
                }
            } else if let Some(name) = file_name.strip_suffix(COMPRESSED_SIDECAR_SUFFIX) {
                compressed_sidecars.insert(name.to_string(), path);
            } else if let Some((name, file)) = compress::parse_member_name(&file_name, active) {
                members
                    .entry(name.to_string())
                    .or_default()
                    .push((file.to_string(), meta));
            }
        }

        let mut names: Vec<String> = members.keys().cloned().collect();
        names.extend(
            compressed_sidecars
                .keys()
                .filter(|n| !members.contains_key(*n))
                .cloned(),
        );
        for name in names {
            let from_sidecar = match compressed_sidecars.get(&name) {
                Some(path) => read_sidecar(path),
                None => None,
            };
            let record = match (from_sidecar, members.remove(&name)) {
                (Some(mut record), _) => {
                    record.name = name.clone();
                    record.kind = BackupKind::Compressed;
                    record
                }
                (None, Some(group)) => reconstruct_compressed(&name, group),
                (None, None) => continue,
            };
            records.push(record);
        }

        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Exact-name lookup.
    pub fn find(&self, name: &str) -> EnvxResult<Option<BackupRecord>> {
        Ok(self.list()?.into_iter().find(|r| r.name == name))
    }

    fn load_directory_backup(&self, name: &str, path: &Path) -> EnvxResult<Option<BackupRecord>> {
        if let Some(mut record) = read_sidecar(&path.join(DIRECTORY_SIDECAR)) {
            // the on-disk name wins over the one recorded at creation
            record.name = name.to_string();
            record.kind = BackupKind::Directory;
            return Ok(Some(record));
        }

        let mut files = Vec::new();
        let mut total_size_bytes = 0u64;
        let mut newest: Option<std::time::SystemTime> = None;
        for entry in std::fs::read_dir(path).map_err(|e| EnvxError::io(path, e))? {
            let entry = entry.map_err(|e| EnvxError::io(path, e))?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            let meta = entry.metadata().map_err(|e| EnvxError::io(entry.path(), e))?;
            if !meta.is_file() || file_name == DIRECTORY_SIDECAR {
                continue;
            }
            total_size_bytes += meta.len();
            newest = newest.max(meta.modified().ok());
            files.push(file_name);
        }
        if files.is_empty() {
            tracing::debug!(backup = name, "skipping empty backup directory");
            return Ok(None);
        }
        files.sort();

        let created_at = newest
            .or_else(|| std::fs::metadata(path).and_then(|m| m.modified()).ok())
            .map(DateTime::<Utc>::from)
            .unwrap_or_default();

        Ok(Some(BackupRecord {
            name: name.to_string(),
            created_at,
            kind: BackupKind::Directory,
            files,
            total_size_bytes,
            checksums: BTreeMap::new(),
        }))
    }

    fn write_sidecar(&self, record: &BackupRecord) -> EnvxResult<()> {
        let path = self.sidecar_path(&record.name, record.kind);
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| anyhow::anyhow!("serializing backup metadata: {e}"))?;
        std::fs::write(&path, json).map_err(|e| EnvxError::io(&path, e))
    }

    fn name_taken(&self, name: &str) -> EnvxResult<bool> {
        if self.directory_path(name).exists()
            || self.sidecar_path(name, BackupKind::Compressed).exists()
        {
            return Ok(true);
        }
        let dir = self.dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(EnvxError::io(&dir, e)),
        };
        let active = self.project.active_name();
        for entry in entries {
            let entry = entry.map_err(|e| EnvxError::io(&dir, e))?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if compress::parse_member_name(&file_name, active).is_some_and(|(b, _)| b == name) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn auto_name(&self, now: DateTime<Utc>) -> EnvxResult<String> {
        let base = now.format(AUTO_NAME_FORMAT).to_string();
        if !self.name_taken(&base)? {
            return Ok(base);
        }
        for n in 1u32.. {
            let candidate = format!("{base}-{n}");
            if !self.name_taken(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(EnvxError::InvalidInput(format!("no free backup name for {base}")))
    }
}

/// Check an explicit backup name.
pub fn validate_name(name: &str, active: &str) -> EnvxResult<()> {
    let problem = if name.is_empty() {
        Some("must not be empty".to_string())
    } else if name.contains('/') || name.contains('\\') {
        Some("must not contain path separators".to_string())
    } else if name.starts_with('.') {
        Some("must not start with '.'".to_string())
    } else if name.contains(&format!("_{active}")) {
        Some(format!("must not contain '_{active}'"))
    } else {
        None
    };
    match problem {
        Some(p) => Err(EnvxError::InvalidInput(format!("backup name '{name}' {p}"))),
        None => Ok(()),
    }
}

fn read_sidecar(path: &Path) -> Option<BackupRecord> {
    let data = std::fs::read(path).ok()?;
    match serde_json::from_slice(&data) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "ignoring unreadable backup metadata"
            );
            None
        }
    }
}

fn reconstruct_compressed(name: &str, group: Vec<(String, std::fs::Metadata)>) -> BackupRecord {
    let created_at = group
        .iter()
        .filter_map(|(_, meta)| meta.modified().ok())
        .max()
        .map(DateTime::<Utc>::from)
        .unwrap_or_default();
    let mut files: Vec<String> = group.iter().map(|(file, _)| file.clone()).collect();
    files.sort();

    BackupRecord {
        name: name.to_string(),
        created_at,
        kind: BackupKind::Compressed,
        files,
        // Compressed sizes; the originals are unknown without metadata
        total_size_bytes: group.iter().map(|(_, meta)| meta.len()).sum(),
        checksums: BTreeMap::new(),
    }
}

fn sort_newest_first(records: &mut [BackupRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.name.cmp(&a.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(name: &str, secs: i64) -> BackupRecord {
        BackupRecord {
            name: name.into(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            kind: BackupKind::Directory,
            files: vec![".env".into()],
            total_size_bytes: 1,
            checksums: BTreeMap::new(),
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("before-upgrade", ".env").is_ok());
        assert!(validate_name("2026-03-01T10-00-00", ".env").is_ok());
        for bad in ["", "a/b", "a\\b", ".hidden", "snap_.env"] {
            let err = validate_name(bad, ".env").unwrap_err();
            assert_eq!(err.kind(), "invalid_input", "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_sort_newest_first_with_name_tiebreak() {
        let mut records = vec![
            record("a", 100),
            record("c", 300),
            record("b", 300),
            record("d", 200),
        ];
        sort_newest_first(&mut records);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn test_auto_name_format_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        let a = early.format(AUTO_NAME_FORMAT).to_string();
        let b = late.format(AUTO_NAME_FORMAT).to_string();
        assert_eq!(a, "2026-01-09T23-59-59");
        assert!(a < b);
    }
}
