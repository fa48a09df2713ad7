use std::path::{Path, PathBuf};

use thiserror::Error;

pub type EnvxResult<T> = Result<T, EnvxError>;

/// Maximum number of backup names carried by [`EnvxError::BackupNotFound`].
pub const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Error)]
pub enum EnvxError {
    #[error("password required: pass --password or set the {env_var} environment variable")]
    PasswordRequired { env_var: String },

    #[error("key '{key}' not found in file")]
    KeyNotFound { key: String },

    /// Tag verification failed. The message never says which check failed.
    #[error("decryption failed: invalid password or corrupted data")]
    Integrity,

    #[error("invalid encrypted container: {0}")]
    Format(String),

    #[error("no env files found in {}", dir.display())]
    NoFilesFound { dir: PathBuf },

    #[error("backup '{reference}' not found{}", fmt_available(available))]
    BackupNotFound {
        reference: String,
        available: Vec<String>,
    },

    #[error("backup '{name}' already exists")]
    BackupExists { name: String },

    #[error("refusing to overwrite existing files (use --force): {}", files.join(", "))]
    OverwriteRefused { files: Vec<String> },

    #[error("backup verification failed: {}", problems.join("; "))]
    Verification { problems: Vec<String> },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EnvxError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        EnvxError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Stable machine-readable error kind, used in structured outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            EnvxError::PasswordRequired { .. } => "password_required",
            EnvxError::KeyNotFound { .. } => "key_not_found",
            EnvxError::Integrity => "integrity",
            EnvxError::Format(_) => "format",
            EnvxError::NoFilesFound { .. } => "no_files_found",
            EnvxError::BackupNotFound { .. } => "backup_not_found",
            EnvxError::BackupExists { .. } => "backup_exists",
            EnvxError::OverwriteRefused { .. } => "overwrite_refused",
            EnvxError::Verification { .. } => "verification",
            EnvxError::InvalidInput(_) => "invalid_input",
            EnvxError::Config(_) => "config",
            EnvxError::Io { .. } => "io",
            EnvxError::Other(_) => "other",
        }
    }
}

fn fmt_available(available: &[String]) -> String {
    if available.is_empty() {
        " (no backups available)".to_string()
    } else {
        format!(" (available: {})", available.join(", "))
    }
}
