use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::error::{EnvxError, EnvxResult};

/// File name looked up in the project root when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = ".envx.toml";

/// Top-level configuration (loaded from .envx.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvxConfig {
    pub files: FilesConfig,
    pub backup: BackupConfig,
    pub crypto: CryptoConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// The active env file that applications read (default: .env)
    pub active: String,
    /// Reference schema file, never backed up or switched to (default: .env.example)
    pub example: String,
    /// Suffix appended to whole-file encrypted output (default: .enc)
    pub encrypted_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Backup area, relative to the project root
    pub dir: PathBuf,
    /// Back up automatically before switch/encrypt/decrypt/restore
    pub auto: bool,
    /// Store new backups zstd-compressed
    pub compress: bool,
    /// zstd compression level
    pub compression_level: i32,
}

/// Encryption configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
    /// Environment variable consulted when no password is passed explicitly
    pub password_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            active: ".env".into(),
            example: ".env.example".into(),
            encrypted_suffix: ".enc".into(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".envx/backups"),
            auto: true,
            compress: false,
            compression_level: 3,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            password_env: "ENVX_PASSWORD".into(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl EnvxConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> EnvxResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| EnvxError::io(path, e))?;
        let config: EnvxConfig = toml::from_str(&content)
            .map_err(|e| EnvxError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make file discovery or naming ambiguous.
    pub fn validate(&self) -> EnvxResult<()> {
        if self.files.active.is_empty() || self.files.active.contains(['/', '\\']) {
            return Err(EnvxError::Config(format!(
                "files.active must be a plain file name, got '{}'",
                self.files.active
            )));
        }
        if self.files.encrypted_suffix.is_empty() {
            return Err(EnvxError::Config("files.encrypted_suffix must not be empty".into()));
        }
        if self.backup.dir.is_absolute() {
            return Err(EnvxError::Config(format!(
                "backup.dir must be relative to the project root, got {}",
                self.backup.dir.display()
            )));
        }
        let mut components = self.backup.dir.components();
        let inside_root = components.clone().any(|c| matches!(c, Component::Normal(_)))
            && !components.any(|c| matches!(c, Component::ParentDir));
        if !inside_root {
            return Err(EnvxError::Config(format!(
                "backup.dir must name a directory inside the project root, got '{}'",
                self.backup.dir.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[files]
active = ".env"
example = ".env.sample"
encrypted_suffix = ".sealed"

[backup]
dir = ".config/envx/backups"
auto = false
compress = true
compression_level = 9

[crypto]
argon2_mem_cost_kib = 131072
argon2_time_cost = 4
argon2_parallelism = 8
password_env = "MY_ENV_PASSWORD"

[log]
level = "debug"
format = "json"
"#;
        let config: EnvxConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.files.example, ".env.sample");
        assert_eq!(config.files.encrypted_suffix, ".sealed");
        assert_eq!(config.backup.dir, PathBuf::from(".config/envx/backups"));
        assert!(!config.backup.auto);
        assert!(config.backup.compress);
        assert_eq!(config.backup.compression_level, 9);
        assert_eq!(config.crypto.argon2_mem_cost_kib, 131072);
        assert_eq!(config.crypto.password_env, "MY_ENV_PASSWORD");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: EnvxConfig = toml::from_str("").unwrap();

        assert_eq!(config.files.active, ".env");
        assert_eq!(config.files.example, ".env.example");
        assert_eq!(config.files.encrypted_suffix, ".enc");
        assert_eq!(config.backup.dir, PathBuf::from(".envx/backups"));
        assert!(config.backup.auto);
        assert!(!config.backup.compress);
        assert_eq!(config.crypto.argon2_mem_cost_kib, 65536);
        assert_eq!(config.crypto.password_env, "ENVX_PASSWORD");
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[backup]
compress = true
"#;
        let config: EnvxConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert!(config.backup.compress);
        // Defaults
        assert!(config.backup.auto);
        assert_eq!(config.backup.compression_level, 3);
        assert_eq!(config.files.active, ".env");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = EnvxConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: EnvxConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.files.active, parsed.files.active);
        assert_eq!(config.backup.dir, parsed.backup.dir);
        assert_eq!(config.crypto.password_env, parsed.crypto.password_env);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EnvxConfig::load(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config.files.active, ".env");
    }

    #[test]
    fn test_load_rejects_absolute_backup_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[backup]\ndir = \"/var/backups\"\n").unwrap();

        let err = EnvxConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_validate_backup_dir_stays_inside_root() {
        for bad in ["", ".", "./", "..", "../backups", "backups/../../x"] {
            let mut config = EnvxConfig::default();
            config.backup.dir = PathBuf::from(bad);
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind(), "config", "accepted backup.dir = {bad:?}");
        }
        for good in [".envx/backups", "./backups", "backups"] {
            let mut config = EnvxConfig::default();
            config.backup.dir = PathBuf::from(good);
            assert!(config.validate().is_ok(), "rejected backup.dir = {good:?}");
        }
    }
}
