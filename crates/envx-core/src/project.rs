//! Project layout: where the env files, schema file and backup area live
//!
//! Env file discovery rule: regular files directly inside the project root
//! whose name is the active file name (`.env`) or matches `<active>.*`,
//! excluding the example file. Sub-directories, including the backup area,
//! are never searched.

use std::path::{Path, PathBuf};

use crate::config::EnvxConfig;
use crate::error::{EnvxError, EnvxResult};

/// A project root plus the configuration that names its files.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: EnvxConfig,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, config: EnvxConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &EnvxConfig {
        &self.config
    }

    pub fn active_name(&self) -> &str {
        &self.config.files.active
    }

    pub fn active_path(&self) -> PathBuf {
        self.root.join(&self.config.files.active)
    }

    pub fn example_path(&self) -> PathBuf {
        self.root.join(&self.config.files.example)
    }

    /// `.env.<variant>`
    pub fn variant_name(&self, variant: &str) -> String {
        format!("{}.{variant}", self.config.files.active)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(&self.config.backup.dir)
    }

    pub fn encrypted_suffix(&self) -> &str {
        &self.config.files.encrypted_suffix
    }

    pub fn is_encrypted_name(&self, name: &str) -> bool {
        name.ends_with(self.encrypted_suffix())
    }

    /// True when `name` follows the env file naming convention.
    pub fn is_env_file_name(&self, name: &str) -> bool {
        let active = self.active_name();
        if name == self.config.files.example {
            return false;
        }
        if name == active {
            return true;
        }
        let pattern = format!("{}.*", glob::Pattern::escape(active));
        glob::Pattern::new(&pattern)
            .map(|p| p.matches(name))
            .unwrap_or(false)
    }

    /// Discover env files in the project root, sorted by name.
    pub fn discover_env_files(&self) -> EnvxResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| EnvxError::io(&self.root, e))?;
        let backups = self.backups_dir();

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EnvxError::io(&self.root, e))?;
            let path = entry.path();
            if path.starts_with(&backups) {
                continue;
            }
            let file_type = entry.file_type().map_err(|e| EnvxError::io(&path, e))?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if self.is_env_file_name(&name) {
                found.push(name);
            }
        }
        found.sort();

        tracing::debug!(root = %self.root.display(), count = found.len(), "discovered env files");
        Ok(found)
    }

    /// Variant names (`.env.<variant>` → `<variant>`), excluding encrypted files.
    pub fn variants(&self) -> EnvxResult<Vec<String>> {
        let prefix = format!("{}.", self.active_name());
        Ok(self
            .discover_env_files()?
            .into_iter()
            .filter(|name| !self.is_encrypted_name(name))
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}
