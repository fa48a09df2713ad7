//! Managed `.gitignore` block keeping env files out of version control

use std::path::Path;

use crate::error::{EnvxError, EnvxResult};
use crate::project::Project;

const BLOCK_START: &str = "# >>> envx managed >>>";
const BLOCK_END: &str = "# <<< envx managed <<<";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitignoreAction {
    /// Append the managed block if it is not already present
    Add,
    /// Delete the managed block, leaving every other line alone
    Remove,
    /// Report which entries are present
    Status,
}

#[derive(Debug, Clone, Default)]
pub struct GitignoreReport {
    /// Whether the file changed on disk
    pub changed: bool,
    /// `(entry, present)` for each managed entry, after the action
    pub entries: Vec<(String, bool)>,
}

/// Entries that keep a project's env files and backups untracked.
pub fn managed_entries(project: &Project) -> Vec<String> {
    let files = &project.config().files;
    let backup_top = project
        .config()
        .backup
        .dir
        .components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .unwrap_or_else(|| ".envx".into());
    vec![
        files.active.clone(),
        format!("{}.*", files.active),
        format!("!{}", files.example),
        format!("{backup_top}/"),
    ]
}

pub fn apply(project: &Project, action: GitignoreAction) -> EnvxResult<GitignoreReport> {
    let path = project.root().join(".gitignore");
    let current = read_optional(&path)?;
    let entries = managed_entries(project);

    let updated = match action {
        GitignoreAction::Status => None,
        GitignoreAction::Add => {
            if current.contains(BLOCK_START) {
                None
            } else {
                let mut out = current.clone();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(BLOCK_START);
                out.push('\n');
                for entry in &entries {
                    out.push_str(entry);
                    out.push('\n');
                }
                out.push_str(BLOCK_END);
                out.push('\n');
                Some(out)
            }
        }
        GitignoreAction::Remove => remove_block(&current),
    };

    let changed = updated.is_some();
    let content = match updated {
        Some(content) => {
            std::fs::write(&path, &content).map_err(|e| EnvxError::io(&path, e))?;
            tracing::info!(path = %path.display(), ?action, "updated .gitignore");
            content
        }
        None => current,
    };

    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    Ok(GitignoreReport {
        changed,
        entries: entries
            .into_iter()
            .map(|e| {
                let present = lines.contains(&e.as_str());
                (e, present)
            })
            .collect(),
    })
}

fn remove_block(content: &str) -> Option<String> {
    let start = content.find(BLOCK_START)?;
    let end = content[start..].find(BLOCK_END)? + start + BLOCK_END.len();
    let end = if content[end..].starts_with('\n') { end + 1 } else { end };
    let mut out = String::with_capacity(content.len());
    out.push_str(&content[..start]);
    out.push_str(&content[end..]);
    Some(out)
}

fn read_optional(path: &Path) -> EnvxResult<String> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(EnvxError::io(path, e)),
    }
}
