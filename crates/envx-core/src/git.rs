//! Detect env files that are tracked by git.

use std::path::Path;

/// Return the subset of `names` (relative to `root`) that git tracks.
///
/// Outside a repository, or when git is not installed, nothing is reported.
pub fn tracked_files(root: &Path, names: &[String]) -> Vec<String> {
    if names.is_empty() {
        return Vec::new();
    }

    let output = std::process::Command::new("git")
        .arg("ls-files")
        .arg("-z")
        .arg("--")
        .args(names)
        .current_dir(root)
        .output();

    let output = match output {
        Ok(o) => o,
        Err(e) => {
            tracing::debug!("running git ls-files: {e}");
            return Vec::new();
        }
    };

    if !output.status.success() {
        tracing::debug!(
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "git ls-files failed (not a repository?)"
        );
        return Vec::new();
    }

    parse_ls_files(&output.stdout)
}

fn parse_ls_files(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|b| *b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).to_string())
        .collect()
}
