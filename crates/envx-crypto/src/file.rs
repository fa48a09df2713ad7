//! File-level encrypt/decrypt workflows
//!
//! Naming convention: whole-file output is `<input><suffix>` (`.env` →
//! `.env.enc`). Inputs already carrying the suffix are treated as encrypted:
//! they are rejected by [`encrypt_file`] and decrypted whole by
//! [`decrypt_file`]. Targeted (per-value) mode rewrites the file in place.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use envx_core::{EnvxError, EnvxResult, KeyValueBody, Project};

use crate::engine::{self, ValueFailure, INLINE_MARKER};
use crate::kdf::KdfParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoMode {
    /// The file's bytes are one container
    WholeFile,
    /// Individual values carry inline containers
    Values,
}

#[derive(Debug, Clone, Default)]
pub struct EncryptOptions<'a> {
    /// Output path; defaults per mode (see module docs)
    pub output: Option<&'a Path>,
    /// Switch to targeted mode; the key must exist in the file
    pub target_key: Option<&'a str>,
    /// Allow replacing an existing output file
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct EncryptOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: CryptoMode,
    /// Keys encrypted in targeted mode (empty for whole-file)
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DecryptOptions<'a> {
    pub output: Option<&'a Path>,
    pub force: bool,
}

#[derive(Debug)]
pub struct DecryptOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: CryptoMode,
    /// Keys decrypted in targeted mode (empty for whole-file)
    pub keys: Vec<String>,
    /// Inline values left encrypted
    pub failures: Vec<ValueFailure>,
}

struct EncryptPlan {
    input: PathBuf,
    name: String,
    data: Vec<u8>,
    mode: CryptoMode,
    output: PathBuf,
}

/// Everything [`encrypt_file`] checks before deriving a key or writing:
/// suffix, readable input, target key present, output free.
fn plan_encrypt(
    project: &Project,
    input: &Path,
    opts: &EncryptOptions<'_>,
) -> EnvxResult<EncryptPlan> {
    let input = project.root().join(input);
    let name = file_name(&input)?;
    if project.is_encrypted_name(&name) {
        return Err(EnvxError::InvalidInput(format!(
            "{name} already carries the {} suffix; decrypt it first",
            project.encrypted_suffix()
        )));
    }

    let data = std::fs::read(&input).map_err(|e| EnvxError::io(&input, e))?;

    let (mode, default_output) = match opts.target_key {
        Some(target) => {
            let text = utf8(&data, &name)?;
            if !KeyValueBody::parse(text).contains_key(target) {
                return Err(EnvxError::KeyNotFound {
                    key: target.to_string(),
                });
            }
            (CryptoMode::Values, input.clone())
        }
        None => (
            CryptoMode::WholeFile,
            input.with_file_name(format!("{name}{}", project.encrypted_suffix())),
        ),
    };
    let output = resolve_output(project, &input, opts.output, default_output, opts.force)?;

    Ok(EncryptPlan {
        input,
        name,
        data,
        mode,
        output,
    })
}

/// Run the checks of [`encrypt_file`] without encrypting or writing.
/// Returns the output path the encryption would write.
pub fn check_encrypt(
    project: &Project,
    input: &Path,
    opts: &EncryptOptions<'_>,
) -> EnvxResult<PathBuf> {
    plan_encrypt(project, input, opts).map(|plan| plan.output)
}

/// Encrypt `input` (relative to the project root, or absolute).
pub fn encrypt_file(
    project: &Project,
    input: &Path,
    password: &SecretString,
    params: &KdfParams,
    opts: &EncryptOptions<'_>,
) -> EnvxResult<EncryptOutcome> {
    let EncryptPlan {
        input,
        name,
        data,
        mode,
        output,
    } = plan_encrypt(project, input, opts)?;

    let (bytes, keys) = match opts.target_key {
        Some(target) => {
            let result = engine::encrypt_values(utf8(&data, &name)?, target, password, params)?;
            (result.body.into_bytes(), result.encrypted)
        }
        None => (engine::encrypt_bytes(&data, password, params)?, Vec::new()),
    };

    write_atomic(&output, &bytes)?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        ?mode,
        values = keys.len(),
        "encrypted"
    );

    Ok(EncryptOutcome {
        input,
        output,
        mode,
        keys,
    })
}

struct DecryptPlan {
    input: PathBuf,
    data: Vec<u8>,
    mode: CryptoMode,
    output: PathBuf,
}

fn plan_decrypt(
    project: &Project,
    input: &Path,
    opts: &DecryptOptions<'_>,
) -> EnvxResult<DecryptPlan> {
    let input = project.root().join(input);
    let name = file_name(&input)?;
    let data = std::fs::read(&input).map_err(|e| EnvxError::io(&input, e))?;

    let suffixed = name
        .strip_suffix(project.encrypted_suffix())
        .filter(|stem| !stem.is_empty());

    let mode = match (suffixed, std::str::from_utf8(&data)) {
        (Some(_), _) => CryptoMode::WholeFile,
        (None, Ok(text)) if text.contains(INLINE_MARKER) => CryptoMode::Values,
        (None, _) => CryptoMode::WholeFile,
    };

    let default_output = match suffixed {
        Some(stem) => input.with_file_name(stem),
        None => input.clone(),
    };
    let output = resolve_output(project, &input, opts.output, default_output, opts.force)?;

    Ok(DecryptPlan {
        input,
        data,
        mode,
        output,
    })
}

/// Run the checks of [`decrypt_file`] without decrypting or writing.
/// Returns the output path the decryption would write.
pub fn check_decrypt(
    project: &Project,
    input: &Path,
    opts: &DecryptOptions<'_>,
) -> EnvxResult<PathBuf> {
    plan_decrypt(project, input, opts).map(|plan| plan.output)
}

/// Decrypt `input` (relative to the project root, or absolute).
///
/// Whole-file decryption is all-or-nothing. Targeted decryption writes the
/// output even when some values fail; check [`DecryptOutcome::failures`].
pub fn decrypt_file(
    project: &Project,
    input: &Path,
    password: &SecretString,
    opts: &DecryptOptions<'_>,
) -> EnvxResult<DecryptOutcome> {
    let DecryptPlan {
        input,
        data,
        mode,
        output,
    } = plan_decrypt(project, input, opts)?;

    let outcome = match mode {
        CryptoMode::WholeFile => {
            let plaintext = engine::decrypt_bytes(&data, password)?;
            write_atomic(&output, &plaintext)?;
            DecryptOutcome {
                input,
                output,
                mode,
                keys: Vec::new(),
                failures: Vec::new(),
            }
        }
        CryptoMode::Values => {
            let text = String::from_utf8_lossy(&data);
            let result = engine::decrypt_values(&text, password);
            write_atomic(&output, result.body.as_bytes())?;
            DecryptOutcome {
                input,
                output,
                mode,
                keys: result.decrypted,
                failures: result.failures,
            }
        }
    };

    if outcome.failures.is_empty() {
        tracing::info!(output = %outcome.output.display(), mode = ?outcome.mode, "decrypted");
    } else {
        tracing::warn!(
            output = %outcome.output.display(),
            failed = outcome.failures.len(),
            "decrypted with failures"
        );
    }
    Ok(outcome)
}

fn resolve_output(
    project: &Project,
    input: &Path,
    explicit: Option<&Path>,
    default: PathBuf,
    force: bool,
) -> EnvxResult<PathBuf> {
    let output = explicit
        .map(|p| project.root().join(p))
        .unwrap_or(default);
    if output != input && output.exists() && !force {
        return Err(EnvxError::OverwriteRefused {
            files: vec![output.display().to_string()],
        });
    }
    Ok(output)
}

fn utf8<'a>(data: &'a [u8], name: &str) -> EnvxResult<&'a str> {
    std::str::from_utf8(data)
        .map_err(|_| EnvxError::InvalidInput(format!("{name} is not valid UTF-8 text")))
}

fn file_name(path: &Path) -> EnvxResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| EnvxError::InvalidInput(format!("{} has no file name", path.display())))
}

/// Write to a temp file in the same directory, then rename over `path`.
pub fn write_atomic(path: &Path, content: &[u8]) -> EnvxResult<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    std::fs::write(&tmp_path, content).map_err(|e| EnvxError::io(&tmp_path, e))?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(EnvxError::io(path, e));
    }
    Ok(())
}
