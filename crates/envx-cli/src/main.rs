//! envx: manage, back up and encrypt `.env` files
//!
//! Commands:
//!   switch <variant>          - copy .env.<variant> over .env
//!   list                      - list variants, marking the active one
//!   validate                  - check .env against .env.example
//!   encrypt / decrypt [FILE]  - whole-file or per-value encryption
//!   backup create | list      - snapshot env files into .envx/backups
//!   restore <REF>             - replay a snapshot
//!   gitignore <action>        - manage the .gitignore block
//!   check                     - warn about env files tracked by git
//!   config show               - display current configuration

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::path::{Path, PathBuf};

use envx_backup::{BackupStore, CreateOptions, RestoreOptions};
use envx_core::config::DEFAULT_CONFIG_FILE;
use envx_core::gitignore::GitignoreAction;
use envx_core::{EnvxConfig, EnvxError, KeyValueBody, Project};
use envx_crypto::{CryptoMode, DecryptOptions, EncryptOptions, KdfParams, INLINE_MARKER};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "envx",
    version,
    about = "Manage, back up and encrypt .env files",
    long_about = "envx: switch between .env variants, validate them against .env.example, \
                  keep timestamped backups and encrypt secrets with a password"
)]
struct Cli {
    /// Project directory (default: current directory)
    #[arg(long, short = 'C', global = true)]
    dir: Option<PathBuf>,

    /// Path to configuration file (default: <dir>/.envx.toml)
    #[arg(long, short = 'c', env = "ENVX_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); default from config
    #[arg(long, env = "ENVX_LOG", global = true)]
    log: Option<String>,

    /// Log format (json, text); default from config
    #[arg(long, env = "ENVX_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Make .env.<variant> the active env file
    Switch {
        /// Variant name (e.g. `production` for .env.production)
        variant: String,
        /// Skip the automatic backup
        #[arg(long)]
        no_backup: bool,
        /// Continue even if the automatic backup fails
        #[arg(long)]
        force: bool,
    },

    /// List available variants
    List,

    /// Validate an env file against the example file
    Validate {
        /// File to validate (default: the active file)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Schema file (default: the configured example file)
        #[arg(long)]
        example: Option<PathBuf>,
    },

    /// Encrypt a whole file, or every value in it with --key
    Encrypt {
        /// File to encrypt (default: the active file)
        file: Option<PathBuf>,
        /// Encrypt values in place; the key must exist in the file
        #[arg(long, short = 'k')]
        key: Option<String>,
        /// Output path (default: <file>.enc, or in place with --key)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        #[command(flatten)]
        password: PasswordArgs,
        /// Overwrite an existing output; continue if the automatic backup fails
        #[arg(long)]
        force: bool,
        /// Skip the automatic backup
        #[arg(long)]
        no_backup: bool,
    },

    /// Decrypt a .enc file, or the encrypted values inside an env file
    Decrypt {
        /// File to decrypt (default: <active>.enc if present, else the active file)
        file: Option<PathBuf>,
        /// Output path (default: the file name without .enc, or in place)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        #[command(flatten)]
        password: PasswordArgs,
        /// Overwrite an existing output; continue if the automatic backup fails
        #[arg(long)]
        force: bool,
        /// Skip the automatic backup
        #[arg(long)]
        no_backup: bool,
    },

    /// Backup management
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Restore env files from a backup
    Restore {
        /// Backup name, or a date prefix such as 2026-03-01
        reference: String,
        /// Overwrite existing env files
        #[arg(long)]
        force: bool,
        /// Check the backup's files and checksums before writing
        #[arg(long)]
        verify: bool,
        /// Back up the current env files first
        #[arg(long)]
        backup_current: bool,
    },

    /// Manage the envx block in .gitignore
    Gitignore {
        #[arg(value_enum)]
        action: GitignoreCmd,
    },

    /// Report env files tracked by git
    Check,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct PasswordArgs {
    /// Encryption password (default: the ENVX_PASSWORD environment variable)
    #[arg(long, short = 'p')]
    password: Option<String>,
    /// Prompt for the password on the terminal
    #[arg(long, conflicts_with = "password")]
    ask_password: bool,
}

#[derive(Subcommand, Debug)]
enum BackupAction {
    /// Snapshot every env file in the project
    Create {
        /// Backup name (default: current UTC time)
        #[arg(long, short = 'n')]
        name: Option<String>,
        /// Store files zstd-compressed
        #[arg(long)]
        compress: bool,
    },
    /// List backups, newest first
    List,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GitignoreCmd {
    Add,
    Remove,
    Status,
}

impl From<GitignoreCmd> for GitignoreAction {
    fn from(cmd: GitignoreCmd) -> Self {
        match cmd {
            GitignoreCmd::Add => GitignoreAction::Add,
            GitignoreCmd::Remove => GitignoreAction::Remove,
            GitignoreCmd::Status => GitignoreAction::Status,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = std::path::absolute(cli.dir.as_deref().unwrap_or(Path::new(".")))
        .context("resolving project directory")?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE));
    let config = EnvxConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        root = %root.display(),
        config = %config_path.display(),
        "envx starting"
    );

    let project = Project::new(root, config);

    match cli.command {
        Commands::Switch {
            variant,
            no_backup,
            force,
        } => cmd_switch(&project, &variant, no_backup, force),
        Commands::List => cmd_list(&project),
        Commands::Validate { file, example } => {
            cmd_validate(&project, file.as_deref(), example.as_deref())
        }
        Commands::Encrypt {
            file,
            key,
            output,
            password,
            force,
            no_backup,
        } => cmd_encrypt(
            &project,
            file.as_deref(),
            key.as_deref(),
            output.as_deref(),
            &password,
            force,
            no_backup,
        ),
        Commands::Decrypt {
            file,
            output,
            password,
            force,
            no_backup,
        } => cmd_decrypt(
            &project,
            file.as_deref(),
            output.as_deref(),
            &password,
            force,
            no_backup,
        ),
        Commands::Backup {
            action: BackupAction::Create { name, compress },
        } => cmd_backup_create(&project, name, compress),
        Commands::Backup {
            action: BackupAction::List,
        } => cmd_backup_list(&project),
        Commands::Restore {
            reference,
            force,
            verify,
            backup_current,
        } => cmd_restore(&project, &reference, force, verify, backup_current),
        Commands::Gitignore { action } => cmd_gitignore(&project, action.into()),
        Commands::Check => cmd_check(&project),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(project.config(), &config_path),
    }
}

/// Logs go to stderr so command output on stdout stays pipeable.
fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Password precedence: --password, then --ask-password, then the env var.
fn read_password(config: &EnvxConfig, args: &PasswordArgs) -> Result<SecretString> {
    let explicit = match (&args.password, args.ask_password) {
        (Some(p), _) => Some(p.clone()),
        (None, true) => {
            Some(rpassword::prompt_password("Password: ").context("reading password")?)
        }
        (None, false) => None,
    };
    Ok(envx_core::password::resolve_password(
        explicit,
        &config.crypto.password_env,
    )?)
}

/// Snapshot the env files before a destructive command.
///
/// Nothing to back up is not an error. Any other failure aborts the command
/// unless `force` is set.
fn auto_backup(project: &Project, no_backup: bool, force: bool) -> Result<Option<String>> {
    if no_backup || !project.config().backup.auto {
        return Ok(None);
    }
    let opts = CreateOptions {
        name: None,
        compress: project.config().backup.compress,
    };
    match BackupStore::new(project).create(&opts) {
        Ok(record) => {
            println!("Backup: {}", record.name);
            Ok(Some(record.name))
        }
        Err(EnvxError::NoFilesFound { .. }) => Ok(None),
        Err(e) if force => {
            tracing::warn!(error = %e, "automatic backup failed, continuing (--force)");
            eprintln!("warning: automatic backup failed: {e}");
            Ok(None)
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context("automatic backup failed (use --no-backup or --force to continue)")),
    }
}

fn warn_if_tracked(project: &Project) {
    let active = project.active_name().to_string();
    let tracked = envx_core::git::tracked_files(project.root(), std::slice::from_ref(&active));
    if !tracked.is_empty() {
        eprintln!(
            "warning: {active} is tracked by git; run `envx gitignore add` and \
             `git rm --cached {active}`"
        );
    }
}

fn file_digest(path: &Path) -> Option<blake3::Hash> {
    std::fs::read(path).ok().map(|data| blake3::hash(&data))
}

/// Default decrypt input: `<active><suffix>` when it exists, else the active file.
fn default_decrypt_input(project: &Project) -> PathBuf {
    let encrypted = format!("{}{}", project.active_name(), project.encrypted_suffix());
    if project.root().join(&encrypted).is_file() {
        PathBuf::from(encrypted)
    } else {
        PathBuf::from(project.active_name())
    }
}

fn read_body(path: &Path) -> Result<KeyValueBody> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(KeyValueBody::parse(&text))
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ── `envx switch` / `envx list` ───────────────────────────────────────────────

fn cmd_switch(project: &Project, variant: &str, no_backup: bool, force: bool) -> Result<()> {
    let variant_name = project.variant_name(variant);
    let source = project.root().join(&variant_name);

    if project.is_encrypted_name(&variant_name) || !source.is_file() {
        let available = project.variants()?;
        let hint = if available.is_empty() {
            "none".to_string()
        } else {
            available.join(", ")
        };
        return Err(EnvxError::InvalidInput(format!(
            "variant '{variant}' not found (available: {hint})"
        ))
        .into());
    }

    auto_backup(project, no_backup, force)?;

    let target = project.active_path();
    std::fs::copy(&source, &target)
        .with_context(|| format!("copying {} -> {}", source.display(), target.display()))?;
    tracing::info!(variant, "switched active env file");

    println!("Switched {} to {variant_name}", project.active_name());
    warn_if_tracked(project);
    Ok(())
}

fn cmd_list(project: &Project) -> Result<()> {
    let variants = project.variants()?;
    if variants.is_empty() {
        println!(
            "No variants found (expected files named {}.<name>)",
            project.active_name()
        );
        return Ok(());
    }

    let active = file_digest(&project.active_path());
    for variant in variants {
        let digest = file_digest(&project.root().join(project.variant_name(&variant)));
        let marker = if active.is_some() && digest == active {
            "*"
        } else {
            " "
        };
        println!("{marker} {variant}");
    }
    Ok(())
}

// ── `envx validate` ───────────────────────────────────────────────────────────

fn cmd_validate(project: &Project, file: Option<&Path>, example: Option<&Path>) -> Result<()> {
    let file = file
        .map(|p| project.root().join(p))
        .unwrap_or_else(|| project.active_path());
    let example = example
        .map(|p| project.root().join(p))
        .unwrap_or_else(|| project.example_path());

    let body = read_body(&file)?;
    let schema = read_body(&example)?;
    let report = envx_core::schema::validate(&body, &schema, INLINE_MARKER);

    for key in &report.missing {
        println!("  missing:  {key}");
    }
    for key in &report.empty {
        println!("  empty:    {key}");
    }
    for m in &report.type_mismatches {
        println!("  type:     {} (expected {}, got {:?})", m.key, m.expected, m.value);
    }
    for key in &report.extra {
        println!("  extra:    {key} (not in {})", example.display());
    }

    if !report.is_valid() {
        anyhow::bail!(
            "{} failed validation against {}",
            file.display(),
            example.display()
        );
    }
    println!("{} is valid", file.display());
    Ok(())
}

// ── `envx encrypt` / `envx decrypt` ───────────────────────────────────────────

fn cmd_encrypt(
    project: &Project,
    file: Option<&Path>,
    key: Option<&str>,
    output: Option<&Path>,
    password_args: &PasswordArgs,
    force: bool,
    no_backup: bool,
) -> Result<()> {
    let input = file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(project.active_name()));
    let password = read_password(project.config(), password_args)?;
    let opts = EncryptOptions {
        output,
        target_key: key,
        force,
    };
    envx_crypto::check_encrypt(project, &input, &opts)
        .with_context(|| format!("encrypting {}", input.display()))?;
    auto_backup(project, no_backup, force)?;

    let params = KdfParams::from(&project.config().crypto);
    let outcome = envx_crypto::encrypt_file(project, &input, &password, &params, &opts)
        .with_context(|| format!("encrypting {}", input.display()))?;

    match outcome.mode {
        CryptoMode::WholeFile => println!(
            "Encrypted {} → {}",
            outcome.input.display(),
            outcome.output.display()
        ),
        CryptoMode::Values => println!(
            "Encrypted {} value(s) in {}",
            outcome.keys.len(),
            outcome.output.display()
        ),
    }
    Ok(())
}

fn cmd_decrypt(
    project: &Project,
    file: Option<&Path>,
    output: Option<&Path>,
    password_args: &PasswordArgs,
    force: bool,
    no_backup: bool,
) -> Result<()> {
    let input = file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_decrypt_input(project));
    let password = read_password(project.config(), password_args)?;
    let opts = DecryptOptions { output, force };
    envx_crypto::check_decrypt(project, &input, &opts)
        .with_context(|| format!("decrypting {}", input.display()))?;
    auto_backup(project, no_backup, force)?;

    let outcome = envx_crypto::decrypt_file(project, &input, &password, &opts)
        .with_context(|| format!("decrypting {}", input.display()))?;

    match outcome.mode {
        CryptoMode::WholeFile => println!(
            "Decrypted {} → {}",
            outcome.input.display(),
            outcome.output.display()
        ),
        CryptoMode::Values => println!(
            "Decrypted {} value(s) in {}",
            outcome.keys.len(),
            outcome.output.display()
        ),
    }

    if !outcome.failures.is_empty() {
        for f in &outcome.failures {
            eprintln!("  line {}: {}: {}", f.line, f.key, f.error);
        }
        anyhow::bail!(
            "{} value(s) left encrypted in {}",
            outcome.failures.len(),
            outcome.output.display()
        );
    }
    Ok(())
}

// ── `envx backup` / `envx restore` ────────────────────────────────────────────

fn cmd_backup_create(project: &Project, name: Option<String>, compress: bool) -> Result<()> {
    let opts = CreateOptions {
        name,
        compress: compress || project.config().backup.compress,
    };
    let record = BackupStore::new(project)
        .create(&opts)
        .context("creating backup")?;

    println!("Created backup {}", record.name);
    println!("  kind:   {}", record.kind);
    println!("  files:  {}", record.files.join(", "));
    println!("  size:   {}", fmt_bytes(record.total_size_bytes));
    Ok(())
}

fn cmd_backup_list(project: &Project) -> Result<()> {
    let store = BackupStore::new(project);
    let records = store.list().context("listing backups")?;
    if records.is_empty() {
        println!("No backups in {}", store.dir().display());
        return Ok(());
    }

    println!("{:<28} {:<20} {:<11} {:>5} {:>10}", "NAME", "CREATED", "KIND", "FILES", "SIZE");
    for r in &records {
        println!(
            "{:<28} {:<20} {:<11} {:>5} {:>10}",
            r.name,
            r.created_at.format("%Y-%m-%d %H:%M:%S"),
            r.kind.to_string(),
            r.files.len(),
            fmt_bytes(r.total_size_bytes),
        );
    }
    Ok(())
}

fn cmd_restore(
    project: &Project,
    reference: &str,
    force: bool,
    verify: bool,
    backup_current: bool,
) -> Result<()> {
    let store = BackupStore::new(project);
    let record = envx_backup::resolve(&store, reference)?;

    // Overwriting is destructive, so the auto-backup policy applies to it too
    let opts = RestoreOptions {
        force,
        verify,
        backup_current_first: backup_current || (force && project.config().backup.auto),
    };
    let outcome = envx_backup::restore(&store, &record, &opts)
        .with_context(|| format!("restoring backup {}", record.name))?;

    if let Some(safety) = &outcome.pre_restore_backup {
        println!("Backup: {safety}");
    }
    println!("Restored {} from {}", outcome.restored.join(", "), outcome.backup);
    if !outcome.overwritten.is_empty() {
        println!("  overwritten: {}", outcome.overwritten.join(", "));
    }
    Ok(())
}

// ── `envx gitignore` / `envx check` ───────────────────────────────────────────

fn cmd_gitignore(project: &Project, action: GitignoreAction) -> Result<()> {
    let report = envx_core::gitignore::apply(project, action)?;
    for (entry, present) in &report.entries {
        println!("  [{}] {entry}", if *present { "x" } else { " " });
    }
    match (action, report.changed) {
        (GitignoreAction::Add, true) => println!("Updated .gitignore"),
        (GitignoreAction::Remove, true) => println!("Removed envx block from .gitignore"),
        (GitignoreAction::Status, _) => {}
        (_, false) => println!(".gitignore unchanged"),
    }
    Ok(())
}

fn cmd_check(project: &Project) -> Result<()> {
    let files = project.discover_env_files()?;
    let tracked = envx_core::git::tracked_files(project.root(), &files);
    if tracked.is_empty() {
        println!("No env files are tracked by git");
        return Ok(());
    }
    for file in &tracked {
        println!("  tracked: {file}");
    }
    anyhow::bail!(
        "{} env file(s) tracked by git; untrack with `git rm --cached <file>`",
        tracked.len()
    )
}

// ── `envx config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &EnvxConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_encrypt_flags() {
        let cli = Cli::parse_from([
            "envx", "-C", "/tmp/app", "encrypt", ".env.local", "--key", "API_KEY", "--force",
        ]);
        match cli.command {
            Commands::Encrypt {
                file, key, force, ..
            } => {
                assert_eq!(file, Some(PathBuf::from(".env.local")));
                assert_eq!(key.as_deref(), Some("API_KEY"));
                assert!(force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/app")));
    }

    #[test]
    fn password_flags_conflict() {
        let res = Cli::try_parse_from(["envx", "decrypt", "--password", "x", "--ask-password"]);
        assert!(res.is_err());
    }

    #[test]
    fn default_decrypt_input_prefers_encrypted_file() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path(), EnvxConfig::default());
        assert_eq!(default_decrypt_input(&project), PathBuf::from(".env"));

        std::fs::write(tmp.path().join(".env.enc"), b"x").unwrap();
        assert_eq!(default_decrypt_input(&project), PathBuf::from(".env.enc"));
    }

    #[test]
    fn auto_backup_respects_no_backup_and_empty_projects() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::new(tmp.path(), EnvxConfig::default());

        assert_eq!(auto_backup(&project, false, false).unwrap(), None);

        std::fs::write(tmp.path().join(".env"), b"A=1\n").unwrap();
        assert_eq!(auto_backup(&project, true, false).unwrap(), None);
        assert!(auto_backup(&project, false, false).unwrap().is_some());
    }

    #[test]
    fn failed_checks_leave_no_auto_backup() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".env"), b"A=1\n").unwrap();
        std::fs::write(tmp.path().join(".env.enc"), b"x").unwrap();
        let project = Project::new(tmp.path(), EnvxConfig::default());
        let pw = PasswordArgs {
            password: Some("pw".into()),
            ask_password: false,
        };

        // already suffixed
        let enc = Path::new(".env.enc");
        assert!(cmd_encrypt(&project, Some(enc), None, None, &pw, false, false).is_err());
        // unknown key
        let env = Path::new(".env");
        let missing_key = cmd_encrypt(&project, Some(env), Some("NOPE"), None, &pw, false, false);
        assert!(missing_key.is_err());
        // .env exists and --force not given
        assert!(cmd_decrypt(&project, Some(enc), None, &pw, false, false).is_err());

        assert!(BackupStore::new(&project).list().unwrap().is_empty());
        assert!(!tmp.path().join(".envx").exists());
    }

    #[test]
    fn fmt_bytes_units() {
        assert_eq!(fmt_bytes(12), "12 B");
        assert_eq!(fmt_bytes(2048), "2.0 KB");
        assert_eq!(fmt_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
