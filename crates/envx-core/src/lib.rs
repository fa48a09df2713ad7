pub mod config;
pub mod error;
pub mod git;
pub mod gitignore;
pub mod kvfile;
pub mod password;
pub mod project;
pub mod schema;
pub mod types;

pub use config::EnvxConfig;
pub use error::{EnvxError, EnvxResult};
pub use kvfile::{KeyValueBody, Line};
pub use project::Project;
pub use types::{BackupKind, BackupRecord, RestoreOutcome};
