//! envx-backup: point-in-time snapshots of a project's env files
//!
//! Snapshots are taken on demand or automatically before destructive
//! operations, and replayed by the restore engine with overwrite protection.

pub mod compress;
pub mod restore;
pub mod store;

pub use restore::{resolve, restore, verify, RestoreOptions};
pub use store::{validate_name, BackupStore, CreateOptions};
