//! Integration tests: backup creation and listing against a scratch project

use std::path::Path;
use std::time::{Duration, SystemTime};

use envx_backup::{BackupStore, CreateOptions};
use envx_core::{BackupKind, EnvxConfig, EnvxError, Project};
use tempfile::TempDir;

fn project_with(files: &[(&str, &str)]) -> (TempDir, Project) {
    let tmp = TempDir::new().unwrap();
    for (name, content) in files {
        std::fs::write(tmp.path().join(name), content).unwrap();
    }
    let project = Project::new(tmp.path(), EnvxConfig::default());
    (tmp, project)
}

fn named(name: &str) -> CreateOptions {
    CreateOptions {
        name: Some(name.to_string()),
        compress: false,
    }
}

fn set_mtime(path: &Path, secs: u64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

#[test]
fn zero_candidates_fail_and_create_nothing() {
    let (tmp, project) = project_with(&[(".env.example", "A=\n"), ("README.md", "hi")]);
    let store = BackupStore::new(&project);

    let err = store.create(&CreateOptions::default()).unwrap_err();
    assert!(matches!(err, EnvxError::NoFilesFound { .. }));
    assert!(!tmp.path().join(".envx").exists());
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn directory_backup_copies_discovered_files() {
    let (tmp, project) = project_with(&[
        (".env", "A=1\n"),
        (".env.local", "A=2\n"),
        (".env.example", "A=\n"),
    ]);
    let store = BackupStore::new(&project);

    let record = store.create(&named("before-upgrade")).unwrap();
    assert_eq!(record.kind, BackupKind::Directory);
    assert_eq!(record.files, vec![".env", ".env.local"]);
    assert_eq!(record.total_size_bytes, 8);

    let dir = tmp.path().join(".envx/backups/before-upgrade");
    assert_eq!(std::fs::read(dir.join(".env")).unwrap(), b"A=1\n");
    assert_eq!(std::fs::read(dir.join(".env.local")).unwrap(), b"A=2\n");
    assert!(!dir.join(".env.example").exists());
    assert_eq!(
        record.checksums[".env"],
        blake3::hash(b"A=1\n").to_hex().to_string()
    );

    let listed = store.find("before-upgrade").unwrap().unwrap();
    assert_eq!(listed, record);
}

#[test]
fn compressed_backup_is_flat_and_listed() {
    let (tmp, project) = project_with(&[(".env", "A=1\n"), (".env.prod", "A=3\n")]);
    let store = BackupStore::new(&project);

    let record = store
        .create(&CreateOptions {
            name: Some("snap".into()),
            compress: true,
        })
        .unwrap();

    let backups = tmp.path().join(".envx/backups");
    assert!(backups.join("snap_.env.zst").is_file());
    assert!(backups.join("snap_.env.prod.zst").is_file());
    assert!(!backups.join("snap").exists());

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], record);
    assert_eq!(listed[0].kind, BackupKind::Compressed);
}

#[test]
fn explicit_name_collision_is_rejected() {
    let (_tmp, project) = project_with(&[(".env", "A=1\n")]);
    let store = BackupStore::new(&project);

    store.create(&named("release")).unwrap();
    let err = store.create(&named("release")).unwrap_err();
    assert!(matches!(err, EnvxError::BackupExists { ref name } if name == "release"));

    let compressed = CreateOptions {
        name: Some("packed".into()),
        compress: true,
    };
    store.create(&compressed).unwrap();
    assert!(matches!(
        store.create(&named("packed")),
        Err(EnvxError::BackupExists { .. })
    ));
}

#[test]
fn invalid_names_are_rejected_before_writing() {
    let (tmp, project) = project_with(&[(".env", "A=1\n")]);
    let store = BackupStore::new(&project);

    for bad in ["../escape", ".hidden", "x_.env"] {
        let err = store.create(&named(bad)).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
    assert!(!tmp.path().join(".envx").exists());
}

#[test]
fn auto_names_never_collide() {
    let (_tmp, project) = project_with(&[(".env", "A=1\n")]);
    let store = BackupStore::new(&project);

    let a = store.create(&CreateOptions::default()).unwrap();
    let b = store.create(&CreateOptions::default()).unwrap();
    let c = store.create(&CreateOptions::default()).unwrap();

    assert_ne!(a.name, b.name);
    assert_ne!(b.name, c.name);
    assert_ne!(a.name, c.name);
    assert_eq!(a.name.len(), "2026-01-01T00-00-00".len());
    assert_eq!(store.list().unwrap().len(), 3);
}

#[test]
fn list_is_newest_first_across_kinds() {
    let (_tmp, project) = project_with(&[(".env", "A=1\n")]);
    let store = BackupStore::new(&project);

    // creation order differs from name order in both directions
    store.create(&named("zeta")).unwrap();
    store
        .create(&CreateOptions {
            name: Some("alpha".into()),
            compress: true,
        })
        .unwrap();
    store.create(&named("mid")).unwrap();

    let names: Vec<String> = store.list().unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["mid", "alpha", "zeta"]);
}

#[test]
fn list_falls_back_to_mtime_without_metadata() {
    let (tmp, project) = project_with(&[]);
    let backups = tmp.path().join(".envx/backups");

    // hand-made directory backup, newer despite sorting first by name
    std::fs::create_dir_all(backups.join("aaa")).unwrap();
    std::fs::write(backups.join("aaa/.env"), "A=1\n").unwrap();
    set_mtime(&backups.join("aaa/.env"), 1_700_000_000);

    // hand-made compressed backup, older
    let member = backups.join("zzz_.env.zst");
    std::fs::write(&member, zstd::encode_all(&b"A=2\n"[..], 3).unwrap()).unwrap();
    set_mtime(&member, 1_600_000_000);

    // neither a backup nor a member
    std::fs::write(backups.join("notes.txt"), "x").unwrap();
    std::fs::create_dir_all(backups.join("empty")).unwrap();

    let store = BackupStore::new(&project);
    let listed = store.list().unwrap();
    let names: Vec<&str> = listed.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["aaa", "zzz"]);

    assert_eq!(listed[0].kind, BackupKind::Directory);
    assert_eq!(listed[0].created_at.timestamp(), 1_700_000_000);
    assert_eq!(listed[1].kind, BackupKind::Compressed);
    assert_eq!(listed[1].files, vec![".env"]);
    assert!(listed[1].checksums.is_empty());
}

#[test]
fn renamed_backup_is_listed_under_its_disk_name() {
    let (tmp, project) = project_with(&[(".env", "A=1\n")]);
    let store = BackupStore::new(&project);
    store.create(&named("original")).unwrap();

    let backups = tmp.path().join(".envx/backups");
    std::fs::rename(backups.join("original"), backups.join("renamed")).unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "renamed");
    assert_eq!(listed[0].kind, BackupKind::Directory);
    assert!(store.find("original").unwrap().is_none());
    assert!(store.find("renamed").unwrap().is_some());
}

#[test]
fn missing_backup_area_lists_empty() {
    let (_tmp, project) = project_with(&[(".env", "A=1\n")]);
    assert!(BackupStore::new(&project).list().unwrap().is_empty());
}

#[test]
fn backups_are_not_rediscovered_as_env_files() {
    let (_tmp, project) = project_with(&[(".env", "A=1\n")]);
    let store = BackupStore::new(&project);
    store.create(&named("one")).unwrap();

    let second = store.create(&named("two")).unwrap();
    assert_eq!(second.files, vec![".env"]);
}
