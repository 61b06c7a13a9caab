//! Applying replication actions to the destination tree.
//!
//! Directory creation is idempotent so a later action can reference a path
//! whose parent an earlier action already created. File copies restore the
//! recorded permission bits and modification time, so the next comparison
//! of the two trees reports equivalence.

use crate::error::EngineError;
use crate::model::{ReplicationAction, SyncConfig};
use filetime::FileTime;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Apply one action against the destination tree. Returns the number of
/// bytes copied (zero for directories).
///
/// Failures are scoped to the action; the caller logs them and moves on to
/// the rest of the plan.
pub fn apply(action: &ReplicationAction, config: &SyncConfig) -> Result<u64, EngineError> {
    match action {
        ReplicationAction::CreateDirectory {
            relative_path,
            permissions,
        } => {
            let target = config.destination.join(relative_path);
            fs::create_dir_all(&target).map_err(|e| replication_error(&target, e))?;
            if let Some(mode) = permissions {
                fs::set_permissions(&target, fs::Permissions::from_mode(*mode))
                    .map_err(|e| replication_error(&target, e))?;
            }
            Ok(0)
        }
        ReplicationAction::CopyFile {
            relative_path,
            permissions,
            modified_at,
            ..
        } => {
            let from = config.source.join(relative_path);
            let target = config.destination.join(relative_path);

            ensure_parent_exists(&target)?;
            let bytes = fs::copy(&from, &target).map_err(|e| replication_error(&target, e))?;

            // Metadata recorded at fingerprint time wins; an action built
            // from a failed entry recorded none, so read it off the source
            // file as it stands now.
            let (mode, mtime) = match (permissions, modified_at) {
                (Some(mode), Some(mtime)) => (*mode, *mtime),
                _ => {
                    let metadata =
                        fs::metadata(&from).map_err(|e| replication_error(&from, e))?;
                    (
                        permissions.unwrap_or_else(|| metadata.permissions().mode()),
                        modified_at
                            .unwrap_or_else(|| FileTime::from_last_modification_time(&metadata)),
                    )
                }
            };
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                .map_err(|e| replication_error(&target, e))?;
            filetime::set_file_mtime(&target, mtime).map_err(|e| replication_error(&target, e))?;

            Ok(bytes)
        }
    }
}

/// Create the missing parents of `path`. An already-existing parent is the
/// common case once the plan's directory actions have run.
fn ensure_parent_exists(path: &Path) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        if parent.as_os_str().is_empty() || parent.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(parent).map_err(|e| replication_error(parent, e))?;
    }
    Ok(())
}

fn replication_error(path: &Path, source: io::Error) -> EngineError {
    EngineError::Replication {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config(temp: &tempfile::TempDir) -> SyncConfig {
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir(&src).expect("Failed to create src");
        fs::create_dir(&dst).expect("Failed to create dst");
        SyncConfig::new(src, dst)
    }

    #[test]
    fn test_copy_restores_content_mode_and_mtime() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = test_config(&temp_dir);

        let source_file = config.source.join("a.txt");
        fs::write(&source_file, b"hello").expect("Failed to write source file");
        let mtime = FileTime::from_unix_time(1_600_000_000, 123_456_789);
        filetime::set_file_mtime(&source_file, mtime).expect("Failed to set source mtime");

        let action = ReplicationAction::CopyFile {
            relative_path: PathBuf::from("a.txt"),
            permissions: Some(0o100644),
            modified_at: Some(mtime),
            size: 5,
        };
        let bytes = apply(&action, &config).expect("Failed to apply copy");
        assert_eq!(bytes, 5);

        let target = config.destination.join("a.txt");
        let content = fs::read_to_string(&target).expect("Failed to read copied file");
        assert_eq!(content, "hello");

        let metadata = fs::metadata(&target).expect("Failed to stat copied file");
        assert_eq!(metadata.permissions().mode() & 0o7777, 0o644);
        assert_eq!(FileTime::from_last_modification_time(&metadata), mtime);
    }

    #[test]
    fn test_copy_creates_missing_parents() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = test_config(&temp_dir);

        let nested = config.source.join("a").join("b");
        fs::create_dir_all(&nested).expect("Failed to create nested source dirs");
        fs::write(nested.join("deep.txt"), b"deep").expect("Failed to write source file");

        let action = ReplicationAction::CopyFile {
            relative_path: PathBuf::from("a/b/deep.txt"),
            permissions: Some(0o100644),
            modified_at: Some(FileTime::from_unix_time(1000, 0)),
            size: 4,
        };
        apply(&action, &config).expect("Failed to apply copy");

        assert!(config.destination.join("a/b/deep.txt").is_file());
    }

    #[test]
    fn test_create_directory_is_idempotent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = test_config(&temp_dir);

        let action = ReplicationAction::CreateDirectory {
            relative_path: PathBuf::from("sub"),
            permissions: Some(0o40755),
        };
        apply(&action, &config).expect("Failed to create directory");
        apply(&action, &config).expect("Re-creating an existing directory should succeed");

        assert!(config.destination.join("sub").is_dir());
    }

    #[test]
    fn test_copy_without_recorded_metadata_falls_back_to_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = test_config(&temp_dir);

        let source_file = config.source.join("a.txt");
        fs::write(&source_file, b"data").expect("Failed to write source file");

        // The action a failed entry produces: no recorded metadata.
        let action = ReplicationAction::CopyFile {
            relative_path: PathBuf::from("a.txt"),
            permissions: None,
            modified_at: None,
            size: 0,
        };
        apply(&action, &config).expect("Failed to apply copy");

        let src_meta = fs::metadata(&source_file).expect("Failed to stat source");
        let dst_meta =
            fs::metadata(config.destination.join("a.txt")).expect("Failed to stat target");
        assert_eq!(
            src_meta.permissions().mode() & 0o7777,
            dst_meta.permissions().mode() & 0o7777
        );
        assert_eq!(
            FileTime::from_last_modification_time(&src_meta),
            FileTime::from_last_modification_time(&dst_meta)
        );
    }

    #[test]
    fn test_copy_missing_source_is_replication_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = test_config(&temp_dir);

        let action = ReplicationAction::CopyFile {
            relative_path: PathBuf::from("ghost.txt"),
            permissions: Some(0o100644),
            modified_at: Some(FileTime::from_unix_time(1000, 0)),
            size: 1,
        };
        let result = apply(&action, &config);
        assert!(matches!(result, Err(EngineError::Replication { .. })));
    }
}
