//! Run orchestration: validate, scan, fingerprint, diff, replicate.
//!
//! Only configuration-class failures abort a run. Everything after
//! validation is best-effort: failed entries are copied conservatively,
//! failed actions are logged and skipped, and the report carries the
//! counts either way.

use crate::diff;
use crate::error::EngineError;
use crate::model::{Catalog, ReplicationAction, SyncConfig, SyncReport};
use crate::pool;
use crate::replicate;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Execute one full synchronization run.
pub fn run(config: &SyncConfig) -> Result<SyncReport, EngineError> {
    validate_roots(config)?;

    let mut source = Catalog::build(&config.source)?;
    let mut destination = if config.destination.is_dir() {
        Catalog::build(&config.destination)?
    } else {
        // Only reachable in a dry run, which never creates the root.
        Catalog::new(config.destination.clone())
    };
    debug!(
        source = source.len(),
        destination = destination.len(),
        "catalogs built"
    );

    let fingerprint_failures = pool::fingerprint_catalogs(config, &mut source, &mut destination);

    let actions = diff::diff(&source, &destination, config.fingerprint);
    info!(actions = actions.len(), "replication plan ready");

    let mut report = SyncReport::new(config.dry_run);
    report.source_entries = source.len();
    report.destination_entries = destination.len();
    report.fingerprint_failures = fingerprint_failures;
    report.actions_planned = actions.len();

    for action in &actions {
        if config.dry_run {
            info!("would {}", action);
            continue;
        }
        match replicate::apply(action, config) {
            Ok(bytes) => {
                debug!("{}", action);
                match action {
                    ReplicationAction::CreateDirectory { .. } => report.directories_created += 1,
                    ReplicationAction::CopyFile { .. } => {
                        report.files_copied += 1;
                        report.bytes_copied += bytes;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "replication failed, continuing");
                report.replication_failures += 1;
            }
        }
    }

    Ok(report)
}

/// Probe both roots before any traversal.
///
/// The source must be readable as a directory. The destination is created
/// when absent and probed for writability by creating and removing a
/// scratch file, since access bits alone don't tell the whole story on
/// every filesystem. A dry run never touches the destination.
pub fn validate_roots(config: &SyncConfig) -> Result<(), EngineError> {
    if config.parallel && config.worker_count == 0 {
        return Err(EngineError::InvalidConfiguration {
            reason: "worker count must be at least 1".to_string(),
        });
    }

    fs::read_dir(&config.source).map_err(|e| EngineError::SourceUnreadable {
        path: config.source.clone(),
        source: e,
    })?;

    if config.dry_run {
        return Ok(());
    }

    if !config.destination.is_dir() {
        fs::create_dir_all(&config.destination).map_err(|e| {
            EngineError::DestinationUnwritable {
                path: config.destination.clone(),
                source: e,
            }
        })?;
    }
    probe_writable(&config.destination).map_err(|e| EngineError::DestinationUnwritable {
        path: config.destination.clone(),
        source: e,
    })?;

    Ok(())
}

/// Create and remove a scratch file under `dir`.
fn probe_writable(dir: &Path) -> io::Result<()> {
    let probe = dir.join(".mirror-write-probe");
    fs::File::create(&probe)?;
    fs::remove_file(&probe)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::os::unix::fs::PermissionsExt;

    fn write_tree(root: &Path) {
        fs::write(root.join("a.txt"), b"alpha").expect("Failed to write a.txt");
        fs::create_dir(root.join("sub")).expect("Failed to create sub");
        fs::write(root.join("sub").join("b.txt"), b"beta").expect("Failed to write b.txt");
    }

    fn paired_roots(temp: &tempfile::TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir(&src).expect("Failed to create src");
        (src, dst)
    }

    #[test]
    fn test_full_run_replicates_tree() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (src, dst) = paired_roots(&temp_dir);
        write_tree(&src);

        let config = SyncConfig::new(src, dst.clone());
        let report = run(&config).expect("Run should succeed");

        assert_eq!(report.source_entries, 3);
        assert_eq!(report.actions_planned, 3);
        assert_eq!(report.directories_created, 1);
        assert_eq!(report.files_copied, 2);
        assert_eq!(report.bytes_copied, 9);
        assert_eq!(report.replication_failures, 0);

        assert_eq!(
            fs::read_to_string(dst.join("a.txt")).expect("Failed to read a.txt"),
            "alpha"
        );
        assert_eq!(
            fs::read_to_string(dst.join("sub").join("b.txt")).expect("Failed to read b.txt"),
            "beta"
        );
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (src, dst) = paired_roots(&temp_dir);
        write_tree(&src);

        let config = SyncConfig::new(src, dst);
        run(&config).expect("First run should succeed");
        let report = run(&config).expect("Second run should succeed");

        assert_eq!(report.actions_planned, 0);
        assert_eq!(report.files_copied, 0);
    }

    #[test]
    fn test_parallel_and_sequential_runs_converge_identically() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst_par = temp_dir.path().join("dst-par");
        let dst_seq = temp_dir.path().join("dst-seq");
        fs::create_dir(&src).expect("Failed to create src");
        write_tree(&src);

        let mut config = SyncConfig::new(src.clone(), dst_par.clone());
        config.worker_count = 4;
        let report_par = run(&config).expect("Parallel run should succeed");

        let mut config = SyncConfig::new(src, dst_seq.clone());
        config.parallel = false;
        let report_seq = run(&config).expect("Sequential run should succeed");

        assert_eq!(report_par.actions_planned, report_seq.actions_planned);
        assert_eq!(report_par.files_copied, report_seq.files_copied);
        assert_eq!(
            fs::read_to_string(dst_par.join("a.txt")).expect("Failed to read parallel copy"),
            fs::read_to_string(dst_seq.join("a.txt")).expect("Failed to read sequential copy"),
        );
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (src, dst) = paired_roots(&temp_dir);
        write_tree(&src);

        let mut config = SyncConfig::new(src, dst.clone());
        config.dry_run = true;
        let report = run(&config).expect("Dry run should succeed");

        assert!(report.dry_run);
        assert_eq!(report.actions_planned, 3);
        assert_eq!(report.files_copied, 0);
        assert_eq!(report.directories_created, 0);
        // The destination root was never even created.
        assert!(!dst.exists());
    }

    #[test]
    fn test_dry_run_preserves_existing_destination() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (src, dst) = paired_roots(&temp_dir);
        write_tree(&src);
        fs::create_dir(&dst).expect("Failed to create dst");
        fs::write(dst.join("existing.txt"), b"keep me").expect("Failed to write existing file");
        let before = fs::metadata(dst.join("existing.txt")).expect("Failed to stat existing file");

        let mut config = SyncConfig::new(src, dst.clone());
        config.dry_run = true;
        run(&config).expect("Dry run should succeed");

        let after = fs::metadata(dst.join("existing.txt")).expect("Failed to stat existing file");
        assert_eq!(
            fs::read_to_string(dst.join("existing.txt")).expect("Failed to read existing file"),
            "keep me"
        );
        assert_eq!(before.len(), after.len());
        assert_eq!(
            FileTime::from_last_modification_time(&before),
            FileTime::from_last_modification_time(&after)
        );
        assert_eq!(before.permissions().mode(), after.permissions().mode());
        assert!(!dst.join("a.txt").exists());
    }

    #[test]
    fn test_missing_source_is_fatal() {
        // Scenario E: the source cannot be read at all.
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = SyncConfig::new(
            temp_dir.path().join("nonexistent"),
            temp_dir.path().join("dst"),
        );

        let result = run(&config);
        match result {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("Run against a missing source should fail"),
        }
    }

    #[test]
    fn test_zero_workers_in_parallel_mode_is_invalid() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (src, dst) = paired_roots(&temp_dir);

        let mut config = SyncConfig::new(src, dst);
        config.worker_count = 0;
        let result = run(&config);
        assert!(matches!(
            result,
            Err(EngineError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_destination_created_when_absent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (src, dst) = paired_roots(&temp_dir);
        write_tree(&src);

        let config = SyncConfig::new(src, dst.clone());
        run(&config).expect("Run should create the destination");
        assert!(dst.is_dir());
        assert!(dst.join("a.txt").is_file());
    }

    #[test]
    fn test_content_change_with_matching_metadata_is_caught() {
        // Scenario C end to end: same size, mtime, and mode; different
        // bytes. Only the fingerprint can tell.
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (src, dst) = paired_roots(&temp_dir);
        fs::create_dir(&dst).expect("Failed to create dst");

        fs::write(src.join("a.txt"), b"aaaa").expect("Failed to write source a.txt");
        fs::write(dst.join("a.txt"), b"bbbb").expect("Failed to write dest a.txt");
        let mtime = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(src.join("a.txt"), mtime).expect("Failed to set source mtime");
        filetime::set_file_mtime(dst.join("a.txt"), mtime).expect("Failed to set dest mtime");
        fs::set_permissions(src.join("a.txt"), fs::Permissions::from_mode(0o644))
            .expect("Failed to chmod source");
        fs::set_permissions(dst.join("a.txt"), fs::Permissions::from_mode(0o644))
            .expect("Failed to chmod dest");

        let config = SyncConfig::new(src, dst.clone());
        let report = run(&config).expect("Run should succeed");

        assert_eq!(report.actions_planned, 1);
        assert_eq!(
            fs::read_to_string(dst.join("a.txt")).expect("Failed to read dest a.txt"),
            "aaaa"
        );
    }

    #[test]
    fn test_date_size_only_misses_content_change() {
        // Scenario D end to end: identical metadata, different bytes,
        // fingerprinting disabled.
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (src, dst) = paired_roots(&temp_dir);
        fs::create_dir(&dst).expect("Failed to create dst");

        fs::write(src.join("a.txt"), b"aaaa").expect("Failed to write source a.txt");
        fs::write(dst.join("a.txt"), b"bbbb").expect("Failed to write dest a.txt");
        let mtime = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(src.join("a.txt"), mtime).expect("Failed to set source mtime");
        filetime::set_file_mtime(dst.join("a.txt"), mtime).expect("Failed to set dest mtime");
        fs::set_permissions(src.join("a.txt"), fs::Permissions::from_mode(0o644))
            .expect("Failed to chmod source");
        fs::set_permissions(dst.join("a.txt"), fs::Permissions::from_mode(0o644))
            .expect("Failed to chmod dest");

        let mut config = SyncConfig::new(src, dst.clone());
        config.fingerprint = false;
        let report = run(&config).expect("Run should succeed");

        assert_eq!(report.actions_planned, 0);
        assert_eq!(
            fs::read_to_string(dst.join("a.txt")).expect("Failed to read dest a.txt"),
            "bbbb"
        );
    }

    #[test]
    fn test_replicated_tree_preserves_mode_and_mtime() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (src, dst) = paired_roots(&temp_dir);

        fs::write(src.join("a.txt"), b"hello").expect("Failed to write a.txt");
        fs::set_permissions(src.join("a.txt"), fs::Permissions::from_mode(0o600))
            .expect("Failed to chmod a.txt");
        let mtime = FileTime::from_unix_time(1_234_567, 890);
        filetime::set_file_mtime(src.join("a.txt"), mtime).expect("Failed to set mtime");

        let config = SyncConfig::new(src, dst.clone());
        run(&config).expect("Run should succeed");

        let metadata = fs::metadata(dst.join("a.txt")).expect("Failed to stat copy");
        assert_eq!(metadata.permissions().mode() & 0o7777, 0o600);
        assert_eq!(FileTime::from_last_modification_time(&metadata), mtime);
    }
}
