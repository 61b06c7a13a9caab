//! Per-entry metadata and content fingerprint resolution.
//!
//! One entry at a time: directories get permission bits only, files get
//! size, modification time, permission bits, and optionally a content
//! digest streamed over the full file. Failures stay scoped to the entry;
//! callers mark it failed and continue.

use crate::error::EngineError;
use crate::model::{Entry, EntryKind, EntryStatus, Fingerprint};
use filetime::FileTime;
use std::fs;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Read size used when streaming file contents through the digest.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Fill `entry` with metadata from the object it names under `root`.
///
/// For a directory, only the permission bits are resolved. For a file,
/// size and modification time are taken from the same stat call, and when
/// `with_fingerprint` is set the full contents are digested. The
/// modification time keeps whatever sub-second precision the filesystem
/// exposes.
pub fn resolve_entry(
    root: &Path,
    entry: &mut Entry,
    with_fingerprint: bool,
) -> Result<(), EngineError> {
    let absolute = root.join(&entry.relative_path);
    let metadata = fs::metadata(&absolute).map_err(|e| EngineError::Fingerprint {
        path: absolute.clone(),
        source: e,
    })?;

    entry.permissions = Some(metadata.permissions().mode());

    if entry.kind == EntryKind::File {
        entry.size = metadata.len();
        entry.modified_at = Some(FileTime::from_last_modification_time(&metadata));
        if with_fingerprint {
            entry.fingerprint = Some(digest_file(&absolute)?);
        }
    }

    entry.status = EntryStatus::Resolved;
    Ok(())
}

/// Stream the full contents of `path` through the digest.
pub fn digest_file(path: &Path) -> Result<Fingerprint, EngineError> {
    let mut file = fs::File::open(path).map_err(|e| EngineError::Fingerprint {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut context = md5::Context::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => context.consume(&buffer[..n]),
            Err(e) => {
                return Err(EngineError::Fingerprint {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    Ok(Fingerprint::from_bytes(context.compute().0))
}
