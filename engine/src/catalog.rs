//! Directory tree enumeration.
//!
//! Builds a catalog of paths under one root without resolving any
//! metadata; the fingerprint phase fills that in later. Traversal is
//! depth-first in directory-read order, and an unreadable subdirectory
//! only costs its own subtree.

use crate::error::EngineError;
use crate::model::{Catalog, Entry, EntryKind};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

impl Catalog {
    /// Enumerate `root` recursively into a new catalog.
    ///
    /// Entries are appended in directory-read order, recursing into each
    /// subdirectory right after its own entry. A subdirectory that cannot
    /// be opened is reported as a warning and skipped; traversal continues
    /// with its siblings. Only an unreadable root is an error.
    ///
    /// No ordering guarantee beyond the above is made; consumers must not
    /// assume lexicographic order.
    pub fn build(root: &Path) -> Result<Catalog, EngineError> {
        let mut catalog = Catalog::new(root.to_path_buf());
        scan_into(root, Path::new(""), &mut catalog.entries).map_err(|e| {
            EngineError::Traversal {
                path: root.to_path_buf(),
                source: e,
            }
        })?;
        Ok(catalog)
    }
}

/// Append one entry per object under `dir`, recursing into subdirectories.
/// `relative` is the path of `dir` relative to the catalog root.
fn scan_into(dir: &Path, relative: &Path, entries: &mut Vec<Entry>) -> io::Result<()> {
    for dirent in fs::read_dir(dir)? {
        let dirent = match dirent {
            Ok(dirent) => dirent,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "unreadable directory entry skipped");
                continue;
            }
        };
        let file_type = match dirent.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!(path = %dirent.path().display(), error = %e, "entry type unavailable, skipped");
                continue;
            }
        };

        let relative_path = relative.join(dirent.file_name());

        if file_type.is_dir() {
            entries.push(Entry::new(relative_path.clone(), EntryKind::Directory));
            let child = dirent.path();
            if let Err(e) = scan_into(&child, &relative_path, entries) {
                warn!(path = %child.display(), error = %e, "unreadable subdirectory skipped");
            }
        } else if file_type.is_file() {
            entries.push(Entry::new(relative_path, EntryKind::File));
        } else {
            // Symlinks, sockets, fifos: only regular files and directories
            // are mirrored.
            debug!(path = %dirent.path().display(), "special file skipped");
        }
    }
    Ok(())
}
