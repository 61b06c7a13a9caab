//! Core data model for a synchronization run.
//!
//! This module defines the main data structures shared across the pipeline:
//! - SyncConfig: immutable per-run settings
//! - Entry / Catalog: one filesystem object and the set discovered under a root
//! - ReplicationAction: a single create/copy instruction produced by the diff
//! - SyncReport: counters summarizing a completed run

use filetime::FileTime;
use std::fmt;
use std::path::PathBuf;

/// Settings for one synchronization run.
///
/// Built once by the caller and passed by reference into every component;
/// never mutated while the run is in flight.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Root source directory
    pub source: PathBuf,

    /// Root destination directory
    pub destination: PathBuf,

    /// Number of fingerprint workers in parallel mode
    pub worker_count: usize,

    /// Fingerprint with a worker pool instead of inline in the caller
    pub parallel: bool,

    /// Compute content fingerprints for files
    pub fingerprint: bool,

    /// Compute and report actions without touching the destination
    pub dry_run: bool,

    /// Verbose progress reporting
    pub verbose: bool,
}

impl SyncConfig {
    /// Create a configuration with the default knobs: two workers,
    /// parallel fingerprinting with content digests, a real (non-dry) run.
    pub fn new<P: Into<PathBuf>>(source: P, destination: P) -> Self {
        SyncConfig {
            source: source.into(),
            destination: destination.into(),
            worker_count: 2,
            parallel: true,
            fingerprint: true,
            dry_run: false,
            verbose: false,
        }
    }
}

/// What kind of filesystem object an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
        }
    }
}

/// The state of an entry with respect to the fingerprint phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Discovered by traversal, metadata not yet resolved
    Pending,
    /// Metadata (and digest, when requested) resolved
    Resolved,
    /// Metadata could not be resolved; true state unknown
    Failed,
}

/// A 128-bit content digest used as a change-detection heuristic.
///
/// Not a security primitive; it only has to make accidental collisions
/// between two versions of the same path unlikely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Fingerprint(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// One filesystem object discovered under a catalog root.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Path relative to the catalog root; the identity key used to match
    /// entries across the two trees
    pub relative_path: PathBuf,

    /// File or directory
    pub kind: EntryKind,

    /// Byte length; meaningful for files only
    pub size: u64,

    /// Modification time at whatever precision the filesystem exposes;
    /// files only
    pub modified_at: Option<FileTime>,

    /// Permission bits from the file mode
    pub permissions: Option<u32>,

    /// Content digest; present for files when fingerprinting was requested
    /// and succeeded
    pub fingerprint: Option<Fingerprint>,

    /// Pending until the fingerprint phase resolves or fails the entry
    pub status: EntryStatus,

    /// Failure reason when status is Failed
    pub error_message: Option<String>,
}

impl Entry {
    /// Create a bare entry as traversal discovers it: identity and kind
    /// only, everything else left for the fingerprint phase.
    pub fn new(relative_path: PathBuf, kind: EntryKind) -> Self {
        Entry {
            relative_path,
            kind,
            size: 0,
            modified_at: None,
            permissions: None,
            fingerprint: None,
            status: EntryStatus::Pending,
            error_message: None,
        }
    }

    /// Record that this entry could not be fingerprinted. The diff phase
    /// treats such entries as unconditionally mismatched.
    pub fn mark_failed(&mut self, message: String) {
        self.status = EntryStatus::Failed;
        self.error_message = Some(message);
    }
}

/// All entries discovered under one root, in directory-read order.
#[derive(Debug)]
pub struct Catalog {
    /// Root directory all entries are relative to
    pub root: PathBuf,

    /// Entries in the order traversal appended them
    pub entries: Vec<Entry>,
}

impl Catalog {
    pub fn new(root: PathBuf) -> Self {
        Catalog {
            root,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One instruction produced by the diff phase and consumed by the
/// replicator. Immutable once produced.
///
/// Permissions and modification time are optional because a source entry
/// whose fingerprinting failed still generates an action; the replicator
/// then falls back to the source file's current metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationAction {
    /// Create a directory under the destination root
    CreateDirectory {
        relative_path: PathBuf,
        permissions: Option<u32>,
    },
    /// Copy a file's full contents and restore its recorded metadata
    CopyFile {
        relative_path: PathBuf,
        permissions: Option<u32>,
        modified_at: Option<FileTime>,
        size: u64,
    },
}

impl ReplicationAction {
    /// The destination-relative path this action targets.
    pub fn relative_path(&self) -> &std::path::Path {
        match self {
            ReplicationAction::CreateDirectory { relative_path, .. } => relative_path,
            ReplicationAction::CopyFile { relative_path, .. } => relative_path,
        }
    }
}

impl fmt::Display for ReplicationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationAction::CreateDirectory { relative_path, .. } => {
                write!(f, "create directory {}", relative_path.display())
            }
            ReplicationAction::CopyFile {
                relative_path,
                size,
                ..
            } => {
                write!(f, "copy {} ({} bytes)", relative_path.display(), size)
            }
        }
    }
}

/// Counters summarizing one completed run.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    /// Entries discovered under the source root
    pub source_entries: usize,

    /// Entries discovered under the destination root
    pub destination_entries: usize,

    /// Entries whose fingerprinting failed (copied conservatively)
    pub fingerprint_failures: usize,

    /// Actions the diff produced
    pub actions_planned: usize,

    /// Directories created during replication
    pub directories_created: usize,

    /// Files copied during replication
    pub files_copied: usize,

    /// Bytes copied during replication
    pub bytes_copied: u64,

    /// Actions that failed to apply
    pub replication_failures: usize,

    /// True when the run computed actions without applying them
    pub dry_run: bool,
}

impl SyncReport {
    pub fn new(dry_run: bool) -> Self {
        SyncReport {
            dry_run,
            ..SyncReport::default()
        }
    }
}
