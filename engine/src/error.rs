//! Error types for the synchronization engine.
//!
//! Only the configuration class is fatal to a run. Traversal, fingerprint,
//! worker, and replication failures are all recovered at entry or action
//! granularity and surfaced as warnings, preserving best-effort completion
//! of the whole tree.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong during a run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source root missing or not readable as a directory
    #[error("source directory not readable: {path}")]
    SourceUnreadable { path: PathBuf, source: io::Error },

    /// Destination root cannot be created or written to
    #[error("destination directory not writable: {path}")]
    DestinationUnwritable { path: PathBuf, source: io::Error },

    /// Arguments that cannot describe a valid run
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A directory could not be opened during traversal
    #[error("cannot open directory: {path}")]
    Traversal { path: PathBuf, source: io::Error },

    /// An entry could not be opened, stat'ed, or read while fingerprinting
    #[error("cannot fingerprint: {path}")]
    Fingerprint { path: PathBuf, source: io::Error },

    /// A worker never returned a result for this entry
    #[error("worker result missing for: {path}")]
    WorkerLost { path: PathBuf },

    /// A create/copy action could not be applied
    #[error("cannot replicate: {path}")]
    Replication { path: PathBuf, source: io::Error },
}

impl EngineError {
    /// True for the configuration class, the only errors that abort a run
    /// before any traversal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::SourceUnreadable { .. }
                | EngineError::DestinationUnwritable { .. }
                | EngineError::InvalidConfiguration { .. }
        )
    }
}
