//! # Mirror Engine - One-Way Directory Synchronization Library
//!
//! A headless engine that replicates new and changed entries from a
//! source directory tree to a destination tree. It is deliberately
//! one-way and non-destructive: entries that exist only in the
//! destination are never touched.
//!
//! ## Overview
//!
//! A run walks both trees into catalogs, fingerprints every entry (with a
//! worker pool or sequentially), reconciles the catalogs into an ordered
//! action plan, and applies the plan — or only reports it, in dry-run
//! mode. Individual entry and action failures are isolated; only a bad
//! source or destination root aborts the run.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{run, SyncConfig};
//!
//! # fn main() -> Result<(), engine::EngineError> {
//! let mut config = SyncConfig::new("/data/photos", "/backup/photos");
//! config.worker_count = 4;
//!
//! let report = run(&config)?;
//! println!(
//!     "{} copied, {} failed",
//!     report.files_copied, report.replication_failures
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (SyncConfig, Entry, Catalog, actions)
//! - **error**: Error taxonomy and fatality classification
//! - **catalog**: Recursive tree enumeration
//! - **fingerprint**: Per-entry metadata and content digest resolution
//! - **pool**: Worker-pool coordination for the fingerprint phase
//! - **diff**: Catalog reconciliation into replication actions
//! - **replicate**: Applying actions to the destination tree
//! - **sync**: Whole-run orchestration

pub mod catalog;
pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod pool;
pub mod replicate;
pub mod sync;

// Re-export main types and functions
pub use error::EngineError;
pub use model::{
    Catalog, Entry, EntryKind, EntryStatus, Fingerprint, ReplicationAction, SyncConfig, SyncReport,
};
pub use pool::{fingerprint_catalogs, CatalogSide, TaskId, WorkerResult, WorkerTask};
pub use sync::run;
