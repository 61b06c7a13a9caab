//! Worker-pool coordination for the fingerprint phase.
//!
//! The coordinator owns a fixed pool of long-lived worker threads and one
//! shared task/result channel pair. Every entry of both catalogs becomes
//! one task tagged with its identity (catalog side + relative path);
//! workers send back one result per task carrying the same identity, so
//! results merge by lookup and never by arrival order. A worker that
//! vanishes only costs the coordinator an inline retry of the tasks that
//! never produced a result.
//!
//! Sequential mode resolves every entry in the calling thread and must
//! produce catalogs identical to the parallel path.

use crate::error::EngineError;
use crate::fingerprint;
use crate::model::{Catalog, Entry, SyncConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{trace, warn};

/// Which catalog an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogSide {
    Source,
    Destination,
}

impl fmt::Display for CatalogSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSide::Source => write!(f, "source"),
            CatalogSide::Destination => write!(f, "destination"),
        }
    }
}

/// Identity of one fingerprinting task. It travels with both the task and
/// its result so the coordinator can merge out-of-order replies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId {
    pub side: CatalogSide,
    pub relative_path: PathBuf,
}

/// One unit of work: resolve the metadata (and optional digest) of `entry`.
/// The task owns its entry copy until the result is merged back.
#[derive(Debug)]
pub struct WorkerTask {
    pub id: TaskId,
    pub root: PathBuf,
    pub entry: Entry,
    pub with_fingerprint: bool,
}

/// What became of one task. A fingerprinting failure is still a result —
/// the failure marker lets the coordinator tell "failed to fingerprint"
/// apart from "worker vanished".
#[derive(Debug)]
pub enum TaskOutcome {
    Resolved(Entry),
    Failed(Entry),
}

/// Reply to one [`WorkerTask`], tagged with the same identity.
#[derive(Debug)]
pub struct WorkerResult {
    pub id: TaskId,
    pub outcome: TaskOutcome,
}

/// How long the coordinator waits for a missing result before concluding
/// the pool is stuck and finishing the remaining tasks itself.
const RESULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolve every entry of both catalogs, with a worker pool when the
/// configuration asks for one. Returns the number of entries whose
/// fingerprinting failed; those are marked on the entries themselves and
/// treated as unconditionally mismatched by the diff.
pub fn fingerprint_catalogs(
    config: &SyncConfig,
    source: &mut Catalog,
    destination: &mut Catalog,
) -> usize {
    if config.parallel && config.worker_count > 0 {
        fingerprint_parallel(config, source, destination)
    } else {
        resolve_catalog(source, config.fingerprint) + resolve_catalog(destination, config.fingerprint)
    }
}

/// Sequential path: resolve each entry inline, in catalog order.
fn resolve_catalog(catalog: &mut Catalog, with_fingerprint: bool) -> usize {
    let root = catalog.root.clone();
    let mut failures = 0;
    for entry in &mut catalog.entries {
        if let Err(e) = fingerprint::resolve_entry(&root, entry, with_fingerprint) {
            warn!(path = %entry.relative_path.display(), error = %e, "fingerprinting failed");
            entry.mark_failed(e.to_string());
            failures += 1;
        }
    }
    failures
}

fn fingerprint_parallel(
    config: &SyncConfig,
    source: &mut Catalog,
    destination: &mut Catalog,
) -> usize {
    // Index every entry by identity so results can merge regardless of
    // arrival order, and build one task per entry.
    let mut index: HashMap<TaskId, usize> = HashMap::new();
    let mut tasks: Vec<WorkerTask> = Vec::new();
    for (side, catalog) in [
        (CatalogSide::Source, &*source),
        (CatalogSide::Destination, &*destination),
    ] {
        for (position, entry) in catalog.entries.iter().enumerate() {
            let id = TaskId {
                side,
                relative_path: entry.relative_path.clone(),
            };
            index.insert(id.clone(), position);
            tasks.push(WorkerTask {
                id,
                root: catalog.root.clone(),
                entry: entry.clone(),
                with_fingerprint: config.fingerprint,
            });
        }
    }

    let total = tasks.len();
    if total == 0 {
        return 0;
    }

    // Capacity covers every message in flight, so workers can always post
    // their final results and drain to exit even once the coordinator has
    // stopped reading.
    let (task_tx, task_rx) = bounded::<WorkerTask>(total);
    let (result_tx, result_rx) = bounded::<WorkerResult>(total);

    let mut handles = Vec::with_capacity(config.worker_count);
    for worker in 0..config.worker_count {
        let task_rx = task_rx.clone();
        let result_tx = result_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("fingerprint-{worker}"))
            .spawn(move || worker_loop(worker, task_rx, result_tx));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => warn!(worker, error = %e, "could not spawn fingerprint worker"),
        }
    }
    // The coordinator holds no channel ends of its own beyond task_tx and
    // result_rx: a fully dead pool shows up as a disconnect.
    drop(task_rx);
    drop(result_tx);

    let mut outstanding: HashSet<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
    for task in tasks {
        if task_tx.send(task).is_err() {
            // No worker left to receive; the drain loop below picks the
            // remainder up inline.
            break;
        }
    }
    drop(task_tx);

    let mut failures = 0;
    let mut stalled = false;
    while !outstanding.is_empty() {
        match result_rx.recv_timeout(RESULT_TIMEOUT) {
            Ok(result) => {
                if outstanding.remove(&result.id) {
                    failures += merge_result(source, destination, &index, result);
                } else {
                    // Late duplicate from a task already retried inline.
                    trace!(path = %result.id.relative_path.display(), "duplicate result discarded");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                stalled = true;
                warn!(
                    remaining = outstanding.len(),
                    "worker pool unresponsive, finishing remaining tasks inline"
                );
                failures += retry_inline(source, destination, &index, &mut outstanding, config);
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!(
                    remaining = outstanding.len(),
                    "worker pool exited early, finishing remaining tasks inline"
                );
                failures += retry_inline(source, destination, &index, &mut outstanding, config);
            }
        }
    }

    if stalled {
        // A hung worker would block join forever; leave the pool detached,
        // it holds nothing but channel ends.
        warn!("leaving stalled fingerprint workers detached");
    } else {
        for handle in handles {
            if handle.join().is_err() {
                warn!("fingerprint worker panicked");
            }
        }
    }

    failures
}

/// Re-execute every still-outstanding task in the coordinator's own
/// thread. Each task is retried exactly once; a repeated failure degrades
/// to a failed entry like any other fingerprint error.
fn retry_inline(
    source: &mut Catalog,
    destination: &mut Catalog,
    index: &HashMap<TaskId, usize>,
    outstanding: &mut HashSet<TaskId>,
    config: &SyncConfig,
) -> usize {
    let mut failures = 0;
    let remaining: Vec<TaskId> = outstanding.drain().collect();
    for id in remaining {
        let lost = EngineError::WorkerLost {
            path: id.relative_path.clone(),
        };
        warn!(error = %lost, "retrying task inline");
        let (root, entry) = match id.side {
            CatalogSide::Source => (source.root.clone(), source.entries[index[&id]].clone()),
            CatalogSide::Destination => (
                destination.root.clone(),
                destination.entries[index[&id]].clone(),
            ),
        };
        let result = execute_task(WorkerTask {
            id,
            root,
            entry,
            with_fingerprint: config.fingerprint,
        });
        failures += merge_result(source, destination, index, result);
    }
    failures
}

/// Write one result back into the catalog it came from, by identity.
/// Returns 1 when the outcome was a failure marker.
fn merge_result(
    source: &mut Catalog,
    destination: &mut Catalog,
    index: &HashMap<TaskId, usize>,
    result: WorkerResult,
) -> usize {
    let Some(&position) = index.get(&result.id) else {
        warn!(path = %result.id.relative_path.display(), "result for unknown entry discarded");
        return 0;
    };
    let slot = match result.id.side {
        CatalogSide::Source => &mut source.entries[position],
        CatalogSide::Destination => &mut destination.entries[position],
    };
    match result.outcome {
        TaskOutcome::Resolved(entry) => {
            *slot = entry;
            0
        }
        TaskOutcome::Failed(entry) => {
            *slot = entry;
            1
        }
    }
}

/// Run one task to completion. A fingerprint error becomes a failure
/// marker on the entry, never a missing result.
fn execute_task(mut task: WorkerTask) -> WorkerResult {
    let outcome = match fingerprint::resolve_entry(&task.root, &mut task.entry, task.with_fingerprint)
    {
        Ok(()) => TaskOutcome::Resolved(task.entry),
        Err(e) => {
            warn!(path = %task.id.relative_path.display(), error = %e, "fingerprinting failed");
            task.entry.mark_failed(e.to_string());
            TaskOutcome::Failed(task.entry)
        }
    };
    WorkerResult {
        id: task.id,
        outcome,
    }
}

/// Worker body: pull one task, resolve it, post the result. Exits when the
/// task channel disconnects (coordinator dropped its sender) or the result
/// channel does (coordinator gone).
fn worker_loop(worker: usize, task_rx: Receiver<WorkerTask>, result_tx: Sender<WorkerResult>) {
    trace!(worker, "fingerprint worker started");
    while let Ok(task) = task_rx.recv() {
        let result = execute_task(task);
        if result_tx.send(result).is_err() {
            break;
        }
    }
    trace!(worker, "fingerprint worker exiting");
}
