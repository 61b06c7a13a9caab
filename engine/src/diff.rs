//! Catalog reconciliation.
//!
//! Produces the ordered list of replication actions that would make the
//! destination cover the source. Source-catalog order is authoritative for
//! output order, so the plan is reproducible no matter how fingerprinting
//! was parallelized. Entries present only in the destination are never
//! examined: nothing is ever deleted.

use crate::model::{Catalog, Entry, EntryKind, EntryStatus, ReplicationAction};
use std::collections::HashMap;
use std::path::Path;

/// Reconcile `source` against `destination` into an ordered action list.
pub fn diff(source: &Catalog, destination: &Catalog, use_fingerprint: bool) -> Vec<ReplicationAction> {
    let by_path: HashMap<&Path, &Entry> = destination
        .entries
        .iter()
        .map(|e| (e.relative_path.as_path(), e))
        .collect();

    let mut actions = Vec::new();
    for entry in &source.entries {
        let needs_copy = match by_path.get(entry.relative_path.as_path()) {
            None => true,
            Some(peer) => is_mismatched(entry, peer, use_fingerprint),
        };
        if needs_copy {
            actions.push(replication_action(entry));
        }
    }
    actions
}

/// Compare a source entry against its destination peer.
///
/// A fingerprint difference alone is conclusive; a fingerprint match is
/// not, since metadata can differ over identical content. Size,
/// modification time, and permission bits are compared verbatim either
/// way. An entry whose fingerprinting failed has unknown state and always
/// mismatches.
pub fn is_mismatched(source: &Entry, destination: &Entry, use_fingerprint: bool) -> bool {
    if source.status == EntryStatus::Failed || destination.status == EntryStatus::Failed {
        return true;
    }

    if use_fingerprint {
        if let (Some(lhs), Some(rhs)) = (&source.fingerprint, &destination.fingerprint) {
            if lhs != rhs {
                return true;
            }
        }
    }

    source.size != destination.size
        || source.modified_at != destination.modified_at
        || source.permissions != destination.permissions
}

fn replication_action(entry: &Entry) -> ReplicationAction {
    match entry.kind {
        EntryKind::Directory => ReplicationAction::CreateDirectory {
            relative_path: entry.relative_path.clone(),
            permissions: entry.permissions,
        },
        EntryKind::File => ReplicationAction::CopyFile {
            relative_path: entry.relative_path.clone(),
            permissions: entry.permissions,
            modified_at: entry.modified_at,
            size: entry.size,
        },
    }
}
