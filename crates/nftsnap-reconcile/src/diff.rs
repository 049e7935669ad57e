//! Offline comparison of two persisted snapshots. No network I/O.

use nftsnap_store::{Snapshot, SnapshotRecord};

/// Changes from `old` to `new`, each list in ascending key order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotDiff<R> {
    pub added: Vec<R>,
    pub removed: Vec<R>,
    /// `(old, new)` pairs for keys present in both with different records.
    pub changed: Vec<(R, R)>,
}

impl<R> SnapshotDiff<R> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

pub fn diff_snapshots<R>(old: &Snapshot<R>, new: &Snapshot<R>) -> SnapshotDiff<R>
where
    R: SnapshotRecord + Clone + PartialEq,
{
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();

    for before in old.records() {
        match new.get(&before.key()) {
            None => removed.push(before.clone()),
            Some(after) if after != before => changed.push((before.clone(), after.clone())),
            Some(_) => {}
        }
    }
    for after in new.records() {
        if !old.contains(&after.key()) {
            added.push(after.clone());
        }
    }

    SnapshotDiff {
        added,
        removed,
        changed,
    }
}
