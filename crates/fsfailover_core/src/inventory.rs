//! Per-run file inventory of every backend in a group.

use std::collections::BTreeMap;

/// File inventories of the backends of one group, keyed by backend index.
///
/// Built fresh for each reconciliation run and dropped afterwards. A backend
/// whose listing failed is absent from the snapshot, which is different from
/// being present with no files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    backends: BTreeMap<usize, BTreeMap<String, i64>>,
}

impl InventorySnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a backend as present with no files yet.
    ///
    /// Resets any files already recorded for it.
    pub fn initialize(&mut self, index: usize) {
        self.backends.insert(index, BTreeMap::new());
    }

    /// Records a file for a backend. A missing timestamp is stored as 0.
    pub fn record(&mut self, index: usize, path: impl Into<String>, last_modified: Option<i64>) {
        self.backends
            .entry(index)
            .or_default()
            .insert(path.into(), last_modified.unwrap_or(0));
    }

    /// Removes a backend from the snapshot.
    pub fn discard(&mut self, index: usize) {
        self.backends.remove(&index);
    }

    /// Returns true if the backend was listed successfully.
    pub fn contains_backend(&self, index: usize) -> bool {
        self.backends.contains_key(&index)
    }

    /// Returns the indexes of the backends present, in ascending order.
    pub fn indexes(&self) -> impl Iterator<Item = usize> + '_ {
        self.backends.keys().copied()
    }

    /// Returns the number of backends present.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Returns the number of files recorded for a backend.
    pub fn file_count(&self, index: usize) -> usize {
        self.backends.get(&index).map_or(0, BTreeMap::len)
    }

    /// Returns the recorded timestamp of a file.
    pub fn timestamp(&self, index: usize, path: &str) -> Option<i64> {
        self.backends.get(&index)?.get(path).copied()
    }

    /// Returns the `(path, destination)` pairs where the `source` backend
    /// holds a file that `destination` lacks or holds an older copy of.
    ///
    /// Only present backends other than `source` are considered. A copy is
    /// older when its timestamp is strictly smaller than the source's; equal
    /// timestamps are up to date. Pairs are ordered by path, then by
    /// destination.
    pub fn diff(&self, source: usize) -> Vec<(String, usize)> {
        let Some(files) = self.backends.get(&source) else {
            return Vec::new();
        };

        let mut pairs = Vec::new();
        for (path, &source_ts) in files {
            for (&destination, other) in &self.backends {
                if destination == source {
                    continue;
                }
                let stale = match other.get(path) {
                    None => true,
                    Some(&destination_ts) => source_ts > destination_ts,
                };
                if stale {
                    pairs.push((path.clone(), destination));
                }
            }
        }
        pairs
    }

    /// Returns the [`diff`](Self::diff) pairs of `source` for files the
    /// `reference` backend does not hold.
    ///
    /// Paths held by `reference` are left out whatever their timestamps. When
    /// `reference` is absent from the snapshot nothing is left out.
    pub fn diff_excluding(&self, source: usize, reference: usize) -> Vec<(String, usize)> {
        let held = self.backends.get(&reference);
        self.diff(source)
            .into_iter()
            .filter(|(path, _)| held.map_or(true, |files| !files.contains_key(path)))
            .collect()
    }
}
