//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use fsfailover_core::{FailoverGroup, GroupRegistry, InventorySnapshot};
use fsfailover_storage::{InMemoryBackend, StorageBackend};
use std::sync::Arc;

/// Name of the benchmark group.
pub const GROUP_NAME: &str = "bench";

/// Deterministic payload of the given size.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Path of the `i`-th generated file, spread over nested directories.
pub fn file_path(i: usize) -> String {
    format!("d{}/e{}/file-{i}.bin", i % 16, i % 7)
}

/// Builds a snapshot where every secondary misses or holds a stale copy of
/// roughly one file in `stale_every`.
pub fn snapshot(backends: usize, files: usize, stale_every: usize) -> InventorySnapshot {
    let mut snapshot = InventorySnapshot::new();
    for index in 0..backends {
        snapshot.initialize(index);
    }
    for i in 0..files {
        let path = file_path(i);
        snapshot.record(0, path.clone(), Some(1_000));
        for index in 1..backends {
            match (i + index) % stale_every {
                0 => {}
                1 => snapshot.record(index, path.clone(), Some(10)),
                _ => snapshot.record(index, path.clone(), Some(1_000)),
            }
        }
    }
    snapshot
}

/// Builds a registry with one group of in-memory backends.
pub fn memory_group(backends: usize) -> (Arc<GroupRegistry>, Vec<Arc<InMemoryBackend>>) {
    let memories: Vec<Arc<InMemoryBackend>> =
        (0..backends).map(|_| Arc::new(InMemoryBackend::new())).collect();
    let group = FailoverGroup::new(
        GROUP_NAME,
        memories
            .iter()
            .map(|m| Arc::clone(m) as Arc<dyn StorageBackend>)
            .collect(),
    )
    .expect("Failed to build benchmark group");
    let registry = GroupRegistry::new([group]).expect("Failed to build benchmark registry");
    (Arc::new(registry), memories)
}
