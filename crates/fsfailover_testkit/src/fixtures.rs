//! Failover group fixtures.
//!
//! Provides ready-made groups over in-memory or on-disk backends, together
//! with the bus, worker and reconciler wiring most tests need.

use fsfailover_core::{
    FailoverAdapter, FailoverGroup, FailoverMessage, GroupRegistry, InlineBus, MessageBus,
    MessageRouter, QueueBus, Reconciler, RetryPolicy, Worker, WorkerStats,
};
use fsfailover_storage::{InMemoryBackend, LocalBackend, StorageBackend};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Name of the group built by the fixtures.
pub const GROUP_NAME: &str = "test";

/// A failover group over in-memory backends with fault injection.
pub struct MemoryGroup {
    /// Registry holding the single group.
    pub registry: Arc<GroupRegistry>,
    /// The backends, by index.
    pub backends: Vec<Arc<InMemoryBackend>>,
    /// Queue used by the queued adapter, reconciler and worker.
    pub queue: Arc<QueueBus>,
    policy: RetryPolicy,
}

impl MemoryGroup {
    /// Creates a group of `count` empty backends.
    pub fn new(count: usize) -> Self {
        Self::with_policy(count, RetryPolicy::default())
    }

    /// Creates a group whose worker uses `policy`.
    pub fn with_policy(count: usize, policy: RetryPolicy) -> Self {
        let backends: Vec<Arc<InMemoryBackend>> =
            (0..count).map(|_| Arc::new(InMemoryBackend::new())).collect();
        let group = FailoverGroup::new(
            GROUP_NAME,
            backends
                .iter()
                .map(|b| Arc::clone(b) as Arc<dyn StorageBackend>)
                .collect(),
        )
        .expect("Failed to build failover group");
        let registry =
            Arc::new(GroupRegistry::new([group]).expect("Failed to build group registry"));

        Self {
            registry,
            backends,
            queue: Arc::new(QueueBus::new()),
            policy,
        }
    }

    /// Returns the group.
    pub fn group(&self) -> Arc<FailoverGroup> {
        Arc::clone(
            self.registry
                .get(GROUP_NAME)
                .expect("Fixture group is registered"),
        )
    }

    /// Returns backend `index`.
    pub fn backend(&self, index: usize) -> &InMemoryBackend {
        &self.backends[index]
    }

    /// Adapter enqueuing on [`MemoryGroup::queue`].
    pub fn queued_adapter(&self) -> FailoverAdapter {
        FailoverAdapter::new(self.group(), self.queue_bus())
    }

    /// Adapter handling messages on the calling thread.
    pub fn inline_adapter(&self) -> FailoverAdapter {
        FailoverAdapter::new(self.group(), self.inline_bus())
    }

    /// Reconciler enqueuing on [`MemoryGroup::queue`].
    pub fn queued_reconciler(&self) -> Reconciler {
        Reconciler::new(Arc::clone(&self.registry), self.queue_bus())
    }

    /// Reconciler handling messages on the calling thread.
    pub fn inline_reconciler(&self) -> Reconciler {
        Reconciler::new(Arc::clone(&self.registry), self.inline_bus())
    }

    /// Router with or without a retry bus pointing at the queue.
    pub fn router(&self, with_retry_bus: bool) -> MessageRouter {
        let retry_bus = with_retry_bus.then(|| self.queue_bus());
        MessageRouter::new(Arc::clone(&self.registry), retry_bus, self.policy.clone())
    }

    /// Worker draining the queue.
    pub fn worker(&self) -> Worker {
        Worker::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.queue),
            self.policy.clone(),
        )
    }

    /// Handles every message ready now.
    pub fn drain(&self) -> WorkerStats {
        self.worker().run_ready()
    }

    /// Handles queued messages, including delayed retries, for at most
    /// `rounds` batches or until the queue is empty.
    pub fn drain_with_retries(&self, rounds: usize) -> WorkerStats {
        let worker = self.worker();
        let mut total = WorkerStats::default();
        for _ in 0..rounds {
            if self.queue.is_empty() {
                break;
            }
            let cutoff = Instant::now() + self.policy.max_delay + Duration::from_secs(1);
            let stats = worker.run_until(cutoff);
            total.handled += stats.handled;
            total.failed += stats.failed;
        }
        total
    }

    /// Returns the queued messages in dispatch order.
    pub fn pending_messages(&self) -> Vec<FailoverMessage> {
        self.queue.pending().into_iter().map(|e| e.message).collect()
    }

    /// Writes a file on one backend with a fixed timestamp.
    pub fn seed(&self, index: usize, path: &str, contents: &[u8], last_modified: i64) {
        self.backends[index]
            .write_with_timestamp(path, contents, last_modified)
            .expect("Failed to seed file");
    }

    /// Returns the contents of a file on one backend, if present.
    pub fn contents(&self, index: usize, path: &str) -> Option<Vec<u8>> {
        self.backends[index].read(path).ok().map(|b| b.to_vec())
    }

    /// Returns every file of one backend with its contents.
    pub fn files(&self, index: usize) -> BTreeMap<String, Vec<u8>> {
        self.backends[index]
            .paths()
            .into_iter()
            .filter_map(|path| self.contents(index, &path).map(|c| (path, c)))
            .collect()
    }

    fn queue_bus(&self) -> Arc<dyn MessageBus> {
        Arc::clone(&self.queue) as Arc<dyn MessageBus>
    }

    fn inline_bus(&self) -> Arc<dyn MessageBus> {
        Arc::new(InlineBus::new(Arc::clone(&self.registry)))
    }
}

/// A failover group over directories in a temporary location.
pub struct LocalGroup {
    /// Registry holding the single group.
    pub registry: Arc<GroupRegistry>,
    /// Root directory of each backend.
    pub roots: Vec<PathBuf>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl LocalGroup {
    /// Creates a group of `count` empty directories.
    pub fn new(count: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let roots: Vec<PathBuf> = (0..count)
            .map(|i| temp_dir.path().join(format!("storage-{i}")))
            .collect();
        let backends = roots
            .iter()
            .map(|root| {
                Arc::new(
                    LocalBackend::open_with_create_dirs(root)
                        .expect("Failed to create local backend"),
                ) as Arc<dyn StorageBackend>
            })
            .collect();
        let group =
            FailoverGroup::new(GROUP_NAME, backends).expect("Failed to build failover group");

        Self {
            registry: Arc::new(GroupRegistry::new([group]).expect("Failed to build registry")),
            roots,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the group.
    pub fn group(&self) -> Arc<FailoverGroup> {
        Arc::clone(
            self.registry
                .get(GROUP_NAME)
                .expect("Fixture group is registered"),
        )
    }

    /// Adapter handling messages on the calling thread.
    pub fn inline_adapter(&self) -> FailoverAdapter {
        FailoverAdapter::new(
            self.group(),
            Arc::new(InlineBus::new(Arc::clone(&self.registry))),
        )
    }

    /// Reconciler handling messages on the calling thread.
    pub fn inline_reconciler(&self) -> Reconciler {
        Reconciler::new(
            Arc::clone(&self.registry),
            Arc::new(InlineBus::new(Arc::clone(&self.registry))),
        )
    }

    /// Absolute path of a file inside backend `index`.
    pub fn path(&self, index: usize, relative: &str) -> PathBuf {
        self.roots[index].join(relative)
    }
}
