//! End-to-end failover, propagation and reconciliation scenarios.

use fsfailover_core::{
    DeleteFile, ExtraFilesPolicy, FailoverError, FailoverMessage, MessageBus, QueueBus,
    ReplicateFile, RetryDelayBus, RetryPolicy,
};
use fsfailover_storage::{StorageBackend, Visibility};
use fsfailover_testkit::{LocalGroup, MemoryGroup, GROUP_NAME};
use std::time::Duration;

fn replicate(path: &str, source: usize, destination: usize) -> FailoverMessage {
    ReplicateFile::new(GROUP_NAME, path, source, destination).into()
}

fn delete(path: &str, target: usize) -> FailoverMessage {
    DeleteFile::new(GROUP_NAME, path, target).into()
}

// ============================================================================
// Reconciliation
// ============================================================================

#[test]
fn primary_pass_fills_secondaries() {
    let fixture = MemoryGroup::new(3);
    fixture.seed(0, "f1", b"one", 100);
    fixture.seed(0, "f2", b"two", 200);
    fixture.seed(1, "f1", b"one", 100);

    let summary = fixture
        .queued_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Ignore)
        .unwrap();

    assert_eq!(
        fixture.pending_messages(),
        vec![replicate("f1", 0, 2), replicate("f2", 0, 1), replicate("f2", 0, 2)]
    );
    assert_eq!(summary.replicated.get(&1), Some(&1));
    assert_eq!(summary.replicated.get(&2), Some(&2));
    assert_eq!(summary.replicated.get(&0), None);

    fixture.drain();
    assert_eq!(fixture.files(1), fixture.files(0));
    assert_eq!(fixture.files(2), fixture.files(0));
    assert_eq!(fixture.backend(0).len(), 2);
}

#[test]
fn ignore_policy_leaves_extra_files_alone() {
    let fixture = MemoryGroup::new(3);
    fixture.seed(1, "f1", b"one", 100);
    fixture.seed(2, "f2", b"two", 100);

    let summary = fixture
        .inline_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Ignore)
        .unwrap();

    assert_eq!(summary.total_replicated(), 0);
    assert_eq!(summary.total_deleted(), 0);
    assert!(fixture.files(0).is_empty());
    assert_eq!(fixture.files(1).keys().collect::<Vec<_>>(), vec!["f1"]);
    assert_eq!(fixture.files(2).keys().collect::<Vec<_>>(), vec!["f2"]);
}

#[test]
fn delete_policy_removes_extra_files() {
    let fixture = MemoryGroup::new(3);
    fixture.seed(1, "f1", b"one", 100);
    fixture.seed(2, "f2", b"two", 100);

    let summary = fixture
        .queued_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Delete)
        .unwrap();
    assert_eq!(fixture.pending_messages(), vec![delete("f1", 1), delete("f2", 2)]);
    assert_eq!(summary.total_deleted(), 2);

    fixture.drain();
    for index in 0..3 {
        assert!(fixture.files(index).is_empty(), "backend {index} not empty");
    }
}

#[test]
fn copy_policy_spreads_extra_files() {
    let fixture = MemoryGroup::new(3);
    fixture.seed(1, "f1", b"one", 100);
    fixture.seed(2, "f2", b"two", 100);

    fixture
        .inline_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Copy)
        .unwrap();

    for index in 0..3 {
        assert_eq!(fixture.contents(index, "f1").unwrap(), b"one");
        assert_eq!(fixture.contents(index, "f2").unwrap(), b"two");
    }
}

#[test]
fn newer_secondary_copy_of_primary_file_is_kept() {
    let fixture = MemoryGroup::new(2);
    fixture.seed(0, "doc", b"primary", 100);
    fixture.seed(1, "doc", b"secondary", 300);

    for policy in [ExtraFilesPolicy::Copy, ExtraFilesPolicy::Delete] {
        let summary = fixture.queued_reconciler().sync(GROUP_NAME, policy).unwrap();
        assert_eq!(summary.total_replicated() + summary.total_deleted(), 0);
    }
    assert!(fixture.queue.is_empty());
    assert_eq!(fixture.contents(0, "doc").unwrap(), b"primary");
    assert_eq!(fixture.contents(1, "doc").unwrap(), b"secondary");
}

#[test]
fn delete_policy_keeps_replicated_primary_files() {
    let fixture = MemoryGroup::new(3);
    fixture.seed(0, "keep", b"k", 100);
    fixture
        .queued_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Ignore)
        .unwrap();
    fixture.drain();

    let summary = fixture
        .queued_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Delete)
        .unwrap();
    assert_eq!(summary.total_deleted(), 0);
    assert!(fixture.pending_messages().is_empty());

    fixture.drain();
    for index in 1..3 {
        assert_eq!(fixture.contents(index, "keep").unwrap(), b"k");
    }
}

#[test]
fn delete_policy_spares_secondary_holding_primary_file() {
    let fixture = MemoryGroup::new(3);
    fixture.seed(0, "f", b"x", 100);
    fixture.seed(1, "f", b"x", 100);

    fixture
        .queued_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Delete)
        .unwrap();
    assert_eq!(fixture.pending_messages(), vec![replicate("f", 0, 2)]);

    fixture.drain();
    for index in 0..3 {
        assert_eq!(fixture.contents(index, "f").unwrap(), b"x");
    }
}

#[test]
fn converged_group_dispatches_nothing() {
    let fixture = MemoryGroup::new(3);
    fixture.seed(0, "a", b"1", 100);
    fixture.seed(0, "dir/b", b"2", 200);
    fixture
        .queued_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Copy)
        .unwrap();
    fixture.drain();

    for policy in [ExtraFilesPolicy::Ignore, ExtraFilesPolicy::Delete, ExtraFilesPolicy::Copy] {
        let summary = fixture.queued_reconciler().sync(GROUP_NAME, policy).unwrap();
        assert_eq!(summary.total_replicated(), 0, "{policy}");
        assert_eq!(summary.total_deleted(), 0, "{policy}");
    }
    assert!(fixture.queue.is_empty());
}

#[test]
fn equal_timestamps_are_in_sync() {
    let fixture = MemoryGroup::new(2);
    fixture.seed(0, "doc", b"a", 100);
    fixture.seed(1, "doc", b"b", 100);

    let summary = fixture
        .queued_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Copy)
        .unwrap();
    assert_eq!(summary.total_replicated(), 0);
    assert!(fixture.queue.is_empty());
}

#[test]
fn offline_backend_is_skipped_not_emptied() {
    let fixture = MemoryGroup::new(3);
    fixture.seed(0, "f", b"x", 100);
    fixture.seed(1, "only-on-1", b"y", 100);
    fixture.backend(1).set_available(false);

    let summary = fixture
        .queued_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Delete)
        .unwrap();

    assert_eq!(summary.excluded, vec![1]);
    assert_eq!(fixture.pending_messages(), vec![replicate("f", 0, 2)]);
}

#[test]
fn offline_primary_leaves_extra_files_alone() {
    let fixture = MemoryGroup::new(3);
    fixture.seed(1, "f", b"x", 100);
    fixture.backend(0).set_available(false);

    for policy in [ExtraFilesPolicy::Copy, ExtraFilesPolicy::Delete] {
        let summary = fixture.queued_reconciler().sync(GROUP_NAME, policy).unwrap();
        assert_eq!(summary.excluded, vec![0]);
    }
    assert!(fixture.pending_messages().is_empty());
    assert_eq!(fixture.contents(1, "f").unwrap(), b"x");
}

#[test]
fn reconciliation_errors() {
    let fixture = MemoryGroup::new(2);
    let reconciler = fixture.queued_reconciler();
    assert!(matches!(
        reconciler.sync("unknown", ExtraFilesPolicy::Ignore),
        Err(FailoverError::GroupNotFound { .. })
    ));
    assert!(matches!(
        reconciler.sync_named(GROUP_NAME, "mirror"),
        Err(FailoverError::InvalidArgument(_))
    ));
}

// ============================================================================
// Failover adapter
// ============================================================================

#[test]
fn write_replicates_from_primary() {
    let fixture = MemoryGroup::new(3);
    let adapter = fixture.queued_adapter();

    assert_eq!(adapter.write("a.txt", b"data").unwrap(), 0);
    assert_eq!(
        fixture.pending_messages(),
        vec![replicate("a.txt", 0, 1), replicate("a.txt", 0, 2)]
    );

    fixture.drain();
    assert_eq!(fixture.contents(2, "a.txt").unwrap(), b"data");
}

#[test]
fn write_commits_to_first_available() {
    let fixture = MemoryGroup::new(3);
    fixture.backend(0).set_available(false);
    fixture.backend(1).set_read_only(true);
    let adapter = fixture.queued_adapter();

    assert_eq!(adapter.write("a.txt", b"data").unwrap(), 2);
    assert_eq!(
        fixture.pending_messages(),
        vec![replicate("a.txt", 2, 0), replicate("a.txt", 2, 1)]
    );
}

#[test]
fn write_rejected_everywhere() {
    let fixture = MemoryGroup::new(2);
    fixture.backend(0).set_read_only(true);
    fixture.backend(1).set_available(false);

    assert!(matches!(
        fixture.queued_adapter().write("a.txt", b"data"),
        Err(FailoverError::WriteFailed { .. })
    ));
    assert!(fixture.queue.is_empty());
}

#[test]
fn reads_fall_back() {
    let fixture = MemoryGroup::new(2);
    fixture.seed(1, "a.txt", b"from-1", 42);
    fixture.backend(0).set_available(false);
    let adapter = fixture.queued_adapter();

    assert_eq!(&adapter.read("a.txt").unwrap()[..], b"from-1");
    assert!(adapter.file_exists("a.txt").unwrap());
    assert_eq!(adapter.last_modified("a.txt").unwrap(), 42);
    assert_eq!(adapter.visibility("a.txt").unwrap(), Visibility::Private);

    let mut stream = adapter.read_stream("a.txt").unwrap();
    let mut buffer = Vec::new();
    std::io::Read::read_to_end(&mut stream, &mut buffer).unwrap();
    assert_eq!(buffer, b"from-1");

    fixture.backend(1).set_available(false);
    assert!(matches!(
        adapter.read("a.txt"),
        Err(FailoverError::AllBackendsFailed { operation: "read", .. })
    ));
    assert!(matches!(
        adapter.file_size("a.txt"),
        Err(FailoverError::AllBackendsFailed { operation: "file_size", .. })
    ));
}

#[test]
fn delete_fans_out_and_defers_failures() {
    let fixture = MemoryGroup::new(3);
    for index in 0..3 {
        fixture.seed(index, "a.txt", b"x", 1);
    }
    fixture.backend(2).set_read_only(true);

    fixture.queued_adapter().delete("a.txt");
    assert!(fixture.contents(0, "a.txt").is_none());
    assert!(fixture.contents(1, "a.txt").is_none());
    assert_eq!(fixture.pending_messages(), vec![delete("a.txt", 2)]);

    fixture.backend(2).set_read_only(false);
    fixture.drain();
    assert!(fixture.contents(2, "a.txt").is_none());
}

#[test]
fn delete_never_fails_synchronously() {
    let fixture = MemoryGroup::new(2);
    fixture.backend(0).set_available(false);
    fixture.backend(1).set_available(false);

    fixture.queued_adapter().delete_directory("dir");
    assert_eq!(fixture.pending_messages().len(), 2);
}

#[test]
fn unsupported_operations_are_rejected() {
    let fixture = MemoryGroup::new(2);
    let adapter = fixture.queued_adapter();

    for result in [
        adapter.create_directory("dir"),
        adapter.set_visibility("a", Visibility::Public),
        adapter.move_file("a", "b"),
        adapter.copy_file("a", "b"),
    ] {
        assert!(matches!(
            result,
            Err(FailoverError::UnsupportedOperation { .. })
        ));
    }
    assert!(adapter.list_contents("", true).is_err());
}

// ============================================================================
// Propagation and retries
// ============================================================================

#[test]
fn retry_delays() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for_retry(0), Duration::from_secs(1));
    assert_eq!(policy.delay_for_retry(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for_retry(10), Duration::from_secs(600));
    assert_eq!(policy.delay_for_retry(20), Duration::from_secs(600));
}

#[test]
fn replicate_is_idempotent() {
    let fixture = MemoryGroup::new(2);
    fixture.seed(0, "a.bin", &[1, 2, 3], 5);
    let router = fixture.router(false);
    let message = replicate("a.bin", 0, 1);

    router.handle(&message).unwrap();
    let once = fixture.contents(1, "a.bin");
    router.handle(&message).unwrap();
    assert_eq!(fixture.contents(1, "a.bin"), once);
    assert_eq!(once.unwrap(), vec![1, 2, 3]);
}

#[test]
fn handler_without_bus_rethrows() {
    let fixture = MemoryGroup::new(2);
    fixture.seed(0, "a", b"x", 1);
    fixture.backend(1).set_available(false);

    let err = fixture.router(false).handle(&replicate("a", 0, 1)).unwrap_err();
    assert!(matches!(err, FailoverError::Storage(_)));
    assert!(fixture.queue.is_empty());
}

#[test]
fn handler_with_bus_redispatches_same_message() {
    let fixture = MemoryGroup::new(2);
    fixture.seed(0, "a", b"x", 1);
    fixture.backend(1).set_available(false);

    fixture.router(true).handle(&replicate("a", 0, 1)).unwrap();

    let pending = fixture.queue.pending();
    assert_eq!(pending.len(), 1);
    match &pending[0].message {
        FailoverMessage::ReplicateFile(m) => {
            assert_eq!(m.path, "a");
            assert_eq!(m.source, 0);
            assert_eq!(m.destination, 1);
            assert_eq!(m.retry_count, 1);
        }
        other => panic!("unexpected message {other:?}"),
    }
}

#[test]
fn worker_retries_until_backend_recovers() {
    let fixture = MemoryGroup::new(3);
    fixture.backend(1).set_available(false);

    fixture.queued_adapter().write("a.txt", b"data").unwrap();
    let stats = fixture.drain();
    assert_eq!(stats.handled, 2);
    assert_eq!(fixture.contents(2, "a.txt").unwrap(), b"data");

    let pending = fixture.queue.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message.retry_count(), 1);
    assert_eq!(pending[0].delay, Some(Duration::from_secs(2)));

    fixture.backend(1).set_available(true);
    fixture.drain_with_retries(3);
    assert!(fixture.queue.is_empty());
    assert_eq!(fixture.contents(1, "a.txt").unwrap(), b"data");
}

#[test]
fn retry_delay_bus_only_delays_retries() {
    let queue = std::sync::Arc::new(QueueBus::new());
    let bus = RetryDelayBus::new(std::sync::Arc::clone(&queue), RetryPolicy::default());

    let first = bus.dispatch(replicate("a", 0, 1)).unwrap();
    let tenth = (0..10).fold(replicate("a", 0, 1), |m, _| m.next_attempt());
    let retried = bus.dispatch(tenth).unwrap();

    assert_eq!(first.delay, None);
    assert_eq!(retried.delay, Some(Duration::from_secs(600)));
    assert_eq!(queue.len(), 2);
}

#[test]
fn bounded_retries_give_up() {
    let fixture = MemoryGroup::with_policy(2, RetryPolicy::default().with_max_retries(2));
    fixture.backend(1).set_available(false);
    fixture.queue.dispatch(delete("gone", 1)).unwrap();

    let stats = fixture.drain_with_retries(10);
    assert_eq!(stats.handled, 2);
    assert_eq!(stats.failed, 1);
    assert!(fixture.queue.is_empty());
}

// ============================================================================
// Local disk
// ============================================================================

#[test]
fn local_group_end_to_end() {
    let fixture = LocalGroup::new(3);
    let adapter = fixture.inline_adapter();

    adapter.write("reports/2024/q1.csv", b"a,b\n1,2\n").unwrap();
    for index in 0..3 {
        assert_eq!(
            std::fs::read(fixture.path(index, "reports/2024/q1.csv")).unwrap(),
            b"a,b\n1,2\n"
        );
    }

    std::fs::write(fixture.path(2, "extra.txt"), b"stray").unwrap();
    fixture
        .inline_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Copy)
        .unwrap();
    for index in 0..2 {
        assert_eq!(std::fs::read(fixture.path(index, "extra.txt")).unwrap(), b"stray");
    }

    std::fs::write(fixture.path(1, "stray.txt"), b"gone soon").unwrap();
    let summary = fixture
        .inline_reconciler()
        .sync(GROUP_NAME, ExtraFilesPolicy::Delete)
        .unwrap();
    assert_eq!(summary.total_deleted(), 1);
    assert!(!fixture.path(1, "stray.txt").exists());
    for index in 0..3 {
        assert!(fixture.path(index, "reports/2024/q1.csv").exists());
        assert!(fixture.path(index, "extra.txt").exists());
    }

    adapter.delete("extra.txt");
    for index in 0..3 {
        assert!(!fixture.path(index, "extra.txt").exists());
    }

    adapter.delete_directory("reports");
    let group = fixture.group();
    for backend in group.backends() {
        assert!(!backend.file_exists("reports/2024/q1.csv").unwrap());
    }
}
