//! Failover adapter: file operations over a whole group.

use crate::bus::MessageBus;
use crate::error::{FailoverError, FailoverResult};
use crate::group::FailoverGroup;
use crate::message::{DeleteDirectory, DeleteFile, FailoverMessage, ReplicateFile};
use bytes::Bytes;
use fsfailover_storage::{Listing, StorageBackend, StorageResult, Visibility};
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, warn};

/// File operations over a failover group.
///
/// - Reads and metadata lookups return the first backend that answers,
///   trying backends in index order.
/// - Writes commit to the first backend that accepts them, then enqueue a
///   [`ReplicateFile`] for every other backend.
/// - Deletes are attempted on every backend; each failure is deferred as a
///   [`DeleteFile`] or [`DeleteDirectory`] message and never surfaced.
///
/// Directory creation, visibility changes, moves, copies and listings are
/// rejected with [`FailoverError::UnsupportedOperation`].
pub struct FailoverAdapter {
    group: Arc<FailoverGroup>,
    bus: Arc<dyn MessageBus>,
}

impl FailoverAdapter {
    /// Creates an adapter over `group` dispatching on `bus`.
    pub fn new(group: Arc<FailoverGroup>, bus: Arc<dyn MessageBus>) -> Self {
        Self { group, bus }
    }

    /// Returns the group name.
    pub fn name(&self) -> &str {
        self.group.name()
    }

    /// Returns the wrapped group.
    pub fn group(&self) -> &Arc<FailoverGroup> {
        &self.group
    }

    /// Returns the backend at `index`.
    pub fn backend(&self, index: usize) -> FailoverResult<&Arc<dyn StorageBackend>> {
        self.group.backend(index)
    }

    /// Returns all backends in priority order.
    pub fn backends(&self) -> &[Arc<dyn StorageBackend>] {
        self.group.backends()
    }

    /// Checks whether a file exists, asking backends in order.
    pub fn file_exists(&self, path: &str) -> FailoverResult<bool> {
        self.first_success("file_exists", path, |b| b.file_exists(path))
    }

    /// Reads a file from the first backend that can serve it.
    pub fn read(&self, path: &str) -> FailoverResult<Bytes> {
        self.first_success("read", path, |b| b.read(path))
    }

    /// Opens a file for reading on the first backend that can serve it.
    pub fn read_stream(&self, path: &str) -> FailoverResult<Box<dyn Read + Send>> {
        self.first_success("read_stream", path, |b| b.read_stream(path))
    }

    /// Returns the visibility of a file.
    pub fn visibility(&self, path: &str) -> FailoverResult<Visibility> {
        self.first_success("visibility", path, |b| b.visibility(path))
    }

    /// Returns the mime type of a file.
    pub fn mime_type(&self, path: &str) -> FailoverResult<String> {
        self.first_success("mime_type", path, |b| b.mime_type(path))
    }

    /// Returns the last modification time of a file in unix seconds.
    pub fn last_modified(&self, path: &str) -> FailoverResult<i64> {
        self.first_success("last_modified", path, |b| b.last_modified(path))
    }

    /// Returns the size of a file in bytes.
    pub fn file_size(&self, path: &str) -> FailoverResult<u64> {
        self.first_success("file_size", path, |b| b.file_size(path))
    }

    /// Writes a file and returns the index of the backend that committed it.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::WriteFailed`] if no backend accepts the write.
    pub fn write(&self, path: &str, contents: &[u8]) -> FailoverResult<usize> {
        let committed = self
            .group
            .backends()
            .iter()
            .enumerate()
            .find_map(|(index, backend)| match backend.write(path, contents) {
                Ok(()) => Some(index),
                Err(e) => {
                    debug!(group = self.name(), index, path, error = %e, "write rejected");
                    None
                }
            })
            .ok_or_else(|| FailoverError::WriteFailed {
                path: path.to_string(),
            })?;

        self.replicate_from(committed, path);
        Ok(committed)
    }

    /// Writes a file from a seekable reader and returns the committing index.
    ///
    /// The reader is rewound to its starting position before each attempt.
    pub fn write_stream<R: Read + Seek>(&self, path: &str, contents: &mut R) -> FailoverResult<usize> {
        let start = contents.stream_position()?;
        let mut committed = None;

        for (index, backend) in self.group.backends().iter().enumerate() {
            contents.seek(SeekFrom::Start(start))?;
            match backend.write_stream(path, &mut *contents) {
                Ok(()) => {
                    committed = Some(index);
                    break;
                }
                Err(e) => {
                    debug!(group = self.name(), index, path, error = %e, "write rejected");
                }
            }
        }

        let committed = committed.ok_or_else(|| FailoverError::WriteFailed {
            path: path.to_string(),
        })?;
        self.replicate_from(committed, path);
        Ok(committed)
    }

    /// Deletes a file on every backend.
    ///
    /// Backends that fail get a [`DeleteFile`] message; nothing is returned
    /// to the caller even if every backend fails.
    pub fn delete(&self, path: &str) {
        for (index, backend) in self.group.backends().iter().enumerate() {
            if let Err(e) = backend.delete(path) {
                warn!(group = self.name(), index, path, error = %e, "delete deferred");
                self.enqueue(DeleteFile::new(self.name(), path, index).into());
            }
        }
    }

    /// Deletes a directory subtree on every backend, deferring failures as
    /// [`DeleteDirectory`] messages.
    pub fn delete_directory(&self, path: &str) {
        for (index, backend) in self.group.backends().iter().enumerate() {
            if let Err(e) = backend.delete_directory(path) {
                warn!(group = self.name(), index, path, error = %e, "directory delete deferred");
                self.enqueue(DeleteDirectory::new(self.name(), path, index).into());
            }
        }
    }

    /// Always fails with [`FailoverError::UnsupportedOperation`].
    pub fn create_directory(&self, _path: &str) -> FailoverResult<()> {
        Err(FailoverError::UnsupportedOperation {
            operation: "create_directory",
        })
    }

    /// Always fails with [`FailoverError::UnsupportedOperation`].
    pub fn set_visibility(&self, _path: &str, _visibility: Visibility) -> FailoverResult<()> {
        Err(FailoverError::UnsupportedOperation {
            operation: "set_visibility",
        })
    }

    /// Always fails with [`FailoverError::UnsupportedOperation`].
    pub fn move_file(&self, _source: &str, _destination: &str) -> FailoverResult<()> {
        Err(FailoverError::UnsupportedOperation { operation: "move" })
    }

    /// Always fails with [`FailoverError::UnsupportedOperation`].
    pub fn copy_file(&self, _source: &str, _destination: &str) -> FailoverResult<()> {
        Err(FailoverError::UnsupportedOperation { operation: "copy" })
    }

    /// Always fails with [`FailoverError::UnsupportedOperation`].
    ///
    /// Use [`FailoverAdapter::backend`] to list one backend.
    pub fn list_contents(&self, _path: &str, _deep: bool) -> FailoverResult<Listing<'_>> {
        Err(FailoverError::UnsupportedOperation {
            operation: "list_contents",
        })
    }

    fn first_success<T>(
        &self,
        operation: &'static str,
        path: &str,
        f: impl Fn(&dyn StorageBackend) -> StorageResult<T>,
    ) -> FailoverResult<T> {
        for (index, backend) in self.group.backends().iter().enumerate() {
            match f(backend.as_ref()) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    debug!(group = self.name(), index, operation, path, error = %e, "backend failed, trying next");
                }
            }
        }
        Err(FailoverError::AllBackendsFailed {
            operation,
            path: path.to_string(),
        })
    }

    fn replicate_from(&self, source: usize, path: &str) {
        for destination in (0..self.group.len()).filter(|&i| i != source) {
            self.enqueue(ReplicateFile::new(self.name(), path, source, destination).into());
        }
    }

    fn enqueue(&self, message: FailoverMessage) {
        if let Err(e) = self.bus.dispatch(message.clone()) {
            warn!(
                kind = message.kind(),
                group = message.group(),
                path = message.path(),
                target = message.target(),
                error = %e,
                "dispatch failed"
            );
        }
    }
}

impl std::fmt::Debug for FailoverAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverAdapter")
            .field("group", &self.group)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::QueueBus;
    use fsfailover_storage::InMemoryBackend;
    use std::io::Cursor;

    struct Fixture {
        adapter: FailoverAdapter,
        memories: Vec<Arc<InMemoryBackend>>,
        queue: Arc<QueueBus>,
    }

    fn fixture(n: usize) -> Fixture {
        let memories: Vec<Arc<InMemoryBackend>> =
            (0..n).map(|_| Arc::new(InMemoryBackend::new())).collect();
        let backends = memories
            .iter()
            .map(|m| Arc::clone(m) as Arc<dyn StorageBackend>)
            .collect();
        let group = Arc::new(FailoverGroup::new("g", backends).unwrap());
        let queue = Arc::new(QueueBus::new());
        let adapter = FailoverAdapter::new(group, Arc::clone(&queue) as Arc<dyn MessageBus>);
        Fixture {
            adapter,
            memories,
            queue,
        }
    }

    fn replicate_targets(queue: &QueueBus) -> Vec<(usize, usize)> {
        queue
            .pending()
            .into_iter()
            .map(|e| match e.message {
                FailoverMessage::ReplicateFile(m) => (m.source, m.destination),
                other => panic!("unexpected message {other:?}"),
            })
            .collect()
    }

    #[test]
    fn write_commits_to_primary() {
        let f = fixture(3);
        assert_eq!(f.adapter.write("a.txt", b"data").unwrap(), 0);
        assert_eq!(replicate_targets(&f.queue), vec![(0, 1), (0, 2)]);
        assert!(f.memories[0].file_exists("a.txt").unwrap());
        assert!(!f.memories[1].file_exists("a.txt").unwrap());
    }

    #[test]
    fn write_falls_through() {
        let f = fixture(3);
        f.memories[0].set_available(false);
        f.memories[1].set_read_only(true);

        assert_eq!(f.adapter.write("a.txt", b"data").unwrap(), 2);
        assert_eq!(replicate_targets(&f.queue), vec![(2, 0), (2, 1)]);
    }

    #[test]
    fn write_fails_when_nobody_accepts() {
        let f = fixture(2);
        f.memories[0].set_read_only(true);
        f.memories[1].set_read_only(true);

        let err = f.adapter.write("a.txt", b"data").unwrap_err();
        assert!(matches!(err, FailoverError::WriteFailed { .. }));
        assert!(f.queue.is_empty());
    }

    #[test]
    fn write_stream_rewinds_between_attempts() {
        let f = fixture(2);
        f.memories[0].set_read_only(true);

        let mut cursor = Cursor::new(b"streamed".to_vec());
        assert_eq!(f.adapter.write_stream("s.bin", &mut cursor).unwrap(), 1);
        assert_eq!(&f.memories[1].read("s.bin").unwrap()[..], b"streamed");
    }

    #[test]
    fn read_falls_through() {
        let f = fixture(2);
        f.memories[1].write("a.txt", b"second").unwrap();
        f.memories[0].set_available(false);

        assert_eq!(&f.adapter.read("a.txt").unwrap()[..], b"second");
        assert_eq!(f.adapter.file_size("a.txt").unwrap(), 6);
        assert_eq!(f.adapter.mime_type("a.txt").unwrap(), "text/plain");
    }

    #[test]
    fn read_fails_on_every_backend() {
        let f = fixture(2);
        f.memories[0].set_available(false);
        f.memories[1].set_available(false);

        assert!(matches!(
            f.adapter.read("a.txt"),
            Err(FailoverError::AllBackendsFailed {
                operation: "read",
                ..
            })
        ));
        assert!(matches!(
            f.adapter.file_exists("a.txt"),
            Err(FailoverError::AllBackendsFailed { .. })
        ));
    }

    #[test]
    fn exists_answers_from_first_available() {
        let f = fixture(2);
        f.memories[1].write("only-on-1", b"x").unwrap();
        assert!(!f.adapter.file_exists("only-on-1").unwrap());
    }

    #[test]
    fn delete_defers_failures() {
        let f = fixture(3);
        for memory in &f.memories {
            memory.write("a.txt", b"x").unwrap();
        }
        f.memories[1].set_available(false);

        f.adapter.delete("a.txt");

        assert!(!f.memories[0].file_exists("a.txt").unwrap());
        assert!(!f.memories[2].file_exists("a.txt").unwrap());
        let pending = f.queue.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message.kind(), "delete_file");
        assert_eq!(pending[0].message.target(), 1);
    }

    #[test]
    fn delete_directory_defers_failures() {
        let f = fixture(2);
        f.memories[0].set_read_only(true);
        f.memories[1].set_read_only(true);

        f.adapter.delete_directory("dir");
        let targets: Vec<_> = f.queue.pending().iter().map(|e| e.message.target()).collect();
        assert_eq!(targets, vec![0, 1]);
    }

    #[test]
    fn unsupported_operations() {
        let f = fixture(2);
        assert!(matches!(
            f.adapter.create_directory("d"),
            Err(FailoverError::UnsupportedOperation { .. })
        ));
        assert!(f.adapter.set_visibility("a", Visibility::Public).is_err());
        assert!(f.adapter.move_file("a", "b").is_err());
        assert!(f.adapter.copy_file("a", "b").is_err());
        assert!(f.adapter.list_contents("", true).is_err());
    }

    #[test]
    fn backend_lookup() {
        let f = fixture(2);
        assert!(f.adapter.backend(1).is_ok());
        assert!(matches!(
            f.adapter.backend(2),
            Err(FailoverError::IndexNotFound { index: 2, .. })
        ));
    }
}
