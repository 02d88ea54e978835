//! Storage backend trait definition.

use crate::error::StorageResult;
use crate::types::{Listing, Visibility};
use bytes::Bytes;
use std::io::Read;

/// A storage location that can participate in a failover group.
///
/// Backends are **interchangeable file stores** addressed by relative,
/// `/`-separated paths. The failover layer never inspects the concrete type
/// and treats every error as "this backend failed".
///
/// # Invariants
///
/// - `read` returns exactly the bytes of the last successful `write`
/// - `write` replaces any previous content of the path
/// - `delete` and `delete_directory` succeed when the path is already absent
/// - `list_contents` is finite and may be consumed only once
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::LocalBackend`] - For a directory on local disk
pub trait StorageBackend: Send + Sync {
    /// Returns whether a file exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot answer; an absent file is
    /// `Ok(false)`, not an error.
    fn file_exists(&self, path: &str) -> StorageResult<bool>;

    /// Reads the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is absent or cannot be read.
    fn read(&self, path: &str) -> StorageResult<Bytes>;

    /// Opens the file at `path` for streaming reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is absent or cannot be opened.
    fn read_stream(&self, path: &str) -> StorageResult<Box<dyn Read + Send>>;

    /// Writes `contents` to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn write(&self, path: &str, contents: &[u8]) -> StorageResult<()>;

    /// Writes everything produced by `contents` to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the source or writing the target fails.
    fn write_stream(&self, path: &str, contents: &mut dyn Read) -> StorageResult<()>;

    /// Deletes the file at `path`. Deleting an absent file succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot perform the deletion.
    fn delete(&self, path: &str) -> StorageResult<()>;

    /// Deletes `path` and everything below it. Deleting an absent directory
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot perform the deletion.
    fn delete_directory(&self, path: &str) -> StorageResult<()>;

    /// Returns the visibility of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is absent or the metadata is unavailable.
    fn visibility(&self, path: &str) -> StorageResult<Visibility>;

    /// Returns the MIME type of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is absent or the metadata is unavailable.
    fn mime_type(&self, path: &str) -> StorageResult<String>;

    /// Returns the last modification time of `path` in seconds since the
    /// Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is absent or the metadata is unavailable.
    fn last_modified(&self, path: &str) -> StorageResult<i64>;

    /// Returns the size of the file at `path` in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is absent or the metadata is unavailable.
    fn file_size(&self, path: &str) -> StorageResult<u64>;

    /// Lists entries below `root`, recursing into subdirectories when `deep`
    /// is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be started. Failures while
    /// iterating are yielded as `Err` items.
    fn list_contents(&self, root: &str, deep: bool) -> StorageResult<Listing<'_>>;
}
