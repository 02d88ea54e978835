//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::types::{guess_mime_type, normalize_path, ListEntry, Listing, Visibility};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: Bytes,
    last_modified: i64,
    visibility: Visibility,
}

/// An in-memory storage backend.
///
/// This backend stores all files in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral failover groups that don't need persistence
///
/// Failures can be injected with [`InMemoryBackend::set_available`] and
/// [`InMemoryBackend::set_read_only`] to simulate an offline or degraded
/// storage location.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use fsfailover_storage::{InMemoryBackend, StorageBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.write("a.txt", b"test data").unwrap();
/// assert_eq!(backend.file_size("a.txt").unwrap(), 9);
///
/// backend.set_available(false);
/// assert!(backend.read("a.txt").is_err());
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    files: RwLock<BTreeMap<String, MemoryFile>>,
    available: AtomicBool,
    read_only: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            read_only: AtomicBool::new(false),
        }
    }
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with [`StorageError::Unavailable`] while
    /// `available` is false.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes writes and deletes fail with [`StorageError::ReadOnly`] while
    /// `read_only` is true. Reads keep working.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Returns whether the backend currently accepts operations.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Writes a file with an explicit modification time.
    ///
    /// Useful for deterministic reconciliation tests. Ignores injected
    /// failures.
    pub fn write_with_timestamp(
        &self,
        path: &str,
        contents: &[u8],
        last_modified: i64,
    ) -> StorageResult<()> {
        let path = normalize_path(path)?;
        self.files.write().insert(
            path,
            MemoryFile {
                contents: Bytes::copy_from_slice(contents),
                last_modified,
                visibility: Visibility::default(),
            },
        );
        Ok(())
    }

    /// Sets the visibility of an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist.
    pub fn set_visibility(&self, path: &str, visibility: Visibility) -> StorageResult<()> {
        let path = normalize_path(path)?;
        let mut files = self.files.write();
        let file = files
            .get_mut(&path)
            .ok_or_else(|| StorageError::not_found(&path))?;
        file.visibility = visibility;
        Ok(())
    }

    /// Returns the sorted paths of all stored files.
    ///
    /// Useful for testing and debugging. Ignores injected failures.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }

    /// Returns the number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Returns true if no file is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    /// Removes every file.
    pub fn clear(&self) {
        self.files.write().clear();
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StorageError::unavailable("in-memory backend is offline"))
        }
    }

    fn check_writable(&self) -> StorageResult<()> {
        self.check_available()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }

    fn with_file<T>(&self, path: &str, f: impl FnOnce(&MemoryFile) -> T) -> StorageResult<T> {
        self.check_available()?;
        let path = normalize_path(path)?;
        let files = self.files.read();
        files
            .get(&path)
            .map(f)
            .ok_or_else(|| StorageError::not_found(path))
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn is_below(path: &str, root: &str) -> bool {
    root.is_empty()
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl StorageBackend for InMemoryBackend {
    fn file_exists(&self, path: &str) -> StorageResult<bool> {
        self.check_available()?;
        let path = normalize_path(path)?;
        Ok(self.files.read().contains_key(&path))
    }

    fn read(&self, path: &str) -> StorageResult<Bytes> {
        self.with_file(path, |file| file.contents.clone())
    }

    fn read_stream(&self, path: &str) -> StorageResult<Box<dyn Read + Send>> {
        let contents = self.read(path)?;
        Ok(Box::new(Cursor::new(contents)))
    }

    fn write(&self, path: &str, contents: &[u8]) -> StorageResult<()> {
        self.check_writable()?;
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Err(StorageError::InvalidPath { path });
        }

        let mut files = self.files.write();
        let visibility = files
            .get(&path)
            .map(|file| file.visibility)
            .unwrap_or_default();
        files.insert(
            path,
            MemoryFile {
                contents: Bytes::copy_from_slice(contents),
                last_modified: now_secs(),
                visibility,
            },
        );
        Ok(())
    }

    fn write_stream(&self, path: &str, contents: &mut dyn Read) -> StorageResult<()> {
        self.check_writable()?;
        let mut buffer = Vec::new();
        contents.read_to_end(&mut buffer)?;
        self.write(path, &buffer)
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        self.check_writable()?;
        let path = normalize_path(path)?;
        self.files.write().remove(&path);
        Ok(())
    }

    fn delete_directory(&self, path: &str) -> StorageResult<()> {
        self.check_writable()?;
        let root = normalize_path(path)?;
        self.files.write().retain(|key, _| !is_below(key, &root));
        Ok(())
    }

    fn visibility(&self, path: &str) -> StorageResult<Visibility> {
        self.with_file(path, |file| file.visibility)
    }

    fn mime_type(&self, path: &str) -> StorageResult<String> {
        let path = normalize_path(path)?;
        self.with_file(&path, |_| guess_mime_type(&path).to_string())
    }

    fn last_modified(&self, path: &str) -> StorageResult<i64> {
        self.with_file(path, |file| file.last_modified)
    }

    fn file_size(&self, path: &str) -> StorageResult<u64> {
        self.with_file(path, |file| file.contents.len() as u64)
    }

    fn list_contents(&self, root: &str, deep: bool) -> StorageResult<Listing<'_>> {
        self.check_available()?;
        let root = normalize_path(root)?;
        let files = self.files.read();

        let mut directories = BTreeSet::new();
        let mut entries = Vec::new();
        for (path, file) in files.iter().filter(|(path, _)| is_below(path, &root)) {
            let relative = if root.is_empty() {
                path.as_str()
            } else {
                &path[root.len() + 1..]
            };

            // Every intermediate directory is reported once.
            let mut prefix = root.clone();
            let segments: Vec<&str> = relative.split('/').collect();
            let Some((_, parents)) = segments.split_last() else {
                continue;
            };
            let mut nested = false;
            for parent in parents {
                if nested && !deep {
                    break;
                }
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(parent);
                directories.insert(prefix.clone());
                nested = true;
            }

            if deep || parents.is_empty() {
                entries.push(ListEntry::file(path.clone(), Some(file.last_modified)));
            }
        }

        let items: Vec<StorageResult<ListEntry>> = directories
            .into_iter()
            .map(|dir| Ok(ListEntry::directory(dir)))
            .chain(entries.into_iter().map(Ok))
            .collect();

        Ok(Box::new(items.into_iter()))
    }
}
