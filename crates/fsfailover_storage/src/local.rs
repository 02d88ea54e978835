//! Local-directory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::types::{guess_mime_type, normalize_path, ListEntry, Listing, Visibility};
use bytes::Bytes;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

/// Prefix of the scratch files used while writing; never listed.
const TEMP_PREFIX: &str = ".fsfailover-tmp";

/// A storage backend rooted at a directory on the local filesystem.
///
/// Paths are resolved relative to the root; paths containing `..` are
/// rejected so a backend can never touch files outside its root.
///
/// # Durability
///
/// Writes go to a scratch file in the target directory which is synced and
/// then renamed over the destination, so readers never observe a partially
/// written file.
///
/// # Example
///
/// ```no_run
/// use fsfailover_storage::{LocalBackend, StorageBackend};
/// use std::path::Path;
///
/// let backend = LocalBackend::open_with_create_dirs(Path::new("/srv/storage-a")).unwrap();
/// backend.write("reports/2024.csv", b"a,b,c").unwrap();
/// ```
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl LocalBackend {
    /// Opens a backend rooted at an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist or is not a directory.
    pub fn open(root: &Path) -> StorageResult<Self> {
        let metadata = fs::metadata(root)?;
        if !metadata.is_dir() {
            return Err(StorageError::InvalidPath {
                path: root.display().to_string(),
            });
        }

        Ok(Self {
            root: root.to_path_buf(),
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Opens a backend, creating the root directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open_with_create_dirs(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Self::open(root)
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> StorageResult<(String, PathBuf)> {
        let normalized = normalize_path(path)?;
        let full = if normalized.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&normalized)
        };
        Ok((normalized, full))
    }

    fn resolve_file(&self, path: &str) -> StorageResult<PathBuf> {
        let (normalized, full) = self.resolve(path)?;
        if normalized.is_empty() {
            return Err(StorageError::InvalidPath { path: normalized });
        }
        Ok(full)
    }

    fn metadata(&self, path: &str) -> StorageResult<fs::Metadata> {
        let full = self.resolve_file(path)?;
        let metadata = fs::metadata(&full).map_err(|e| map_not_found(e, path))?;
        if !metadata.is_file() {
            return Err(StorageError::not_found(path));
        }
        Ok(metadata)
    }

    fn write_atomically(
        &self,
        path: &str,
        fill: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> StorageResult<()> {
        let full = self.resolve_file(path)?;
        let parent = full.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent)?;

        let counter = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let scratch = parent.join(format!("{TEMP_PREFIX}-{}-{counter}", std::process::id()));

        let result = File::create(&scratch).and_then(|mut file| {
            fill(&mut file)?;
            file.flush()?;
            file.sync_all()
        });

        match result.and_then(|()| fs::rename(&scratch, &full)) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = fs::remove_file(&scratch);
                Err(e.into())
            }
        }
    }
}

fn map_not_found(error: io::Error, path: &str) -> StorageError {
    if error.kind() == io::ErrorKind::NotFound {
        StorageError::not_found(path)
    } else {
        StorageError::Io(error)
    }
}

fn modified_secs(metadata: &fs::Metadata) -> Option<i64> {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

#[cfg(unix)]
fn visibility_of(metadata: &fs::Metadata) -> Visibility {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o004 != 0 {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

#[cfg(not(unix))]
fn visibility_of(_metadata: &fs::Metadata) -> Visibility {
    Visibility::Public
}

impl StorageBackend for LocalBackend {
    fn file_exists(&self, path: &str) -> StorageResult<bool> {
        let full = self.resolve_file(path)?;
        match fs::metadata(&full) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self, path: &str) -> StorageResult<Bytes> {
        let full = self.resolve_file(path)?;
        let contents = fs::read(&full).map_err(|e| map_not_found(e, path))?;
        Ok(Bytes::from(contents))
    }

    fn read_stream(&self, path: &str) -> StorageResult<Box<dyn Read + Send>> {
        let full = self.resolve_file(path)?;
        let file = File::open(&full).map_err(|e| map_not_found(e, path))?;
        Ok(Box::new(file))
    }

    fn write(&self, path: &str, contents: &[u8]) -> StorageResult<()> {
        self.write_atomically(path, |file| file.write_all(contents))
    }

    fn write_stream(&self, path: &str, contents: &mut dyn Read) -> StorageResult<()> {
        self.write_atomically(path, |file| io::copy(contents, file).map(|_| ()))
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        let full = self.resolve_file(path)?;
        match fs::remove_file(&full) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn delete_directory(&self, path: &str) -> StorageResult<()> {
        let (normalized, full) = self.resolve(path)?;

        if !normalized.is_empty() {
            return match fs::remove_dir_all(&full) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        // The root itself stays; only its contents go.
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    fn visibility(&self, path: &str) -> StorageResult<Visibility> {
        Ok(visibility_of(&self.metadata(path)?))
    }

    fn mime_type(&self, path: &str) -> StorageResult<String> {
        self.metadata(path)?;
        Ok(guess_mime_type(path).to_string())
    }

    fn last_modified(&self, path: &str) -> StorageResult<i64> {
        let metadata = self.metadata(path)?;
        modified_secs(&metadata).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "modification time unavailable",
            ))
        })
    }

    fn file_size(&self, path: &str) -> StorageResult<u64> {
        Ok(self.metadata(path)?.len())
    }

    fn list_contents(&self, root: &str, deep: bool) -> StorageResult<Listing<'_>> {
        let (_, full) = self.resolve(root)?;
        let first = fs::read_dir(&full)?;
        Ok(Box::new(Walk {
            root: self.root.clone(),
            deep,
            stack: vec![first],
        }))
    }
}

/// Lazy depth-first directory walk. Stops after the first error.
struct Walk {
    root: PathBuf,
    deep: bool,
    stack: Vec<fs::ReadDir>,
}

impl Walk {
    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn fail(&mut self, error: io::Error) -> Option<StorageResult<ListEntry>> {
        self.stack.clear();
        Some(Err(error.into()))
    }
}

impl Iterator for Walk {
    type Item = StorageResult<ListEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = self.stack.last_mut()?.next();
            let entry = match next {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(Err(e)) => return self.fail(e),
                Some(Ok(entry)) => entry,
            };

            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => return self.fail(e),
            };
            let path = self.relative(&entry.path());

            if metadata.is_dir() {
                if self.deep {
                    match fs::read_dir(entry.path()) {
                        Ok(children) => self.stack.push(children),
                        Err(e) => return self.fail(e),
                    }
                }
                return Some(Ok(ListEntry::directory(path)));
            }

            return Some(Ok(ListEntry::file(path, modified_secs(&metadata))));
        }
    }
}
