//! Value types shared by all backends.

use crate::error::{StorageError, StorageResult};
use std::fmt;

/// Whether a file is readable by everyone or only by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Readable by anyone.
    Public,
    /// Readable by the owner only.
    #[default]
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => f.write_str("public"),
            Visibility::Private => f.write_str("private"),
        }
    }
}

/// Kind of an entry returned by a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

/// A single item produced by [`crate::StorageBackend::list_contents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Normalized path relative to the backend root.
    pub path: String,
    /// File or directory.
    pub kind: EntryKind,
    /// Last modification time in seconds since the Unix epoch, when known.
    pub last_modified: Option<i64>,
}

impl ListEntry {
    /// Creates a file entry.
    pub fn file(path: impl Into<String>, last_modified: Option<i64>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            last_modified,
        }
    }

    /// Creates a directory entry.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            last_modified: None,
        }
    }

    /// Returns true for regular files.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// A lazy, one-shot sequence of listing results.
///
/// An `Err` item means the listing broke part-way; consumers must treat the
/// whole listing as failed.
pub type Listing<'a> = Box<dyn Iterator<Item = StorageResult<ListEntry>> + Send + 'a>;

/// Normalizes a backend path.
///
/// Leading and duplicate separators and `.` components are dropped, so
/// `"/a//./b"` becomes `"a/b"`. The root normalizes to the empty string.
///
/// # Errors
///
/// Returns [`StorageError::InvalidPath`] if the path contains a `..`
/// component or a NUL byte.
pub fn normalize_path(path: &str) -> StorageResult<String> {
    if path.contains('\0') {
        return Err(StorageError::InvalidPath {
            path: path.to_string(),
        });
    }

    let mut parts = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                return Err(StorageError::InvalidPath {
                    path: path.to_string(),
                })
            }
            other => parts.push(other),
        }
    }

    Ok(parts.join("/"))
}

/// Guesses a MIME type from the extension of `path`.
///
/// Unknown extensions map to `application/octet-stream`.
pub fn guess_mime_type(path: &str) -> &'static str {
    let extension = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("txt") | Some("log") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_separators() {
        assert_eq!(normalize_path("/a//./b/").unwrap(), "a/b");
        assert_eq!(normalize_path("file.txt").unwrap(), "file.txt");
        assert_eq!(normalize_path("/").unwrap(), "");
        assert_eq!(normalize_path("a\\b").unwrap(), "a/b");
    }

    #[test]
    fn normalize_rejects_parent_components() {
        assert!(matches!(
            normalize_path("a/../../etc/passwd"),
            Err(StorageError::InvalidPath { .. })
        ));
        assert!(normalize_path("a\0b").is_err());
    }

    #[test]
    fn list_entry_kinds() {
        assert!(ListEntry::file("a", Some(1)).is_file());
        assert!(!ListEntry::directory("a").is_file());
        assert_eq!(Visibility::Public.to_string(), "public");
        assert_eq!(Visibility::default(), Visibility::Private);
    }

    #[test]
    fn mime_guessing() {
        assert_eq!(guess_mime_type("a/b/photo.JPG"), "image/jpeg");
        assert_eq!(guess_mime_type("notes.txt"), "text/plain");
        assert_eq!(guess_mime_type("dir.d/noext"), "application/octet-stream");
    }
}
