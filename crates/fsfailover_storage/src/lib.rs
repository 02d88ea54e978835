//! # fsfailover storage
//!
//! Storage backend trait and implementations for fsfailover.
//!
//! This crate provides the capability interface every member of a failover
//! group must satisfy. Backends are **interchangeable file stores**: they
//! know nothing about groups, replication or retry policies.
//!
//! ## Design Principles
//!
//! - Backends are plain path-addressed file stores
//! - Every failure is reported as a [`StorageError`]; callers treat it as
//!   "this backend failed" without inspecting the variant
//! - Must be `Send + Sync` so a group can share them across workers
//! - Deleting an absent path succeeds, so replayed deletes are harmless
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing, ephemeral groups and fault injection
//! - [`LocalBackend`] - A directory on the local filesystem
//!
//! ## Example
//!
//! ```rust
//! use fsfailover_storage::{InMemoryBackend, StorageBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.write("docs/readme.txt", b"hello world").unwrap();
//! assert_eq!(&backend.read("docs/readme.txt").unwrap()[..], b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod local;
mod memory;
mod types;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use local::LocalBackend;
pub use memory::InMemoryBackend;
pub use types::{guess_mime_type, normalize_path, EntryKind, ListEntry, Listing, Visibility};
