//! # fsfailover core
//!
//! Failover and eventual-consistency replication across a prioritized list
//! of interchangeable storage backends.
//!
//! This crate provides:
//! - Failover groups and a registry resolving them by name
//! - The failover adapter (fall-through reads, first-available writes,
//!   fan-out deletes)
//! - Propagation messages, a message bus interface and in-process transports
//! - Propagation handlers with exponential retry backoff
//! - The reconciliation engine comparing backend inventories
//!
//! ## Architecture
//!
//! Live I/O goes through [`FailoverAdapter`]. Writes commit to the first
//! backend that accepts them and enqueue a [`ReplicateFile`] message for
//! every other backend. Deletes are attempted everywhere and failures are
//! deferred as [`DeleteFile`] messages.
//!
//! [`Reconciler::sync`] lists every backend, diffs the inventories against
//! the primary (index 0) and schedules repairs. Messages are delivered to a
//! [`MessageRouter`] by the bus; failed deliveries are re-dispatched with an
//! incremented retry count and a delay computed by [`RetryPolicy`].
//!
//! ## Key Invariants
//!
//! - A group has at least two backends; index 0 is the primary
//! - Only the failover adapter and the reconciler create new messages
//! - Handlers never change the path, source or destination of a message
//! - Replaying any message leaves the backends in the same final state
//! - No locks span backends; consistency between them is eventual

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod bus;
mod config;
mod error;
mod event;
mod group;
mod handler;
mod inventory;
mod message;
mod reconcile;
mod retry;

pub use adapter::FailoverAdapter;
pub use bus::{Envelope, InlineBus, MessageBus, QueueBus, RetryDelayBus};
pub use config::{BackendConfig, FailoverConfig, GroupConfig, RetrySettings, TransportKind};
pub use error::{FailoverError, FailoverResult};
pub use event::{RecordingObserver, SyncEvent, SyncObserver, TracingObserver};
pub use group::{FailoverGroup, GroupRegistry};
pub use handler::{
    DeleteDirectoryHandler, DeleteFileHandler, HandlerContext, MessageRouter,
    ReplicateFileHandler, Worker, WorkerStats,
};
pub use inventory::InventorySnapshot;
pub use message::{DeleteDirectory, DeleteFile, FailoverMessage, ReplicateFile};
pub use reconcile::{ExtraFilesPolicy, Reconciler, SyncSummary};
pub use retry::RetryPolicy;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
