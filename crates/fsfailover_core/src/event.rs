//! Reconciliation progress events.

use crate::bus::Envelope;
use crate::message::{DeleteFile, FailoverMessage, ReplicateFile};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// A structured progress event emitted by [`crate::Reconciler::sync`].
///
/// Events carry no control flow; observers may ignore them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Listing of a backend started.
    ListingStarted {
        /// Group name.
        group: String,
        /// Backend index.
        index: usize,
    },
    /// Listing of a backend completed.
    ListingSucceeded {
        /// Group name.
        group: String,
        /// Backend index.
        index: usize,
        /// Number of files listed.
        count: usize,
    },
    /// Listing of a backend failed; the backend is excluded from the run.
    ListingFailed {
        /// Group name.
        group: String,
        /// Backend index.
        index: usize,
        /// Error description.
        reason: String,
    },
    /// All listings are done and the diff is being computed.
    SearchStarted {
        /// Group name.
        group: String,
    },
    /// A replicate message is about to be dispatched.
    ReplicatePreDispatch(ReplicateFile),
    /// A replicate message was accepted by the bus.
    ReplicateDispatched(Envelope),
    /// A delete message is about to be dispatched.
    DeletePreDispatch(DeleteFile),
    /// A delete message was accepted by the bus.
    DeleteDispatched(Envelope),
    /// The bus rejected a message.
    DispatchFailed {
        /// The rejected message.
        message: FailoverMessage,
        /// Error description.
        reason: String,
    },
}

/// Receives reconciliation events.
pub trait SyncObserver: Send + Sync {
    /// Called for every event, in emission order.
    fn on_event(&self, event: &SyncEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::ListingStarted { group, index } => {
                debug!(group, index, "listing backend");
            }
            SyncEvent::ListingSucceeded {
                group,
                index,
                count,
            } => {
                info!(group, index, count, "backend listed");
            }
            SyncEvent::ListingFailed {
                group,
                index,
                reason,
            } => {
                warn!(group, index, reason, "listing failed, backend excluded from this run");
            }
            SyncEvent::SearchStarted { group } => {
                info!(group, "searching files to replicate");
            }
            SyncEvent::ReplicatePreDispatch(m) => {
                debug!(
                    group = %m.group,
                    path = %m.path,
                    source = m.source,
                    destination = m.destination,
                    "dispatching replicate"
                );
            }
            SyncEvent::DeletePreDispatch(m) => {
                debug!(group = %m.group, path = %m.path, target = m.target, "dispatching delete");
            }
            SyncEvent::ReplicateDispatched(envelope) | SyncEvent::DeleteDispatched(envelope) => {
                debug!(id = %envelope.id, kind = envelope.message.kind(), "dispatched");
            }
            SyncEvent::DispatchFailed { message, reason } => {
                warn!(
                    kind = message.kind(),
                    path = message.path(),
                    target = message.target(),
                    reason,
                    "dispatch failed"
                );
            }
        }
    }
}

/// Stores every event it receives.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().clone()
    }

    /// Drops the recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl SyncObserver for RecordingObserver {
    fn on_event(&self, event: &SyncEvent) {
        self.events.lock().push(event.clone());
    }
}
