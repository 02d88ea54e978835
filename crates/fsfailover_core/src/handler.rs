//! Propagation handlers.
//!
//! Each handler resolves the group and backend indexes named by a message
//! and performs exactly one backend operation. On backend failure the
//! message is re-dispatched with its retry count incremented, or the error is
//! returned when no retry bus is wired (same-thread transports).

use crate::bus::{MessageBus, QueueBus, RetryDelayBus};
use crate::error::{FailoverError, FailoverResult};
use crate::group::GroupRegistry;
use crate::message::{DeleteDirectory, DeleteFile, FailoverMessage, ReplicateFile};
use crate::retry::RetryPolicy;
use fsfailover_storage::{StorageBackend, StorageError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Context shared by all handlers.
pub struct HandlerContext {
    /// Groups the messages refer to.
    pub registry: Arc<GroupRegistry>,
    /// Retry backoff policy.
    pub policy: RetryPolicy,
    retry_bus: Option<Arc<dyn MessageBus>>,
}

impl HandlerContext {
    /// Creates a new handler context.
    ///
    /// Without a retry bus, backend failures are returned to the caller.
    pub fn new(
        registry: Arc<GroupRegistry>,
        retry_bus: Option<Arc<dyn MessageBus>>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            policy,
            retry_bus,
        }
    }

    /// Returns true if failed messages are re-dispatched.
    pub fn has_retry_bus(&self) -> bool {
        self.retry_bus.is_some()
    }

    fn backend(&self, group: &str, index: usize) -> FailoverResult<Arc<dyn StorageBackend>> {
        self.registry.backend(group, index).map(Arc::clone)
    }

    fn retry_or_fail(&self, message: FailoverMessage, err: StorageError) -> FailoverResult<()> {
        let Some(bus) = &self.retry_bus else {
            return Err(err.into());
        };

        let next = message.next_attempt();
        if !self.policy.allows(next.retry_count()) {
            error!(
                kind = message.kind(),
                group = message.group(),
                path = message.path(),
                target = message.target(),
                attempts = message.retry_count(),
                error = %err,
                "giving up on propagation message"
            );
            return Err(FailoverError::RetriesExhausted {
                kind: message.kind(),
                path: message.path().to_string(),
                attempts: message.retry_count(),
            });
        }

        warn!(
            kind = message.kind(),
            group = message.group(),
            path = message.path(),
            target = message.target(),
            retry = next.retry_count(),
            error = %err,
            "propagation failed, retrying"
        );
        bus.dispatch(next)?;
        Ok(())
    }
}

/// Copies a file from the source backend to the destination backend.
pub struct ReplicateFileHandler {
    context: Arc<HandlerContext>,
}

impl ReplicateFileHandler {
    /// Creates a new handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a replicate message.
    ///
    /// Replaying the same message leaves the destination with the same bytes.
    pub fn handle(&self, message: &ReplicateFile) -> FailoverResult<()> {
        let source = self.context.backend(&message.group, message.source)?;
        let destination = self.context.backend(&message.group, message.destination)?;

        let result = source
            .read_stream(&message.path)
            .and_then(|mut reader| destination.write_stream(&message.path, &mut reader));

        match result {
            Ok(()) => {
                debug!(
                    group = %message.group,
                    path = %message.path,
                    source = message.source,
                    destination = message.destination,
                    "file replicated"
                );
                Ok(())
            }
            Err(err) => self.context.retry_or_fail(message.clone().into(), err),
        }
    }
}

/// Deletes a file on one backend.
pub struct DeleteFileHandler {
    context: Arc<HandlerContext>,
}

impl DeleteFileHandler {
    /// Creates a new handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a delete message. Deleting an absent file succeeds.
    pub fn handle(&self, message: &DeleteFile) -> FailoverResult<()> {
        let target = self.context.backend(&message.group, message.target)?;
        match target.delete(&message.path) {
            Ok(()) => {
                debug!(group = %message.group, path = %message.path, target = message.target, "file deleted");
                Ok(())
            }
            Err(err) => self.context.retry_or_fail(message.clone().into(), err),
        }
    }
}

/// Deletes a directory subtree on one backend.
pub struct DeleteDirectoryHandler {
    context: Arc<HandlerContext>,
}

impl DeleteDirectoryHandler {
    /// Creates a new handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a delete-directory message.
    pub fn handle(&self, message: &DeleteDirectory) -> FailoverResult<()> {
        let target = self.context.backend(&message.group, message.target)?;
        match target.delete_directory(&message.path) {
            Ok(()) => {
                debug!(group = %message.group, path = %message.path, target = message.target, "directory deleted");
                Ok(())
            }
            Err(err) => self.context.retry_or_fail(message.clone().into(), err),
        }
    }
}

/// Routes each message kind to its handler.
pub struct MessageRouter {
    context: Arc<HandlerContext>,
    replicate: ReplicateFileHandler,
    delete_file: DeleteFileHandler,
    delete_directory: DeleteDirectoryHandler,
}

impl MessageRouter {
    /// Creates a router with handlers sharing one context.
    pub fn new(
        registry: Arc<GroupRegistry>,
        retry_bus: Option<Arc<dyn MessageBus>>,
        policy: RetryPolicy,
    ) -> Self {
        Self::with_context(Arc::new(HandlerContext::new(registry, retry_bus, policy)))
    }

    /// Creates a router from an existing context.
    pub fn with_context(context: Arc<HandlerContext>) -> Self {
        Self {
            replicate: ReplicateFileHandler::new(Arc::clone(&context)),
            delete_file: DeleteFileHandler::new(Arc::clone(&context)),
            delete_directory: DeleteDirectoryHandler::new(Arc::clone(&context)),
            context,
        }
    }

    /// Returns the shared context.
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.context
    }

    /// Handles one message.
    pub fn handle(&self, message: &FailoverMessage) -> FailoverResult<()> {
        match message {
            FailoverMessage::ReplicateFile(m) => self.replicate.handle(m),
            FailoverMessage::DeleteFile(m) => self.delete_file.handle(m),
            FailoverMessage::DeleteDirectory(m) => self.delete_directory.handle(m),
        }
    }
}

/// Counters for one worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    /// Messages handled without error (including ones re-dispatched for retry).
    pub handled: usize,
    /// Messages whose handler returned an error.
    pub failed: usize,
}

/// Drains ready messages from a [`QueueBus`].
///
/// Failed messages go back to the same queue through a [`RetryDelayBus`], so
/// they only become ready again after their backoff delay.
pub struct Worker {
    router: MessageRouter,
    queue: Arc<QueueBus>,
}

impl Worker {
    /// Creates a worker consuming `queue`.
    pub fn new(registry: Arc<GroupRegistry>, queue: Arc<QueueBus>, policy: RetryPolicy) -> Self {
        let retry_bus: Arc<dyn MessageBus> =
            Arc::new(RetryDelayBus::new(Arc::clone(&queue), policy.clone()));
        Self {
            router: MessageRouter::new(registry, Some(retry_bus), policy),
            queue,
        }
    }

    /// Returns the queue this worker consumes.
    pub fn queue(&self) -> &Arc<QueueBus> {
        &self.queue
    }

    /// Handles every envelope that is ready now.
    ///
    /// Messages re-dispatched during the run carry a delay and are left for
    /// a later run.
    pub fn run_ready(&self) -> WorkerStats {
        self.run_until(Instant::now())
    }

    /// Handles the envelopes queued and ready at `cutoff` when the call
    /// starts. Envelopes dispatched while the batch runs wait for the next
    /// call, even if they are ready before `cutoff`.
    pub fn run_until(&self, cutoff: Instant) -> WorkerStats {
        let mut stats = WorkerStats::default();
        for envelope in self.queue.take_ready(cutoff) {
            match self.router.handle(&envelope.message) {
                Ok(()) => stats.handled += 1,
                Err(err) => {
                    warn!(
                        id = %envelope.id,
                        kind = envelope.message.kind(),
                        path = envelope.message.path(),
                        error = %err,
                        "message dropped"
                    );
                    stats.failed += 1;
                }
            }
        }
        stats
    }
}
