//! Message bus abstraction and in-process transports.
//!
//! The bus accepts propagation messages for asynchronous execution. Delivery
//! is at-least-once with no ordering guarantee across messages, so every
//! handler must be idempotent.

use crate::error::{FailoverError, FailoverResult};
use crate::group::GroupRegistry;
use crate::handler::MessageRouter;
use crate::message::FailoverMessage;
use crate::retry::RetryPolicy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// A message plus its delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique id of this dispatch. Redeliveries of the same dispatch share it.
    pub id: Uuid,
    /// The message.
    pub message: FailoverMessage,
    /// Delay before the message becomes visible to handlers.
    pub delay: Option<Duration>,
}

impl Envelope {
    /// Wraps a message with no delay.
    pub fn new(message: FailoverMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            delay: None,
        }
    }

    /// Sets the delivery delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Accepts messages for asynchronous execution.
///
/// This trait abstracts the queue transport, allowing for different
/// implementations (an external broker, the in-process [`QueueBus`], the
/// same-thread [`InlineBus`], etc.).
pub trait MessageBus: Send + Sync {
    /// Submits an envelope and returns it as accepted by the transport.
    fn dispatch_envelope(&self, envelope: Envelope) -> FailoverResult<Envelope>;

    /// Submits a message with no delay.
    fn dispatch(&self, message: FailoverMessage) -> FailoverResult<Envelope> {
        self.dispatch_envelope(Envelope::new(message))
    }
}

impl<B: MessageBus + ?Sized> MessageBus for Arc<B> {
    fn dispatch_envelope(&self, envelope: Envelope) -> FailoverResult<Envelope> {
        (**self).dispatch_envelope(envelope)
    }
}

#[derive(Debug)]
struct Queued {
    envelope: Envelope,
    ready_at: Instant,
}

/// In-process FIFO transport.
///
/// Envelopes become ready once their delay has elapsed. A [`crate::Worker`]
/// consumes ready envelopes; tests can inspect [`QueueBus::pending`].
#[derive(Debug, Default)]
pub struct QueueBus {
    queue: Mutex<VecDeque<Queued>>,
}

impl QueueBus {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the oldest envelope that is ready at `now`.
    pub fn pop_ready(&self, now: Instant) -> Option<Envelope> {
        let mut queue = self.queue.lock();
        let position = queue.iter().position(|queued| queued.ready_at <= now)?;
        queue.remove(position).map(|queued| queued.envelope)
    }

    /// Removes and returns every envelope that is ready at `now`.
    pub fn take_ready(&self, now: Instant) -> Vec<Envelope> {
        let mut queue = self.queue.lock();
        let (ready, waiting): (VecDeque<Queued>, VecDeque<Queued>) =
            queue.drain(..).partition(|queued| queued.ready_at <= now);
        *queue = waiting;
        ready.into_iter().map(|queued| queued.envelope).collect()
    }

    /// Returns copies of all queued envelopes in dispatch order.
    pub fn pending(&self) -> Vec<Envelope> {
        self.queue
            .lock()
            .iter()
            .map(|queued| queued.envelope.clone())
            .collect()
    }

    /// Returns the earliest instant at which an envelope becomes ready.
    pub fn next_ready_at(&self) -> Option<Instant> {
        self.queue.lock().iter().map(|queued| queued.ready_at).min()
    }

    /// Returns the number of queued envelopes.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Drops every queued envelope and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut queue = self.queue.lock();
        let count = queue.len();
        queue.clear();
        count
    }
}

impl MessageBus for QueueBus {
    fn dispatch_envelope(&self, envelope: Envelope) -> FailoverResult<Envelope> {
        let ready_at = Instant::now() + envelope.delay.unwrap_or_default();
        debug!(
            id = %envelope.id,
            kind = envelope.message.kind(),
            path = envelope.message.path(),
            retry = envelope.message.retry_count(),
            delay_ms = envelope.delay.map(|d| d.as_millis() as u64),
            "message queued"
        );
        self.queue.lock().push_back(Queued {
            envelope: envelope.clone(),
            ready_at,
        });
        Ok(envelope)
    }
}

/// Middleware stamping the retry backoff delay on redelivered messages.
///
/// Envelopes whose message has a retry count above zero get
/// `policy.delay_for_retry(retry_count)` as delay; first dispatches pass
/// through untouched.
#[derive(Debug)]
pub struct RetryDelayBus<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B: MessageBus> RetryDelayBus<B> {
    /// Wraps `inner`.
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the wrapped bus.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Returns the policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<B: MessageBus> MessageBus for RetryDelayBus<B> {
    fn dispatch_envelope(&self, mut envelope: Envelope) -> FailoverResult<Envelope> {
        let retry_count = envelope.message.retry_count();
        if retry_count > 0 {
            envelope.delay = Some(self.policy.delay_for_retry(retry_count));
        }
        self.inner.dispatch_envelope(envelope)
    }
}

/// Same-thread transport: every message is handled during `dispatch`.
///
/// Delays are ignored. The router behind it has no retry bus, so a failing
/// backend makes the dispatch itself fail instead of re-dispatching into the
/// same thread forever.
pub struct InlineBus {
    router: MessageRouter,
}

impl InlineBus {
    /// Creates an inline bus handling messages against `registry`.
    pub fn new(registry: Arc<GroupRegistry>) -> Self {
        Self {
            router: MessageRouter::new(registry, None, RetryPolicy::default()),
        }
    }
}

impl MessageBus for InlineBus {
    fn dispatch_envelope(&self, envelope: Envelope) -> FailoverResult<Envelope> {
        self.router.handle(&envelope.message).map_err(|e| {
            FailoverError::Dispatch(format!(
                "{} of {} failed: {e}",
                envelope.message.kind(),
                envelope.message.path()
            ))
        })?;
        Ok(envelope)
    }
}
