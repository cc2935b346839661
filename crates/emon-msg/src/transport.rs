//! ---
//! emon_section: "02-messaging-ipc-data-model"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Wire schema helpers and protocol codecs."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::types::WireMessage;
use crate::{Result, WireError};

/// Transport abstraction over the pub/sub channel.
///
/// Connection and reconnection mechanics live entirely behind this trait:
/// the core publishes fire-and-forget and polls for inbound messages, and
/// a broker-backed implementation plugs in from the embedding binary.
pub trait Transport: Send + Sync {
    /// Publish a message. Failure is reported to the caller but never
    /// retried by the core.
    fn publish(&self, msg: WireMessage) -> Result<()>;
    /// Take the next inbound message, if one is available.
    fn recv(&self) -> Option<WireMessage>;
    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

/// In-memory transport backed by a mutex protected queue. Used by tests
/// and single-process integration; published messages are readable back
/// through [`Transport::recv`].
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    queue: Arc<Mutex<VecDeque<WireMessage>>>,
}

impl InMemoryTransport {
    /// Create a new in-memory transport channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.queue.lock().expect("queue poisoned").len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain every queued message in publish order.
    pub fn drain(&self) -> Vec<WireMessage> {
        let mut guard = self.queue.lock().expect("queue poisoned");
        guard.drain(..).collect()
    }
}

impl Transport for InMemoryTransport {
    fn publish(&self, msg: WireMessage) -> Result<()> {
        let mut guard = self.queue.lock().expect("queue poisoned");
        guard.push_back(msg);
        Ok(())
    }

    fn recv(&self) -> Option<WireMessage> {
        let mut guard = self.queue.lock().expect("queue poisoned");
        guard.pop_front()
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

/// A transport whose publishes always fail. Stands in for a disconnected
/// broker when exercising the failure path.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosedTransport;

impl Transport for ClosedTransport {
    fn publish(&self, _msg: WireMessage) -> Result<()> {
        Err(WireError::PublishRejected(self.name()))
    }

    fn recv(&self) -> Option<WireMessage> {
        None
    }

    fn name(&self) -> &'static str {
        "closed"
    }
}
