//! ---
//! emon_section: "02-messaging-ipc-data-model"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Wire schema helpers and protocol codecs."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::Command;
use crate::{Result, Transport};

/// Snapshot of dispatch counters for monitoring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchMetrics {
    /// Commands successfully handed to the transport.
    pub sent: u64,
    /// Commands the transport refused.
    pub dropped: u64,
}

struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> DispatchMetrics {
        DispatchMetrics {
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Fire-and-forget outbound command publisher.
///
/// There is no retry and no acknowledgement tracking: a failed publish is
/// counted, logged, and reported to the caller, which converts it into an
/// alert finding. The transport layer's own reconnection policy is the
/// only recovery mechanism.
pub struct CommandDispatcher {
    transport: Arc<dyn Transport>,
    counters: Counters,
}

impl CommandDispatcher {
    /// Construct a dispatcher over the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            counters: Counters::new(),
        }
    }

    /// Publish a command. Errors are returned for alerting but the command
    /// is gone either way.
    pub fn send(&self, command: Command) -> Result<()> {
        let message = command.to_wire();
        tracing::debug!(route = %message.route, payload = %message.payload, "publishing command");
        match self.transport.publish(message) {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(transport = self.transport.name(), error = %err, "command publish failed");
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// Current counter snapshot.
    pub fn metrics(&self) -> DispatchMetrics {
        self.counters.snapshot()
    }
}
