//! ---
//! emon_section: "03-telemetry-policy-safety"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Telemetry processing, policy evaluation, and safety actuation."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use emon_common::Room;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::policy::Severity;

/// Live-feed buffer depth. A lagging subscriber skips old findings; the
/// full log remains available through [`AlertSink::snapshot`].
const FEED_CAPACITY: usize = 256;

/// One evaluated policy outcome or recorded action, with enough context
/// to reconstruct what happened and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Identifier for deduplication and tracing.
    pub id: Uuid,
    pub severity: Severity,
    /// Room the finding concerns, or `None` for system-wide records.
    pub room: Option<Room>,
    pub message: String,
    /// Optional operator guidance.
    pub guidance: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    /// Construct a finding stamped with the current time.
    pub fn new(
        severity: Severity,
        room: Option<Room>,
        message: impl Into<String>,
        guidance: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            room,
            message: message.into(),
            guidance,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, append-only log of findings.
///
/// Records are never edited or removed. Consumers either take a point-in-
/// time snapshot or subscribe to the broadcast feed; neither path blocks
/// the recording side.
pub struct AlertSink {
    log: Mutex<Vec<Finding>>,
    feed: broadcast::Sender<Finding>,
}

impl AlertSink {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            log: Mutex::new(Vec::new()),
            feed,
        }
    }

    /// Append a finding, mirror it onto the tracing output, and fan it
    /// out to live subscribers.
    pub fn record(&self, finding: Finding) {
        match finding.severity {
            Severity::Info => tracing::info!(room = ?finding.room, "{}", finding.message),
            Severity::Warning => tracing::warn!(room = ?finding.room, "{}", finding.message),
            Severity::Alert => tracing::warn!(room = ?finding.room, alert = true, "{}", finding.message),
            Severity::Critical => tracing::error!(room = ?finding.room, "{}", finding.message),
        }
        self.log.lock().push(finding.clone());
        // no receivers is fine; the log is the source of truth
        let _ = self.feed.send(finding);
    }

    /// Convenience wrapper building and recording a finding.
    pub fn emit(
        &self,
        severity: Severity,
        room: Option<Room>,
        message: impl Into<String>,
        guidance: Option<String>,
    ) -> Finding {
        let finding = Finding::new(severity, room, message, guidance);
        self.record(finding.clone());
        finding
    }

    /// Point-in-time copy of the full log, in emission order.
    pub fn snapshot(&self) -> Vec<Finding> {
        self.log.lock().clone()
    }

    /// Subscribe to findings emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Finding> {
        self.feed.subscribe()
    }

    /// Number of findings recorded so far.
    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    /// Whether no findings have been recorded.
    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }
}

impl Default for AlertSink {
    fn default() -> Self {
        Self::new()
    }
}
