//! ---
//! emon_section: "02-messaging-ipc-data-model"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Wire schema helpers and protocol codecs."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod codec;
pub mod dispatch;
pub mod transport;
pub mod types;

/// Shared result type for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors raised at the transport boundary. Decode failures carry their own
/// type ([`codec::DecodeError`]) because the policy for them differs per
/// route.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The transport refused an outbound publish.
    #[error("transport '{0}' rejected publish")]
    PublishRejected(&'static str),
    /// Wrapper for IO errors encountered during wire operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization or deserialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use codec::{decode, DecodeError, IgnoreReason, Inbound};
pub use dispatch::{CommandDispatcher, DispatchMetrics};
pub use transport::{ClosedTransport, InMemoryTransport, Transport};
pub use types::{
    relay_status_route, telemetry_route, Command, RelayStatus, TelemetrySample, WireMessage,
    RELAY_STATUS_SUBSCRIPTION, TELEMETRY_SUBSCRIPTION,
};
