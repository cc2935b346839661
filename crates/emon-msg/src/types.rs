//! ---
//! emon_section: "02-messaging-ipc-data-model"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Wire schema helpers and protocol codecs."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use emon_common::Room;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Subscription pattern covering every room telemetry route.
pub const TELEMETRY_SUBSCRIPTION: &str = "energy/room/+";

/// Subscription pattern covering every relay status route.
pub const RELAY_STATUS_SUBSCRIPTION: &str = "energy/relay/status/+";

const DOMAIN: &str = "energy";

/// A raw message as carried by the pub/sub transport: a topic-like route
/// plus an opaque payload string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Topic-like route, e.g. `energy/room/kitchen`.
    pub route: String,
    /// Raw payload text. Telemetry and status payloads are JSON; control
    /// payloads are bare literals.
    pub payload: String,
}

impl WireMessage {
    /// Construct a wire message from route and payload.
    pub fn new(route: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            payload: payload.into(),
        }
    }
}

/// Build the telemetry route for a room.
pub fn telemetry_route(room: Room) -> String {
    format!("{}/room/{}", DOMAIN, room.wire_id())
}

/// Build the relay status route for a room.
pub fn relay_status_route(room: Room) -> String {
    format!("{}/relay/status/{}", DOMAIN, room.wire_id())
}

/// Decoded telemetry payload. The field names on the wire come from the
/// metering firmware (`tensao` = voltage, `corrente` = current); missing
/// fields read as 0. Any other fields ride along opaquely so downstream
/// consumers can inspect them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Line voltage in volts.
    #[serde(rename = "tensao", default)]
    pub voltage: f64,
    /// Circuit current in amperes.
    #[serde(rename = "corrente", default)]
    pub current: f64,
    /// Fields beyond voltage/current, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Relay status report published by the switching hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatus {
    /// Whether the relay is currently conducting.
    pub relay_estado: bool,
}

/// Outbound control command.
///
/// Every command is fire-and-forget: the payloads are bare `"ON"`/`"OFF"`/
/// `"SHUTDOWN"` literals understood by the switching hardware, and the core
/// never waits for acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch a single room's relay.
    Relay {
        /// Target circuit.
        room: Room,
        /// Desired relay state.
        on: bool,
    },
    /// Switch every relay at once.
    AllRelays {
        /// Desired relay state.
        on: bool,
    },
    /// Emergency shutdown signal. Semantically "all relays off" plus an
    /// out-of-band alarm; the caller issues the all-off command separately.
    Emergency,
}

impl Command {
    /// Route the command is published on.
    pub fn route(&self) -> String {
        match self {
            Command::Relay { room, .. } => format!("{}/control/{}", DOMAIN, room.wire_id()),
            Command::AllRelays { .. } => format!("{}/control/relay", DOMAIN),
            Command::Emergency => format!("{}/control/emergency", DOMAIN),
        }
    }

    /// Literal payload carried by the command.
    pub fn payload(&self) -> &'static str {
        match self {
            Command::Relay { on: true, .. } | Command::AllRelays { on: true } => "ON",
            Command::Relay { on: false, .. } | Command::AllRelays { on: false } => "OFF",
            Command::Emergency => "SHUTDOWN",
        }
    }

    /// Render the command as a wire message.
    pub fn to_wire(&self) -> WireMessage {
        WireMessage::new(self.route(), self.payload())
    }
}
