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

use crate::types::{RelayStatus, TelemetrySample, WireMessage};

/// Outcome of decoding one inbound message.
///
/// Skipped messages surface as [`Inbound::Ignored`] with a reason rather
/// than being swallowed, so every non-processed case stays enumerable and
/// testable.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A telemetry sample for a known room.
    Telemetry {
        /// Circuit the sample belongs to.
        room: Room,
        /// Decoded payload.
        sample: TelemetrySample,
    },
    /// A relay status report for a known room.
    RelayStatus {
        /// Circuit the report belongs to.
        room: Room,
        /// Reported relay state.
        on: bool,
    },
    /// A message deliberately skipped; see [`IgnoreReason`].
    Ignored(IgnoreReason),
}

/// Why an inbound message was skipped without raising an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The room id segment is outside the configured set. Forward
    /// compatible: other deployments may share the broker.
    UnknownRoom(String),
    /// The route does not match either inbound grammar.
    ForeignRoute(String),
    /// A relay status payload that did not decode. Status pings are a
    /// best-effort channel, so this is not worth an alert.
    MalformedStatus(Room),
}

/// A telemetry payload that is not valid structured data. Unlike status
/// pings this is alert-worthy: the meter is publishing garbage.
#[derive(Debug, thiserror::Error)]
#[error("telemetry payload on '{route}' is not valid structured data: {source}")]
pub struct DecodeError {
    /// Route the offending message arrived on.
    pub route: String,
    /// Underlying JSON error.
    #[source]
    pub source: serde_json::Error,
}

/// Decode one inbound wire message.
///
/// Telemetry payloads are parsed before the room id is checked, so a
/// malformed payload is reported even when the room is unknown. Relay
/// status messages never error: both unknown rooms and malformed payloads
/// come back as [`Inbound::Ignored`].
pub fn decode(message: &WireMessage) -> Result<Inbound, DecodeError> {
    let segments: Vec<&str> = message.route.split('/').collect();
    match segments.as_slice() {
        ["energy", "room", room_id] => {
            let sample: TelemetrySample =
                serde_json::from_str(&message.payload).map_err(|source| DecodeError {
                    route: message.route.clone(),
                    source,
                })?;
            match Room::from_wire(room_id) {
                Some(room) => Ok(Inbound::Telemetry { room, sample }),
                None => Ok(Inbound::Ignored(IgnoreReason::UnknownRoom(
                    (*room_id).to_owned(),
                ))),
            }
        }
        ["energy", "relay", "status", room_id] => match Room::from_wire(room_id) {
            Some(room) => match serde_json::from_str::<RelayStatus>(&message.payload) {
                Ok(status) => Ok(Inbound::RelayStatus {
                    room,
                    on: status.relay_estado,
                }),
                Err(_) => Ok(Inbound::Ignored(IgnoreReason::MalformedStatus(room))),
            },
            None => Ok(Inbound::Ignored(IgnoreReason::UnknownRoom(
                (*room_id).to_owned(),
            ))),
        },
        _ => Ok(Inbound::Ignored(IgnoreReason::ForeignRoute(
            message.route.clone(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{relay_status_route, telemetry_route};

    #[test]
    fn telemetry_for_known_room_decodes() {
        let msg = WireMessage::new(
            telemetry_route(Room::Kitchen),
            r#"{"tensao": 220.0, "corrente": 4.5}"#,
        );
        match decode(&msg).unwrap() {
            Inbound::Telemetry { room, sample } => {
                assert_eq!(room, Room::Kitchen);
                assert_eq!(sample.voltage, 220.0);
                assert_eq!(sample.current, 4.5);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn telemetry_with_missing_fields_reads_zero() {
        let msg = WireMessage::new(telemetry_route(Room::Bedroom), r#"{"corrente": 2.0}"#);
        match decode(&msg).unwrap() {
            Inbound::Telemetry { sample, .. } => {
                assert_eq!(sample.voltage, 0.0);
                assert_eq!(sample.current, 2.0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn malformed_telemetry_payload_is_a_decode_error() {
        let msg = WireMessage::new(telemetry_route(Room::Bathroom), "not json at all");
        let err = decode(&msg).unwrap_err();
        assert_eq!(err.route, "energy/room/bathroom");
    }

    #[test]
    fn unknown_room_telemetry_is_ignored() {
        let msg = WireMessage::new("energy/room/garage", r#"{"tensao": 230.0}"#);
        assert_eq!(
            decode(&msg).unwrap(),
            Inbound::Ignored(IgnoreReason::UnknownRoom("garage".into()))
        );
    }

    #[test]
    fn malformed_payload_for_unknown_room_still_errors() {
        // The payload is parsed before the room id check, matching the
        // alert contract for broken meters wherever they are wired.
        let msg = WireMessage::new("energy/room/garage", "{broken");
        assert!(decode(&msg).is_err());
    }

    #[test]
    fn relay_status_updates_decode() {
        let msg = WireMessage::new(
            relay_status_route(Room::Utility),
            r#"{"relay_estado": false}"#,
        );
        assert_eq!(
            decode(&msg).unwrap(),
            Inbound::RelayStatus {
                room: Room::Utility,
                on: false
            }
        );
    }

    #[test]
    fn malformed_relay_status_is_ignored_silently() {
        let msg = WireMessage::new(relay_status_route(Room::Utility), "OFF");
        assert_eq!(
            decode(&msg).unwrap(),
            Inbound::Ignored(IgnoreReason::MalformedStatus(Room::Utility))
        );
    }

    #[test]
    fn foreign_routes_are_ignored() {
        for route in [
            "energy/meter/kitchen",
            "water/room/kitchen",
            "energy/room",
            "energy/room/kitchen/extra",
        ] {
            let msg = WireMessage::new(route, "{}");
            assert_eq!(
                decode(&msg).unwrap(),
                Inbound::Ignored(IgnoreReason::ForeignRoute(route.into()))
            );
        }
    }
}
