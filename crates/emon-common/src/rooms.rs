//! ---
//! emon_section: "01-core-functionality"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Shared primitives and utilities for the monitor runtime."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// One electrically monitored circuit in the premises.
///
/// The set is closed for a deployment: telemetry addressed to a wire id
/// outside this enum is ignored at the decode boundary rather than
/// materialised as arbitrary string state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Room {
    LivingRoom,
    Bedroom,
    Kitchen,
    Bathroom,
    Utility,
}

impl Room {
    /// Parse the `<room_id>` segment of a topic route. Returns `None` for
    /// ids outside the configured set.
    pub fn from_wire(segment: &str) -> Option<Self> {
        segment.parse().ok()
    }

    /// The id used in topic routes and configuration tables.
    pub fn wire_id(&self) -> &'static str {
        match self {
            Room::LivingRoom => "living_room",
            Room::Bedroom => "bedroom",
            Room::Kitchen => "kitchen",
            Room::Bathroom => "bathroom",
            Room::Utility => "utility",
        }
    }

    /// Human-readable label used in alert messages.
    pub fn label(&self) -> &'static str {
        match self {
            Room::LivingRoom => "Living room",
            Room::Bedroom => "Bedroom",
            Room::Kitchen => "Kitchen",
            Room::Bathroom => "Bathroom",
            Room::Utility => "Utility area",
        }
    }

    /// Iterate over every room in the deployment.
    pub fn all() -> impl Iterator<Item = Room> {
        Room::iter()
    }
}
