//! ---
//! emon_section: "03-telemetry-policy-safety"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Telemetry processing, policy evaluation, and safety actuation."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use emon_common::{MonitorConfig, Room};
use indexmap::IndexMap;

/// Fallback factor for a room with no configured entry. Should not occur
/// with the closed room set, but the model never fails on lookup.
const DEFAULT_POWER_FACTOR: f64 = 0.85;

/// Converts apparent power (V·A) into real power using per-room power
/// factors.
#[derive(Debug, Clone)]
pub struct PowerModel {
    factors: IndexMap<Room, f64>,
}

impl PowerModel {
    /// Build the model from an explicit factor table.
    pub fn new(factors: IndexMap<Room, f64>) -> Self {
        Self { factors }
    }

    /// Build the model from loaded configuration.
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.power_factors.clone())
    }

    /// Power factor for a room.
    pub fn factor(&self, room: Room) -> f64 {
        self.factors
            .get(&room)
            .copied()
            .unwrap_or(DEFAULT_POWER_FACTOR)
    }

    /// Real power in watts, rounded to two decimals.
    ///
    /// Non-positive voltage or current reads as "no load" and yields 0:
    /// meters report zeros during sensor dropout and that must not trip
    /// any threshold.
    pub fn power(&self, room: Room, voltage: f64, current: f64) -> f64 {
        if voltage <= 0.0 || current <= 0.0 {
            return 0.0;
        }
        round2(voltage * current * self.factor(room))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
