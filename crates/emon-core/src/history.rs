//! ---
//! emon_section: "03-telemetry-policy-safety"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Telemetry processing, policy evaluation, and safety actuation."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use emon_common::Room;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One decoded, power-annotated telemetry reading. Immutable once
/// appended to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub room: Room,
    pub voltage: f64,
    pub current: f64,
    /// Real power in watts, derived at ingest time.
    pub power: f64,
    pub timestamp: DateTime<Utc>,
    /// Payload fields beyond voltage/current, carried through opaquely.
    #[serde(default)]
    pub extra: Map<String, JsonValue>,
}

/// Bounded FIFO ring of the most recent readings for one room.
///
/// Append is the only mutation: once at capacity the oldest entry is
/// evicted, and stored readings are never edited or removed otherwise.
#[derive(Debug, Clone)]
pub struct RoomHistory {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl RoomHistory {
    /// Create an empty ring with the given capacity (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            readings: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Append a reading, evicting the oldest entry when full.
    pub fn append(&mut self, reading: Reading) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    /// The last `k` power values in chronological order, or fewer if the
    /// ring holds fewer.
    pub fn recent_powers(&self, k: usize) -> Vec<f64> {
        let skip = self.readings.len().saturating_sub(k);
        self.readings.iter().skip(skip).map(|r| r.power).collect()
    }

    /// Most recent reading, if any.
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// Number of retained readings.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Whether the ring holds no readings.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(power: f64) -> Reading {
        Reading {
            room: Room::LivingRoom,
            voltage: 220.0,
            current: power / 220.0,
            power,
            timestamp: Utc::now(),
            extra: Map::new(),
        }
    }

    #[test]
    fn append_evicts_oldest_at_capacity() {
        let mut history = RoomHistory::with_capacity(100);
        for i in 1..=101 {
            history.append(reading(i as f64));
        }
        assert_eq!(history.len(), 100);
        // readings 2..=101 survive, in order
        let powers = history.recent_powers(100);
        assert_eq!(powers.first().copied(), Some(2.0));
        assert_eq!(powers.last().copied(), Some(101.0));
        assert_eq!(powers.len(), 100);
    }

    #[test]
    fn recent_powers_is_chronological_and_clamped() {
        let mut history = RoomHistory::with_capacity(10);
        for p in [10.0, 20.0, 30.0] {
            history.append(reading(p));
        }
        assert_eq!(history.recent_powers(2), vec![20.0, 30.0]);
        assert_eq!(history.recent_powers(5), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn latest_tracks_the_newest_reading() {
        let mut history = RoomHistory::with_capacity(3);
        assert!(history.latest().is_none());
        history.append(reading(42.0));
        history.append(reading(43.0));
        assert_eq!(history.latest().map(|r| r.power), Some(43.0));
    }
}
