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
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Cost projection for one power figure at a given tariff.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Power the projection is based on, in watts.
    pub power_w: f64,
    /// Cost per hour at the tariff.
    pub hourly: f64,
    /// Cost per day (24 h).
    pub daily: f64,
    /// Cost per month (30 days).
    pub monthly: f64,
}

impl CostBreakdown {
    /// Project a power figure (watts) at a tariff (currency/kWh).
    pub fn for_power(power_w: f64, tariff: f64) -> Self {
        let hourly = power_w / 1000.0 * tariff;
        let daily = hourly * 24.0;
        let monthly = daily * 30.0;
        Self {
            power_w,
            hourly,
            daily,
            monthly,
        }
    }
}

/// Per-room entry of a [`CostReport`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomCost {
    pub room: Room,
    pub cost: CostBreakdown,
}

/// Snapshot of cost estimates across all rooms with latest-known power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub generated_at: DateTime<Utc>,
    pub tariff: f64,
    pub rooms: Vec<RoomCost>,
    /// Sum of the per-room figures (not re-derived from summed power;
    /// the formula is linear so the two agree, but tests pin this one).
    pub total: CostBreakdown,
}

/// Aggregate the latest per-room power figures into a cost report.
/// Pure and stateless: safe to call at any cadence.
pub fn aggregate_costs(latest_power: &IndexMap<Room, f64>, tariff: f64) -> CostReport {
    let rooms: Vec<RoomCost> = latest_power
        .iter()
        .map(|(room, power)| RoomCost {
            room: *room,
            cost: CostBreakdown::for_power(*power, tariff),
        })
        .collect();

    let total = rooms.iter().fold(CostBreakdown::default(), |acc, entry| {
        CostBreakdown {
            power_w: acc.power_w + entry.cost.power_w,
            hourly: acc.hourly + entry.cost.hourly,
            daily: acc.daily + entry.cost.daily,
            monthly: acc.monthly + entry.cost.monthly,
        }
    });

    CostReport {
        generated_at: Utc::now(),
        tariff,
        rooms,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn kilowatt_at_65_cents() {
        let cost = CostBreakdown::for_power(1000.0, 0.65);
        assert!((cost.hourly - 0.65).abs() < TOLERANCE);
        assert!((cost.daily - 15.60).abs() < TOLERANCE);
        assert!((cost.monthly - 468.00).abs() < TOLERANCE);
    }

    #[test]
    fn zero_power_costs_nothing() {
        let cost = CostBreakdown::for_power(0.0, 0.65);
        assert_eq!(cost.hourly, 0.0);
        assert_eq!(cost.monthly, 0.0);
    }

    #[test]
    fn totals_are_the_sum_of_room_figures() {
        let mut latest = IndexMap::new();
        latest.insert(Room::LivingRoom, 400.0);
        latest.insert(Room::Kitchen, 600.0);
        let report = aggregate_costs(&latest, 0.65);

        assert_eq!(report.rooms.len(), 2);
        assert!((report.total.power_w - 1000.0).abs() < TOLERANCE);
        let summed_hourly: f64 = report.rooms.iter().map(|r| r.cost.hourly).sum();
        assert!((report.total.hourly - summed_hourly).abs() < TOLERANCE);
        assert!((report.total.hourly - 0.65).abs() < TOLERANCE);
    }

    #[test]
    fn report_is_stable_for_empty_input() {
        let report = aggregate_costs(&IndexMap::new(), 0.9);
        assert!(report.rooms.is_empty());
        assert_eq!(report.total.power_w, 0.0);
        assert_eq!(report.tariff, 0.9);
    }
}
