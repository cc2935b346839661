//! ---
//! emon_section: "03-telemetry-policy-safety"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Telemetry processing, policy evaluation, and safety actuation."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use emon_common::{ResolvedLimits, Room, TelemetryConfig};
use serde::{Deserialize, Serialize};

use crate::history::{Reading, RoomHistory};

/// Severity levels carried by alert findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Alert,
    Critical,
}

/// Spike-detection tuning, lifted from the telemetry config section.
#[derive(Debug, Clone, Copy)]
pub struct SpikePolicy {
    /// Number of trailing samples in the rolling average.
    pub window: usize,
    /// Absolute floor in watts: below this nothing is a spike, which
    /// keeps noise at low baseline from flagging.
    pub min_watts: f64,
    /// Relative factor over the rolling average that catches sudden
    /// jumps at higher baseline.
    pub factor: f64,
}

impl From<&TelemetryConfig> for SpikePolicy {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            window: config.spike_window,
            min_watts: config.spike_min_watts,
            factor: config.spike_factor,
        }
    }
}

/// One policy outcome for a single reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Violation {
    Undervoltage { volts: f64 },
    Overvoltage { volts: f64 },
    ElevatedCurrent { amps: f64 },
    /// Above the cutoff threshold; drives the automatic relay-off.
    CriticalCurrent { amps: f64 },
    ConsumptionSpike { watts: f64, threshold: f64 },
}

impl Violation {
    /// Severity this violation is recorded at.
    pub fn severity(&self) -> Severity {
        match self {
            Violation::Undervoltage { .. }
            | Violation::Overvoltage { .. }
            | Violation::ConsumptionSpike { .. } => Severity::Warning,
            Violation::ElevatedCurrent { .. } => Severity::Alert,
            Violation::CriticalCurrent { .. } => Severity::Critical,
        }
    }

    /// Whether this violation forces the relay off.
    pub fn is_cutoff(&self) -> bool {
        matches!(self, Violation::CriticalCurrent { .. })
    }

    /// Alert message, including the automatic action for a cutoff.
    pub fn message(&self, room: Room) -> String {
        match self {
            Violation::Undervoltage { volts } => {
                format!("{}: undervoltage detected ({:.1} V).", room.label(), volts)
            }
            Violation::Overvoltage { volts } => {
                format!("{}: overvoltage detected ({:.1} V).", room.label(), volts)
            }
            Violation::ElevatedCurrent { amps } => {
                format!("{}: elevated current {:.1} A.", room.label(), amps)
            }
            Violation::CriticalCurrent { amps } => format!(
                "{}: critical current {:.1} A. Relay switched OFF for safety.",
                room.label(),
                amps
            ),
            Violation::ConsumptionSpike { watts, .. } => {
                format!("{}: high consumption right now ({:.0} W).", room.label(), watts)
            }
        }
    }

    /// Operator guidance recorded alongside the message.
    pub fn guidance(&self) -> &'static str {
        match self {
            Violation::Undervoltage { .. } => {
                "Avoid switching on sensitive appliances. If it persists, contact the utility."
            }
            Violation::Overvoltage { .. } => {
                "Disconnect sensitive equipment. If it continues, notify the utility."
            }
            Violation::ElevatedCurrent { .. } => {
                "Avoid adding more load on this circuit."
            }
            Violation::CriticalCurrent { .. } => {
                "Check for a short circuit or overheating. Re-energise only after inspection."
            }
            Violation::ConsumptionSpike { .. } => {
                "Expected if you just switched on a heavy load. Otherwise, investigate."
            }
        }
    }
}

/// Evaluate a freshly appended reading against the room's resolved limits
/// and post-append history.
///
/// Checks run in a fixed order and independently of each other, so one
/// reading can produce several findings: voltage band first (under/over
/// are mutually exclusive), then current severity (cutoff takes precedence
/// over warn), then the consumption spike once the history window is full.
/// The rolling average deliberately includes the reading under evaluation.
pub fn evaluate(
    reading: &Reading,
    history: &RoomHistory,
    limits: ResolvedLimits,
    spike: &SpikePolicy,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if reading.voltage < limits.voltage_low {
        violations.push(Violation::Undervoltage {
            volts: reading.voltage,
        });
    } else if reading.voltage > limits.voltage_high {
        violations.push(Violation::Overvoltage {
            volts: reading.voltage,
        });
    }

    if reading.current > limits.current_cutoff {
        violations.push(Violation::CriticalCurrent {
            amps: reading.current,
        });
    } else if reading.current > limits.current_warn {
        violations.push(Violation::ElevatedCurrent {
            amps: reading.current,
        });
    }

    if history.len() >= spike.window {
        let recent = history.recent_powers(spike.window);
        let avg = recent.iter().sum::<f64>() / spike.window as f64;
        let threshold = spike.min_watts.max(avg * spike.factor);
        if reading.power > threshold {
            violations.push(Violation::ConsumptionSpike {
                watts: reading.power,
                threshold,
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Map;

    const LIMITS: ResolvedLimits = ResolvedLimits {
        voltage_low: 90.0,
        voltage_high: 260.0,
        current_warn: 10.0,
        current_cutoff: 15.0,
    };

    const SPIKE: SpikePolicy = SpikePolicy {
        window: 10,
        min_watts: 200.0,
        factor: 1.6,
    };

    fn reading(voltage: f64, current: f64, power: f64) -> Reading {
        Reading {
            room: Room::LivingRoom,
            voltage,
            current,
            power,
            timestamp: Utc::now(),
            extra: Map::new(),
        }
    }

    /// Append `powers` then the probe reading, mirroring the evaluator's
    /// post-append contract.
    fn history_with(powers: &[f64], probe: &Reading) -> RoomHistory {
        let mut history = RoomHistory::with_capacity(100);
        for p in powers {
            history.append(reading(220.0, *p / 220.0, *p));
        }
        history.append(probe.clone());
        history
    }

    #[test]
    fn undervoltage_fires_alone() {
        let probe = reading(80.0, 5.0, 340.0);
        let history = history_with(&[], &probe);
        let violations = evaluate(&probe, &history, LIMITS, &SPIKE);
        assert_eq!(violations, vec![Violation::Undervoltage { volts: 80.0 }]);
        assert_eq!(violations[0].severity(), Severity::Warning);
    }

    #[test]
    fn overvoltage_excludes_undervoltage() {
        let probe = reading(280.0, 5.0, 1190.0);
        let history = history_with(&[], &probe);
        let violations = evaluate(&probe, &history, LIMITS, &SPIKE);
        assert_eq!(violations, vec![Violation::Overvoltage { volts: 280.0 }]);
    }

    #[test]
    fn cutoff_takes_precedence_over_warn() {
        let probe = reading(150.0, 16.0, 2040.0);
        let history = history_with(&[], &probe);
        let violations = evaluate(&probe, &history, LIMITS, &SPIKE);
        assert_eq!(violations, vec![Violation::CriticalCurrent { amps: 16.0 }]);
        assert!(violations[0].is_cutoff());
        assert_eq!(violations[0].severity(), Severity::Critical);
    }

    #[test]
    fn elevated_current_is_advisory() {
        let probe = reading(150.0, 11.0, 1402.5);
        let history = history_with(&[], &probe);
        let violations = evaluate(&probe, &history, LIMITS, &SPIKE);
        assert_eq!(violations, vec![Violation::ElevatedCurrent { amps: 11.0 }]);
        assert!(!violations[0].is_cutoff());
        assert_eq!(violations[0].severity(), Severity::Alert);
    }

    #[test]
    fn spike_requires_full_window() {
        // 8 prior readings + probe = 9 entries: below the window, no spike
        let probe = reading(220.0, 3.0, 500.0);
        let history = history_with(&[100.0; 8], &probe);
        assert!(evaluate(&probe, &history, LIMITS, &SPIKE).is_empty());
    }

    #[test]
    fn spike_fires_over_both_floor_and_factor() {
        // 10 prior of 100 W, probe 500 W: window holds 9x100 + 500,
        // avg = 140, threshold = max(200, 224) = 224, 500 > 224
        let probe = reading(220.0, 3.0, 500.0);
        let history = history_with(&[100.0; 10], &probe);
        let violations = evaluate(&probe, &history, LIMITS, &SPIKE);
        assert_eq!(violations.len(), 1);
        match violations[0] {
            Violation::ConsumptionSpike { watts, threshold } => {
                assert_eq!(watts, 500.0);
                assert!((threshold - 224.0).abs() < 1e-9);
            }
            other => panic!("unexpected violation: {:?}", other),
        }
    }

    #[test]
    fn high_baseline_absorbs_moderate_jump() {
        // prior avg 500 W, probe 700 W: avg = (9*500+700)/10 = 520,
        // threshold = max(200, 832) = 832, 700 < 832 -> no spike
        let probe = reading(220.0, 4.0, 700.0);
        let history = history_with(&[500.0; 10], &probe);
        assert!(evaluate(&probe, &history, LIMITS, &SPIKE).is_empty());
    }

    #[test]
    fn multiple_findings_preserve_fixed_order() {
        // undervoltage + critical current + spike, all in one reading
        let probe = reading(80.0, 16.0, 1088.0);
        let history = history_with(&[100.0; 10], &probe);
        let violations = evaluate(&probe, &history, LIMITS, &SPIKE);
        assert_eq!(violations.len(), 3);
        assert!(matches!(violations[0], Violation::Undervoltage { .. }));
        assert!(matches!(violations[1], Violation::CriticalCurrent { .. }));
        assert!(matches!(violations[2], Violation::ConsumptionSpike { .. }));
    }

    #[test]
    fn messages_name_the_room_and_action() {
        let cutoff = Violation::CriticalCurrent { amps: 16.2 };
        let message = cutoff.message(Room::Kitchen);
        assert!(message.starts_with("Kitchen:"));
        assert!(message.contains("OFF"));
        assert!(!cutoff.guidance().is_empty());
    }
}
