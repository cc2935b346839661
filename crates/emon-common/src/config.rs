//! ---
//! emon_section: "01-core-functionality"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Shared primitives and utilities for the monitor runtime."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;
use crate::rooms::Room;

fn default_tariff() -> f64 {
    0.65
}

fn default_power_factor() -> f64 {
    0.85
}

fn default_power_factors() -> IndexMap<Room, f64> {
    IndexMap::from([
        (Room::LivingRoom, 0.85),
        (Room::Bedroom, 0.90),
        (Room::Kitchen, 0.80),
        (Room::Bathroom, 0.95),
        (Room::Utility, 0.75),
    ])
}

fn default_limit_overrides() -> IndexMap<Room, RoomLimitOverride> {
    IndexMap::from([
        (Room::LivingRoom, RoomLimitOverride::current(8.0, 12.0)),
        (Room::Bedroom, RoomLimitOverride::current(7.0, 10.0)),
        (Room::Kitchen, RoomLimitOverride::current(13.0, 18.0)),
        (Room::Bathroom, RoomLimitOverride::current(14.0, 20.0)),
        (Room::Utility, RoomLimitOverride::current(12.0, 17.0)),
    ])
}

fn default_history_capacity() -> usize {
    100
}

fn default_spike_window() -> usize {
    10
}

fn default_spike_min_watts() -> f64 {
    200.0
}

fn default_spike_factor() -> f64 {
    1.6
}

fn default_cost_refresh_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_event_queue_depth() -> usize {
    256
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the monitor runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Electricity tariff in currency units per kWh.
    #[serde(default = "default_tariff")]
    pub tariff: f64,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default = "default_power_factors")]
    pub power_factors: IndexMap<Room, f64>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`MonitorConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedMonitorConfig {
    pub config: MonitorConfig,
    pub source: PathBuf,
}

impl MonitorConfig {
    pub const ENV_CONFIG_PATH: &str = "EMON_CONFIG";

    /// Load configuration from disk, respecting the `EMON_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedMonitorConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedMonitorConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedMonitorConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<MonitorConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Power factor for a room, falling back to the defensive default of
    /// 0.85 when the table has no entry.
    pub fn power_factor(&self, room: Room) -> f64 {
        self.power_factors
            .get(&room)
            .copied()
            .unwrap_or_else(default_power_factor)
    }

    /// Validate structural invariants. An incomplete policy is fatal at
    /// startup; the evaluator never re-checks at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.tariff < 0.0 {
            return Err(anyhow!("tariff must not be negative"));
        }
        self.limits.validate()?;
        for (room, factor) in &self.power_factors {
            if !(*factor > 0.0 && *factor <= 1.0) {
                return Err(anyhow!(
                    "power factor for room '{}' must lie in (0, 1], got {}",
                    room.wire_id(),
                    factor
                ));
            }
        }
        self.telemetry.validate()?;
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tariff: default_tariff(),
            limits: LimitsConfig::default(),
            power_factors: default_power_factors(),
            telemetry: TelemetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for MonitorConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: MonitorConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Threshold policy: a total default record overlaid by partial per-room
/// overrides. Every key of the default record is mandatory, so a config
/// file with an incomplete `[limits.default]` table fails to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub default: LimitBand,
    #[serde(default = "default_limit_overrides")]
    pub overrides: IndexMap<Room, RoomLimitOverride>,
}

impl LimitsConfig {
    /// Resolve the effective limits for a room. Total by construction:
    /// each key falls back to the default record independently.
    pub fn resolve(&self, room: Room) -> ResolvedLimits {
        let over = self.overrides.get(&room);
        ResolvedLimits {
            voltage_low: over
                .and_then(|o| o.voltage_low)
                .unwrap_or(self.default.voltage_low),
            voltage_high: over
                .and_then(|o| o.voltage_high)
                .unwrap_or(self.default.voltage_high),
            current_warn: over
                .and_then(|o| o.current_warn)
                .unwrap_or(self.default.current_warn),
            current_cutoff: over
                .and_then(|o| o.current_cutoff)
                .unwrap_or(self.default.current_cutoff),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for room in Room::all() {
            let resolved = self.resolve(room);
            if resolved.voltage_low >= resolved.voltage_high {
                return Err(anyhow!(
                    "room '{}' resolves voltage_low {} >= voltage_high {}",
                    room.wire_id(),
                    resolved.voltage_low,
                    resolved.voltage_high
                ));
            }
            if resolved.current_warn >= resolved.current_cutoff {
                return Err(anyhow!(
                    "room '{}' resolves current_warn {} >= current_cutoff {}",
                    room.wire_id(),
                    resolved.current_warn,
                    resolved.current_cutoff
                ));
            }
        }
        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default: LimitBand::default(),
            overrides: default_limit_overrides(),
        }
    }
}

/// The total default threshold record. All four keys are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitBand {
    pub voltage_low: f64,
    pub voltage_high: f64,
    pub current_warn: f64,
    pub current_cutoff: f64,
}

impl Default for LimitBand {
    fn default() -> Self {
        Self {
            voltage_low: 90.0,
            voltage_high: 260.0,
            current_warn: 10.0,
            current_cutoff: 15.0,
        }
    }
}

/// Partial per-room override of the default threshold record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomLimitOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_warn: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_cutoff: Option<f64>,
}

impl RoomLimitOverride {
    /// Override only the current thresholds, the common case.
    pub fn current(warn: f64, cutoff: f64) -> Self {
        Self {
            current_warn: Some(warn),
            current_cutoff: Some(cutoff),
            ..Self::default()
        }
    }
}

/// Fully resolved thresholds handed to the policy evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLimits {
    pub voltage_low: f64,
    pub voltage_high: f64,
    pub current_warn: f64,
    pub current_cutoff: f64,
}

/// Tuning for history retention, spike detection, and the cost task.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_spike_window")]
    pub spike_window: usize,
    #[serde(default = "default_spike_min_watts")]
    pub spike_min_watts: f64,
    #[serde(default = "default_spike_factor")]
    pub spike_factor: f64,
    #[serde(default = "default_cost_refresh_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub cost_refresh_interval: Duration,
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(anyhow!("history_capacity must be at least 1"));
        }
        if self.spike_window == 0 || self.spike_window > self.history_capacity {
            return Err(anyhow!(
                "spike_window must lie in 1..={}, got {}",
                self.history_capacity,
                self.spike_window
            ));
        }
        if self.spike_factor <= 0.0 {
            return Err(anyhow!("spike_factor must be positive"));
        }
        if self.event_queue_depth == 0 {
            return Err(anyhow!("event_queue_depth must be at least 1"));
        }
        Ok(())
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            spike_window: default_spike_window(),
            spike_min_watts: default_spike_min_watts(),
            spike_factor: default_spike_factor(),
            cost_refresh_interval: default_cost_refresh_interval(),
            event_queue_depth: default_event_queue_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
