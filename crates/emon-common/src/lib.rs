//! ---
//! emon_section: "01-core-functionality"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Shared primitives and utilities for the monitor runtime."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
//! Core shared primitives for the EMON workspace.
//! This crate exposes the closed room set, configuration loading, and the
//! logging bootstrap consumed across the workspace.

pub mod config;
pub mod logging;
pub mod rooms;

pub use config::{
    LimitsConfig, LoggingConfig, MonitorConfig, ResolvedLimits, RoomLimitOverride, TelemetryConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use rooms::Room;
