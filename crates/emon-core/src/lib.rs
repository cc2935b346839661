//! ---
//! emon_section: "03-telemetry-policy-safety"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Telemetry processing, policy evaluation, and safety actuation."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
//! The EMON decision core: power derivation, rolling room history, policy
//! evaluation, the automatic safety cutoff, the append-only alert feed,
//! and rolling cost aggregates. Presentation layers and the transport
//! client sit outside this crate and consume its snapshot accessors.

pub mod alerts;
pub mod cost;
pub mod history;
pub mod monitor;
pub mod policy;
pub mod power;

pub use alerts::{AlertSink, Finding};
pub use cost::{aggregate_costs, CostBreakdown, CostReport, RoomCost};
pub use history::{Reading, RoomHistory};
pub use monitor::{ControlRequest, Monitor, MonitorEvent, MonitorHandle, MonitorIngress, StateSnapshot};
pub use policy::{evaluate, Severity, SpikePolicy, Violation};
pub use power::PowerModel;
