//! ---
//! emon_section: "04-daemon"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Synthetic telemetry feed for bench runs and demos."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use std::time::Duration;

use emon_common::Room;
use emon_core::MonitorIngress;
use emon_msg::{telemetry_route, WireMessage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;
use tracing::debug;

/// Per-room nominal load used as the random-walk baseline, in amperes.
fn baseline_current(room: Room) -> f64 {
    match room {
        Room::LivingRoom => 2.5,
        Room::Bedroom => 1.2,
        Room::Kitchen => 5.0,
        Room::Bathroom => 3.0,
        Room::Utility => 2.0,
    }
}

/// Publish jittered per-room telemetry once a second until stopped.
///
/// Values wander around nominal mains voltage and the per-room baseline
/// current, with an occasional surge thrown in so the policy paths get
/// exercised end to end.
pub async fn run(ingress: MonitorIngress, mut shutdown: broadcast::Receiver<()>) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                for room in Room::all() {
                    let voltage: f64 = 220.0 + rng.gen_range(-8.0..8.0);
                    let mut current = baseline_current(room) * rng.gen_range(0.8..1.2);
                    if rng.gen_bool(0.02) {
                        // simulated surge: enough to cross warn or cutoff
                        current *= 5.0;
                    }
                    let payload = serde_json::json!({
                        "tensao": (voltage * 10.0).round() / 10.0,
                        "corrente": (current * 100.0).round() / 100.0,
                    });
                    let message = WireMessage::new(telemetry_route(room), payload.to_string());
                    if ingress.wire(message).await.is_err() {
                        // monitor is shutting down
                        return;
                    }
                }
                debug!("synthetic telemetry round published");
            }
        }
    }
}
