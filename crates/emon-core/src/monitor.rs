//! ---
//! emon_section: "03-telemetry-policy-safety"
//! emon_subsection: "module"
//! emon_type: "source"
//! emon_scope: "code"
//! emon_description: "Telemetry processing, policy evaluation, and safety actuation."
//! emon_version: "v0.0.0-prealpha"
//! emon_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{anyhow, Result};
use emon_common::{MonitorConfig, ResolvedLimits, Room};
use emon_msg::{decode, Command, CommandDispatcher, Inbound, Transport, WireMessage};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::alerts::AlertSink;
use crate::cost::{aggregate_costs, CostReport};
use crate::history::{Reading, RoomHistory};
use crate::policy::{evaluate, Severity, SpikePolicy};
use crate::power::PowerModel;

/// Event consumed by the single processing task. Operator control
/// requests ride the same channel as wire traffic so that history and
/// relay state have exactly one writer.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Raw inbound pub/sub message.
    Wire(WireMessage),
    /// Operator-initiated control action.
    Control(ControlRequest),
}

/// Operator-initiated control actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Switch one room's relay.
    Relay { room: Room, on: bool },
    /// Switch every relay.
    AllRelays { on: bool },
    /// Emergency shutdown: emergency signal plus all-relays-off.
    Emergency,
}

/// Copy-on-read view of the mutable monitor state, safe to take from any
/// thread without blocking the processing path.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    /// Latest derived power per room, in watts.
    pub latest_power: IndexMap<Room, f64>,
    /// Last-known relay state per room. A cache, not an authority.
    pub relays: IndexMap<Room, bool>,
}

struct SharedState {
    snapshot: RwLock<StateSnapshot>,
    tariff: RwLock<f64>,
    costs: RwLock<Option<CostReport>>,
}

/// The monitor context: configuration, alert sink, and shared snapshot
/// state. Created at startup, torn down on shutdown.
pub struct Monitor {
    config: MonitorConfig,
    sink: Arc<AlertSink>,
    shared: Arc<SharedState>,
}

impl Monitor {
    /// Build a monitor from validated configuration. An incomplete policy
    /// is rejected here, before any message is consumed.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let mut snapshot = StateSnapshot::default();
        for room in Room::all() {
            // relays report in asynchronously; assume conducting until told otherwise
            snapshot.relays.insert(room, true);
        }
        let shared = Arc::new(SharedState {
            snapshot: RwLock::new(snapshot),
            tariff: RwLock::new(config.tariff),
            costs: RwLock::new(None),
        });
        Ok(Self {
            config,
            sink: Arc::new(AlertSink::new()),
            shared,
        })
    }

    /// Spawn the processing and cost tasks over the given transport and
    /// return the lifecycle handle.
    pub fn start(self, transport: Arc<dyn Transport>) -> MonitorHandle {
        let (shutdown_tx, _) = broadcast::channel(4);
        let (event_tx, event_rx) = mpsc::channel(self.config.telemetry.event_queue_depth);

        let limits: IndexMap<Room, ResolvedLimits> = Room::all()
            .map(|room| (room, self.config.limits.resolve(room)))
            .collect();
        let histories: IndexMap<Room, RoomHistory> = Room::all()
            .map(|room| {
                (
                    room,
                    RoomHistory::with_capacity(self.config.telemetry.history_capacity),
                )
            })
            .collect();

        let consumer = ConsumerState {
            histories,
            limits,
            power: PowerModel::from_config(&self.config),
            spike: SpikePolicy::from(&self.config.telemetry),
            dispatcher: CommandDispatcher::new(transport),
            sink: self.sink.clone(),
            shared: self.shared.clone(),
        };

        let consumer_task = tokio::spawn(run_consumer(
            event_rx,
            shutdown_tx.subscribe(),
            consumer,
        ));
        let cost_task = tokio::spawn(run_cost_task(
            self.shared.clone(),
            self.config.telemetry.cost_refresh_interval,
            shutdown_tx.subscribe(),
        ));

        self.sink
            .emit(Severity::Info, None, "monitor started", None);
        info!(rooms = Room::all().count(), "monitor runtime started");

        MonitorHandle {
            events: event_tx,
            shutdown: shutdown_tx,
            consumer_task,
            cost_task,
            sink: self.sink,
            shared: self.shared,
        }
    }
}

/// Clonable ingress used by transport bridges and telemetry generators to
/// feed wire messages into the processing task.
#[derive(Clone)]
pub struct MonitorIngress {
    events: mpsc::Sender<MonitorEvent>,
}

impl MonitorIngress {
    /// Deliver one inbound wire message. Fails only once the monitor is
    /// shutting down.
    pub async fn wire(&self, message: WireMessage) -> Result<()> {
        self.events
            .send(MonitorEvent::Wire(message))
            .await
            .map_err(|_| anyhow!("monitor is shutting down"))
    }
}

/// Lifecycle handle returned from [`Monitor::start`]: the operator
/// surface, snapshot accessors, and graceful shutdown.
pub struct MonitorHandle {
    events: mpsc::Sender<MonitorEvent>,
    shutdown: broadcast::Sender<()>,
    consumer_task: JoinHandle<()>,
    cost_task: JoinHandle<()>,
    sink: Arc<AlertSink>,
    shared: Arc<SharedState>,
}

impl MonitorHandle {
    /// Ingress for inbound wire traffic.
    pub fn ingress(&self) -> MonitorIngress {
        MonitorIngress {
            events: self.events.clone(),
        }
    }

    /// Switch a single room's relay.
    pub async fn control_relay(&self, room: Room, on: bool) -> Result<()> {
        self.send_control(ControlRequest::Relay { room, on }).await
    }

    /// Switch every relay.
    pub async fn control_all_relays(&self, on: bool) -> Result<()> {
        self.send_control(ControlRequest::AllRelays { on }).await
    }

    /// Emergency shutdown: emergency signal plus all-relays-off.
    pub async fn emergency_shutdown(&self) -> Result<()> {
        self.send_control(ControlRequest::Emergency).await
    }

    async fn send_control(&self, request: ControlRequest) -> Result<()> {
        self.events
            .send(MonitorEvent::Control(request))
            .await
            .map_err(|_| anyhow!("monitor is shutting down"))
    }

    /// Update the tariff. Affects subsequent cost computations only.
    pub fn update_tariff(&self, rate_per_kwh: f64) {
        *self.shared.tariff.write() = rate_per_kwh;
        self.sink.emit(
            Severity::Info,
            None,
            format!("tariff updated: {:.3}/kWh", rate_per_kwh),
            None,
        );
    }

    /// The append-only alert sink.
    pub fn alerts(&self) -> Arc<AlertSink> {
        self.sink.clone()
    }

    /// Copy-on-read snapshot of latest power and relay state.
    pub fn state(&self) -> StateSnapshot {
        self.shared.snapshot.read().clone()
    }

    /// Most recent cost report, once the cost task has produced one.
    pub fn costs(&self) -> Option<CostReport> {
        self.shared.costs.read().clone()
    }

    /// Stop accepting new work, let in-flight evaluation finish, and join
    /// both tasks. Recorded findings survive in the sink.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        drop(self.events);
        self.consumer_task.await?;
        self.cost_task.await?;
        info!("monitor shutdown complete");
        Ok(())
    }
}

struct ConsumerState {
    histories: IndexMap<Room, RoomHistory>,
    limits: IndexMap<Room, ResolvedLimits>,
    power: PowerModel,
    spike: SpikePolicy,
    dispatcher: CommandDispatcher,
    sink: Arc<AlertSink>,
    shared: Arc<SharedState>,
}

async fn run_consumer(
    mut events: mpsc::Receiver<MonitorEvent>,
    mut shutdown: broadcast::Receiver<()>,
    mut state: ConsumerState,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("consumer shutdown signal received");
                break;
            }
            event = events.recv() => match event {
                Some(MonitorEvent::Wire(message)) => state.handle_wire(&message),
                Some(MonitorEvent::Control(request)) => state.handle_control(request),
                None => break,
            }
        }
    }
}

async fn run_cost_task(
    shared: Arc<SharedState>,
    refresh: std::time::Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(refresh);
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("cost task shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                // snapshot reads only; never blocks the consumer
                let latest = shared.snapshot.read().latest_power.clone();
                let tariff = *shared.tariff.read();
                let report = aggregate_costs(&latest, tariff);
                debug!(total_w = report.total.power_w, tariff, "cost aggregates refreshed");
                *shared.costs.write() = Some(report);
            }
        }
    }
}

impl ConsumerState {
    fn handle_wire(&mut self, message: &WireMessage) {
        match decode(message) {
            Ok(Inbound::Telemetry { room, sample }) => {
                self.process_reading(room, sample.voltage, sample.current, sample.extra);
            }
            Ok(Inbound::RelayStatus { room, on }) => {
                self.set_relay(room, on);
                debug!(room = room.wire_id(), on, "relay status updated");
            }
            Ok(Inbound::Ignored(reason)) => {
                debug!(?reason, "inbound message ignored");
            }
            Err(err) => {
                // drop the message whole; the next one processes normally
                self.sink.emit(
                    Severity::Alert,
                    None,
                    format!("failed to process message: {}", err),
                    Some("The payload format may be incorrect (JSON expected).".into()),
                );
            }
        }
    }

    fn process_reading(
        &mut self,
        room: Room,
        voltage: f64,
        current: f64,
        extra: serde_json::Map<String, serde_json::Value>,
    ) {
        let power = self.power.power(room, voltage, current);
        let reading = Reading {
            room,
            voltage,
            current,
            power,
            timestamp: chrono::Utc::now(),
            extra,
        };

        let history = match self.histories.get_mut(&room) {
            Some(history) => history,
            // unreachable: the table is total over the closed room set
            None => return,
        };
        history.append(reading.clone());
        self.shared.snapshot.write().latest_power.insert(room, power);

        let limits = self.limits[&room];
        for violation in evaluate(&reading, &self.histories[&room], limits, &self.spike) {
            if violation.is_cutoff() {
                self.force_relay_off(room);
            }
            self.sink.emit(
                violation.severity(),
                Some(room),
                violation.message(room),
                Some(violation.guidance().to_owned()),
            );
        }
    }

    /// The one automatic control action: the cutoff command goes out
    /// before the CRITICAL finding that describes it is recorded.
    fn force_relay_off(&mut self, room: Room) {
        match self.dispatcher.send(Command::Relay { room, on: false }) {
            Ok(()) => self.set_relay(room, false),
            Err(err) => self.alert_publish_failure(&err),
        }
    }

    fn handle_control(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::Relay { room, on } => {
                match self.dispatcher.send(Command::Relay { room, on }) {
                    Ok(()) => {
                        self.set_relay(room, on);
                        self.sink.emit(
                            Severity::Info,
                            Some(room),
                            format!(
                                "command sent: {} switched {}",
                                room.label(),
                                if on { "on" } else { "off" }
                            ),
                            None,
                        );
                    }
                    Err(err) => self.alert_publish_failure(&err),
                }
            }
            ControlRequest::AllRelays { on } => self.all_relays(on),
            ControlRequest::Emergency => {
                if let Err(err) = self.dispatcher.send(Command::Emergency) {
                    self.alert_publish_failure(&err);
                }
                self.all_relays(false);
                self.sink.emit(
                    Severity::Critical,
                    None,
                    "EMERGENCY SHUTDOWN ACTIVATED (all loads off)",
                    None,
                );
            }
        }
    }

    fn all_relays(&mut self, on: bool) {
        match self.dispatcher.send(Command::AllRelays { on }) {
            Ok(()) => {
                for room in Room::all() {
                    self.set_relay(room, on);
                }
                self.sink.emit(
                    Severity::Info,
                    None,
                    format!(
                        "command sent: all relays switched {}",
                        if on { "on" } else { "off" }
                    ),
                    None,
                );
            }
            Err(err) => self.alert_publish_failure(&err),
        }
    }

    fn set_relay(&mut self, room: Room, on: bool) {
        self.shared.snapshot.write().relays.insert(room, on);
    }

    fn alert_publish_failure(&self, err: &emon_msg::WireError) {
        self.sink.emit(
            Severity::Alert,
            None,
            format!("failed to publish command: {}", err),
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emon_msg::{telemetry_route, relay_status_route, ClosedTransport, InMemoryTransport};
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        // keep the cost task quiet during consumer-focused tests
        config.telemetry.cost_refresh_interval = Duration::from_secs(3600);
        config
    }

    async fn started() -> (MonitorHandle, Arc<InMemoryTransport>) {
        let transport = Arc::new(InMemoryTransport::new());
        let handle = Monitor::new(test_config())
            .expect("default config is valid")
            .start(transport.clone());
        (handle, transport)
    }

    async fn next_finding(feed: &mut broadcast::Receiver<crate::Finding>) -> crate::Finding {
        timeout(Duration::from_secs(2), feed.recv())
            .await
            .expect("finding within deadline")
            .expect("feed open")
    }

    #[tokio::test]
    async fn critical_current_forces_relay_off() {
        let (handle, transport) = started().await;
        let mut feed = handle.alerts().subscribe();

        // living_room cutoff is 12 A
        handle
            .ingress()
            .wire(WireMessage::new(
                telemetry_route(Room::LivingRoom),
                r#"{"tensao": 150.0, "corrente": 16.0}"#,
            ))
            .await
            .unwrap();

        let finding = next_finding(&mut feed).await;
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.room, Some(Room::LivingRoom));

        let commands = transport.drain();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].route, "energy/control/living_room");
        assert_eq!(commands[0].payload, "OFF");
        assert_eq!(handle.state().relays[&Room::LivingRoom], false);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn elevated_current_is_advisory_only() {
        let (handle, transport) = started().await;
        let mut feed = handle.alerts().subscribe();

        // bathroom: warn 14 A, cutoff 20 A
        handle
            .ingress()
            .wire(WireMessage::new(
                telemetry_route(Room::Bathroom),
                r#"{"tensao": 220.0, "corrente": 15.0}"#,
            ))
            .await
            .unwrap();

        let finding = next_finding(&mut feed).await;
        assert_eq!(finding.severity, Severity::Alert);
        assert!(transport.is_empty());
        assert_eq!(handle.state().relays[&Room::Bathroom], true);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_telemetry_alerts_and_drops() {
        let (handle, transport) = started().await;
        let mut feed = handle.alerts().subscribe();

        handle
            .ingress()
            .wire(WireMessage::new(
                telemetry_route(Room::Kitchen),
                "not json",
            ))
            .await
            .unwrap();

        let finding = next_finding(&mut feed).await;
        assert_eq!(finding.severity, Severity::Alert);
        assert!(finding
            .guidance
            .as_deref()
            .unwrap_or_default()
            .contains("payload format"));
        // nothing appended, nothing published
        assert!(handle.state().latest_power.get(&Room::Kitchen).is_none());
        assert!(transport.is_empty());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_room_and_bad_status_are_silent() {
        let (handle, _transport) = started().await;
        let mut feed = handle.alerts().subscribe();
        let ingress = handle.ingress();

        ingress
            .wire(WireMessage::new("energy/room/garage", r#"{"tensao": 230.0}"#))
            .await
            .unwrap();
        ingress
            .wire(WireMessage::new(relay_status_route(Room::Kitchen), "OFF"))
            .await
            .unwrap();
        // marker: the next finding must come from this command, proving the
        // two messages above produced none
        handle.control_relay(Room::Bedroom, true).await.unwrap();

        let finding = next_finding(&mut feed).await;
        assert_eq!(finding.severity, Severity::Info);
        assert_eq!(finding.room, Some(Room::Bedroom));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn relay_status_report_updates_cache() {
        let (handle, _transport) = started().await;
        let ingress = handle.ingress();

        ingress
            .wire(WireMessage::new(
                relay_status_route(Room::Utility),
                r#"{"relay_estado": false}"#,
            ))
            .await
            .unwrap();
        // synchronize on a control round-trip
        let mut feed = handle.alerts().subscribe();
        handle.control_relay(Room::LivingRoom, true).await.unwrap();
        next_finding(&mut feed).await;

        assert_eq!(handle.state().relays[&Room::Utility], false);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn repeated_off_is_idempotent() {
        let (handle, transport) = started().await;
        let mut feed = handle.alerts().subscribe();

        handle.control_relay(Room::Kitchen, false).await.unwrap();
        next_finding(&mut feed).await;
        handle.control_relay(Room::Kitchen, false).await.unwrap();
        next_finding(&mut feed).await;

        // two commands on the wire, cache simply stays off
        let commands = transport.drain();
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| c.payload == "OFF"));
        assert_eq!(handle.state().relays[&Room::Kitchen], false);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn emergency_issues_signal_then_all_off() {
        let (handle, transport) = started().await;
        let mut feed = handle.alerts().subscribe();

        handle.emergency_shutdown().await.unwrap();

        // INFO for the all-off command, then the CRITICAL alarm
        let first = next_finding(&mut feed).await;
        assert_eq!(first.severity, Severity::Info);
        let second = next_finding(&mut feed).await;
        assert_eq!(second.severity, Severity::Critical);

        let commands = transport.drain();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].route, "energy/control/emergency");
        assert_eq!(commands[0].payload, "SHUTDOWN");
        assert_eq!(commands[1].route, "energy/control/relay");
        assert_eq!(commands[1].payload, "OFF");
        assert!(handle.state().relays.values().all(|on| !on));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn failed_publish_becomes_an_alert_finding() {
        let handle = Monitor::new(test_config())
            .unwrap()
            .start(Arc::new(ClosedTransport));
        let mut feed = handle.alerts().subscribe();

        handle.control_relay(Room::Kitchen, false).await.unwrap();
        let finding = next_finding(&mut feed).await;
        assert_eq!(finding.severity, Severity::Alert);
        assert!(finding.message.contains("failed to publish"));
        // the cache is untouched when nothing went out
        assert_eq!(handle.state().relays[&Room::Kitchen], true);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn tariff_update_affects_subsequent_reports_only() {
        let mut config = test_config();
        config.telemetry.cost_refresh_interval = Duration::from_millis(50);
        let handle = Monitor::new(config)
            .unwrap()
            .start(Arc::new(InMemoryTransport::new()));
        let mut feed = handle.alerts().subscribe();

        handle
            .ingress()
            .wire(WireMessage::new(
                telemetry_route(Room::LivingRoom),
                // 200 * 5 * 0.85 = 850 W
                r#"{"tensao": 200.0, "corrente": 5.0}"#,
            ))
            .await
            .unwrap();

        handle.update_tariff(0.80);
        let finding = next_finding(&mut feed).await;
        assert!(finding.message.contains("tariff updated"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let report = handle.costs().expect("cost task has run");
        assert_eq!(report.tariff, 0.80);
        let living = report
            .rooms
            .iter()
            .find(|r| r.room == Room::LivingRoom)
            .expect("living room in report");
        assert!((living.cost.hourly - 850.0 / 1000.0 * 0.80).abs() < 1e-9);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_preserves_recorded_findings() {
        let (handle, _transport) = started().await;
        let mut feed = handle.alerts().subscribe();
        handle.control_all_relays(true).await.unwrap();
        next_finding(&mut feed).await;

        let sink = handle.alerts();
        handle.shutdown().await.unwrap();
        // "monitor started" + the all-on command record
        assert_eq!(sink.len(), 2);
    }
}
