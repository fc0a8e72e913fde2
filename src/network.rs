//! Lighting network client contract and the command emitter.
//!
//! The transport itself is an external collaborator: anything that can deliver
//! a named event with a JSON payload to a set of rooms implements
//! [`LightingNetwork`]. [`LightingEmitter`] turns [`LightingCommand`]s into
//! those events and keeps delivery failures away from the polling loops.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::lighting::{LightingCommand, LightingState};
use crate::{Result, SyncError};

/// Named events understood by the lighting server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkEvent {
    /// Full [`LightingState`] for the target rooms
    SetNetworkState,
    /// RPM intensity as `{"fftValue": n}`
    SetIntensity,
}

impl NetworkEvent {
    pub fn name(self) -> &'static str {
        match self {
            NetworkEvent::SetNetworkState => "setNetworkState",
            NetworkEvent::SetIntensity => "setFftValue",
        }
    }
}

impl fmt::Display for NetworkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of a room on the lighting server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomTarget(pub String);

impl From<&str> for RoomTarget {
    fn from(id: &str) -> Self {
        RoomTarget(id.to_string())
    }
}

impl fmt::Display for RoomTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client for the lighting server.
#[async_trait]
pub trait LightingNetwork: Send + Sync + 'static {
    async fn connect(&self) -> Result<()>;

    /// Deliver `event` to `targets`, returning the server's acknowledgement if it sent one.
    async fn send(
        &self,
        event: NetworkEvent,
        targets: &[RoomTarget],
        payload: Value,
    ) -> Result<Option<Value>>;

    fn is_connected(&self) -> bool;

    /// Connected flag; changes mark connect and disconnect.
    fn connection_events(&self) -> watch::Receiver<bool>;

    async fn disconnect(&self) -> Result<()>;
}

impl LightingCommand {
    pub fn event(&self) -> NetworkEvent {
        match self {
            LightingCommand::SetState(_) => NetworkEvent::SetNetworkState,
            LightingCommand::SetIntensity(_) => NetworkEvent::SetIntensity,
        }
    }

    /// Wire payload of the command.
    pub fn payload(&self) -> Result<Value> {
        match self {
            LightingCommand::SetState(state) => Ok(serde_json::to_value(state)?),
            LightingCommand::SetIntensity(value) => Ok(json!({ "fftValue": value })),
        }
    }
}

/// Sends lighting commands to a fixed set of rooms.
pub struct LightingEmitter<N: LightingNetwork> {
    network: Arc<N>,
    targets: Arc<[RoomTarget]>,
    send_timeout: Duration,
}

impl<N: LightingNetwork> Clone for LightingEmitter<N> {
    fn clone(&self) -> Self {
        Self {
            network: Arc::clone(&self.network),
            targets: Arc::clone(&self.targets),
            send_timeout: self.send_timeout,
        }
    }
}

impl<N: LightingNetwork> LightingEmitter<N> {
    pub fn new(network: Arc<N>, targets: Vec<RoomTarget>, send_timeout: Duration) -> Self {
        Self { network, targets: targets.into(), send_timeout }
    }

    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    pub fn targets(&self) -> &[RoomTarget] {
        &self.targets
    }

    pub async fn set_state(&self, state: LightingState) -> bool {
        self.emit(&LightingCommand::SetState(state)).await
    }

    /// Send `command`, returning whether the network accepted it.
    ///
    /// Failures and timeouts are logged, never returned.
    pub async fn emit(&self, command: &LightingCommand) -> bool {
        match self.try_emit(command).await {
            Ok(ack) => {
                trace!(event = %command.event(), ?ack, "Lighting command delivered");
                true
            }
            Err(e) => {
                warn!(event = %command.event(), "Failed to send lighting command: {}", e);
                false
            }
        }
    }

    async fn try_emit(&self, command: &LightingCommand) -> Result<Option<Value>> {
        if self.targets.is_empty() {
            debug!(event = %command.event(), "No target rooms configured, skipping send");
            return Ok(None);
        }

        let payload = command.payload()?;
        let send = self.network.send(command.event(), &self.targets, payload);
        tokio::time::timeout(self.send_timeout, send)
            .await
            .map_err(|_| SyncError::Timeout { duration: self.send_timeout })?
    }
}

/// Dry-run network that logs every event instead of delivering it.
pub struct TracingNetwork {
    url: String,
    device_name: String,
    connected: watch::Sender<bool>,
}

impl TracingNetwork {
    pub fn new(url: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self { url: url.into(), device_name: device_name.into(), connected: watch::channel(false).0 }
    }
}

#[async_trait]
impl LightingNetwork for TracingNetwork {
    async fn connect(&self) -> Result<()> {
        info!(url = %self.url, device = %self.device_name, "Connected to lighting network (dry run)");
        self.connected.send_replace(true);
        Ok(())
    }

    async fn send(
        &self,
        event: NetworkEvent,
        targets: &[RoomTarget],
        payload: Value,
    ) -> Result<Option<Value>> {
        if !self.is_connected() {
            return Err(SyncError::network_failed(format!("{} is not connected", self.url)));
        }
        let rooms: Vec<&str> = targets.iter().map(|t| t.0.as_str()).collect();
        info!(%event, ?rooms, %payload, "Lighting event");
        Ok(None)
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn connection_events(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    async fn disconnect(&self) -> Result<()> {
        if self.connected.send_replace(false) {
            info!(url = %self.url, "Disconnected from lighting network");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::test_utils::RecordingNetwork;

    fn emitter(network: Arc<RecordingNetwork>) -> LightingEmitter<RecordingNetwork> {
        LightingEmitter::new(network, vec!["garage".into(), "office".into()], Duration::from_millis(50))
    }

    #[test]
    fn commands_map_to_wire_events() {
        let intensity = LightingCommand::SetIntensity(128);
        assert_eq!(intensity.event().name(), "setFftValue");
        assert_eq!(intensity.payload().unwrap(), json!({ "fftValue": 128 }));

        let state = LightingCommand::SetState(LightingState::alert(Rgb::BLUE));
        assert_eq!(state.event().name(), "setNetworkState");
        assert_eq!(state.payload().unwrap()["colors"][0], "#0000FF");
    }

    #[tokio::test]
    async fn emitter_sends_to_every_target() {
        let network = Arc::new(RecordingNetwork::connected());
        let emitter = emitter(Arc::clone(&network));

        assert!(emitter.emit(&LightingCommand::SetIntensity(42)).await);

        let sent = network.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, NetworkEvent::SetIntensity);
        assert_eq!(sent[0].targets, vec![RoomTarget::from("garage"), RoomTarget::from("office")]);
        assert_eq!(sent[0].payload, json!({ "fftValue": 42 }));
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let network = Arc::new(RecordingNetwork::connected());
        network.fail_sends(true);
        let emitter = emitter(Arc::clone(&network));

        assert!(!emitter.emit(&LightingCommand::SetIntensity(1)).await);
        assert!(network.sent().is_empty());
    }

    #[tokio::test]
    async fn slow_sends_time_out() {
        let network = Arc::new(RecordingNetwork::connected());
        network.set_latency(Duration::from_millis(500));
        let emitter = emitter(Arc::clone(&network));

        let started = std::time::Instant::now();
        assert!(!emitter.emit(&LightingCommand::SetIntensity(1)).await);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn no_targets_means_no_send() {
        let network = Arc::new(RecordingNetwork::connected());
        let emitter = LightingEmitter::new(Arc::clone(&network), Vec::new(), Duration::from_secs(1));

        assert!(emitter.emit(&LightingCommand::SetIntensity(1)).await);
        assert!(network.sent().is_empty());
    }

    #[tokio::test]
    async fn tracing_network_tracks_connection() {
        let network = TracingNetwork::new("http://localhost:3000", "racelight");
        let mut events = network.connection_events();
        assert!(!network.is_connected());
        assert!(network.send(NetworkEvent::SetIntensity, &[], json!({})).await.is_err());

        network.connect().await.unwrap();
        assert!(events.has_changed().unwrap());
        assert!(*events.borrow_and_update());
        assert_eq!(network.send(NetworkEvent::SetIntensity, &[], json!({})).await.unwrap(), None);

        network.disconnect().await.unwrap();
        assert!(!*events.borrow_and_update());
    }
}
