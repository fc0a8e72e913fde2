//! Telemetry to lighting bridge.
//!
//! Consumes the session channels, maps every event through
//! [`TelemetryMapper`] and hands the resulting commands to a
//! [`LightingEmitter`]. Physics samples may be paced with an [`UpdateRate`]
//! before mapping; other sources are handled as they arrive.

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::UpdateRate;
use crate::lighting::TelemetryMapper;
use crate::network::{LightingEmitter, LightingNetwork};
use crate::session::{SessionChannels, SessionEvent};
use crate::stream::ThrottleExt;

/// Pacing and threshold settings of the bridge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BridgeConfig {
    /// Fraction of the rev limit above which intensity is sent
    pub rpm_threshold: f64,
    /// Maximum rate of RPM mapping
    pub intensity_rate: UpdateRate,
    /// Physics sampling interval of the session
    pub physics_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            rpm_threshold: 0.75,
            intensity_rate: UpdateRate::Native,
            physics_interval: Duration::from_millis(10),
        }
    }
}

/// Running bridge task.
pub struct TelemetryBridge {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TelemetryBridge {
    /// Spawn the bridge on the current tokio runtime.
    pub fn spawn<N: LightingNetwork>(
        channels: &SessionChannels,
        emitter: LightingEmitter<N>,
        config: BridgeConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let events = Self::event_stream(channels, &config);
        let task = tokio::spawn(Self::run(events, emitter, config, cancel.clone()));
        Self { cancel, task: Some(task) }
    }

    fn event_stream(
        channels: &SessionChannels,
        config: &BridgeConfig,
    ) -> BoxStream<'static, SessionEvent> {
        let source_hz = 1.0 / config.physics_interval.as_secs_f64().max(f64::EPSILON);
        let physics = match config.intensity_rate.throttle_interval(source_hz) {
            Some(period) => {
                debug!(?period, "Throttling RPM mapping");
                channels.physics_updates().throttle(period).boxed()
            }
            None => channels.physics_updates(),
        };

        stream::select(physics.map(SessionEvent::PhysicsUpdated), channels.slow_events()).boxed()
    }

    async fn run<N: LightingNetwork>(
        mut events: BoxStream<'static, SessionEvent>,
        emitter: LightingEmitter<N>,
        config: BridgeConfig,
        cancel: CancellationToken,
    ) {
        let mut mapper = TelemetryMapper::new(config.rpm_threshold);
        info!(threshold = config.rpm_threshold, rate = ?config.intensity_rate, "Telemetry bridge started");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.next() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if let SessionEvent::GameStatusChanged(status) = &event {
                info!(%status, "Simulator status");
            }

            if let Some(command) = mapper.handle(&event) {
                emitter.emit(&command).await;
            }
        }

        info!("Telemetry bridge stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Cancel the bridge and wait for the task to end.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Telemetry bridge task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for TelemetryBridge {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
