//! Shared memory session lifecycle and telemetry sampling.
//!
//! [`SessionManager`] owns the three segment handles and a connection state
//! machine:
//!
//! ```text
//! Disconnected --(retry tick, all segments open)--> Connected
//!      ^                                                |
//!      +------------------- stop() ---------------------+
//! ```
//!
//! While running, a retry task keeps trying to open the segments and one
//! sampler task per segment decodes a fresh record on its own interval. Each
//! task runs its callback inline, so a slow callback delays the next tick
//! rather than overlapping it. Samples are published on watch channels
//! (latest-wins), which never block the samplers regardless of how slowly a
//! consumer drains them.
//!
//! State and handles live behind one lock: a read checks both together, and
//! [`SessionManager::stop`] takes the write side, so no read can observe a
//! handle after it has been released.

mod segment;

pub use segment::{Segment, SegmentOpener};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::telemetry::{
    AcStatus, Graphics, Physics, SegmentKind, SharedMemoryStruct, StaticInfo,
};
use crate::{Result, SyncError};

/// Connection state of the shared memory session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Typed telemetry event.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    PhysicsUpdated(Arc<Physics>),
    GraphicsUpdated(Arc<Graphics>),
    StaticInfoUpdated(Arc<StaticInfo>),
    /// Raised only when the decoded status differs from the last one observed
    GameStatusChanged(AcStatus),
}

/// Polling cadence of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub physics_interval_ms: u64,
    pub graphics_interval_ms: u64,
    pub static_info_interval_ms: u64,
    pub retry_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            physics_interval_ms: 10,
            graphics_interval_ms: 1000,
            static_info_interval_ms: 1000,
            retry_interval_ms: 2000,
        }
    }
}

impl SessionConfig {
    /// Sampling interval for a segment.
    pub fn interval(&self, kind: SegmentKind) -> Duration {
        let ms = match kind {
            SegmentKind::Physics => self.physics_interval_ms,
            SegmentKind::Graphics => self.graphics_interval_ms,
            SegmentKind::StaticInfo => self.static_info_interval_ms,
        };
        Duration::from_millis(ms.max(1))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.max(1))
    }
}

/// Receivers for everything the session manager publishes.
#[derive(Debug, Clone)]
pub struct SessionChannels {
    pub physics: watch::Receiver<Option<Arc<Physics>>>,
    pub graphics: watch::Receiver<Option<Arc<Graphics>>>,
    pub static_info: watch::Receiver<Option<Arc<StaticInfo>>>,
    pub game_status: watch::Receiver<AcStatus>,
    pub state: watch::Receiver<SessionConnectionState>,
}

impl SessionChannels {
    /// Merge the per-segment channels into one event stream.
    ///
    /// Yields the latest sample of each source, if one was already published,
    /// then every later one. Each source keeps at most one pending value, so a
    /// slow consumer sees the latest sample of every source rather than a
    /// backlog. Game status is only reported when it changes after this call.
    pub fn events(&self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        stream::select(
            self.physics_updates().map(SessionEvent::PhysicsUpdated),
            self.slow_events(),
        )
    }

    /// Physics samples alone, for consumers that pace them separately.
    pub fn physics_updates(&self) -> BoxStream<'static, Arc<Physics>> {
        Self::samples(self.physics.clone())
    }

    /// Graphics, static and game status events, without physics.
    pub fn slow_events(&self) -> BoxStream<'static, SessionEvent> {
        stream::select_all([
            Self::samples(self.graphics.clone()).map(SessionEvent::GraphicsUpdated).boxed(),
            Self::samples(self.static_info.clone()).map(SessionEvent::StaticInfoUpdated).boxed(),
            WatchStream::from_changes(self.game_status.clone())
                .map(SessionEvent::GameStatusChanged)
                .boxed(),
        ])
        .boxed()
    }

    fn samples<T>(rx: watch::Receiver<Option<Arc<T>>>) -> BoxStream<'static, Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        WatchStream::new(rx).filter_map(|sample| async move { sample }).boxed()
    }
}

struct Segments<S> {
    physics: S,
    graphics: S,
    static_info: S,
}

impl<S> Segments<S> {
    fn get(&self, kind: SegmentKind) -> &S {
        match kind {
            SegmentKind::Physics => &self.physics,
            SegmentKind::Graphics => &self.graphics,
            SegmentKind::StaticInfo => &self.static_info,
        }
    }
}

struct Link<S> {
    state: SessionConnectionState,
    segments: Option<Segments<S>>,
}

struct Shared<O: SegmentOpener> {
    opener: O,
    link: RwLock<Link<O::Segment>>,
    physics: watch::Sender<Option<Arc<Physics>>>,
    graphics: watch::Sender<Option<Arc<Graphics>>>,
    static_info: watch::Sender<Option<Arc<StaticInfo>>>,
    game_status: watch::Sender<AcStatus>,
    state: watch::Sender<SessionConnectionState>,
}

impl<O: SegmentOpener> Shared<O> {
    fn set_state(&self, link: &mut Link<O::Segment>, state: SessionConnectionState) {
        link.state = state;
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    /// Open all three segments. Returns `Ok(false)` if the session was stopped
    /// before the attempt could take the link.
    fn connect(&self, cancel: &CancellationToken) -> Result<bool> {
        let mut link = self.link.write();
        if cancel.is_cancelled() {
            return Ok(false);
        }
        if link.state == SessionConnectionState::Connected {
            return Ok(true);
        }

        self.set_state(&mut link, SessionConnectionState::Connecting);

        let opened = (|| {
            Ok(Segments {
                physics: self.opener.open(SegmentKind::Physics)?,
                graphics: self.opener.open(SegmentKind::Graphics)?,
                static_info: self.opener.open(SegmentKind::StaticInfo)?,
            })
        })();

        match opened {
            Ok(segments) => {
                link.segments = Some(segments);
                self.set_state(&mut link, SessionConnectionState::Connected);
                Ok(true)
            }
            Err(e) => {
                link.segments = None;
                self.set_state(&mut link, SessionConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    fn disconnect(&self) {
        let mut link = self.link.write();
        link.segments = None;
        self.set_state(&mut link, SessionConnectionState::Disconnected);
    }

    fn read_locked<T: SharedMemoryStruct>(link: &Link<O::Segment>) -> Result<T> {
        let segment_name = T::SEGMENT.segment_name();
        if link.state != SessionConnectionState::Connected {
            return Err(SyncError::not_connected(segment_name));
        }
        let segments = link.segments.as_ref().ok_or(SyncError::not_connected(segment_name))?;

        let mut buf = vec![0u8; T::SIZE];
        let copied = segments.get(T::SEGMENT).read_into(&mut buf)?;
        T::decode(&buf[..copied])
    }

    fn read<T: SharedMemoryStruct>(&self) -> Result<T> {
        let link = self.link.read();
        Self::read_locked(&link)
    }

    /// Decode one record and hand it to `publish` while still holding the
    /// link, so a concurrent `stop()` either precedes the read or follows the
    /// publication.
    fn sample<T: SharedMemoryStruct>(&self, cancel: &CancellationToken, publish: impl FnOnce(&Self, T)) {
        let link = self.link.read();
        if cancel.is_cancelled() {
            return;
        }

        match Self::read_locked::<T>(&link) {
            Ok(record) => publish(self, record),
            Err(SyncError::NotConnected { segment }) => {
                trace!(segment, "Skipping sample while disconnected");
            }
            Err(e @ SyncError::SizeMismatch { .. }) => {
                warn!(structure = T::NAME, "Discarding incompatible snapshot: {}", e);
            }
            Err(e) => {
                warn!(structure = T::NAME, "Failed to sample segment: {}", e);
            }
        }
    }

    fn sample_kind(&self, kind: SegmentKind, cancel: &CancellationToken) {
        match kind {
            SegmentKind::Physics => self.sample::<Physics>(cancel, |shared, physics| {
                shared.physics.send_replace(Some(Arc::new(physics)));
            }),
            SegmentKind::Graphics => self.sample::<Graphics>(cancel, |shared, graphics| {
                let status = graphics.status();
                shared.graphics.send_replace(Some(Arc::new(graphics)));
                shared.game_status.send_if_modified(|current| {
                    if *current == status {
                        return false;
                    }
                    info!(from = %current, to = %status, "Game status changed");
                    *current = status;
                    true
                });
            }),
            SegmentKind::StaticInfo => self.sample::<StaticInfo>(cancel, |shared, info| {
                shared.static_info.send_replace(Some(Arc::new(info)));
            }),
        }
    }
}

struct Running {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Owner of the shared memory session.
///
/// Create one instance and pass it by reference to every consumer; the
/// manager is not a process-wide singleton.
pub struct SessionManager<O: SegmentOpener> {
    shared: Arc<Shared<O>>,
    config: SessionConfig,
    running: Mutex<Option<Running>>,
}

impl<O: SegmentOpener> SessionManager<O> {
    pub fn new(opener: O, config: SessionConfig) -> Self {
        let shared = Arc::new(Shared {
            opener,
            link: RwLock::new(Link { state: SessionConnectionState::Disconnected, segments: None }),
            physics: watch::channel(None).0,
            graphics: watch::channel(None).0,
            static_info: watch::channel(None).0,
            game_status: watch::channel(AcStatus::Off).0,
            state: watch::channel(SessionConnectionState::Disconnected).0,
        });

        Self { shared, config, running: Mutex::new(None) }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> SessionConnectionState {
        self.shared.link.read().state
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Receivers for samples and connection state.
    pub fn subscribe(&self) -> SessionChannels {
        SessionChannels {
            physics: self.shared.physics.subscribe(),
            graphics: self.shared.graphics.subscribe(),
            static_info: self.shared.static_info.subscribe(),
            game_status: self.shared.game_status.subscribe(),
            state: self.shared.state.subscribe(),
        }
    }

    /// Decode the current contents of `T`'s segment.
    ///
    /// Fails with [`SyncError::NotConnected`] unless the session is connected
    /// and the segment handle is held.
    pub fn read<T: SharedMemoryStruct>(&self) -> Result<T> {
        self.shared.read()
    }

    /// Start the retry timer and the samplers. Calling it again while running
    /// has no effect.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            debug!("Session manager already running");
            return;
        }

        let cancel = CancellationToken::new();
        let mut tasks = Vec::with_capacity(4);

        tasks.push(tokio::spawn(Self::retry_task(
            Arc::clone(&self.shared),
            self.config.retry_interval(),
            cancel.clone(),
        )));

        for kind in SegmentKind::ALL {
            tasks.push(tokio::spawn(Self::sampler_task(
                Arc::clone(&self.shared),
                kind,
                self.config.interval(kind),
                cancel.clone(),
            )));
        }

        info!(
            physics_ms = self.config.physics_interval_ms,
            graphics_ms = self.config.graphics_interval_ms,
            static_ms = self.config.static_info_interval_ms,
            "Session manager started"
        );

        *running = Some(Running { cancel, tasks });
    }

    /// Halt every timer and release the segment handles.
    ///
    /// Synchronous and idempotent. Once it returns, reads fail with
    /// [`SyncError::NotConnected`] and no further samples are published.
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            running.cancel.cancel();
            for task in running.tasks {
                task.abort();
            }
            info!("Session manager stopped");
        }

        self.shared.disconnect();
    }

    async fn retry_task(shared: Arc<Shared<O>>, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut attempts = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if shared.link.read().state == SessionConnectionState::Connected {
                continue;
            }

            attempts += 1;
            match shared.connect(&cancel) {
                Ok(true) => {
                    info!(attempts, "Connected to simulator shared memory");
                    attempts = 0;
                    // Prime every consumer instead of waiting a full interval
                    shared.sample_kind(SegmentKind::StaticInfo, &cancel);
                    shared.sample_kind(SegmentKind::Graphics, &cancel);
                    shared.sample_kind(SegmentKind::Physics, &cancel);
                }
                Ok(false) => break,
                Err(e) if e.is_retryable() => {
                    if attempts == 1 {
                        info!("Waiting for the simulator to publish telemetry...");
                    }
                    debug!(attempts, "Shared memory not available: {}", e);
                }
                Err(e) => {
                    warn!(attempts, "Failed to open shared memory: {}", e);
                }
            }
        }

        trace!("Retry task ended");
    }

    async fn sampler_task(
        shared: Arc<Shared<O>>,
        kind: SegmentKind,
        period: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => shared.sample_kind(kind, &cancel),
            }
        }

        trace!(segment = kind.segment_name(), "Sampler task ended");
    }
}

impl<O: SegmentOpener> Drop for SessionManager<O> {
    fn drop(&mut self) {
        debug!("Dropping session manager");
        self.stop();
    }
}
