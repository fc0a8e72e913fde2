//! Continuous screen-to-lighting color sync.
//!
//! While capturing, the driver repeatedly captures the zone on the blocking
//! pool, reduces it to one color, writes that color into the first slot of a
//! persisted [`LightingState`] and sends it to the target rooms. There is no
//! delay between iterations; the loop runs as fast as capture and delivery
//! allow. Stopping clears the flag and lets the in-flight iteration finish.
//! Every start gets its own flag, so a loop that is still finishing its last
//! iteration can never be revived by a restart.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::capture::{CaptureDevice, FrameCapture, PixelBuffer};
use crate::color::{ExtractionAlgorithm, Rgb};
use crate::lighting::LightingState;
use crate::network::{LightingEmitter, LightingNetwork};
use crate::{Result, SyncError};

/// Latest frame and the color extracted from it.
#[derive(Debug, Clone)]
pub struct SyncPreview {
    pub frame: Arc<PixelBuffer>,
    pub color: Rgb,
}

/// One started loop and the flag that keeps it going.
struct Run {
    capturing: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Screen sync loop controller.
pub struct ScreenSync<D: CaptureDevice, N: LightingNetwork> {
    capture: Arc<FrameCapture<D>>,
    emitter: LightingEmitter<N>,
    algorithm: ExtractionAlgorithm,
    preview: watch::Sender<Option<SyncPreview>>,
    /// Newest run last; older entries are loops still finishing after a stop
    runs: Mutex<Vec<Run>>,
}

impl<D: CaptureDevice, N: LightingNetwork> ScreenSync<D, N> {
    pub fn new(
        capture: Arc<FrameCapture<D>>,
        emitter: LightingEmitter<N>,
        algorithm: ExtractionAlgorithm,
    ) -> Self {
        Self {
            capture,
            emitter,
            algorithm,
            preview: watch::channel(None).0,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn capture(&self) -> &Arc<FrameCapture<D>> {
        &self.capture
    }

    pub fn algorithm(&self) -> ExtractionAlgorithm {
        self.algorithm
    }

    pub fn is_capturing(&self) -> bool {
        Self::is_active(&self.runs.lock())
    }

    fn is_active(runs: &[Run]) -> bool {
        runs.last().is_some_and(|run| run.capturing.load(Ordering::Acquire))
    }

    /// Most recent frame and color, refreshed every iteration.
    pub fn preview(&self) -> watch::Receiver<Option<SyncPreview>> {
        self.preview.subscribe()
    }

    /// Start the sync loop on the current tokio runtime.
    ///
    /// Without a custom zone the whole selected display is captured. Fails
    /// with [`SyncError::InvalidState`] if no display is selected.
    pub fn start(&self) -> Result<()> {
        let mut runs = self.runs.lock();
        if Self::is_active(&runs) {
            debug!("Screen sync already running");
            return Ok(());
        }
        runs.retain(|run| !run.task.is_finished());

        let zone = self.capture.ensure_full_display_zone()?;
        let capturing = Arc::new(AtomicBool::new(true));

        info!(%zone, algorithm = %self.algorithm, "Screen sync started");
        let task = tokio::spawn(Self::run(
            Arc::clone(&self.capture),
            self.emitter.clone(),
            self.algorithm,
            Arc::clone(&capturing),
            self.preview.clone(),
        ));
        runs.push(Run { capturing, task });
        Ok(())
    }

    /// Ask the loop to stop after its current iteration.
    pub fn stop(&self) {
        let runs = self.runs.lock();
        let stopped = runs.last().is_some_and(|run| run.capturing.swap(false, Ordering::AcqRel));
        if stopped {
            info!("Screen sync stopping");
        }
    }

    /// Stop and wait until every loop has exited.
    pub async fn stop_and_wait(&self) {
        self.stop();
        let runs = std::mem::take(&mut *self.runs.lock());
        for run in runs {
            if let Err(e) = run.task.await {
                warn!("Screen sync task ended abnormally: {}", e);
            }
        }
    }

    async fn run(
        capture: Arc<FrameCapture<D>>,
        emitter: LightingEmitter<N>,
        algorithm: ExtractionAlgorithm,
        capturing: Arc<AtomicBool>,
        preview: watch::Sender<Option<SyncPreview>>,
    ) {
        let mut state = LightingState::screen_sync_base();
        emitter.set_state(state.clone()).await;

        let mut frames = 0u64;
        while capturing.load(Ordering::Acquire) {
            let capture = Arc::clone(&capture);
            let sampled = tokio::task::spawn_blocking(move || {
                let frame = capture.capture_frame()?;
                let color = algorithm.extract(&frame);
                Ok::<_, SyncError>((frame, color))
            })
            .await
            .map_err(|e| SyncError::capture_failed(format!("Capture task failed: {e}")))
            .and_then(|sampled| sampled);

            let (frame, color) = match sampled {
                Ok(sampled) => sampled,
                Err(e) => {
                    warn!("Screen sync capture failed, stopping: {}", e);
                    break;
                }
            };

            state.colors[0] = color;
            emitter.set_state(state.clone()).await;
            preview.send_replace(Some(SyncPreview { frame: Arc::new(frame), color }));

            frames += 1;
            trace!(frames, %color, "Screen sync iteration");
        }

        capturing.store(false, Ordering::Release);
        info!(frames, "Screen sync stopped");
    }
}

impl<D: CaptureDevice, N: LightingNetwork> Drop for ScreenSync<D, N> {
    fn drop(&mut self) {
        for run in self.runs.get_mut().iter() {
            run.capturing.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Bgra;
    use crate::lighting::LightingMode;
    use crate::network::NetworkEvent;
    use crate::test_utils::{RecordingNetwork, SyntheticCaptureDevice};
    use std::time::Duration;

    fn driver(
        device: SyntheticCaptureDevice,
        network: Arc<RecordingNetwork>,
    ) -> ScreenSync<SyntheticCaptureDevice, RecordingNetwork> {
        let capture = Arc::new(FrameCapture::new(device));
        let display = capture.list_displays().unwrap().remove(0);
        capture.select_display(Some(&display)).unwrap();
        let emitter = LightingEmitter::new(network, vec!["studio".into()], Duration::from_secs(1));
        ScreenSync::new(capture, emitter, ExtractionAlgorithm::Average)
    }

    #[tokio::test]
    async fn prepares_rooms_then_streams_colors() {
        let device = SyntheticCaptureDevice::new(vec![(8, 8)]);
        device.fill(Bgra::opaque(0x12, 0x34, 0x56));
        let network = Arc::new(RecordingNetwork::connected());
        let sync = driver(device, Arc::clone(&network));

        let mut preview = sync.preview();
        sync.start().unwrap();
        assert!(sync.is_capturing());

        tokio::time::timeout(Duration::from_secs(2), preview.wait_for(|p| p.is_some()))
            .await
            .expect("no preview within timeout")
            .unwrap();
        sync.stop_and_wait().await;
        assert!(!sync.is_capturing());

        let states = network.states();
        assert!(states.len() >= 2);
        assert_eq!(states[0], LightingState::screen_sync_base());
        assert_eq!(states[1].colors, [Rgb::new(0x12, 0x34, 0x56), Rgb::BLACK, Rgb::BLACK]);
        assert_eq!(states[1].mode, LightingMode::Visualizer);
        assert!(network.sent().iter().all(|m| m.event == NetworkEvent::SetNetworkState));

        let last = preview.borrow().clone().unwrap();
        assert_eq!(last.color, Rgb::new(0x12, 0x34, 0x56));
        assert_eq!((last.frame.width(), last.frame.height()), (8, 8));
    }

    #[tokio::test]
    async fn stop_halts_sending() {
        let network = Arc::new(RecordingNetwork::connected());
        let sync = driver(SyntheticCaptureDevice::new(vec![(4, 4)]), Arc::clone(&network));

        sync.start().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        sync.stop_and_wait().await;

        let sent = network.sent().len();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(network.sent().len(), sent);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn restart_retires_the_previous_loop() {
        let network = Arc::new(RecordingNetwork::connected());
        network.set_latency(Duration::from_millis(2));
        let sync = driver(SyntheticCaptureDevice::new(vec![(4, 4)]), Arc::clone(&network));

        sync.start().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        sync.stop();
        sync.start().unwrap();
        assert!(sync.is_capturing());
        tokio::time::sleep(Duration::from_millis(100)).await;

        {
            let runs = sync.runs.lock();
            let live = runs.iter().filter(|run| !run.task.is_finished()).count();
            assert_eq!(live, 1, "only the restarted loop may keep running");
            assert!(runs.last().is_some_and(|run| !run.task.is_finished()));
        }

        sync.stop_and_wait().await;
        assert!(!sync.is_capturing());
        assert!(sync.runs.lock().is_empty());

        let sent = network.sent().len();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(network.sent().len(), sent);
    }

    #[tokio::test]
    async fn start_requires_a_display() {
        let capture = Arc::new(FrameCapture::new(SyntheticCaptureDevice::new(vec![(4, 4)])));
        let network = Arc::new(RecordingNetwork::connected());
        let emitter = LightingEmitter::new(network, vec![], Duration::from_secs(1));
        let sync = ScreenSync::new(capture, emitter, ExtractionAlgorithm::Dominant);

        assert!(matches!(sync.start(), Err(SyncError::InvalidState { .. })));
        assert!(!sync.is_capturing());
    }

    #[tokio::test]
    async fn capture_errors_end_the_loop() {
        let device = SyntheticCaptureDevice::new(vec![(4, 4)]);
        let network = Arc::new(RecordingNetwork::connected());
        let sync = driver(device.clone(), network);

        device.fail_captures(true);
        sync.start().unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while sync.is_capturing() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("loop did not stop after capture failure");
        sync.stop_and_wait().await;
    }
}
