//! In-memory stand-ins for the simulator, the display and the lighting server.
//!
//! These fakes let the session, capture and sync layers run without Windows,
//! a running simulator or a lighting server.

#![cfg(any(test, feature = "benchmark"))]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

use crate::capture::{
    Bgra, CaptureDevice, CaptureZone, Display, PixelBuffer, PixelView, ScreenCapture, ZoneId,
};
use crate::lighting::LightingState;
use crate::network::{LightingNetwork, NetworkEvent, RoomTarget};
use crate::session::{Segment, SegmentOpener};
use crate::telemetry::{Graphics, Physics, SegmentKind, SharedMemoryStruct, StaticInfo};
use crate::{Result, SyncError};

/// Frame with a horizontal hue gradient and a bright diagonal, for benchmarks.
pub fn gradient_frame(width: u32, height: u32) -> PixelBuffer {
    let pixels: Vec<Bgra> = (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| {
                if x == y {
                    Bgra::opaque(255, 255, 255)
                } else {
                    let r = (x * 255 / width.max(1)) as u8;
                    let b = (y * 255 / height.max(1)) as u8;
                    Bgra::opaque(r, 64, b)
                }
            })
        })
        .collect();
    PixelBuffer::from_pixels(width, height, &pixels).unwrap_or_default()
}

// Simulator shared memory

#[derive(Default)]
struct MemoryPages {
    available: AtomicBool,
    pages: Mutex<HashMap<SegmentKind, Vec<u8>>>,
    opens: AtomicUsize,
    reads: AtomicUsize,
    live: AtomicUsize,
}

/// Segment opener backed by byte vectors the test writes into.
#[derive(Clone, Default)]
pub struct MemorySegments {
    inner: Arc<MemoryPages>,
}

impl MemorySegments {
    /// Segments that do not exist yet; every open fails.
    pub fn new() -> Self {
        let segments = Self::default();
        segments.publish(&Physics::default());
        segments.publish(&Graphics::default());
        segments.publish(&StaticInfo::default());
        segments
    }

    /// Segments that can be opened immediately.
    pub fn available() -> Self {
        let segments = Self::new();
        segments.set_available(true);
        segments
    }

    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Overwrite the segment of `T` with its encoding.
    pub fn publish<T: SharedMemoryStruct>(&self, record: &T) {
        self.publish_raw(T::SEGMENT, record.encode());
    }

    pub fn publish_raw(&self, kind: SegmentKind, bytes: Vec<u8>) {
        self.inner.pages.lock().insert(kind, bytes);
    }

    /// Open attempts so far, successful or not.
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Reads served through any handle so far.
    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Handles currently held by the session.
    pub fn live_handles(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }
}

impl SegmentOpener for MemorySegments {
    type Segment = MemorySegment;

    fn open(&self, kind: SegmentKind) -> Result<MemorySegment> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(SyncError::segment_unavailable(kind.segment_name()));
        }
        self.inner.live.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySegment { kind, inner: Arc::clone(&self.inner) })
    }
}

pub struct MemorySegment {
    kind: SegmentKind,
    inner: Arc<MemoryPages>,
}

impl Segment for MemorySegment {
    fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        let pages = self.inner.pages.lock();
        let page = pages.get(&self.kind).map(Vec::as_slice).unwrap_or_default();
        let copied = buf.len().min(page.len());
        buf[..copied].copy_from_slice(&page[..copied]);
        Ok(copied)
    }
}

impl Drop for MemorySegment {
    fn drop(&mut self) {
        self.inner.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// Displays

#[derive(Default)]
struct SyntheticState {
    displays: Vec<Display>,
    pixel: Mutex<Bgra>,
    fail: AtomicBool,
    captures: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    live_zones: AtomicUsize,
}

/// Capture device whose displays show a single solid color.
#[derive(Clone)]
pub struct SyntheticCaptureDevice {
    inner: Arc<SyntheticState>,
}

impl SyntheticCaptureDevice {
    pub fn new(sizes: Vec<(u32, u32)>) -> Self {
        let displays = sizes
            .into_iter()
            .enumerate()
            .map(|(id, (width, height))| Display {
                id: id as u32,
                name: format!("Synthetic {id}"),
                width,
                height,
            })
            .collect();
        Self { inner: Arc::new(SyntheticState { displays, ..Default::default() }) }
    }

    /// Color shown from the next capture on.
    pub fn fill(&self, pixel: Bgra) {
        *self.inner.pixel.lock() = pixel;
    }

    pub fn fail_captures(&self, fail: bool) {
        self.inner.fail.store(fail, Ordering::SeqCst);
    }

    pub fn captures(&self) -> usize {
        self.inner.captures.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_captures(&self) -> usize {
        self.inner.max_active.load(Ordering::SeqCst)
    }

    pub fn live_zones(&self) -> usize {
        self.inner.live_zones.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for SyntheticCaptureDevice {
    type Screen = SyntheticScreen;

    fn displays(&self) -> Result<Vec<Display>> {
        Ok(self.inner.displays.clone())
    }

    fn open_display(&self, display: &Display) -> Result<SyntheticScreen> {
        let frame = PixelBuffer::filled(display.width, display.height, *self.inner.pixel.lock());
        Ok(SyntheticScreen {
            inner: Arc::clone(&self.inner),
            frame,
            zones: HashMap::new(),
            next_zone: 0,
        })
    }
}

pub struct SyntheticScreen {
    inner: Arc<SyntheticState>,
    frame: PixelBuffer,
    zones: HashMap<ZoneId, CaptureZone>,
    next_zone: u32,
}

impl ScreenCapture for SyntheticScreen {
    fn register_zone(&mut self, zone: CaptureZone) -> Result<ZoneId> {
        let id = ZoneId(self.next_zone);
        self.next_zone += 1;
        self.zones.insert(id, zone);
        self.inner.live_zones.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn unregister_zone(&mut self, zone: ZoneId) {
        if self.zones.remove(&zone).is_some() {
            self.inner.live_zones.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn capture(&mut self) -> Result<()> {
        if self.inner.fail.load(Ordering::SeqCst) {
            return Err(SyncError::capture_failed("Synthetic display lost"));
        }

        let active = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_active.fetch_max(active, Ordering::SeqCst);
        std::thread::sleep(Duration::from_micros(100));

        let pixel = *self.inner.pixel.lock();
        self.frame = PixelBuffer::filled(self.frame.width(), self.frame.height(), pixel);

        self.inner.active.fetch_sub(1, Ordering::SeqCst);
        self.inner.captures.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn zone_view(&self, zone: ZoneId) -> Result<PixelView<'_>> {
        let zone = self
            .zones
            .get(&zone)
            .ok_or_else(|| SyncError::invalid_state("Capture zone is not registered"))?;
        self.frame.view().crop(zone)
    }
}

impl Drop for SyntheticScreen {
    fn drop(&mut self) {
        self.inner.live_zones.fetch_sub(self.zones.len(), Ordering::SeqCst);
    }
}

// Lighting server

/// One event delivered to a [`RecordingNetwork`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub event: NetworkEvent,
    pub targets: Vec<RoomTarget>,
    pub payload: Value,
}

/// Network that records every delivered event.
pub struct RecordingNetwork {
    connected: watch::Sender<bool>,
    sent: Mutex<Vec<SentMessage>>,
    fail: AtomicBool,
    latency_ms: AtomicU64,
}

impl Default for RecordingNetwork {
    fn default() -> Self {
        Self {
            connected: watch::channel(false).0,
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }
}

impl RecordingNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        let network = Self::default();
        network.connected.send_replace(true);
        network
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Lighting states delivered so far, in order.
    pub fn states(&self) -> Vec<LightingState> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.event == NetworkEvent::SetNetworkState)
            .filter_map(|m| serde_json::from_value(m.payload.clone()).ok())
            .collect()
    }

    /// Intensity values delivered so far, in order.
    pub fn intensities(&self) -> Vec<u64> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.event == NetworkEvent::SetIntensity)
            .filter_map(|m| m.payload["fftValue"].as_u64())
            .collect()
    }
}

#[async_trait]
impl LightingNetwork for RecordingNetwork {
    async fn connect(&self) -> Result<()> {
        self.connected.send_replace(true);
        Ok(())
    }

    async fn send(
        &self,
        event: NetworkEvent,
        targets: &[RoomTarget],
        payload: Value,
    ) -> Result<Option<Value>> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::network_failed("Recording network refused the event"));
        }
        if !self.is_connected() {
            return Err(SyncError::network_failed("Recording network is not connected"));
        }

        self.sent.lock().push(SentMessage { event, targets: targets.to_vec(), payload });
        Ok(None)
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn connection_events(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.send_replace(false);
        Ok(())
    }
}
