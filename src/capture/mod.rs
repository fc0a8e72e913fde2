//! Display selection and region capture.
//!
//! [`FrameCapture`] wraps a platform [`CaptureDevice`] and tracks the selected
//! display and its single capture zone. Every operation runs under one scoped
//! lock, so concurrent captures on the same adapter serialize and a returned
//! [`PixelBuffer`] is always an owned copy taken while the lock was held.

mod buffer;

pub use buffer::{Bgra, PixelBuffer, PixelView};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, trace};

use crate::{Result, SyncError};

/// A capturable display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub id: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ({}x{})", self.id, self.name, self.width, self.height)
    }
}

/// Rectangle in display pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureZone {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureZone {
    /// Zone covering a whole display.
    pub fn full(display: &Display) -> Self {
        Self { x: 0, y: 0, width: display.width, height: display.height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}

impl fmt::Display for CaptureZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Handle of a zone registered with a [`ScreenCapture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneId(pub u32);

/// Platform entry point for screen capture.
pub trait CaptureDevice: Send + Sync + 'static {
    type Screen: ScreenCapture;

    /// Attached displays in enumeration order.
    fn displays(&self) -> Result<Vec<Display>>;

    /// Start capturing `display`.
    fn open_display(&self, display: &Display) -> Result<Self::Screen>;
}

/// Capture session bound to one display.
pub trait ScreenCapture: Send + 'static {
    fn register_zone(&mut self, zone: CaptureZone) -> Result<ZoneId>;

    fn unregister_zone(&mut self, zone: ZoneId);

    /// Refresh the backend's frame from the display.
    fn capture(&mut self) -> Result<()>;

    /// View of the zone's pixels in the most recent frame.
    fn zone_view(&self, zone: ZoneId) -> Result<PixelView<'_>>;
}

struct CaptureState<S> {
    display: Option<Display>,
    screen: Option<S>,
    zone: Option<(ZoneId, CaptureZone)>,
}

impl<S: ScreenCapture> CaptureState<S> {
    fn release_zone(&mut self) {
        if let (Some(screen), Some((id, zone))) = (self.screen.as_mut(), self.zone.take()) {
            trace!(%zone, "Unregistering capture zone");
            screen.unregister_zone(id);
        }
    }
}

/// Capture adapter holding the selected display and zone.
pub struct FrameCapture<D: CaptureDevice> {
    device: D,
    state: Mutex<CaptureState<D::Screen>>,
}

impl<D: CaptureDevice> FrameCapture<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            state: Mutex::new(CaptureState { display: None, screen: None, zone: None }),
        }
    }

    pub fn list_displays(&self) -> Result<Vec<Display>> {
        self.device.displays()
    }

    pub fn selected_display(&self) -> Option<Display> {
        self.state.lock().display.clone()
    }

    pub fn capture_zone(&self) -> Option<CaptureZone> {
        self.state.lock().zone.map(|(_, zone)| zone)
    }

    /// Switch the active display, or deselect with `None`.
    ///
    /// Any existing zone is unregistered from the previous display. If the new
    /// display cannot be opened the previous selection is left untouched.
    pub fn select_display(&self, display: Option<&Display>) -> Result<()> {
        let screen = display.map(|d| self.device.open_display(d)).transpose()?;

        let mut state = self.state.lock();
        state.release_zone();
        state.screen = screen;
        state.display = display.cloned();

        match display {
            Some(selected) => info!(display = %selected, "Selected display"),
            None => debug!("Display deselected"),
        }
        Ok(())
    }

    /// Register `x, y, width, height` as the capture zone, replacing any prior zone.
    pub fn create_capture_zone(&self, x: u32, y: u32, width: u32, height: u32) -> Result<CaptureZone> {
        let zone = CaptureZone { x, y, width, height };
        let mut state = self.state.lock();
        Self::register(&mut state, zone)?;
        Ok(zone)
    }

    /// Register a zone spanning the selected display unless one already exists.
    pub fn ensure_full_display_zone(&self) -> Result<CaptureZone> {
        let mut state = self.state.lock();
        if let Some((_, zone)) = state.zone {
            return Ok(zone);
        }
        let display = state
            .display
            .as_ref()
            .ok_or_else(|| SyncError::invalid_state("No display selected"))?;
        let zone = CaptureZone::full(display);
        Self::register(&mut state, zone)?;
        Ok(zone)
    }

    fn register(state: &mut CaptureState<D::Screen>, zone: CaptureZone) -> Result<()> {
        let display = state
            .display
            .as_ref()
            .ok_or_else(|| SyncError::invalid_state("No display selected"))?;
        if zone.is_empty() {
            return Err(SyncError::invalid_state(format!("Capture zone {zone} is empty")));
        }
        if !zone.fits_within(display.width, display.height) {
            return Err(SyncError::invalid_state(format!(
                "Capture zone {zone} exceeds display {display}"
            )));
        }

        state.release_zone();
        let screen = state
            .screen
            .as_mut()
            .ok_or_else(|| SyncError::invalid_state("No display selected"))?;
        let id = screen.register_zone(zone)?;
        state.zone = Some((id, zone));

        debug!(%zone, "Registered capture zone");
        Ok(())
    }

    /// Capture the zone and return an owned copy of its pixels.
    pub fn capture_frame(&self) -> Result<PixelBuffer> {
        let mut state = self.state.lock();
        let (id, _) = state.zone.ok_or_else(|| SyncError::invalid_state("No capture zone"))?;
        let screen =
            state.screen.as_mut().ok_or_else(|| SyncError::invalid_state("No display selected"))?;

        screen.capture()?;
        let buffer = screen.zone_view(id)?.to_buffer();
        trace!(width = buffer.width(), height = buffer.height(), "Captured frame");
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SyntheticCaptureDevice;
    use std::sync::Arc;

    fn capture() -> FrameCapture<SyntheticCaptureDevice> {
        FrameCapture::new(SyntheticCaptureDevice::new(vec![(64, 48), (32, 16)]))
    }

    #[test]
    fn zone_requires_a_selected_display() {
        let capture = capture();
        assert!(matches!(
            capture.create_capture_zone(0, 0, 8, 8),
            Err(SyncError::InvalidState { .. })
        ));
        assert!(matches!(capture.capture_frame(), Err(SyncError::InvalidState { .. })));
    }

    #[test]
    fn capture_requires_a_zone() {
        let capture = capture();
        let display = capture.list_displays().unwrap().remove(0);
        capture.select_display(Some(&display)).unwrap();

        assert!(matches!(capture.capture_frame(), Err(SyncError::InvalidState { .. })));
    }

    #[test]
    fn zone_must_fit_the_display() {
        let capture = capture();
        let display = capture.list_displays().unwrap().remove(1);
        capture.select_display(Some(&display)).unwrap();

        assert!(capture.create_capture_zone(30, 0, 4, 4).is_err());
        assert!(capture.create_capture_zone(0, 0, 0, 4).is_err());
        assert!(capture.create_capture_zone(28, 12, 4, 4).is_ok());
    }

    #[test]
    fn captured_buffer_matches_the_zone() {
        let device = SyntheticCaptureDevice::new(vec![(64, 48)]);
        let capture = FrameCapture::new(device.clone());
        let display = capture.list_displays().unwrap().remove(0);
        capture.select_display(Some(&display)).unwrap();
        capture.create_capture_zone(10, 5, 20, 10).unwrap();

        device.fill(Bgra::opaque(200, 100, 50));
        let buffer = capture.capture_frame().unwrap();

        assert_eq!((buffer.width(), buffer.height()), (20, 10));
        assert!(buffer.pixels().all(|p| p == Bgra::opaque(200, 100, 50)));
    }

    #[test]
    fn reselecting_releases_the_old_zone() {
        let device = SyntheticCaptureDevice::new(vec![(64, 48), (32, 16)]);
        let capture = FrameCapture::new(device.clone());
        let displays = capture.list_displays().unwrap();

        capture.select_display(Some(&displays[0])).unwrap();
        capture.create_capture_zone(0, 0, 16, 16).unwrap();
        capture.create_capture_zone(0, 0, 8, 8).unwrap();
        assert_eq!(device.live_zones(), 1);

        capture.select_display(Some(&displays[1])).unwrap();
        assert_eq!(capture.capture_zone(), None);
        assert_eq!(device.live_zones(), 0);

        capture.select_display(None).unwrap();
        assert_eq!(capture.selected_display(), None);
    }

    #[test]
    fn full_display_zone_is_created_once() {
        let capture = capture();
        let display = capture.list_displays().unwrap().remove(0);
        capture.select_display(Some(&display)).unwrap();

        let zone = capture.ensure_full_display_zone().unwrap();
        assert_eq!(zone, CaptureZone { x: 0, y: 0, width: 64, height: 48 });

        capture.create_capture_zone(4, 4, 8, 8).unwrap();
        let kept = capture.ensure_full_display_zone().unwrap();
        assert_eq!(kept, CaptureZone { x: 4, y: 4, width: 8, height: 8 });
    }

    #[test]
    fn concurrent_captures_never_overlap() {
        let device = SyntheticCaptureDevice::new(vec![(16, 16)]);
        let capture = Arc::new(FrameCapture::new(device.clone()));
        let display = capture.list_displays().unwrap().remove(0);
        capture.select_display(Some(&display)).unwrap();
        capture.ensure_full_display_zone().unwrap();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let capture = Arc::clone(&capture);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        capture.capture_frame().unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(device.captures(), 100);
        assert_eq!(device.max_concurrent_captures(), 1);
    }
}
