//! Windows backends for live telemetry and desktop capture.
//!
//! - [`SharedMemoryOpener`] maps the simulator's `Local\acpmf_*` file mappings
//!   read-only for the session manager.
//! - [`DxgiCaptureDevice`] captures displays through DXGI Desktop Duplication.

mod dxgi;
mod shared_memory;

pub use dxgi::{DxgiCaptureDevice, DxgiScreen};
pub use shared_memory::{SharedMemoryOpener, SharedMemorySegment};
