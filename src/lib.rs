//! Drive a room lighting network from Assetto Corsa telemetry and screen colors.
//!
//! Racelight has two independent pipelines:
//!
//! - **Telemetry lighting**: [`session::SessionManager`] polls the simulator's
//!   shared memory segments and publishes typed samples; [`bridge::TelemetryBridge`]
//!   maps flags to alert states and engine RPM to an intensity value.
//! - **Screen sync**: [`capture::FrameCapture`] grabs a zone of a display,
//!   [`color::ExtractionAlgorithm`] reduces it to one color and
//!   [`screen_sync::ScreenSync`] streams that color to the lighting rooms.
//!
//! Both pipelines deliver through a [`network::LightingNetwork`].
//!
//! # Features
//!
//! - **Live telemetry**: shared memory access on Windows, behind the
//!   [`session::SegmentOpener`] trait everywhere else
//! - **Screen capture**: DXGI desktop duplication on Windows
//! - **Seven color algorithms**, selectable from YAML configuration
//!
//! ## Example (flag mapping)
//!
//! ```rust
//! use racelight::color::Rgb;
//! use racelight::lighting::{FlagMapper, LightingMode};
//! use racelight::telemetry::AcFlag;
//!
//! let mut flags = FlagMapper::new();
//! let alert = flags.on_flag(AcFlag::Yellow).expect("new flag raises an alert");
//! assert_eq!(alert.mode, LightingMode::Alert);
//! assert_eq!(alert.colors[0], Rgb::YELLOW);
//!
//! // The same flag again is not re-sent
//! assert!(flags.on_flag(AcFlag::Yellow).is_none());
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Telemetry pipeline
pub mod bridge;
pub mod lighting;
pub mod session;
pub mod stream;
pub mod telemetry;

// Screen sync pipeline
pub mod capture;
pub mod color;
pub mod screen_sync;

pub mod config;
pub mod network;

// Platform-specific modules
#[cfg(windows)]
pub mod windows;

pub use error::*;
pub use types::*;
