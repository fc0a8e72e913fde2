//! YAML configuration for the sync pipeline.
//!
//! Every section and key is optional; missing values take the defaults below.
//!
//! ```yaml
//! network:
//!   url: http://192.168.1.20:3000
//!   device_name: racelight
//!   rooms: [living-room, garage]
//!   send_timeout_ms: 250
//! session:
//!   physics_interval_ms: 10
//!   graphics_interval_ms: 1000
//!   static_info_interval_ms: 1000
//!   retry_interval_ms: 2000
//! lighting:
//!   rpm_threshold: 0.75
//!   intensity_rate: !Max 30
//! screen_sync:
//!   display: 0
//!   zone: { x: 0, y: 0, width: 1920, height: 200 }
//!   algorithm: { kind: dominant }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::bridge::BridgeConfig;
use crate::capture::CaptureZone;
use crate::color::ExtractionAlgorithm;
use crate::network::RoomTarget;
use crate::session::SessionConfig;
use crate::{Result, SyncError, UpdateRate};

/// Lighting server connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub url: String,
    /// Name this client announces to the server
    pub device_name: String,
    pub rooms: Vec<RoomTarget>,
    pub send_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            device_name: "racelight".to_string(),
            rooms: Vec::new(),
            send_timeout_ms: 500,
        }
    }
}

impl NetworkConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Telemetry lighting behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Fraction of the rev limit where the RPM intensity starts
    pub rpm_threshold: f64,
    pub intensity_rate: UpdateRate,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self { rpm_threshold: 0.75, intensity_rate: UpdateRate::Native }
    }
}

/// Screen sync capture settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenSyncConfig {
    /// Index into the enumerated displays
    pub display: usize,
    /// Capture area; the whole display when absent
    pub zone: Option<CaptureZone>,
    pub algorithm: ExtractionAlgorithm,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub network: NetworkConfig,
    pub session: SessionConfig,
    pub lighting: LightingConfig,
    pub screen_sync: ScreenSyncConfig,
}

impl SyncConfig {
    /// Read and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml_str(&text)
    }

    /// Parse and validate YAML configuration text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: SyncConfig = serde_yaml_ng::from_str(text)
            .map_err(|e| SyncError::config_error("configuration", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| SyncError::config_error("configuration", e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.url.trim().is_empty() {
            return Err(SyncError::config_error("network", "url must not be empty"));
        }
        if self.network.send_timeout_ms == 0 {
            return Err(SyncError::config_error("network", "send_timeout_ms must be positive"));
        }

        let intervals = [
            ("physics_interval_ms", self.session.physics_interval_ms),
            ("graphics_interval_ms", self.session.graphics_interval_ms),
            ("static_info_interval_ms", self.session.static_info_interval_ms),
            ("retry_interval_ms", self.session.retry_interval_ms),
        ];
        for (key, value) in intervals {
            if value == 0 {
                return Err(SyncError::config_error("session", format!("{key} must be positive")));
            }
        }

        let threshold = self.lighting.rpm_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(SyncError::config_error(
                "lighting",
                format!("rpm_threshold must be in (0, 1], got {threshold}"),
            ));
        }

        if let Some(zone) = self.screen_sync.zone.filter(CaptureZone::is_empty) {
            return Err(SyncError::config_error("screen_sync", format!("zone {zone} is empty")));
        }
        match self.screen_sync.algorithm {
            ExtractionAlgorithm::SpatialAverage { grid: 0 } => {
                return Err(SyncError::config_error("screen_sync", "grid must be positive"));
            }
            ExtractionAlgorithm::RegionSplit { regions: 0 } => {
                return Err(SyncError::config_error("screen_sync", "regions must be positive"));
            }
            _ => {}
        }

        Ok(())
    }

    pub fn bridge(&self) -> BridgeConfig {
        BridgeConfig {
            rpm_threshold: self.lighting.rpm_threshold,
            intensity_rate: self.lighting.intensity_rate,
            physics_interval: self.session.interval(crate::telemetry::SegmentKind::Physics),
        }
    }
}
