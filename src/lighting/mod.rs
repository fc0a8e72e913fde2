//! Lighting state sent to the lighting network.

mod mapper;

pub use mapper::{FlagMapper, RpmMapper, TelemetryMapper, flag_color};

use serde::{Deserialize, Serialize, Serializer};

use crate::color::Rgb;

/// Rendering mode of the lighting devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum LightingMode {
    /// Devices follow their own visualizer animation
    #[default]
    Visualizer,
    /// Devices flash the alert color
    Alert,
}

impl LightingMode {
    pub fn code(self) -> u8 {
        match self {
            LightingMode::Visualizer => 0,
            LightingMode::Alert => 1,
        }
    }
}

impl TryFrom<u8> for LightingMode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(LightingMode::Visualizer),
            1 => Ok(LightingMode::Alert),
            other => Err(format!("unknown lighting mode {other}")),
        }
    }
}

impl Serialize for LightingMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Full state of the lighting devices in the target rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightingState {
    pub mode: LightingMode,
    pub colors: [Rgb; 3],
    pub brightness: u8,
    /// Animation speed in milliseconds
    pub speed: u32,
}

impl Default for LightingState {
    fn default() -> Self {
        Self { mode: LightingMode::Visualizer, colors: [Rgb::BLACK; 3], brightness: 255, speed: 2000 }
    }
}

impl LightingState {
    /// State sent when a flag is raised.
    pub fn alert(color: Rgb) -> Self {
        Self {
            mode: LightingMode::Alert,
            colors: [color, Rgb::BLACK, Rgb::BLACK],
            brightness: 255,
            speed: 1000,
        }
    }

    /// State sent when the flag clears.
    pub fn reset() -> Self {
        Self { colors: [Rgb::BLUE, Rgb::BLACK, Rgb::BLACK], ..Self::default() }
    }

    /// Neutral state the rooms are prepared with before screen sync.
    pub fn screen_sync_base() -> Self {
        Self::default()
    }
}

/// Output of the telemetry mappers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LightingCommand {
    SetState(LightingState),
    /// RPM intensity in `0..=255`
    SetIntensity(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_serializes_to_wire_shape() {
        let value = serde_json::to_value(LightingState::reset()).unwrap();
        assert_eq!(
            value,
            json!({
                "mode": 0,
                "colors": ["#0000FF", "#000000", "#000000"],
                "brightness": 255,
                "speed": 2000,
            })
        );

        let alert = serde_json::to_value(LightingState::alert(Rgb::YELLOW)).unwrap();
        assert_eq!(alert["mode"], 1);
        assert_eq!(alert["colors"][0], "#FFFF00");
        assert_eq!(alert["speed"], 1000);
    }

    #[test]
    fn state_parses_back_from_wire_shape() {
        let state: LightingState = serde_json::from_value(json!({
            "mode": 1,
            "colors": ["#FF0000", "#000000", "#000000"],
            "brightness": 255,
            "speed": 1000,
        }))
        .unwrap();
        assert_eq!(state, LightingState::alert(Rgb::RED));

        assert!(serde_json::from_value::<LightingMode>(json!(7)).is_err());
    }
}
