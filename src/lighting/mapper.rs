//! Telemetry to lighting translation.

use tracing::{debug, trace};

use super::{LightingCommand, LightingState};
use crate::color::Rgb;
use crate::session::SessionEvent;
use crate::telemetry::AcFlag;

/// Alert color of a flag, if it has one.
pub fn flag_color(flag: AcFlag) -> Option<Rgb> {
    match flag {
        AcFlag::Blue => Some(Rgb::BLUE),
        AcFlag::White => Some(Rgb::WHITE),
        AcFlag::Yellow => Some(Rgb::YELLOW),
        AcFlag::Penalty => Some(Rgb::RED),
        _ => None,
    }
}

/// Edge-triggered flag alerts.
#[derive(Debug, Clone, Default)]
pub struct FlagMapper {
    previous: AcFlag,
}

impl FlagMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> AcFlag {
        self.previous
    }

    /// State to send for the flag just observed, if the flag changed.
    pub fn on_flag(&mut self, flag: AcFlag) -> Option<LightingState> {
        if flag == self.previous {
            return None;
        }
        let previous = std::mem::replace(&mut self.previous, flag);

        if flag == AcFlag::NoFlag {
            debug!(?previous, "Flag cleared");
            return Some(LightingState::reset());
        }

        debug!(?previous, ?flag, "Flag raised");
        Some(LightingState::alert(flag_color(flag).unwrap_or(Rgb::BLACK)))
    }
}

/// Maps engine speed above a threshold onto an intensity in `0..=255`.
///
/// The threshold is `threshold_ratio * max_rpm`. Below it nothing is sent,
/// apart from a single 0 when the engine drops back under the threshold.
/// Above it a value is only sent when it differs from the last one sent.
#[derive(Debug, Clone)]
pub struct RpmMapper {
    threshold_ratio: f64,
    max_rpm: i32,
    last_actual: i32,
    last_mapped: Option<u8>,
}

impl Default for RpmMapper {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl RpmMapper {
    pub const DEFAULT_THRESHOLD: f64 = 0.75;

    pub fn new(threshold_ratio: f64) -> Self {
        Self { threshold_ratio, max_rpm: 0, last_actual: 0, last_mapped: None }
    }

    pub fn set_max_rpm(&mut self, max_rpm: i32) {
        if max_rpm != self.max_rpm {
            debug!(max_rpm, threshold = self.threshold_ratio * f64::from(max_rpm), "Rev limit updated");
        }
        self.max_rpm = max_rpm;
    }

    pub fn max_rpm(&self) -> i32 {
        self.max_rpm
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_ratio * f64::from(self.max_rpm)
    }

    /// Intensity to send for the engine speed just observed, if any.
    pub fn on_rpm(&mut self, rpm: i32) -> Option<u8> {
        if self.max_rpm <= 0 {
            return None;
        }

        let threshold = self.threshold();
        let actual = f64::from(rpm);

        if actual < threshold {
            if f64::from(self.last_actual) < threshold {
                return None;
            }
            trace!(rpm, "Dropped below threshold");
            self.last_actual = rpm;
            self.last_mapped = Some(0);
            return Some(0);
        }

        let span = f64::from(self.max_rpm) - threshold;
        let mapped = if span > 0.0 {
            (255.0 * (actual - threshold) / span).round().clamp(0.0, 255.0) as u8
        } else {
            u8::MAX
        };

        self.last_actual = rpm;
        if self.last_mapped == Some(mapped) {
            return None;
        }
        self.last_mapped = Some(mapped);
        Some(mapped)
    }
}

/// Routes session events through the flag and RPM mappers.
#[derive(Debug, Clone, Default)]
pub struct TelemetryMapper {
    flags: FlagMapper,
    rpm: RpmMapper,
}

impl TelemetryMapper {
    pub fn new(threshold_ratio: f64) -> Self {
        Self { flags: FlagMapper::new(), rpm: RpmMapper::new(threshold_ratio) }
    }

    pub fn rpm(&self) -> &RpmMapper {
        &self.rpm
    }

    pub fn handle(&mut self, event: &SessionEvent) -> Option<LightingCommand> {
        match event {
            SessionEvent::StaticInfoUpdated(info) => {
                self.rpm.set_max_rpm(info.max_rpm);
                None
            }
            SessionEvent::GraphicsUpdated(graphics) => {
                self.flags.on_flag(graphics.flag()).map(LightingCommand::SetState)
            }
            SessionEvent::PhysicsUpdated(physics) => {
                self.rpm.on_rpm(physics.rpms).map(LightingCommand::SetIntensity)
            }
            SessionEvent::GameStatusChanged(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::LightingMode;
    use crate::telemetry::{Graphics, Physics, StaticInfo};
    use std::sync::Arc;

    #[test]
    fn flag_sequence_is_edge_triggered() {
        let mut mapper = FlagMapper::new();
        let flags = [AcFlag::NoFlag, AcFlag::Yellow, AcFlag::Yellow, AcFlag::NoFlag];
        let sent: Vec<_> = flags.into_iter().map(|f| mapper.on_flag(f)).collect();

        assert_eq!(sent[0], None);
        assert_eq!(sent[1], Some(LightingState::alert(Rgb::YELLOW)));
        assert_eq!(sent[2], None);
        assert_eq!(sent[3], Some(LightingState::reset()));
    }

    #[test]
    fn blue_flag_alerts_once_then_resets() {
        let mut mapper = FlagMapper::new();
        let flags = [AcFlag::NoFlag, AcFlag::Blue, AcFlag::Blue, AcFlag::NoFlag];
        let sent: Vec<_> = flags.into_iter().map(|f| mapper.on_flag(f)).collect();

        assert_eq!(
            sent,
            vec![
                None,
                Some(LightingState::alert(Rgb::BLUE)),
                None,
                Some(LightingState::reset()),
            ]
        );
        assert_eq!(mapper.previous(), AcFlag::NoFlag);
    }

    #[test]
    fn alert_and_reset_payloads() {
        let alert = LightingState::alert(Rgb::RED);
        assert_eq!(alert.mode, LightingMode::Alert);
        assert_eq!((alert.brightness, alert.speed), (255, 1000));

        let reset = LightingState::reset();
        assert_eq!(reset.mode, LightingMode::Visualizer);
        assert_eq!(reset.colors, [Rgb::BLUE, Rgb::BLACK, Rgb::BLACK]);
        assert_eq!((reset.brightness, reset.speed), (255, 2000));
    }

    #[test]
    fn switching_between_flags_alerts_each_time() {
        let mut mapper = FlagMapper::new();
        assert_eq!(mapper.on_flag(AcFlag::Blue), Some(LightingState::alert(Rgb::BLUE)));
        assert_eq!(mapper.on_flag(AcFlag::Penalty), Some(LightingState::alert(Rgb::RED)));
        assert_eq!(mapper.on_flag(AcFlag::White), Some(LightingState::alert(Rgb::WHITE)));
        assert_eq!(mapper.previous(), AcFlag::White);
    }

    #[test]
    fn unmapped_flags_alert_in_black() {
        let mut mapper = FlagMapper::new();
        let state = mapper.on_flag(AcFlag::Checkered).unwrap();
        assert_eq!(state.mode, LightingMode::Alert);
        assert_eq!(state.colors[0], Rgb::BLACK);
        assert_eq!(flag_color(AcFlag::Black), None);
    }

    #[test]
    fn rpm_sequence_maps_above_threshold() {
        let mut mapper = RpmMapper::default();
        mapper.set_max_rpm(8000);

        let sent: Vec<_> = [5000, 6000, 7000, 8000].into_iter().map(|r| mapper.on_rpm(r)).collect();
        assert_eq!(sent, vec![None, Some(0), Some(128), Some(255)]);
    }

    #[test]
    fn rpm_repeats_are_suppressed() {
        let mut mapper = RpmMapper::default();
        mapper.set_max_rpm(8000);

        assert_eq!(mapper.on_rpm(7000), Some(128));
        assert_eq!(mapper.on_rpm(7001), None);
        assert_eq!(mapper.on_rpm(9000), Some(255));
        assert_eq!(mapper.on_rpm(9500), None);
    }

    #[test]
    fn falling_below_threshold_sends_zero_once() {
        let mut mapper = RpmMapper::default();
        mapper.set_max_rpm(8000);

        assert_eq!(mapper.on_rpm(7500), Some(191));
        assert_eq!(mapper.on_rpm(4000), Some(0));
        assert_eq!(mapper.on_rpm(3000), None);
        // Back at the threshold maps to 0, which was already sent
        assert_eq!(mapper.on_rpm(6000), None);
        assert_eq!(mapper.on_rpm(6050), Some(6));
    }

    #[test]
    fn climbing_back_resends_the_band() {
        let mut mapper = RpmMapper::default();
        mapper.set_max_rpm(8000);

        assert_eq!(mapper.on_rpm(7500), Some(191));
        assert_eq!(mapper.on_rpm(4000), Some(0));
        assert_eq!(mapper.on_rpm(7500), Some(191));
    }

    #[test]
    fn unknown_rev_limit_is_a_noop() {
        let mut mapper = RpmMapper::default();
        assert_eq!(mapper.on_rpm(9000), None);
        mapper.set_max_rpm(-1);
        assert_eq!(mapper.on_rpm(9000), None);
    }

    #[test]
    fn full_threshold_ratio_saturates() {
        let mut mapper = RpmMapper::new(1.0);
        mapper.set_max_rpm(8000);
        assert_eq!(mapper.on_rpm(7999), None);
        assert_eq!(mapper.on_rpm(8000), Some(255));
    }

    #[test]
    fn telemetry_mapper_routes_events() {
        let mut mapper = TelemetryMapper::new(0.75);

        let info = StaticInfo { max_rpm: 8000, ..Default::default() };
        assert_eq!(mapper.handle(&SessionEvent::StaticInfoUpdated(Arc::new(info))), None);
        assert_eq!(mapper.rpm().max_rpm(), 8000);

        let physics = Physics { rpms: 8000, ..Default::default() };
        assert_eq!(
            mapper.handle(&SessionEvent::PhysicsUpdated(Arc::new(physics))),
            Some(LightingCommand::SetIntensity(255))
        );

        let graphics = Graphics { flag: AcFlag::Blue.raw(), ..Default::default() };
        assert_eq!(
            mapper.handle(&SessionEvent::GraphicsUpdated(Arc::new(graphics))),
            Some(LightingCommand::SetState(LightingState::alert(Rgb::BLUE)))
        );
    }
}
