//! Static page (`acpmf_static`): values fixed for the lifetime of a session.

use super::SegmentKind;
use super::layout::{FieldReader, FieldWriter, SharedMemoryStruct, WideString};
use crate::Result;

/// Session-constant car, track and rules information.
///
/// Follows `SPageFileStatic`, including the two padding bytes after each
/// odd-length wide string that precedes a 32-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StaticInfo {
    pub sm_version: WideString<15>,
    pub ac_version: WideString<15>,
    pub number_of_sessions: i32,
    pub num_cars: i32,
    pub car_model: WideString<33>,
    pub track: WideString<33>,
    pub player_name: WideString<33>,
    pub player_surname: WideString<33>,
    pub player_nick: WideString<33>,
    pub pad0: [u8; 2],
    pub sector_count: i32,
    pub max_torque: f32,
    pub max_power: f32,
    /// Rev limit of the current car
    pub max_rpm: i32,
    pub max_fuel: f32,
    pub suspension_max_travel: [f32; 4],
    pub tyre_radius: [f32; 4],
    pub max_turbo_boost: f32,
    pub deprecated_1: f32,
    pub deprecated_2: f32,
    pub penalties_enabled: i32,
    pub aid_fuel_rate: f32,
    pub aid_tire_rate: f32,
    pub aid_mechanical_damage: f32,
    pub aid_allow_tyre_blankets: i32,
    pub aid_stability: f32,
    pub aid_auto_clutch: i32,
    pub aid_auto_blip: i32,
    pub has_drs: i32,
    pub has_ers: i32,
    pub has_kers: i32,
    pub kers_max_j: f32,
    pub engine_brake_settings_count: i32,
    pub ers_power_controller_count: i32,
    pub track_spline_length: f32,
    pub track_configuration: WideString<33>,
    pub pad1: [u8; 2],
    pub ers_max_j: f32,
    pub is_timed_race: i32,
    pub has_extra_lap: i32,
    pub car_skin: WideString<33>,
    pub pad2: [u8; 2],
    pub reversed_grid_positions: i32,
    pub pit_window_start: i32,
    pub pit_window_end: i32,
}

impl SharedMemoryStruct for StaticInfo {
    const NAME: &'static str = "StaticInfo";
    const SIZE: usize = 684;
    const SEGMENT: SegmentKind = SegmentKind::StaticInfo;

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            sm_version: r.wide()?,
            ac_version: r.wide()?,
            number_of_sessions: r.i32()?,
            num_cars: r.i32()?,
            car_model: r.wide()?,
            track: r.wide()?,
            player_name: r.wide()?,
            player_surname: r.wide()?,
            player_nick: r.wide()?,
            pad0: r.pad()?,
            sector_count: r.i32()?,
            max_torque: r.f32()?,
            max_power: r.f32()?,
            max_rpm: r.i32()?,
            max_fuel: r.f32()?,
            suspension_max_travel: r.f32s()?,
            tyre_radius: r.f32s()?,
            max_turbo_boost: r.f32()?,
            deprecated_1: r.f32()?,
            deprecated_2: r.f32()?,
            penalties_enabled: r.i32()?,
            aid_fuel_rate: r.f32()?,
            aid_tire_rate: r.f32()?,
            aid_mechanical_damage: r.f32()?,
            aid_allow_tyre_blankets: r.i32()?,
            aid_stability: r.f32()?,
            aid_auto_clutch: r.i32()?,
            aid_auto_blip: r.i32()?,
            has_drs: r.i32()?,
            has_ers: r.i32()?,
            has_kers: r.i32()?,
            kers_max_j: r.f32()?,
            engine_brake_settings_count: r.i32()?,
            ers_power_controller_count: r.i32()?,
            track_spline_length: r.f32()?,
            track_configuration: r.wide()?,
            pad1: r.pad()?,
            ers_max_j: r.f32()?,
            is_timed_race: r.i32()?,
            has_extra_lap: r.i32()?,
            car_skin: r.wide()?,
            pad2: r.pad()?,
            reversed_grid_positions: r.i32()?,
            pit_window_start: r.i32()?,
            pit_window_end: r.i32()?,
        })
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.put_wide(&self.sm_version);
        w.put_wide(&self.ac_version);
        w.put_i32(self.number_of_sessions);
        w.put_i32(self.num_cars);
        w.put_wide(&self.car_model);
        w.put_wide(&self.track);
        w.put_wide(&self.player_name);
        w.put_wide(&self.player_surname);
        w.put_wide(&self.player_nick);
        w.put_bytes(&self.pad0);
        w.put_i32(self.sector_count);
        w.put_f32(self.max_torque);
        w.put_f32(self.max_power);
        w.put_i32(self.max_rpm);
        w.put_f32(self.max_fuel);
        w.put_f32s(&self.suspension_max_travel);
        w.put_f32s(&self.tyre_radius);
        w.put_f32(self.max_turbo_boost);
        w.put_f32(self.deprecated_1);
        w.put_f32(self.deprecated_2);
        w.put_i32(self.penalties_enabled);
        w.put_f32(self.aid_fuel_rate);
        w.put_f32(self.aid_tire_rate);
        w.put_f32(self.aid_mechanical_damage);
        w.put_i32(self.aid_allow_tyre_blankets);
        w.put_f32(self.aid_stability);
        w.put_i32(self.aid_auto_clutch);
        w.put_i32(self.aid_auto_blip);
        w.put_i32(self.has_drs);
        w.put_i32(self.has_ers);
        w.put_i32(self.has_kers);
        w.put_f32(self.kers_max_j);
        w.put_i32(self.engine_brake_settings_count);
        w.put_i32(self.ers_power_controller_count);
        w.put_f32(self.track_spline_length);
        w.put_wide(&self.track_configuration);
        w.put_bytes(&self.pad1);
        w.put_f32(self.ers_max_j);
        w.put_i32(self.is_timed_race);
        w.put_i32(self.has_extra_lap);
        w.put_wide(&self.car_skin);
        w.put_bytes(&self.pad2);
        w.put_i32(self.reversed_grid_positions);
        w.put_i32(self.pit_window_start);
        w.put_i32(self.pit_window_end);
    }
}
