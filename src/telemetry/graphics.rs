//! Graphics page (`acpmf_graphics`): session status, timing and flags.

use super::layout::{FieldReader, FieldWriter, SharedMemoryStruct, WideString};
use super::{AcFlag, AcSessionType, AcStatus, SegmentKind};
use crate::Result;

/// Session and HUD state snapshot.
///
/// Follows `SPageFileGraphic`. Enumerated fields are kept as their raw integers
/// so unknown values survive a decode/encode cycle; use the typed accessors to
/// interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Graphics {
    pub packet_id: i32,
    /// Raw `AC_STATUS`, see [`Graphics::status`]
    pub status: i32,
    /// Raw `AC_SESSION_TYPE`, see [`Graphics::session_type`]
    pub session: i32,
    pub current_time: WideString<15>,
    pub last_time: WideString<15>,
    pub best_time: WideString<15>,
    pub split: WideString<15>,
    pub completed_laps: i32,
    pub position: i32,
    pub i_current_time: i32,
    pub i_last_time: i32,
    pub i_best_time: i32,
    pub session_time_left: f32,
    pub distance_traveled: f32,
    pub is_in_pit: i32,
    pub current_sector_index: i32,
    pub last_sector_time: i32,
    pub number_of_laps: i32,
    pub tyre_compound: WideString<33>,
    /// Alignment after the odd-length compound string
    pub pad0: [u8; 2],
    pub replay_time_multiplier: f32,
    pub normalized_car_position: f32,
    pub car_coordinates: [f32; 3],
    pub penalty_time: f32,
    /// Raw `AC_FLAG_TYPE`, see [`Graphics::flag`]
    pub flag: i32,
    pub ideal_line_on: i32,
    pub is_in_pit_lane: i32,
    pub surface_grip: f32,
    pub mandatory_pit_done: i32,
    pub wind_speed: f32,
    pub wind_direction: f32,
}

impl Graphics {
    pub fn status(&self) -> AcStatus {
        AcStatus::from_raw(self.status)
    }

    pub fn flag(&self) -> AcFlag {
        AcFlag::from_raw(self.flag)
    }

    pub fn session_type(&self) -> AcSessionType {
        AcSessionType::from_raw(self.session)
    }
}

impl SharedMemoryStruct for Graphics {
    const NAME: &'static str = "Graphics";
    const SIZE: usize = 296;
    const SEGMENT: SegmentKind = SegmentKind::Graphics;

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            packet_id: r.i32()?,
            status: r.i32()?,
            session: r.i32()?,
            current_time: r.wide()?,
            last_time: r.wide()?,
            best_time: r.wide()?,
            split: r.wide()?,
            completed_laps: r.i32()?,
            position: r.i32()?,
            i_current_time: r.i32()?,
            i_last_time: r.i32()?,
            i_best_time: r.i32()?,
            session_time_left: r.f32()?,
            distance_traveled: r.f32()?,
            is_in_pit: r.i32()?,
            current_sector_index: r.i32()?,
            last_sector_time: r.i32()?,
            number_of_laps: r.i32()?,
            tyre_compound: r.wide()?,
            pad0: r.pad()?,
            replay_time_multiplier: r.f32()?,
            normalized_car_position: r.f32()?,
            car_coordinates: r.f32s()?,
            penalty_time: r.f32()?,
            flag: r.i32()?,
            ideal_line_on: r.i32()?,
            is_in_pit_lane: r.i32()?,
            surface_grip: r.f32()?,
            mandatory_pit_done: r.i32()?,
            wind_speed: r.f32()?,
            wind_direction: r.f32()?,
        })
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.put_i32(self.packet_id);
        w.put_i32(self.status);
        w.put_i32(self.session);
        w.put_wide(&self.current_time);
        w.put_wide(&self.last_time);
        w.put_wide(&self.best_time);
        w.put_wide(&self.split);
        w.put_i32(self.completed_laps);
        w.put_i32(self.position);
        w.put_i32(self.i_current_time);
        w.put_i32(self.i_last_time);
        w.put_i32(self.i_best_time);
        w.put_f32(self.session_time_left);
        w.put_f32(self.distance_traveled);
        w.put_i32(self.is_in_pit);
        w.put_i32(self.current_sector_index);
        w.put_i32(self.last_sector_time);
        w.put_i32(self.number_of_laps);
        w.put_wide(&self.tyre_compound);
        w.put_bytes(&self.pad0);
        w.put_f32(self.replay_time_multiplier);
        w.put_f32(self.normalized_car_position);
        w.put_f32s(&self.car_coordinates);
        w.put_f32(self.penalty_time);
        w.put_i32(self.flag);
        w.put_i32(self.ideal_line_on);
        w.put_i32(self.is_in_pit_lane);
        w.put_f32(self.surface_grip);
        w.put_i32(self.mandatory_pit_done);
        w.put_f32(self.wind_speed);
        w.put_f32(self.wind_direction);
    }
}
