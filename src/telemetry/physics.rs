//! Physics page (`acpmf_physics`), refreshed by the simulator every physics step.

use super::SegmentKind;
use super::layout::{FieldReader, FieldWriter, SharedMemoryStruct};
use crate::Result;

/// Vehicle physics snapshot.
///
/// Field order and widths follow `SPageFilePhysics`; every field is four bytes
/// wide so the struct carries no padding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Physics {
    pub packet_id: i32,
    pub gas: f32,
    pub brake: f32,
    pub fuel: f32,
    pub gear: i32,
    /// Engine speed in revolutions per minute
    pub rpms: i32,
    pub steer_angle: f32,
    pub speed_kmh: f32,
    pub velocity: [f32; 3],
    pub acc_g: [f32; 3],
    pub wheel_slip: [f32; 4],
    pub wheel_load: [f32; 4],
    pub wheels_pressure: [f32; 4],
    pub wheel_angular_speed: [f32; 4],
    pub tyre_wear: [f32; 4],
    pub tyre_dirty_level: [f32; 4],
    pub tyre_core_temperature: [f32; 4],
    pub camber_rad: [f32; 4],
    pub suspension_travel: [f32; 4],
    pub drs: f32,
    pub tc: f32,
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
    pub cg_height: f32,
    pub car_damage: [f32; 5],
    pub number_of_tyres_out: i32,
    pub pit_limiter_on: i32,
    pub abs: f32,
    pub kers_charge: f32,
    pub kers_input: f32,
    pub auto_shifter_on: i32,
    pub ride_height: [f32; 2],
    pub turbo_boost: f32,
    pub ballast: f32,
    pub air_density: f32,
    pub air_temp: f32,
    pub road_temp: f32,
    pub local_angular_vel: [f32; 3],
    pub final_ff: f32,
    pub performance_meter: f32,
    pub engine_brake: i32,
    pub ers_recovery_level: i32,
    pub ers_power_level: i32,
    pub ers_heat_charging: i32,
    pub ers_is_charging: i32,
    pub kers_current_kj: f32,
    pub drs_available: i32,
    pub drs_enabled: i32,
    pub brake_temp: [f32; 4],
    pub clutch: f32,
    pub tyre_temp_i: [f32; 4],
    pub tyre_temp_m: [f32; 4],
    pub tyre_temp_o: [f32; 4],
    pub is_ai_controlled: i32,
    pub tyre_contact_point: [[f32; 3]; 4],
    pub tyre_contact_normal: [[f32; 3]; 4],
    pub tyre_contact_heading: [[f32; 3]; 4],
    pub brake_bias: f32,
    pub local_velocity: [f32; 3],
}

impl SharedMemoryStruct for Physics {
    const NAME: &'static str = "Physics";
    const SIZE: usize = 580;
    const SEGMENT: SegmentKind = SegmentKind::Physics;

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            packet_id: r.i32()?,
            gas: r.f32()?,
            brake: r.f32()?,
            fuel: r.f32()?,
            gear: r.i32()?,
            rpms: r.i32()?,
            steer_angle: r.f32()?,
            speed_kmh: r.f32()?,
            velocity: r.f32s()?,
            acc_g: r.f32s()?,
            wheel_slip: r.f32s()?,
            wheel_load: r.f32s()?,
            wheels_pressure: r.f32s()?,
            wheel_angular_speed: r.f32s()?,
            tyre_wear: r.f32s()?,
            tyre_dirty_level: r.f32s()?,
            tyre_core_temperature: r.f32s()?,
            camber_rad: r.f32s()?,
            suspension_travel: r.f32s()?,
            drs: r.f32()?,
            tc: r.f32()?,
            heading: r.f32()?,
            pitch: r.f32()?,
            roll: r.f32()?,
            cg_height: r.f32()?,
            car_damage: r.f32s()?,
            number_of_tyres_out: r.i32()?,
            pit_limiter_on: r.i32()?,
            abs: r.f32()?,
            kers_charge: r.f32()?,
            kers_input: r.f32()?,
            auto_shifter_on: r.i32()?,
            ride_height: r.f32s()?,
            turbo_boost: r.f32()?,
            ballast: r.f32()?,
            air_density: r.f32()?,
            air_temp: r.f32()?,
            road_temp: r.f32()?,
            local_angular_vel: r.f32s()?,
            final_ff: r.f32()?,
            performance_meter: r.f32()?,
            engine_brake: r.i32()?,
            ers_recovery_level: r.i32()?,
            ers_power_level: r.i32()?,
            ers_heat_charging: r.i32()?,
            ers_is_charging: r.i32()?,
            kers_current_kj: r.f32()?,
            drs_available: r.i32()?,
            drs_enabled: r.i32()?,
            brake_temp: r.f32s()?,
            clutch: r.f32()?,
            tyre_temp_i: r.f32s()?,
            tyre_temp_m: r.f32s()?,
            tyre_temp_o: r.f32s()?,
            is_ai_controlled: r.i32()?,
            tyre_contact_point: r.vec3s()?,
            tyre_contact_normal: r.vec3s()?,
            tyre_contact_heading: r.vec3s()?,
            brake_bias: r.f32()?,
            local_velocity: r.f32s()?,
        })
    }

    fn write_fields(&self, w: &mut FieldWriter) {
        w.put_i32(self.packet_id);
        w.put_f32(self.gas);
        w.put_f32(self.brake);
        w.put_f32(self.fuel);
        w.put_i32(self.gear);
        w.put_i32(self.rpms);
        w.put_f32(self.steer_angle);
        w.put_f32(self.speed_kmh);
        w.put_f32s(&self.velocity);
        w.put_f32s(&self.acc_g);
        w.put_f32s(&self.wheel_slip);
        w.put_f32s(&self.wheel_load);
        w.put_f32s(&self.wheels_pressure);
        w.put_f32s(&self.wheel_angular_speed);
        w.put_f32s(&self.tyre_wear);
        w.put_f32s(&self.tyre_dirty_level);
        w.put_f32s(&self.tyre_core_temperature);
        w.put_f32s(&self.camber_rad);
        w.put_f32s(&self.suspension_travel);
        w.put_f32(self.drs);
        w.put_f32(self.tc);
        w.put_f32(self.heading);
        w.put_f32(self.pitch);
        w.put_f32(self.roll);
        w.put_f32(self.cg_height);
        w.put_f32s(&self.car_damage);
        w.put_i32(self.number_of_tyres_out);
        w.put_i32(self.pit_limiter_on);
        w.put_f32(self.abs);
        w.put_f32(self.kers_charge);
        w.put_f32(self.kers_input);
        w.put_i32(self.auto_shifter_on);
        w.put_f32s(&self.ride_height);
        w.put_f32(self.turbo_boost);
        w.put_f32(self.ballast);
        w.put_f32(self.air_density);
        w.put_f32(self.air_temp);
        w.put_f32(self.road_temp);
        w.put_f32s(&self.local_angular_vel);
        w.put_f32(self.final_ff);
        w.put_f32(self.performance_meter);
        w.put_i32(self.engine_brake);
        w.put_i32(self.ers_recovery_level);
        w.put_i32(self.ers_power_level);
        w.put_i32(self.ers_heat_charging);
        w.put_i32(self.ers_is_charging);
        w.put_f32(self.kers_current_kj);
        w.put_i32(self.drs_available);
        w.put_i32(self.drs_enabled);
        w.put_f32s(&self.brake_temp);
        w.put_f32(self.clutch);
        w.put_f32s(&self.tyre_temp_i);
        w.put_f32s(&self.tyre_temp_m);
        w.put_f32s(&self.tyre_temp_o);
        w.put_i32(self.is_ai_controlled);
        w.put_vec3s(&self.tyre_contact_point);
        w.put_vec3s(&self.tyre_contact_normal);
        w.put_vec3s(&self.tyre_contact_heading);
        w.put_f32(self.brake_bias);
        w.put_f32s(&self.local_velocity);
    }
}
