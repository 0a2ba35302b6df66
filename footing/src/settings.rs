/*!
Per-actor controller settings.

Every tunable the grounding, slope, step, tilt and force stages read lives
here so an actor can be configured from data (RON/JSON) in one place.
Distances are in meters, speeds in meters per second, angles in degrees and
angular speeds in degrees per second.
*/

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::math::{Vec3, try_normalize};

/// Axes that are locked in place when the frame is committed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeAxes {
    pub position_x: bool,
    pub position_y: bool,
    pub position_z: bool,
    pub yaw: bool,
    pub tilt: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Actor mass used to turn forces into accelerations (kg).
    pub mass: f32,

    pub is_gravity_enabled: bool,
    /// Gravity magnitude (m/s^2, positive).
    pub gravity: f32,
    /// Gravity-relative "up" when gravity is not ground-relative.
    pub world_up: [f32; 3],
    /// Use a trailing average of recent ground normals as world up.
    pub is_gravity_relative: bool,
    /// Snapshots averaged for ground-relative gravity.
    pub gravity_relative_frames: usize,
    /// Clamp on the downward accumulated speed (m/s).
    pub terminal_fall_speed: f32,

    /// Buffer kept between the feet and the ground.
    pub skin_width: f32,
    /// Height above the feet the grounding ray starts from.
    /// Keep it above `max_step_height` so ledge tops can be seen.
    pub ground_probe_start_offset: f32,
    /// How far below the feet the grounding ray reaches.
    pub grounding_distance: f32,
    /// Radius used by the edge-support fallback probe.
    pub base_radius: f32,

    /// Steepest walkable slope.
    pub max_slope_angle: f32,
    /// Bracket size at which the slope-boundary bisection stops.
    pub slope_step_size: f32,
    pub is_slope_sliding_enabled: bool,
    /// Downhill speed while standing on an unwalkable slope.
    pub slope_slide_speed: f32,

    pub max_step_height: f32,
    /// Upward correction speed while stepping up or leaving penetration.
    pub step_up_speed: f32,
    /// Downward correction speed while stepping down a ledge.
    pub step_down_speed: f32,

    pub is_force_grounding_enabled: bool,
    /// Hover gaps smaller than this are pulled down onto the ground.
    pub force_grounding_distance: f32,

    pub orient_to_ground: bool,
    /// Keep the last ground normal while airborne.
    pub keep_orientation_in_air: bool,
    /// Keep orienting to ground while falling if it is within this distance.
    pub orient_in_air_distance: f32,
    /// Base tilt speed (deg/s).
    pub orient_to_ground_speed: f32,
    /// Residual tilt angles below this snap instead of rotating over time.
    pub min_angle_for_speed: f32,
    /// Frame-to-frame ground angle jumps above this are treated as probe glitches.
    pub tilt_glitch_angle: f32,

    pub is_collision_enabled: bool,
    /// Layer mask for colliders that block body shapes.
    pub collision_layers: u32,
    /// Layer mask for colliders that can support the actor.
    pub ground_layers: u32,

    /// Number of kinematic snapshots kept in the ring.
    pub history_len: usize,

    pub freeze: FreezeAxes,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            mass: 1.0,
            is_gravity_enabled: true,
            gravity: 9.81,
            world_up: [0.0, 1.0, 0.0],
            is_gravity_relative: false,
            gravity_relative_frames: 20,
            terminal_fall_speed: 50.0,
            skin_width: 0.01,
            ground_probe_start_offset: 0.5,
            grounding_distance: 3.0,
            base_radius: 0.3,
            max_slope_angle: 45.0,
            slope_step_size: 0.01,
            is_slope_sliding_enabled: true,
            slope_slide_speed: 2.0,
            max_step_height: 0.3,
            step_up_speed: 1.5,
            step_down_speed: 3.0,
            is_force_grounding_enabled: true,
            force_grounding_distance: 0.1,
            orient_to_ground: false,
            keep_orientation_in_air: false,
            orient_in_air_distance: 2.0,
            orient_to_ground_speed: 90.0,
            min_angle_for_speed: 5.0,
            tilt_glitch_angle: 30.0,
            is_collision_enabled: true,
            collision_layers: u32::MAX,
            ground_layers: u32::MAX,
            history_len: 20,
            freeze: FreezeAxes::default(),
        }
    }
}

impl ControllerSettings {
    /// Normalized world up, falling back to +Y for a degenerate vector.
    pub fn world_up(&self) -> Vec3 {
        let [x, y, z] = self.world_up;
        try_normalize(Vec3::new(x, y, z)).unwrap_or_else(Vec3::y)
    }

    /// Check every field for finiteness and range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let finite = [
            ("mass", self.mass),
            ("gravity", self.gravity),
            ("terminal_fall_speed", self.terminal_fall_speed),
            ("skin_width", self.skin_width),
            ("ground_probe_start_offset", self.ground_probe_start_offset),
            ("grounding_distance", self.grounding_distance),
            ("base_radius", self.base_radius),
            ("max_slope_angle", self.max_slope_angle),
            ("slope_step_size", self.slope_step_size),
            ("slope_slide_speed", self.slope_slide_speed),
            ("max_step_height", self.max_step_height),
            ("step_up_speed", self.step_up_speed),
            ("step_down_speed", self.step_down_speed),
            ("force_grounding_distance", self.force_grounding_distance),
            ("orient_in_air_distance", self.orient_in_air_distance),
            ("orient_to_ground_speed", self.orient_to_ground_speed),
            ("min_angle_for_speed", self.min_angle_for_speed),
            ("tilt_glitch_angle", self.tilt_glitch_angle),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(SettingsError::NotFinite { name, value });
            }
        }

        let positive = [
            ("mass", self.mass),
            ("grounding_distance", self.grounding_distance),
            ("base_radius", self.base_radius),
            ("slope_step_size", self.slope_step_size),
        ];
        for (name, value) in positive {
            if value <= 0.0 {
                return Err(SettingsError::NotPositive { name, value });
            }
        }

        let non_negative = [
            ("gravity", self.gravity),
            ("terminal_fall_speed", self.terminal_fall_speed),
            ("skin_width", self.skin_width),
            ("ground_probe_start_offset", self.ground_probe_start_offset),
            ("slope_slide_speed", self.slope_slide_speed),
            ("max_step_height", self.max_step_height),
            ("step_up_speed", self.step_up_speed),
            ("step_down_speed", self.step_down_speed),
            ("force_grounding_distance", self.force_grounding_distance),
            ("orient_in_air_distance", self.orient_in_air_distance),
            ("orient_to_ground_speed", self.orient_to_ground_speed),
            ("min_angle_for_speed", self.min_angle_for_speed),
            ("tilt_glitch_angle", self.tilt_glitch_angle),
        ];
        for (name, value) in non_negative {
            if value < 0.0 {
                return Err(SettingsError::Negative { name, value });
            }
        }

        if self.max_slope_angle <= 0.0 || self.max_slope_angle > 90.0 {
            return Err(SettingsError::OutOfRange {
                name: "max_slope_angle",
                value: self.max_slope_angle,
                min: 0.0,
                max: 90.0,
            });
        }

        let [x, y, z] = self.world_up;
        if try_normalize(Vec3::new(x, y, z)).is_none() {
            return Err(SettingsError::DegenerateWorldUp);
        }

        if self.history_len < 2 {
            return Err(SettingsError::HistoryTooShort(self.history_len));
        }

        Ok(())
    }
}
