/*!
Ground orientation ("tilt").

The actor's up axis is blended toward a target normal at a bounded angular
rate. The target is an explicit override, else the ground normal when the
actor may orient to it, else world up. Small residuals snap; larger ones
rotate over time, faster the larger the residual. A single-frame jump in the
ground angle far from the recent average is treated as a probe glitch and
ignored unless a tilt is already under way.
*/

use crate::constants::TILT_SETTLED_DEG;
use crate::math::{Quat, Vec3, angle_deg, rotate_towards, rotation_between, try_normalize, up_of};
use crate::settings::ControllerSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TiltPhase {
    StableUpright,
    StableTilted,
    Transitioning,
}

#[derive(Clone, Copy, Debug)]
pub struct TiltInput {
    pub tilt: Quat,
    pub world_up: Vec3,
    pub override_up: Option<Vec3>,
    pub is_grounded: bool,
    /// Effective ground normal and angle of this frame.
    pub ground_normal: Vec3,
    pub ground_angle: f32,
    /// Distance to the surface below while airborne.
    pub ground_distance: f32,
    /// Last normal the actor stood on.
    pub last_ground_normal: Option<Vec3>,
    pub is_falling: bool,
    /// Trailing average of recent grounded angles.
    pub average_angle: Option<f32>,
    pub was_tilting: bool,
    pub dt: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TiltOutput {
    pub tilt: Quat,
    pub phase: TiltPhase,
    pub target: Vec3,
    /// Degrees rotated this frame.
    pub step: f32,
}

impl TiltOutput {
    pub fn is_tilting(&self) -> bool {
        self.phase == TiltPhase::Transitioning
    }
}

/// Pick the normal the actor should orient to.
fn target_up(settings: &ControllerSettings, input: &TiltInput) -> (Vec3, bool) {
    if let Some(up) = input.override_up.and_then(try_normalize) {
        return (up, false);
    }
    if !settings.orient_to_ground || input.ground_angle > settings.max_slope_angle {
        return (input.world_up, false);
    }
    if input.is_grounded {
        return (input.ground_normal, true);
    }
    if settings.keep_orientation_in_air {
        if let Some(normal) = input.last_ground_normal {
            return (normal, true);
        }
    }
    if input.is_falling && input.ground_distance <= settings.orient_in_air_distance {
        return (input.ground_normal, true);
    }
    (input.world_up, false)
}

fn settled_phase(up: Vec3, world_up: Vec3) -> TiltPhase {
    if angle_deg(up, world_up) <= TILT_SETTLED_DEG {
        TiltPhase::StableUpright
    } else {
        TiltPhase::StableTilted
    }
}

pub fn update_tilt(settings: &ControllerSettings, input: &TiltInput) -> TiltOutput {
    let current_up = up_of(&input.tilt);
    let (target, from_ground) = target_up(settings, input);

    let glitch = from_ground
        && input.is_grounded
        && !input.was_tilting
        && input
            .average_angle
            .is_some_and(|avg| (input.ground_angle - avg).abs() > settings.tilt_glitch_angle);
    if glitch {
        return TiltOutput {
            tilt: input.tilt,
            phase: settled_phase(current_up, input.world_up),
            target: current_up,
            step: 0.0,
        };
    }

    let angle = angle_deg(current_up, target);
    if angle <= TILT_SETTLED_DEG || angle < settings.min_angle_for_speed {
        let tilt = if angle <= TILT_SETTLED_DEG {
            input.tilt
        } else {
            rotation_between(Vec3::y(), target)
        };
        return TiltOutput {
            tilt,
            phase: settled_phase(target, input.world_up),
            target,
            step: angle,
        };
    }

    let min_angle = settings.min_angle_for_speed.max(TILT_SETTLED_DEG);
    let rate = settings.orient_to_ground_speed * (angle / min_angle).max(1.0);
    let step = (rate * input.dt).min(angle);
    let new_up = rotate_towards(current_up, target, step);
    let phase = if step >= angle {
        settled_phase(target, input.world_up)
    } else {
        TiltPhase::Transitioning
    };

    TiltOutput {
        tilt: rotation_between(Vec3::y(), new_up),
        phase,
        target,
        step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tilted_normal(deg: f32) -> Vec3 {
        Quat::from_axis_angle(&Vec3::z_axis(), deg.to_radians()) * Vec3::y()
    }

    fn input(tilt: Quat, normal: Vec3, angle: f32) -> TiltInput {
        TiltInput {
            tilt,
            world_up: Vec3::y(),
            override_up: None,
            is_grounded: true,
            ground_normal: normal,
            ground_angle: angle,
            ground_distance: 0.0,
            last_ground_normal: None,
            is_falling: false,
            average_angle: Some(angle),
            was_tilting: false,
            dt: 0.02,
        }
    }

    fn oriented() -> ControllerSettings {
        ControllerSettings {
            orient_to_ground: true,
            ..Default::default()
        }
    }

    #[test]
    fn converges_without_overshoot() {
        let settings = oriented();
        let theta = 20.0;
        let normal = tilted_normal(theta);
        let mut tilt = Quat::identity();
        let mut frames = 0;
        let mut was_tilting = false;

        loop {
            let mut i = input(tilt, normal, theta);
            i.was_tilting = was_tilting;
            let before = angle_deg(up_of(&tilt), normal);
            let out = update_tilt(&settings, &i);
            let after = angle_deg(up_of(&out.tilt), normal);

            // Never passes the target: the residual only shrinks by the step.
            assert!(after <= before + 1.0e-3);
            assert!((before - after - out.step).abs() < 1.0e-2 || after < 1.0e-2);

            tilt = out.tilt;
            was_tilting = out.is_tilting();
            frames += 1;
            if !out.is_tilting() {
                break;
            }
            assert!(frames < 200);
        }

        // Speeds never drop below the base rate, so the base rate bounds the frame count.
        let bound = (theta / (settings.orient_to_ground_speed * 0.02)).ceil() as usize + 1;
        assert!(frames <= bound);
        assert!(angle_deg(up_of(&tilt), normal) < 1.0e-2);
    }

    #[test]
    fn small_residual_snaps() {
        let settings = oriented();
        let normal = tilted_normal(3.0);
        let out = update_tilt(&settings, &input(Quat::identity(), normal, 3.0));
        assert_eq!(out.phase, TiltPhase::StableTilted);
        assert!(angle_deg(up_of(&out.tilt), normal) < 1.0e-3);
    }

    #[test]
    fn disabled_orientation_returns_to_world_up() {
        let settings = ControllerSettings::default();
        let tilt = rotation_between(Vec3::y(), tilted_normal(3.0));
        let out = update_tilt(&settings, &input(tilt, tilted_normal(10.0), 10.0));
        assert_eq!(out.phase, TiltPhase::StableUpright);
        assert!(angle_deg(up_of(&out.tilt), Vec3::y()) < 1.0e-3);
    }

    #[test]
    fn sudden_angle_jump_is_ignored() {
        let settings = oriented();
        let mut i = input(Quat::identity(), tilted_normal(40.0), 40.0);
        i.average_angle = Some(2.0);
        let out = update_tilt(&settings, &i);
        assert_eq!(out.tilt, Quat::identity());
        assert_eq!(out.step, 0.0);

        // Already tilting: follow the ground.
        i.was_tilting = true;
        let out = update_tilt(&settings, &i);
        assert!(out.step > 0.0);
    }

    #[test]
    fn override_wins_over_ground() {
        let settings = ControllerSettings::default();
        let mut i = input(Quat::identity(), Vec3::y(), 0.0);
        i.override_up = Some(Vec3::new(0.0, 0.0, 1.0));
        let out = update_tilt(&settings, &i);
        assert!(out.is_tilting());
        assert!(angle_deg(up_of(&out.tilt), Vec3::z()) < 90.0);
    }
}
