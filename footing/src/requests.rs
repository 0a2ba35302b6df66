/*!
Requests from the motion layer.

The animation/motion layer that sits above the controller talks to it only
through [`MotionRequests`]: persistent targets (velocity, tilt override, ground
override, ignored colliders) stay until changed, while one-shot requests
(rotations, absolute movement, forces) are consumed by the next frame update.
*/

use crate::math::{Quat, Vec3};
use crate::scene::ColliderId;

/// Distances at or below this count as arrived (meters).
const ARRIVE_EPS: f32 = 1.0e-4;

/// Move toward an absolute position, stopping on the acceptance sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetPosition {
    pub position: Vec3,
    /// Meters per second.
    pub speed: f32,
    /// Considered reached within this distance.
    pub acceptance_radius: f32,
}

/// Result of one [`approach`] step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Approach {
    /// Translation for this frame. Never crosses into the acceptance sphere.
    pub movement: Vec3,
    /// Within acceptance after this step.
    pub finished: bool,
    /// Distance to the target before the step.
    pub distance: f32,
}

/// Translation toward `target` at `speed` over `dt`, stopping on the acceptance boundary.
pub fn approach(current: Vec3, target: &TargetPosition, dt: f32) -> Approach {
    let delta = target.position - current;
    let distance = delta.norm();
    let acceptance = target.acceptance_radius.max(0.0);

    if distance <= acceptance + ARRIVE_EPS {
        return Approach {
            movement: Vec3::zeros(),
            finished: true,
            distance,
        };
    }

    let max_step = target.speed.max(0.0) * dt.max(0.0);
    if max_step <= ARRIVE_EPS {
        return Approach {
            movement: Vec3::zeros(),
            finished: false,
            distance,
        };
    }

    let to_boundary = (distance - acceptance).max(0.0);
    let step = to_boundary.min(max_step);
    Approach {
        movement: delta / distance * step,
        finished: (to_boundary - step).abs() <= ARRIVE_EPS,
        distance,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ForceRequest {
    /// Force lasting `duration` seconds (0 = until cleared).
    Force { value: Vec3, duration: f32 },
    Impulse { value: Vec3 },
    ClearAll,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MotionRequests {
    /// Meters per second; persists until changed.
    pub target_velocity: Vec3,
    pub target_position: Option<TargetPosition>,
    /// Absolute orientation to take on next frame.
    pub target_rotation: Option<Quat>,
    /// Incremental yaw about world +Y (degrees).
    pub rotate_yaw: f32,
    /// Incremental tilt applied on top of the current tilt.
    pub rotate_tilt: Quat,
    /// Absolute displacement added once.
    pub movement: Vec3,
    /// Explicit support to attach to; persists until cleared.
    pub ground_override: Option<ColliderId>,
    /// Up vector to orient toward instead of the ground; persists until cleared.
    pub tilt_override: Option<Vec3>,
    pub ignored: Vec<ColliderId>,
    pub forces: Vec<ForceRequest>,
}

impl Default for MotionRequests {
    fn default() -> Self {
        Self {
            target_velocity: Vec3::zeros(),
            target_position: None,
            target_rotation: None,
            rotate_yaw: 0.0,
            rotate_tilt: Quat::identity(),
            movement: Vec3::zeros(),
            ground_override: None,
            tilt_override: None,
            ignored: Vec::new(),
            forces: Vec::new(),
        }
    }
}

impl MotionRequests {
    pub fn set_target_velocity(&mut self, velocity: Vec3) {
        self.target_velocity = velocity;
    }

    pub fn move_to(&mut self, position: Vec3, speed: f32, acceptance_radius: f32) {
        self.target_position = Some(TargetPosition {
            position,
            speed,
            acceptance_radius,
        });
    }

    pub fn rotate_to(&mut self, rotation: Quat) {
        self.target_rotation = Some(rotation);
    }

    pub fn rotate(&mut self, yaw_deg: f32, tilt: Quat) {
        self.rotate_yaw += yaw_deg;
        self.rotate_tilt = tilt * self.rotate_tilt;
    }

    pub fn add_movement(&mut self, movement: Vec3) {
        self.movement += movement;
    }

    pub fn set_ground(&mut self, ground: Option<ColliderId>) {
        self.ground_override = ground;
    }

    pub fn set_tilt_override(&mut self, up: Option<Vec3>) {
        self.tilt_override = up;
    }

    pub fn ignore(&mut self, collider: ColliderId) {
        if !self.ignored.contains(&collider) {
            self.ignored.push(collider);
            self.ignored.sort_unstable();
        }
    }

    pub fn unignore(&mut self, collider: ColliderId) {
        self.ignored.retain(|&c| c != collider);
    }

    pub fn add_force(&mut self, value: Vec3, duration: f32) {
        self.forces.push(ForceRequest::Force { value, duration });
    }

    pub fn add_impulse(&mut self, value: Vec3) {
        self.forces.push(ForceRequest::Impulse { value });
    }

    pub fn clear_forces(&mut self) {
        self.forces.push(ForceRequest::ClearAll);
    }

    /// User movement for one frame: velocity, target approach and absolute moves.
    ///
    /// A reached target position is cleared.
    pub fn take_movement(&mut self, position: Vec3, dt: f32) -> Vec3 {
        let mut movement = self.target_velocity * dt + self.movement;
        self.movement = Vec3::zeros();

        if let Some(target) = self.target_position {
            let step = approach(position, &target, dt);
            movement += step.movement;
            if step.finished {
                self.target_position = None;
            }
        }
        movement
    }

    /// Drop one-shot rotation requests.
    pub fn clear_rotations(&mut self) {
        self.target_rotation = None;
        self.rotate_yaw = 0.0;
        self.rotate_tilt = Quat::identity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(x: f32, acceptance: f32) -> TargetPosition {
        TargetPosition {
            position: Vec3::new(x, 0.0, 0.0),
            speed: 2.0,
            acceptance_radius: acceptance,
        }
    }

    #[test]
    fn approach_stops_on_acceptance_boundary() {
        let step = approach(Vec3::zeros(), &target(1.0, 0.5), 1.0);
        assert!((step.movement.x - 0.5).abs() < 1.0e-6);
        assert!(step.finished);

        let step = approach(Vec3::zeros(), &target(10.0, 0.5), 0.5);
        assert!((step.movement.x - 1.0).abs() < 1.0e-6);
        assert!(!step.finished);
    }

    #[test]
    fn approach_inside_acceptance_is_finished() {
        let step = approach(Vec3::new(0.9, 0.0, 0.0), &target(1.0, 0.5), 1.0);
        assert_eq!(step.movement, Vec3::zeros());
        assert!(step.finished);
    }

    #[test]
    fn take_movement_consumes_one_shot_parts() {
        let mut requests = MotionRequests::default();
        requests.set_target_velocity(Vec3::new(1.0, 0.0, 0.0));
        requests.add_movement(Vec3::new(0.0, 0.0, 0.5));
        requests.move_to(Vec3::new(0.0, 0.0, -0.1), 10.0, 0.0);

        let m = requests.take_movement(Vec3::zeros(), 0.1);
        assert!((m - Vec3::new(0.1, 0.0, 0.4)).norm() < 1.0e-5);
        assert!(requests.target_position.is_none());

        let m = requests.take_movement(Vec3::zeros(), 0.1);
        assert!((m - Vec3::new(0.1, 0.0, 0.0)).norm() < 1.0e-6);
    }

    #[test]
    fn ignore_list_has_no_duplicates() {
        let mut requests = MotionRequests::default();
        requests.ignore(ColliderId(4));
        requests.ignore(ColliderId(2));
        requests.ignore(ColliderId(4));
        assert_eq!(requests.ignored, vec![ColliderId(2), ColliderId(4)]);
        requests.unignore(ColliderId(2));
        assert_eq!(requests.ignored, vec![ColliderId(4)]);
    }
}
