/*!
Per-frame kinematic snapshot.

One `KinematicState` is written per variable-rate update. It records where the
actor ended up, why it moved (movement broken out by cause), what supports it
and what it collided with. The controller writes only the current snapshot and
reads the previous ones through [`crate::history::StateHistory`].
*/

use crate::constants::NO_GROUND_DISTANCE;
use crate::math::{Quat, Vec3};
use crate::scene::ColliderId;

#[derive(Clone, Debug, PartialEq)]
pub struct KinematicState {
    /// Monotonic frame counter assigned on shift.
    pub id: u64,

    pub position: Vec3,
    /// Composed orientation (`tilt * yaw`).
    pub rotation: Quat,
    /// Heading about +Y before tilting.
    pub yaw: Quat,
    /// Rotation taking +Y onto the actor's up.
    pub tilt: Quat,
    /// Displacement of this frame divided by its delta time.
    pub velocity: Vec3,

    /// Movement requested by the motion layer this frame.
    pub movement: Vec3,
    /// Movement caused by gravity and forces.
    pub movement_force_adjust: Vec3,
    /// Movement caused by sliding down an unwalkable slope.
    pub movement_slide_adjust: Vec3,
    /// Movement inherited from a moving support.
    pub movement_platform_adjust: Vec3,
    /// Yaw inherited from a rotating support.
    pub rotation_platform_adjust: Quat,

    pub is_grounded: bool,
    pub is_stepping_up: bool,
    pub is_stepping_down: bool,
    pub is_popping_up: bool,
    pub is_tilting: bool,

    /// Object currently supporting the actor.
    pub ground: Option<ColliderId>,
    /// Support pose when the local contact point was recorded.
    pub ground_position: Vec3,
    pub ground_rotation: Quat,
    /// Actor position in the support's local frame.
    pub ground_local_contact_point: Vec3,
    pub is_ground_local_contact_set: bool,

    /// Whether the effective surface came from the straight-down probe.
    pub is_ground_surface_direct: bool,
    /// Effective surface facts (may come from an edge-support fallback).
    pub ground_surface_angle: f32,
    pub ground_surface_distance: f32,
    pub ground_surface_point: Vec3,
    pub ground_surface_normal: Vec3,
    /// Straight-down probe facts.
    pub ground_surface_direct_distance: f32,
    pub ground_surface_direct_point: Vec3,
    pub ground_surface_direct_normal: Vec3,

    pub is_colliding: bool,
    pub colliding_object: Option<ColliderId>,
    pub collision_point: Vec3,
    pub collision_normal: Vec3,
    pub collision_origin: Vec3,
}

impl Default for KinematicState {
    fn default() -> Self {
        Self {
            id: 0,
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            yaw: Quat::identity(),
            tilt: Quat::identity(),
            velocity: Vec3::zeros(),
            movement: Vec3::zeros(),
            movement_force_adjust: Vec3::zeros(),
            movement_slide_adjust: Vec3::zeros(),
            movement_platform_adjust: Vec3::zeros(),
            rotation_platform_adjust: Quat::identity(),
            is_grounded: false,
            is_stepping_up: false,
            is_stepping_down: false,
            is_popping_up: false,
            is_tilting: false,
            ground: None,
            ground_position: Vec3::zeros(),
            ground_rotation: Quat::identity(),
            ground_local_contact_point: Vec3::zeros(),
            is_ground_local_contact_set: false,
            is_ground_surface_direct: false,
            ground_surface_angle: 0.0,
            ground_surface_distance: NO_GROUND_DISTANCE,
            ground_surface_point: Vec3::zeros(),
            ground_surface_normal: Vec3::y(),
            ground_surface_direct_distance: NO_GROUND_DISTANCE,
            ground_surface_direct_point: Vec3::zeros(),
            ground_surface_direct_normal: Vec3::y(),
            is_colliding: false,
            colliding_object: None,
            collision_point: Vec3::zeros(),
            collision_normal: Vec3::zeros(),
            collision_origin: Vec3::zeros(),
        }
    }
}

impl KinematicState {
    /// Reset every fact so the snapshot can be reused for a new frame.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Carry the facts that persist across frames from `prev`.
    ///
    /// Pose, support reference and contact anchor carry over; per-frame
    /// movement, flags and collision facts start empty.
    pub fn carry_from(&mut self, prev: &KinematicState) {
        self.position = prev.position;
        self.rotation = prev.rotation;
        self.yaw = prev.yaw;
        self.tilt = prev.tilt;
        self.ground = prev.ground;
        self.ground_position = prev.ground_position;
        self.ground_rotation = prev.ground_rotation;
        self.ground_local_contact_point = prev.ground_local_contact_point;
        self.is_ground_local_contact_set = prev.is_ground_local_contact_set;
        self.ground_surface_normal = prev.ground_surface_normal;
    }

    /// Forget the current support.
    pub fn clear_ground(&mut self) {
        self.is_grounded = false;
        self.ground = None;
        self.is_ground_local_contact_set = false;
        self.is_ground_surface_direct = false;
        self.ground_surface_angle = 0.0;
        self.ground_surface_distance = NO_GROUND_DISTANCE;
        self.ground_surface_direct_distance = NO_GROUND_DISTANCE;
    }

    /// Record a collision resolved during this frame.
    pub fn record_collision(&mut self, object: ColliderId, point: Vec3, normal: Vec3, origin: Vec3) {
        self.is_colliding = true;
        self.colliding_object = Some(object);
        self.collision_point = point;
        self.collision_normal = normal;
        self.collision_origin = origin;
    }
}
