/*!
Platform attachment.

While the actor stands on the same support across frames, the actor's feet
are stored in the support's local frame. When the support moves or rotates,
that local point is pushed through the support's new pose; the difference to
where the actor stands becomes extra movement for the frame, and the support's
rotation about up becomes extra yaw.
*/

use log::debug;

use crate::math::{Point, Quat, Vec3, twist_about};
use crate::scene::SceneQuery;
use crate::state::KinematicState;

/// Pose differences below these count as a support that did not move.
const STILL_TRANSLATION_SQ: f32 = 1.0e-14;
const STILL_ROTATION_RAD: f32 = 1.0e-7;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlatformCarry {
    pub movement: Vec3,
    /// Twist about up inherited from the support.
    pub rotation: Quat,
    /// The support moved since the previous frame.
    pub is_moving: bool,
}

impl Default for PlatformCarry {
    fn default() -> Self {
        Self {
            movement: Vec3::zeros(),
            rotation: Quat::identity(),
            is_moving: false,
        }
    }
}

/// Motion inherited from the previous frame's support.
pub fn carry<S: SceneQuery + ?Sized>(scene: &S, prev: &KinematicState, up: Vec3) -> PlatformCarry {
    let Some(ground) = prev.ground else {
        return PlatformCarry::default();
    };
    if !prev.is_ground_local_contact_set {
        return PlatformCarry::default();
    }
    let Some(pose) = scene.collider_pose(ground) else {
        return PlatformCarry::default();
    };

    let translation = pose.translation.vector;
    let moved = (translation - prev.ground_position).norm_squared() > STILL_TRANSLATION_SQ;
    let turned = pose.rotation.angle_to(&prev.ground_rotation) > STILL_ROTATION_RAD;
    if !moved && !turned {
        return PlatformCarry::default();
    }

    let target = pose * Point::from(prev.ground_local_contact_point);
    let delta = pose.rotation * prev.ground_rotation.inverse();

    PlatformCarry {
        movement: target.coords - prev.position,
        rotation: twist_about(&delta, up),
        is_moving: true,
    }
}

/// Why the local contact point has to be re-recorded this frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContactRefresh {
    pub has_user_movement: bool,
    pub has_force_movement: bool,
    pub was_corrected: bool,
}

/// Record the support pose and, when needed, the actor's local contact point.
pub fn update_contact<S: SceneQuery + ?Sized>(
    scene: &S,
    state: &mut KinematicState,
    refresh: ContactRefresh,
    label: &str,
) {
    let Some(ground) = state.ground else {
        state.is_ground_local_contact_set = false;
        return;
    };
    let Some(pose) = scene.collider_pose(ground) else {
        state.is_ground_local_contact_set = false;
        return;
    };

    let rerecord = !state.is_ground_local_contact_set
        || refresh.has_user_movement
        || refresh.has_force_movement
        || refresh.was_corrected;
    if rerecord {
        let local = pose.inverse_transform_point(&Point::from(state.position));
        if !state.is_ground_local_contact_set {
            debug!("[{label}] attached to {ground:?}");
        }
        state.ground_local_contact_point = local.coords;
        state.is_ground_local_contact_set = true;
    }
    state.ground_position = pose.translation.vector;
    state.ground_rotation = pose.rotation;
}
