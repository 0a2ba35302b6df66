use crate::math::{Quat, Vec3};
use crate::requests::MotionRequests;
use crate::state::KinematicState;

/// Callbacks around one frame update, always invoked in this order:
/// `pre_update`, resolution, `pre_commit`, commit, `post_update`.
pub trait ControllerHooks {
    /// Before anything moves. `previous` is the last committed snapshot.
    fn pre_update(&mut self, _requests: &mut MotionRequests, _previous: &KinematicState, _dt: f32) {}

    /// May override the final position and rotation just before they are written.
    fn pre_commit(&mut self, _state: &KinematicState, _position: &mut Vec3, _rotation: &mut Quat) {}

    /// After the frame is committed.
    fn post_update(&mut self, _state: &KinematicState, _dt: f32) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl ControllerHooks for NoHooks {}
