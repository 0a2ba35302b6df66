/*!
Step and penetration correction after movement resolution.

- Step-down keeps the actor glued to ground just below it after walking off a
  small ledge, easing down instead of falling.
- Step-up eases the actor out of ground it has sunk into (a ledge it popped
  onto, or a platform that rose), never more than one step height per nudge.
- Force-to-ground removes tiny hover gaps.

Nudge speeds scale from a tenth of the configured speed for tiny corrections
to the full speed for corrections of a whole step height.
*/

use log::debug;

use crate::constants::{COLLISION_BUFFER, FLAT_ANGLE_DEG, STEP_SPEED_MIN_FACTOR};
use crate::grounding::GroundInfo;
use crate::math::{Vec3, project_on_plane};
use crate::settings::ControllerSettings;

/// Lateral speeds above this multiple of the step-up speed skip easing.
const FAST_STEP_FACTOR: f32 = 3.0;

/// Facts the fixer needs beyond the resolved ground.
#[derive(Clone, Copy, Debug)]
pub struct StepContext {
    pub actor_up: Vec3,
    /// Movement of this frame (used for the speed and downhill guards).
    pub movement: Vec3,
    pub dt: f32,
    pub was_grounded: bool,
    pub was_stepping_down: bool,
    /// Support moved this frame.
    pub on_moving_platform: bool,
    /// Accumulated velocity points away from the ground (jumping).
    pub is_rising: bool,
}

/// One correction chosen by [`plan`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepAction {
    None,
    /// Move down by this distance and keep stepping down next frame if still airborne.
    StepDown(f32),
    /// Move up by this distance; `settled` when the penetration is fully resolved.
    StepUp { nudge: f32, settled: bool },
    /// Snap down onto the ground by this distance.
    ForceGround(f32),
}

impl StepAction {
    /// Displacement along actor up.
    pub fn offset(&self) -> f32 {
        match *self {
            StepAction::None => 0.0,
            StepAction::StepDown(d) | StepAction::ForceGround(d) => -d,
            StepAction::StepUp { nudge, .. } => nudge,
        }
    }
}

/// Speed multiplier in `[0.1, 1]` for a correction of `distance`.
#[inline]
pub fn speed_factor(distance: f32, max_step_height: f32) -> f32 {
    let t = if max_step_height > 0.0 {
        (distance / max_step_height).clamp(0.0, 1.0)
    } else {
        1.0
    };
    STEP_SPEED_MIN_FACTOR + (1.0 - STEP_SPEED_MIN_FACTOR) * t
}

/// Choose this frame's correction from the resolved ground.
pub fn plan(settings: &ControllerSettings, ground: &GroundInfo, ctx: &StepContext) -> StepAction {
    let max_step = settings.max_step_height;

    if ground.is_grounded && ground.is_direct && ground.direct_distance < 0.0 {
        let depth = -ground.direct_distance;
        let lateral_speed = if ctx.dt > 0.0 {
            project_on_plane(ctx.movement, ctx.actor_up).norm() / ctx.dt
        } else {
            0.0
        };
        let is_fast = lateral_speed > settings.step_up_speed * FAST_STEP_FACTOR;
        let is_downhill = ground.angle > FLAT_ANGLE_DEG && ctx.movement.dot(&ground.normal) > 0.0;

        if depth > max_step || is_fast || ctx.on_moving_platform || is_downhill {
            return StepAction::StepUp {
                nudge: depth,
                settled: true,
            };
        }

        let speed = settings.step_up_speed * speed_factor(depth, max_step);
        let nudge = (speed * ctx.dt).min(depth).min(max_step);
        return StepAction::StepUp {
            nudge,
            settled: depth - nudge <= settings.skin_width,
        };
    }

    if ground.is_grounded || ctx.is_rising || !ground.has_surface() {
        return StepAction::None;
    }

    let gap = ground.direct_distance;
    let can_step_down = ctx.was_stepping_down || ctx.was_grounded;
    if can_step_down && gap > 0.0 && gap <= max_step {
        let speed = settings.step_down_speed * speed_factor(gap, max_step);
        return StepAction::StepDown((speed * ctx.dt).min(gap - COLLISION_BUFFER).max(0.0));
    }

    if settings.is_force_grounding_enabled
        && !ctx.was_stepping_down
        && gap > 0.0
        && gap < settings.force_grounding_distance
    {
        return StepAction::ForceGround((gap - COLLISION_BUFFER).max(0.0));
    }

    StepAction::None
}

/// Log transitions between step phases.
pub fn log_transition(label: &str, was_up: bool, is_up: bool, was_down: bool, is_down: bool) {
    if is_up && !was_up {
        debug!("[{label}] step-up begin");
    } else if was_up && !is_up {
        debug!("[{label}] step-up end");
    }
    if is_down && !was_down {
        debug!("[{label}] step-down begin");
    } else if was_down && !is_down {
        debug!("[{label}] step-down end");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ColliderId;

    fn ground(is_grounded: bool, direct_distance: f32) -> GroundInfo {
        GroundInfo {
            is_grounded,
            ground: is_grounded.then_some(ColliderId(1)),
            is_direct: is_grounded,
            distance: direct_distance,
            point: Vec3::zeros(),
            normal: Vec3::y(),
            angle: 0.0,
            direct_ground: Some(ColliderId(1)),
            direct_distance,
            direct_point: Vec3::zeros(),
            direct_normal: Vec3::y(),
            direct_angle: 0.0,
        }
    }

    fn ctx() -> StepContext {
        StepContext {
            actor_up: Vec3::y(),
            movement: Vec3::new(0.02, 0.0, 0.0),
            dt: 0.02,
            was_grounded: true,
            was_stepping_down: false,
            on_moving_platform: false,
            is_rising: false,
        }
    }

    #[test]
    fn speed_factor_ramps_from_a_tenth() {
        assert!((speed_factor(0.0, 0.3) - 0.1).abs() < 1.0e-6);
        assert!((speed_factor(0.15, 0.3) - 0.55).abs() < 1.0e-6);
        assert!((speed_factor(1.0, 0.3) - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn step_up_nudge_is_bounded() {
        let settings = ControllerSettings {
            step_up_speed: 100.0,
            ..Default::default()
        };
        let action = plan(&settings, &ground(true, -0.25), &ctx());
        match action {
            StepAction::StepUp { nudge, settled } => {
                assert!(nudge <= settings.max_step_height);
                assert!((nudge - 0.25).abs() < 1.0e-6);
                assert!(settled);
            }
            other => panic!("unexpected {other:?}"),
        }

        let settings = ControllerSettings::default();
        let action = plan(&settings, &ground(true, -0.2), &ctx());
        // 1.5 m/s * (0.1 + 0.9 * 2/3) * 0.02 s
        let expected = 1.5 * 0.7 * 0.02;
        assert!((action.offset() - expected).abs() < 1.0e-5);
    }

    #[test]
    fn moving_platform_pushes_out_at_once() {
        let settings = ControllerSettings::default();
        let mut c = ctx();
        c.on_moving_platform = true;
        let action = plan(&settings, &ground(true, -0.1), &c);
        assert_eq!(
            action,
            StepAction::StepUp {
                nudge: 0.1,
                settled: true
            }
        );
    }

    #[test]
    fn small_drop_steps_down_and_big_drop_falls() {
        let settings = ControllerSettings::default();
        let action = plan(&settings, &ground(false, 0.2), &ctx());
        assert!(matches!(action, StepAction::StepDown(d) if d > 0.0 && d <= 0.2));

        let action = plan(&settings, &ground(false, 0.5), &ctx());
        assert_eq!(action, StepAction::None);
    }

    #[test]
    fn hover_is_forced_down_unless_rising() {
        let settings = ControllerSettings::default();
        let mut c = ctx();
        c.was_grounded = false;
        let action = plan(&settings, &ground(false, 0.05), &c);
        assert!(matches!(action, StepAction::ForceGround(d) if (d - 0.049).abs() < 1.0e-6));

        c.is_rising = true;
        assert_eq!(plan(&settings, &ground(false, 0.05), &c), StepAction::None);
    }
}
