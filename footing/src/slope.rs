/*!
Forward slope testing.

Before a grounded actor moves, a ray is cast along the lateral movement at
ankle height. If it runs into a surface that is tilted relative to the actor,
a bisection between the feet and that hit finds where the current surface
ends. Movement up to that boundary is always safe; past it the actor is on the
new slope, which is either walkable or treated as a wall.
*/

use log::warn;

use crate::constants::{FLAT_ANGLE_DEG, MAX_SLOPE_BISECTIONS, SLOPE_MATCH_DEG, SLOPE_PROBE_HEIGHT};
use crate::math::{Vec3, angle_deg, project_on_plane, try_normalize};
use crate::scene::{ColliderId, QueryFilter, SceneQuery};
use crate::settings::ControllerSettings;

/// A slope change found ahead of the actor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlopeHit {
    pub collider: ColliderId,
    /// Angle of the slope ahead against world up (degrees).
    pub angle: f32,
    /// Steeper than the walkable maximum.
    pub is_blocked: bool,
    /// Part of the movement that stays on the current surface (or the whole
    /// movement when the slope ahead is walkable).
    pub safe_movement: Vec3,
    /// Surface normal of the slope; horizontal when blocked.
    pub normal: Vec3,
}

#[derive(Clone, Copy, Debug)]
pub struct SlopeQuery {
    pub position: Vec3,
    pub actor_up: Vec3,
    pub world_up: Vec3,
    pub movement: Vec3,
    /// Angle of the surface currently under the actor.
    pub current_angle: f32,
}

/// Test whether `query.movement` crosses onto a different slope.
///
/// Returns `None` when nothing tilted lies ahead within reach.
pub fn test_slope<S: SceneQuery + ?Sized>(
    scene: &S,
    settings: &ControllerSettings,
    filter: &QueryFilter<'_>,
    query: &SlopeQuery,
) -> Option<SlopeHit> {
    let up = query.actor_up;
    let lateral = project_on_plane(query.movement, up);
    let dir = try_normalize(lateral)?;
    let len = lateral.norm();

    let origin = query.position + up * SLOPE_PROBE_HEIGHT;
    let hit = scene.cast_ray(origin, dir, len + settings.skin_width, filter)?;

    if angle_deg(hit.normal, up) <= FLAT_ANGLE_DEG {
        return None;
    }

    let angle = angle_deg(hit.normal, query.world_up);
    let is_blocked = angle > settings.max_slope_angle;

    if !is_blocked {
        return Some(SlopeHit {
            collider: hit.collider,
            angle,
            is_blocked,
            safe_movement: query.movement,
            normal: hit.normal,
        });
    }

    if is_low_step(scene, settings, filter, query, hit.point, dir) {
        return None;
    }

    let safe = squeeze(scene, settings, filter, query, origin, dir, hit.distance);
    let fraction = (safe / len).clamp(0.0, 1.0);
    let normal = try_normalize(project_on_plane(hit.normal, up)).unwrap_or(-dir);

    Some(SlopeHit {
        collider: hit.collider,
        angle,
        is_blocked,
        safe_movement: query.movement * fraction,
        normal,
    })
}

/// A steep face with a walkable top no higher than a step is a ledge to step
/// onto, not a slope.
fn is_low_step<S: SceneQuery + ?Sized>(
    scene: &S,
    settings: &ControllerSettings,
    filter: &QueryFilter<'_>,
    query: &SlopeQuery,
    face_point: Vec3,
    dir: Vec3,
) -> bool {
    let up = query.actor_up;
    let reach = settings.max_step_height + settings.skin_width;
    let origin = face_point + dir * settings.skin_width + up * (reach - SLOPE_PROBE_HEIGHT);
    let Some(down) = scene.cast_ray(origin, -up, reach, filter) else {
        return false;
    };
    if down.distance <= 0.0 {
        return false;
    }
    let top = reach - down.distance;
    top > 0.0
        && top <= settings.max_step_height
        && angle_deg(down.normal, query.world_up) <= settings.max_slope_angle
}

/// Bisect `[0, far]` along `dir` for the last distance still on the current surface.
fn squeeze<S: SceneQuery + ?Sized>(
    scene: &S,
    settings: &ControllerSettings,
    filter: &QueryFilter<'_>,
    query: &SlopeQuery,
    origin: Vec3,
    dir: Vec3,
    far: f32,
) -> f32 {
    let up = query.actor_up;
    let drop = SLOPE_PROBE_HEIGHT * 2.0 + settings.skin_width + settings.max_step_height;

    let mut lo = 0.0;
    let mut hi = far;
    let mut iterations = 0;
    while hi - lo > settings.slope_step_size {
        if iterations == MAX_SLOPE_BISECTIONS {
            warn!(
                "slope bisection stopped after {MAX_SLOPE_BISECTIONS} iterations (bracket {:.4})",
                hi - lo
            );
            break;
        }
        iterations += 1;

        let mid = (lo + hi) * 0.5;
        let probe = origin + dir * mid + up * SLOPE_PROBE_HEIGHT;
        let on_current = match scene.cast_ray(probe, -up, drop, filter) {
            Some(down) => {
                (angle_deg(down.normal, query.world_up) - query.current_angle).abs()
                    < SLOPE_MATCH_DEG
            }
            // Nothing below: still short of the slope face.
            None => true,
        };
        if on_current {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}
