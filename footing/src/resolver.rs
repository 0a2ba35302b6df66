/*!
Segmented movement resolution.

The frame's desired displacement is consumed in bounded segments. Each segment
re-probes the ground, strips movement that would push into the support, runs
the slope tester, sweeps every enabled body shape and resolves only the
nearest hit: the actor advances up to it and the rest of the segment is
deflected along the hit surface into the next segment. Resolution stops when
the remainder is negligible or after [`MAX_SEGMENTS`] segments, in which case
the leftover is dropped.
*/

use log::warn;

use crate::arena::{CollisionHit, HitArena};
use crate::body::{BodyShapes, Support};
use crate::constants::{
    COLLISION_BUFFER, FLAT_ANGLE_DEG, GROUND_EPSILON, MAX_SEGMENTS, MIN_MOVE_SQ, SLOPE_MATCH_DEG,
};
use crate::grounding::{GroundInfo, GroundProbe, GroundProber};
use crate::math::{Quat, Vec3, along, angle_deg, project_on_plane, try_normalize};
use crate::scene::{CastShape, ColliderId, QueryFilter, SceneQuery};
use crate::settings::ControllerSettings;
use crate::slope::{SlopeQuery, test_slope};
use crate::trace::Trace;

/// Hits whose normal opposes the motion by less than this are grazing contacts.
const GRAZE_DOT: f32 = -1.0e-4;

/// Push-out passes per penetrating hit.
const DEPENETRATION_PASSES: usize = 4;

#[derive(Clone, Copy, Debug)]
pub struct ResolveInput<'a> {
    /// Feet position at frame start.
    pub position: Vec3,
    /// Orientation the body shapes are swept with.
    pub rotation: Quat,
    /// Total desired displacement (user, forces, slide and platform).
    pub movement: Vec3,
    /// Platform carry already included in `movement`; the first ground probe
    /// looks where the support has moved to.
    pub platform_offset: Vec3,
    pub actor_up: Vec3,
    pub world_up: Vec3,
    /// Ground angle of the previous frame (degrees).
    pub previous_angle: f32,
    pub ignored: &'a [ColliderId],
    pub ground_override: Option<ColliderId>,
}

#[derive(Clone, Copy, Debug)]
pub struct Resolution {
    pub position: Vec3,
    /// Sum of the displacement actually applied by the segments.
    pub applied: Vec3,
    /// Movement left when the segment cap was reached.
    pub dropped: Vec3,
    /// Ground facts at the final position.
    pub ground: GroundInfo,
    /// Last resolved collision, if any.
    pub collision: Option<CollisionHit>,
    pub segments: usize,
    pub is_popping_up: bool,
}

/// Segment resolver with reusable query buffers.
#[derive(Debug, Default)]
pub struct Resolver {
    prober: GroundProber,
    arena: HitArena,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe the ground at `position` with the resolver's buffers.
    pub fn probe<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        settings: &ControllerSettings,
        ignored: &[ColliderId],
        position: Vec3,
        actor_up: Vec3,
        world_up: Vec3,
    ) -> GroundInfo {
        let filter = QueryFilter::new(settings.ground_layers, ignored);
        self.prober.probe(
            scene,
            settings,
            &filter,
            &GroundProbe {
                position,
                offset: Vec3::zeros(),
                actor_up,
                world_up,
                radius: settings.base_radius,
            },
        )
    }

    pub fn resolve<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        settings: &ControllerSettings,
        body: &BodyShapes,
        input: &ResolveInput<'_>,
        trace: &mut dyn Trace,
    ) -> Resolution {
        let up = input.actor_up;
        let ground_filter = QueryFilter::new(settings.ground_layers, input.ignored);
        let collision_filter = QueryFilter::new(settings.collision_layers, input.ignored);

        let mut position = input.position;
        let mut remaining = input.movement;
        let mut applied = Vec3::zeros();
        let mut collision = None;
        let mut is_popping_up = false;
        let mut segments = 0;

        for index in 0..MAX_SEGMENTS {
            if remaining.norm_squared() <= MIN_MOVE_SQ {
                break;
            }
            segments = index + 1;
            trace.segment(index, position, remaining);

            let offset = if index == 0 {
                input.platform_offset
            } else {
                Vec3::zeros()
            };
            let mut ground = self.prober.probe(
                scene,
                settings,
                &ground_filter,
                &GroundProbe {
                    position,
                    offset,
                    actor_up: up,
                    world_up: input.world_up,
                    radius: settings.base_radius,
                },
            );
            if let Some(id) = input.ground_override {
                ground.ground = Some(id);
            }

            if !ground.is_grounded {
                remaining = clamp_landing(&ground, remaining, up);
            } else {
                // A ray that started inside geometry has not measured the depth.
                let depth = -ground.direct_distance;
                let measured = depth < settings.ground_probe_start_offset - GROUND_EPSILON;
                if ground.is_direct
                    && measured
                    && depth > 0.0
                    && (depth > settings.max_step_height || settings.step_up_speed <= 0.0)
                {
                    position += up * depth;
                }
            }

            let walkable = ground.angle <= settings.max_slope_angle;
            let mut carry = Vec3::zeros();
            let mut step = remaining;

            if ground.is_grounded {
                // The support's own motion is followed, never stripped.
                step = strip_into_ground(&ground, step - offset, up, walkable) + offset;

                if let Some(slope) = test_slope(
                    scene,
                    settings,
                    &ground_filter,
                    &SlopeQuery {
                        position,
                        actor_up: up,
                        world_up: input.world_up,
                        movement: step,
                        current_angle: ground.angle,
                    },
                ) {
                    trace.slope(index, &slope);
                    if slope.is_blocked {
                        carry = deflect(step - slope.safe_movement, slope.normal);
                        step = slope.safe_movement;
                    }
                }

                if walkable
                    && ground.angle > FLAT_ANGLE_DEG
                    && (ground.angle - input.previous_angle).abs() < SLOPE_MATCH_DEG
                    && step.dot(&ground.normal) > 0.0
                {
                    // Follow a constant slope downhill instead of launching off it.
                    let len = step.norm();
                    if let Some(dir) = try_normalize(project_on_plane(step, ground.normal)) {
                        step = dir * len;
                    }
                }
            }

            let Some(dir) = try_normalize(step) else {
                remaining = carry;
                continue;
            };
            let len = step.norm();

            let nearest = if settings.is_collision_enabled {
                self.nearest_hit(
                    scene,
                    settings,
                    body,
                    &collision_filter,
                    &ground_filter,
                    input,
                    &ground,
                    position,
                    dir,
                    len,
                    &mut is_popping_up,
                )
            } else {
                None
            };

            let Some(hit) = nearest else {
                position += step;
                applied += step;
                remaining = carry;
                continue;
            };
            trace.hit(index, &hit);
            collision = Some(hit);

            let mut leftover = step;
            if hit.penetrating {
                if let Some(shape) = body.get(hit.shape) {
                    let world = shape.world_shape(position, &input.rotation);
                    position += depenetrate(scene, &world, hit.collider);
                }
            } else {
                let travel = (hit.distance - COLLISION_BUFFER).clamp(0.0, len);
                let moved = dir * travel;
                position += moved;
                applied += moved;
                leftover -= moved;
            }

            let mut normal = hit.normal;
            if ground.is_grounded && angle_deg(normal, input.world_up) > settings.max_slope_angle {
                normal = try_normalize(project_on_plane(normal, up)).unwrap_or(normal);
            }
            let mut deflected = deflect(leftover, normal);
            if deflected.dot(&input.movement) < 0.0 {
                deflected = along(deflected, up);
            }
            remaining = deflected + carry;
        }

        let mut dropped = Vec3::zeros();
        if remaining.norm_squared() > MIN_MOVE_SQ {
            warn!(
                "movement resolution hit the {MAX_SEGMENTS}-segment cap, dropping ({:.4}, {:.4}, {:.4})",
                remaining.x, remaining.y, remaining.z
            );
            trace.segment_cap(remaining);
            dropped = remaining;
        }

        let mut ground = self.prober.probe(
            scene,
            settings,
            &ground_filter,
            &GroundProbe {
                position,
                offset: Vec3::zeros(),
                actor_up: up,
                world_up: input.world_up,
                radius: settings.base_radius,
            },
        );
        if let Some(id) = input.ground_override {
            ground.ground = Some(id);
        }
        trace.resolved(segments, position);

        Resolution {
            position,
            applied,
            dropped,
            ground,
            collision,
            segments,
            is_popping_up,
        }
    }

    /// Sweep every enabled body shape and pick the nearest hit that blocks the move.
    #[allow(clippy::too_many_arguments)]
    fn nearest_hit<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        settings: &ControllerSettings,
        body: &BodyShapes,
        collision_filter: &QueryFilter<'_>,
        ground_filter: &QueryFilter<'_>,
        input: &ResolveInput<'_>,
        ground: &GroundInfo,
        position: Vec3,
        dir: Vec3,
        len: f32,
        is_popping_up: &mut bool,
    ) -> Option<CollisionHit> {
        let support = if !ground.is_grounded {
            Support::Air
        } else if ground.angle <= settings.max_slope_angle {
            Support::Ground
        } else {
            Support::Slope
        };

        self.arena.reset();
        for (handle, shape) in body.enabled(support) {
            let world = shape.world_shape(position, &input.rotation);
            self.arena.sweep(
                scene,
                handle,
                &world,
                dir,
                len + COLLISION_BUFFER,
                collision_filter,
                ground.ground,
            );
        }
        self.arena.sort();

        for hit in self.arena.hits() {
            if hit.normal.dot(&dir) >= GRAZE_DOT {
                continue;
            }
            if hit.is_support
                && (angle_deg(hit.normal, input.world_up) <= settings.max_slope_angle
                    || is_stepping_onto(settings, ground))
            {
                continue;
            }
            if ground.is_grounded
                && ledge_top(scene, settings, ground_filter, input, position, hit, dir).is_some()
            {
                *is_popping_up = true;
                continue;
            }
            return Some(*hit);
        }
        None
    }
}

/// Move a shape out of one collider, re-measuring after every push so a
/// corner that needs two pushes still ends clear.
fn depenetrate<S: SceneQuery + ?Sized>(scene: &S, shape: &CastShape, collider: ColliderId) -> Vec3 {
    let mut offset = Vec3::zeros();
    for _ in 0..DEPENETRATION_PASSES {
        let Some(pen) = scene.penetration(&shape.translated(offset), collider) else {
            break;
        };
        offset += pen.direction * (pen.depth + COLLISION_BUFFER);
    }
    offset
}

/// The feet have sunk into the support by no more than a step: the step
/// fixer is lifting the actor out of it.
fn is_stepping_onto(settings: &ControllerSettings, ground: &GroundInfo) -> bool {
    ground.is_direct && ground.direct_distance < 0.0 && -ground.direct_distance <= settings.max_step_height
}

/// Remove the part of `movement` pushing into `normal`.
#[inline]
fn deflect(movement: Vec3, normal: Vec3) -> Vec3 {
    let into = movement.dot(&normal);
    if into < 0.0 {
        movement - normal * into
    } else {
        movement
    }
}

/// Keep grounded movement from pushing into the support. Unwalkable ground
/// blocks like a wall so it cannot be climbed.
fn strip_into_ground(ground: &GroundInfo, movement: Vec3, up: Vec3, walkable: bool) -> Vec3 {
    if walkable {
        return deflect(movement, ground.normal);
    }
    match try_normalize(project_on_plane(ground.normal, up)) {
        Some(wall) => {
            let stripped = deflect(movement, wall);
            // Do not dig into the slope either.
            let down = stripped.dot(&up);
            if down < 0.0 { stripped - up * down } else { stripped }
        }
        None => deflect(movement, ground.normal),
    }
}

/// While airborne, do not move further down than the surface below.
fn clamp_landing(ground: &GroundInfo, movement: Vec3, up: Vec3) -> Vec3 {
    if !ground.has_surface() || ground.direct_distance < 0.0 {
        return movement;
    }
    let down = -movement.dot(&up);
    let allowed = (ground.direct_distance - COLLISION_BUFFER).max(0.0);
    if down > allowed {
        movement + up * (down - allowed)
    } else {
        movement
    }
}

/// Height of a walkable ledge top just past `hit`, when it is low enough to
/// pop up onto.
fn ledge_top<S: SceneQuery + ?Sized>(
    scene: &S,
    settings: &ControllerSettings,
    filter: &QueryFilter<'_>,
    input: &ResolveInput<'_>,
    position: Vec3,
    hit: &CollisionHit,
    dir: Vec3,
) -> Option<f32> {
    let up = input.actor_up;
    let rel = hit.point - position;
    let contact_height = rel.dot(&up);
    if contact_height > settings.max_step_height {
        return None;
    }
    // Overlaps report their deepest point, which may sit at foot level.
    if contact_height <= settings.skin_width && !hit.penetrating {
        return None;
    }

    let reach = settings.max_step_height + settings.skin_width;
    let lateral = project_on_plane(rel, up);
    let origin = position + lateral + project_on_plane(dir, up) * settings.skin_width + up * reach;
    let down = scene.cast_ray(origin, -up, reach, filter)?;
    if down.collider != hit.collider || down.distance <= 0.0 {
        return None;
    }

    let top = reach - down.distance;
    let walkable = angle_deg(down.normal, input.world_up) <= settings.max_slope_angle;
    (top > 0.0 && top <= settings.max_step_height && walkable).then_some(top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyShapeDef;
    use crate::scene::{ColliderDef, ColliderShapeDef, StaticWorld};
    use crate::trace::NoopTrace;

    fn floor() -> ColliderDef {
        ColliderDef::new(
            1,
            Vec3::zeros(),
            Quat::identity(),
            ColliderShapeDef::Plane {
                offset_along_normal: 0.0,
            },
        )
    }

    fn body() -> BodyShapes {
        BodyShapes::from_defs(&[BodyShapeDef::capsule("torso", 0.3, 1.8)]).unwrap()
    }

    fn input(position: Vec3, movement: Vec3) -> ResolveInput<'static> {
        ResolveInput {
            position,
            rotation: Quat::identity(),
            movement,
            platform_offset: Vec3::zeros(),
            actor_up: Vec3::y(),
            world_up: Vec3::y(),
            previous_angle: 0.0,
            ignored: &[],
            ground_override: None,
        }
    }

    #[test]
    fn unobstructed_move_is_applied_exactly() {
        let world = StaticWorld::build(vec![floor()]);
        let settings = ControllerSettings::default();
        let mut resolver = Resolver::new();

        let start = Vec3::new(0.0, 0.005, 0.0);
        let movement = Vec3::new(3.0, 0.0, 0.0);
        let out = resolver.resolve(
            &world,
            &settings,
            &body(),
            &input(start, movement),
            &mut NoopTrace,
        );

        assert_eq!(out.applied + out.dropped, movement);
        assert_eq!(out.position, start + movement);
        assert!(out.collision.is_none());
        assert!(out.ground.is_grounded);
    }

    #[test]
    fn wall_stops_and_slides() {
        let wall = ColliderDef::new(
            2,
            Vec3::new(2.0, 1.0, 0.0),
            Quat::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(0.5, 1.0, 5.0),
            },
        );
        let world = StaticWorld::build(vec![floor(), wall]);
        let settings = ControllerSettings::default();
        let mut resolver = Resolver::new();

        let out = resolver.resolve(
            &world,
            &settings,
            &body(),
            &input(Vec3::new(0.0, 0.005, 0.0), Vec3::new(3.0, 0.0, 1.0)),
            &mut NoopTrace,
        );

        // Wall face at x = 1.5, capsule radius 0.3.
        assert!(out.position.x <= 1.2 && out.position.x > 1.19);
        // The lateral part keeps going along the wall.
        assert!((out.position.z - 1.0).abs() < 1.0e-3);
        let hit = out.collision.unwrap();
        assert_eq!(hit.collider, ColliderId(2));
    }

    #[test]
    fn head_on_bounce_does_not_reverse() {
        let wall = ColliderDef::new(
            2,
            Vec3::new(1.0, 1.0, 0.0),
            Quat::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(0.5, 1.0, 5.0),
            },
        );
        let world = StaticWorld::build(vec![floor(), wall]);
        let settings = ControllerSettings::default();
        let mut resolver = Resolver::new();

        let out = resolver.resolve(
            &world,
            &settings,
            &body(),
            &input(Vec3::new(0.0, 0.005, 0.0), Vec3::new(2.0, 0.0, 0.0)),
            &mut NoopTrace,
        );
        assert!(out.position.x > 0.19 && out.position.x <= 0.2);
        assert!(out.segments < MAX_SEGMENTS);
        assert_eq!(out.dropped, Vec3::zeros());
    }

    #[test]
    fn falling_actor_lands_on_floor() {
        let world = StaticWorld::build(vec![floor()]);
        let settings = ControllerSettings::default();
        let mut resolver = Resolver::new();

        let out = resolver.resolve(
            &world,
            &settings,
            &body(),
            &input(Vec3::new(0.0, 0.5, 0.0), Vec3::new(0.0, -2.0, 0.0)),
            &mut NoopTrace,
        );
        assert!(out.position.y >= 0.0);
        assert!(out.position.y < settings.skin_width);
        assert!(out.ground.is_grounded);
    }

    #[test]
    fn low_ledge_is_popped_onto() {
        let step = ColliderDef::new(
            2,
            Vec3::new(1.5, 0.1, 0.0),
            Quat::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(1.0, 0.1, 5.0),
            },
        );
        let world = StaticWorld::build(vec![floor(), step]);
        let settings = ControllerSettings::default();
        let mut resolver = Resolver::new();

        let out = resolver.resolve(
            &world,
            &settings,
            &body(),
            &input(Vec3::new(0.0, 0.005, 0.0), Vec3::new(0.8, 0.0, 0.0)),
            &mut NoopTrace,
        );
        assert!(out.is_popping_up);
        assert!((out.position.x - 0.8).abs() < 1.0e-4);
        // Feet are now inside the 0.2 step, left for the step fixer.
        assert!(out.ground.is_grounded);
        assert!(out.ground.direct_distance < 0.0);
    }

    #[test]
    fn popping_up_continues_while_overlapping_the_ledge_corner() {
        let step = ColliderDef::new(
            2,
            Vec3::new(1.5, 0.1, 0.0),
            Quat::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(1.0, 0.1, 5.0),
            },
        );
        let world = StaticWorld::build(vec![floor(), step]);
        let settings = ControllerSettings::default();
        let mut resolver = Resolver::new();

        // The capsule's lower cap already overlaps the corner at x = 0.5, y = 0.2,
        // so the sweep starts penetrating and reports its deepest point near the feet.
        let start = Vec3::new(0.48, 0.005, 0.0);
        let out = resolver.resolve(
            &world,
            &settings,
            &body(),
            &input(start, Vec3::new(0.04, 0.0, 0.0)),
            &mut NoopTrace,
        );
        assert!(out.is_popping_up);
        assert!(out.collision.is_none());
        assert!((out.position - Vec3::new(0.52, 0.005, 0.0)).norm() < 1.0e-4);
        assert_eq!(out.ground.ground, Some(ColliderId(2)));
        assert!(out.ground.direct_distance < 0.0);

        // Once the feet are over the ledge, its overlap no longer blocks either.
        let out = resolver.resolve(
            &world,
            &settings,
            &body(),
            &input(out.position, Vec3::new(0.04, 0.0, 0.0)),
            &mut NoopTrace,
        );
        assert!(out.collision.is_none());
        assert!((out.position.x - 0.56).abs() < 1.0e-4);
    }

    #[test]
    fn penetrating_wall_is_left_clear() {
        let wall = ColliderDef::new(
            2,
            Vec3::new(1.0, 1.0, 0.0),
            Quat::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(0.5, 1.0, 5.0),
            },
        );
        let world = StaticWorld::build(vec![floor(), wall]);
        let settings = ControllerSettings::default();
        let mut resolver = Resolver::new();

        // Wall face at x = 0.5; the capsule starts 0.1 inside it.
        let out = resolver.resolve(
            &world,
            &settings,
            &body(),
            &input(Vec3::new(0.3, 0.005, 0.0), Vec3::new(0.05, 0.0, 0.0)),
            &mut NoopTrace,
        );
        assert_eq!(out.collision.map(|h| h.collider), Some(ColliderId(2)));
        assert!(out.position.x <= 0.2 && out.position.x > 0.19, "at {:?}", out.position);
        assert!((out.position.y - 0.005).abs() < 1.0e-4);
    }

    #[test]
    fn disabled_collision_passes_through() {
        // Beam above ankle height, so only the body shapes could meet it.
        let beam = ColliderDef::new(
            2,
            Vec3::new(1.0, 1.25, 0.0),
            Quat::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(0.1, 0.75, 5.0),
            },
        );
        let world = StaticWorld::build(vec![floor(), beam]);
        let settings = ControllerSettings {
            is_collision_enabled: false,
            ..Default::default()
        };
        let mut resolver = Resolver::new();
        let out = resolver.resolve(
            &world,
            &settings,
            &body(),
            &input(Vec3::new(0.0, 0.005, 0.0), Vec3::new(2.0, 0.0, 0.0)),
            &mut NoopTrace,
        );
        assert!((out.position.x - 2.0).abs() < 1.0e-5);
    }
}
