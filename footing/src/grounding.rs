/*!
Ground support detection.

A probe first casts one ray straight down (along actor down) from a point
raised above the feet. A hit within skin width of the feet grounds the actor
directly. Otherwise the prober falls back to an overlap query around the feet
and looks at the closest point ("orbit point") of every nearby collider:

- a single orbit point grounds the actor only when it is almost under the
  feet; further out the actor is hanging off an edge and should slide off
- two or more orbit points ground the actor when they are spread around it
  (straddling a gap or a crease), in which case the nearest one is re-cast
  for an authoritative normal

Pure ray casting misses supports at corners, and pure overlap testing grounds
actors that only have support on one side. Using both avoids either failure.
*/

use crate::constants::{
    EDGE_SUPPORT_SPREAD_DEG, GROUND_EPSILON, NO_GROUND_DISTANCE, SINGLE_SUPPORT_RADIUS_FACTOR,
};
use crate::math::{Vec3, angle_deg, try_normalize};
use crate::scene::{ColliderId, QueryFilter, SceneQuery};
use crate::settings::ControllerSettings;
use crate::state::KinematicState;

/// Where and how to probe.
#[derive(Clone, Copy, Debug)]
pub struct GroundProbe {
    /// Actor feet.
    pub position: Vec3,
    /// Extra displacement applied before probing (e.g. pending platform carry).
    pub offset: Vec3,
    pub actor_up: Vec3,
    /// Surface angles are measured against this.
    pub world_up: Vec3,
    /// Radius of the fallback overlap probe.
    pub radius: f32,
}

/// Outcome of one probe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundInfo {
    pub is_grounded: bool,
    /// Collider providing the effective surface.
    pub ground: Option<ColliderId>,
    pub is_direct: bool,

    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub angle: f32,

    /// Collider hit by the straight-down ray, grounded or not.
    pub direct_ground: Option<ColliderId>,
    /// Feet-to-surface distance along actor down. Negative when the surface is above the feet.
    pub direct_distance: f32,
    pub direct_point: Vec3,
    pub direct_normal: Vec3,
    pub direct_angle: f32,
}

impl GroundInfo {
    fn none(up: Vec3) -> Self {
        Self {
            is_grounded: false,
            ground: None,
            is_direct: false,
            distance: NO_GROUND_DISTANCE,
            point: Vec3::zeros(),
            normal: up,
            angle: 0.0,
            direct_ground: None,
            direct_distance: NO_GROUND_DISTANCE,
            direct_point: Vec3::zeros(),
            direct_normal: up,
            direct_angle: 0.0,
        }
    }

    /// Whether any surface was found below the actor within probe range.
    pub fn has_surface(&self) -> bool {
        self.direct_ground.is_some()
    }

    /// Write the surface facts into a kinematic snapshot.
    ///
    /// The support reference is replaced only when grounded. Ground normals are
    /// kept from the previous frame while airborne so orientation can hold.
    pub fn write_to(&self, state: &mut KinematicState) {
        state.is_grounded = self.is_grounded;
        state.is_ground_surface_direct = self.is_direct;
        state.ground_surface_direct_distance = self.direct_distance;
        state.ground_surface_direct_point = self.direct_point;
        state.ground_surface_direct_normal = self.direct_normal;

        if self.is_grounded {
            if state.ground != self.ground {
                state.is_ground_local_contact_set = false;
            }
            state.ground = self.ground;
            state.ground_surface_distance = self.distance;
            state.ground_surface_point = self.point;
            state.ground_surface_normal = self.normal;
            state.ground_surface_angle = self.angle;
        } else {
            state.ground = None;
            state.is_ground_local_contact_set = false;
            state.ground_surface_distance = self.direct_distance;
            state.ground_surface_point = self.direct_point;
            state.ground_surface_angle = self.direct_angle;
            if self.has_surface() {
                state.ground_surface_normal = self.direct_normal;
            }
        }
    }
}

/// Candidate support found by the fallback overlap.
#[derive(Clone, Copy, Debug)]
struct OrbitPoint {
    collider: ColliderId,
    point: Vec3,
    /// Offset from the feet projected onto the plane of actor up.
    lateral: Vec3,
    /// Height of the point above the feet.
    vertical: f32,
}

/// Grounding prober with reusable scratch buffers.
#[derive(Debug, Default)]
pub struct GroundProber {
    overlaps: Vec<ColliderId>,
    orbit: Vec<OrbitPoint>,
}

impl GroundProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        settings: &ControllerSettings,
        filter: &QueryFilter<'_>,
        probe: &GroundProbe,
    ) -> GroundInfo {
        let up = probe.actor_up;
        let feet = probe.position + probe.offset;
        let mut info = GroundInfo::none(up);

        let start = settings.ground_probe_start_offset;
        let origin = feet + up * start;
        if let Some(hit) = scene.cast_ray(
            origin,
            -up,
            start + settings.grounding_distance,
            filter,
        ) {
            info.direct_ground = Some(hit.collider);
            info.direct_distance = hit.distance - start;
            info.direct_point = hit.point;
            info.direct_normal = hit.normal;
            info.direct_angle = angle_deg(hit.normal, probe.world_up);

            if info.direct_distance <= settings.skin_width + GROUND_EPSILON {
                info.is_grounded = true;
                info.is_direct = true;
                info.ground = Some(hit.collider);
                info.distance = info.direct_distance;
                info.point = hit.point;
                info.normal = hit.normal;
                info.angle = info.direct_angle;
                return info;
            }
        }

        if let Some(support) = self.edge_support(scene, settings, filter, probe, feet) {
            info.is_grounded = true;
            info.is_direct = false;
            info.ground = Some(support.collider);
            info.distance = -support.vertical;
            info.point = support.point;

            // A re-cast that clips the vertical face under an edge does not
            // describe the support; use the edge's contact direction instead.
            let center = feet + up * probe.radius;
            info.normal = recast_normal(scene, filter, center, support.point)
                .filter(|n| angle_deg(*n, probe.world_up) <= settings.max_slope_angle)
                .or_else(|| try_normalize(center - support.point))
                .unwrap_or(up);
            info.angle = angle_deg(info.normal, probe.world_up);
        }

        info
    }

    /// Fallback: look for supports spread around the feet.
    fn edge_support<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        settings: &ControllerSettings,
        filter: &QueryFilter<'_>,
        probe: &GroundProbe,
        feet: Vec3,
    ) -> Option<OrbitPoint> {
        let up = probe.actor_up;
        let r = probe.radius;
        let center = feet + up * r;

        self.overlaps.clear();
        scene.overlap_sphere(center, r * std::f32::consts::SQRT_2, filter, &mut self.overlaps);

        self.orbit.clear();
        for &collider in &self.overlaps {
            let Some(point) = scene.closest_point(collider, center) else {
                continue;
            };
            let rel = point - feet;
            let vertical = rel.dot(&up);
            if vertical < -settings.skin_width || vertical > r {
                continue;
            }
            self.orbit.push(OrbitPoint {
                collider,
                point,
                lateral: rel - up * vertical,
                vertical,
            });
        }

        let close_enough = r * SINGLE_SUPPORT_RADIUS_FACTOR;
        match self.orbit.len() {
            0 => None,
            1 => {
                let only = self.orbit[0];
                (only.lateral.norm() <= close_enough).then_some(only)
            }
            _ => {
                let spread = self.orbit.iter().any(|p| p.lateral.norm() <= close_enough)
                    || self.orbit.iter().enumerate().any(|(i, a)| {
                        self.orbit[i + 1..]
                            .iter()
                            .any(|b| angle_deg(a.lateral, b.lateral) > EDGE_SUPPORT_SPREAD_DEG)
                    });
                if !spread {
                    return None;
                }
                self.orbit
                    .iter()
                    .copied()
                    .min_by(|a, b| {
                        let da = (a.point - feet).norm_squared();
                        let db = (b.point - feet).norm_squared();
                        da.total_cmp(&db)
                    })
            }
        }
    }
}

/// Cast from `from` toward `point` to read the surface normal there.
fn recast_normal<S: SceneQuery + ?Sized>(
    scene: &S,
    filter: &QueryFilter<'_>,
    from: Vec3,
    point: Vec3,
) -> Option<Vec3> {
    let delta = point - from;
    let dir = try_normalize(delta)?;
    let reach = delta.norm() + 0.05;
    scene.cast_ray(from, dir, reach, filter).map(|hit| hit.normal)
}
