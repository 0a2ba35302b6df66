/*!
Scene-query capability consumed by the controller.

The controller never owns world geometry. Everything it needs from the
physics/geometry side is expressed by [`SceneQuery`]:

- types:        query inputs/outputs (handles, hits, filters, cast shapes)
- narrow_phase: thin wrappers over parry3d queries for one collider
- world:        `StaticWorld`, a deterministic parry-backed implementation with
                re-posable colliders (moving platforms) and AABB pruning
*/

pub mod narrow_phase;
pub mod types;
pub mod world;

pub use types::{CastShape, ColliderId, Penetration, QueryFilter, RayHit, ShapeHit};
pub use world::{ColliderDef, ColliderShapeDef, StaticWorld};

use crate::math::{Iso, Vec3};

/// Geometry queries the controller relies on.
///
/// Directions passed in are unit length; returned distances are measured along
/// them. Results of `*_all`/`overlap_*` queries are pushed into caller-owned
/// buffers in no particular order.
pub trait SceneQuery {
    /// Nearest hit along a ray.
    fn cast_ray(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_distance: f32,
        filter: &QueryFilter<'_>,
    ) -> Option<RayHit>;

    /// Every collider overlapping `shape`.
    fn overlap_shape(&self, shape: &CastShape, filter: &QueryFilter<'_>, out: &mut Vec<ColliderId>);

    /// Every collider hit when sweeping `shape` along `dir` up to `max_distance`.
    fn cast_shape_all(
        &self,
        shape: &CastShape,
        dir: Vec3,
        max_distance: f32,
        filter: &QueryFilter<'_>,
        out: &mut Vec<ShapeHit>,
    );

    /// Closest point on a collider's surface (or `point` itself if inside).
    fn closest_point(&self, collider: ColliderId, point: Vec3) -> Option<Vec3>;

    /// Penetration of `shape` into a collider, if they interpenetrate.
    fn penetration(&self, shape: &CastShape, collider: ColliderId) -> Option<Penetration>;

    /// Current world pose of a collider.
    fn collider_pose(&self, collider: ColliderId) -> Option<Iso>;

    /// Convenience: colliders overlapping a sphere.
    fn overlap_sphere(
        &self,
        center: Vec3,
        radius: f32,
        filter: &QueryFilter<'_>,
        out: &mut Vec<ColliderId>,
    ) {
        self.overlap_shape(&CastShape::Ball { center, radius }, filter, out);
    }
}
