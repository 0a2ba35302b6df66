//! Parry-backed query world for controller scenes.
//!
//! Design goals
//! - Deterministic: given the same inputs (sorted by `id`), build identical collider sets
//!   and answer queries in the same order.
//! - Query-focused: ray casts, swept shape casts, overlaps, closest points and penetration.
//!   No dynamics are simulated here.
//! - Re-posable: colliders can be moved between frames with [`StaticWorld::set_pose`],
//!   which is how moving and rotating platforms are modelled.

use rapier3d::parry::{
    bounding_volume::{Aabb, BoundingVolume},
    shape::SharedShape,
};

use super::{
    SceneQuery, narrow_phase,
    types::{CastShape, ColliderId, Penetration, QueryFilter, RayHit, ShapeHit},
};
use crate::math::{Iso, Point, Quat, Vec3, iso};

/// Canonical, schema-agnostic definition of a world collider.
///
/// Conventions
/// - Units are meters.
/// - Rotation is a unit quaternion.
/// - Planes take their normal from the pose (`rotation * +Y`) and sit
///   `offset_along_normal` away from the translation along that normal.
#[derive(Clone, Debug)]
pub struct ColliderDef {
    /// Stable unique identifier used to ensure deterministic insertion order.
    pub id: u32,
    pub translation: Vec3,
    pub rotation: Quat,
    pub shape: ColliderShapeDef,
    /// Layer bits tested against query masks.
    pub layer: u32,
}

impl ColliderDef {
    pub fn new(id: u32, translation: Vec3, rotation: Quat, shape: ColliderShapeDef) -> Self {
        Self {
            id,
            translation,
            rotation,
            shape,
            layer: 1,
        }
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }
}

/// Supported world collider shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColliderShapeDef {
    /// Infinite plane (half-space).
    Plane {
        /// Offset along the plane normal (meters).
        offset_along_normal: f32,
    },

    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vec3 },

    /// Sphere/ball (meters).
    Sphere { radius: f32 },

    /// Y-aligned capsule (meters).
    CapsuleY { radius: f32, half_height: f32 },
}

struct WorldCollider {
    id: ColliderId,
    layer: u32,
    pose: Iso,
    shape: SharedShape,
    /// `None` for infinite shapes, which are always tested.
    aabb: Option<Aabb>,
}

impl WorldCollider {
    fn refresh_aabb(&mut self, infinite: bool) {
        self.aabb = if infinite {
            None
        } else {
            Some(self.shape.compute_aabb(&self.pose))
        };
    }
}

/// Query world over a fixed set of colliders whose poses may change.
pub struct StaticWorld {
    colliders: Vec<WorldCollider>,
}

impl StaticWorld {
    /// Build a query world from collider definitions.
    ///
    /// Determinism
    /// - The input is sorted by `id` before insertion.
    /// - Any NaN/invalid values should be filtered/validated by the caller.
    pub fn build(mut defs: Vec<ColliderDef>) -> Self {
        defs.sort_by_key(|d| d.id);

        let colliders = defs
            .into_iter()
            .map(|def| {
                let (shape, pose, infinite) = shape_from_def(&def);
                let mut collider = WorldCollider {
                    id: ColliderId(def.id),
                    layer: def.layer,
                    pose,
                    shape,
                    aabb: None,
                };
                collider.refresh_aabb(infinite);
                collider
            })
            .collect();

        Self { colliders }
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Move a collider. Returns `false` if `id` is unknown.
    pub fn set_pose(&mut self, id: ColliderId, translation: Vec3, rotation: Quat) -> bool {
        let Some(collider) = self.find_mut(id) else {
            return false;
        };
        let infinite = collider.aabb.is_none();
        collider.pose = iso(translation, rotation);
        collider.refresh_aabb(infinite);
        true
    }

    fn find(&self, id: ColliderId) -> Option<&WorldCollider> {
        self.colliders
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|idx| &self.colliders[idx])
    }

    fn find_mut(&mut self, id: ColliderId) -> Option<&mut WorldCollider> {
        self.colliders
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(move |idx| &mut self.colliders[idx])
    }

    /// Colliders passing the filter whose bounds touch `[mins, maxs]`.
    fn candidates<'a>(
        &'a self,
        mins: Vec3,
        maxs: Vec3,
        filter: &'a QueryFilter<'a>,
    ) -> impl Iterator<Item = &'a WorldCollider> + 'a {
        let query = Aabb::new(Point::from(mins), Point::from(maxs));
        self.colliders.iter().filter(move |c| {
            filter.accepts(c.id, c.layer) && c.aabb.as_ref().is_none_or(|a| a.intersects(&query))
        })
    }
}

/// Build the parry shape and pose for a definition. The flag marks infinite shapes.
fn shape_from_def(def: &ColliderDef) -> (SharedShape, Iso, bool) {
    match def.shape {
        ColliderShapeDef::Plane {
            offset_along_normal,
        } => {
            // Half-space with local normal +Y; the pose carries the orientation,
            // so re-posing a plane tilts or lifts it naturally.
            let normal = def.rotation * Vec3::y();
            let pose = iso(def.translation + normal * offset_along_normal, def.rotation);
            (SharedShape::halfspace(Vec3::y_axis()), pose, true)
        }
        ColliderShapeDef::Cuboid { half_extents } => (
            SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
            iso(def.translation, def.rotation),
            false,
        ),
        ColliderShapeDef::Sphere { radius } => (
            SharedShape::ball(radius),
            iso(def.translation, def.rotation),
            false,
        ),
        ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        } => (
            SharedShape::capsule_y(half_height, radius),
            iso(def.translation, def.rotation),
            false,
        ),
    }
}

impl SceneQuery for StaticWorld {
    fn cast_ray(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_distance: f32,
        filter: &QueryFilter<'_>,
    ) -> Option<RayHit> {
        if max_distance <= 0.0 {
            return None;
        }
        let end = origin + dir * max_distance;
        let mut best: Option<RayHit> = None;
        for c in self.candidates(origin.inf(&end), origin.sup(&end), filter) {
            if let Some(hit) =
                narrow_phase::cast_ray(c.id, &c.pose, &*c.shape, origin, dir, max_distance)
            {
                if best.is_none_or(|b| hit.distance < b.distance) {
                    best = Some(hit);
                }
            }
        }
        best
    }

    fn overlap_shape(&self, shape: &CastShape, filter: &QueryFilter<'_>, out: &mut Vec<ColliderId>) {
        let (mins, maxs) = shape.bounds();
        out.extend(
            self.candidates(mins, maxs, filter)
                .filter(|c| narrow_phase::intersects(&c.pose, &*c.shape, shape))
                .map(|c| c.id),
        );
    }

    fn cast_shape_all(
        &self,
        shape: &CastShape,
        dir: Vec3,
        max_distance: f32,
        filter: &QueryFilter<'_>,
        out: &mut Vec<ShapeHit>,
    ) {
        if max_distance <= 0.0 {
            return;
        }
        let (mins, maxs) = shape.bounds();
        let travel = dir * max_distance;
        let swept_mins = mins.inf(&(mins + travel));
        let swept_maxs = maxs.sup(&(maxs + travel));
        out.extend(
            self.candidates(swept_mins, swept_maxs, filter)
                .filter_map(|c| {
                    narrow_phase::cast_shape(c.id, &c.pose, &*c.shape, shape, dir, max_distance)
                }),
        );
    }

    fn closest_point(&self, collider: ColliderId, point: Vec3) -> Option<Vec3> {
        let c = self.find(collider)?;
        Some(narrow_phase::closest_point(&c.pose, &*c.shape, point))
    }

    fn penetration(&self, shape: &CastShape, collider: ColliderId) -> Option<Penetration> {
        let c = self.find(collider)?;
        narrow_phase::penetration(c.id, &c.pose, &*c.shape, shape)
    }

    fn collider_pose(&self, collider: ColliderId) -> Option<Iso> {
        self.find(collider).map(|c| c.pose)
    }
}
