//! Per-segment collision hit arena.
//!
//! Hits live only for one resolution segment. The arena keeps its buffers
//! between segments and is cleared by length reset, so steady-state resolution
//! does not allocate.

use crate::body::BodyShapeHandle;
use crate::constants::HIT_ARENA_CAPACITY;
use crate::math::Vec3;
use crate::scene::{CastShape, ColliderId, QueryFilter, SceneQuery, ShapeHit};

/// One candidate collision of a body shape during a segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionHit {
    /// Body shape that was swept.
    pub shape: BodyShapeHandle,
    pub collider: ColliderId,
    pub point: Vec3,
    /// Surface normal facing the actor.
    pub normal: Vec3,
    /// Center of the swept body shape at segment start.
    pub origin: Vec3,
    pub distance: f32,
    pub penetrating: bool,
    /// The collider is the actor's current support.
    pub is_support: bool,
}

#[derive(Debug)]
pub struct HitArena {
    hits: Vec<CollisionHit>,
    raw: Vec<ShapeHit>,
}

impl Default for HitArena {
    fn default() -> Self {
        Self {
            hits: Vec::with_capacity(HIT_ARENA_CAPACITY),
            raw: Vec::with_capacity(HIT_ARENA_CAPACITY),
        }
    }
}

impl HitArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every hit of the previous segment.
    #[inline]
    pub fn reset(&mut self) {
        self.hits.clear();
        self.raw.clear();
    }

    pub fn push(&mut self, hit: CollisionHit) {
        self.hits.push(hit);
    }

    /// Sweep one body shape and record its hits.
    #[allow(clippy::too_many_arguments)]
    pub fn sweep<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        handle: BodyShapeHandle,
        shape: &CastShape,
        dir: Vec3,
        max_distance: f32,
        filter: &QueryFilter<'_>,
        support: Option<ColliderId>,
    ) {
        self.raw.clear();
        scene.cast_shape_all(shape, dir, max_distance, filter, &mut self.raw);
        for raw in &self.raw {
            self.hits.push(CollisionHit {
                shape: handle,
                collider: raw.collider,
                point: raw.point,
                normal: raw.normal,
                origin: raw.origin,
                distance: raw.distance,
                penetrating: raw.penetrating,
                is_support: support == Some(raw.collider),
            });
        }
    }

    /// Order hits nearest first. Ties prefer penetrating hits, then lower
    /// collider and shape handles, so results do not depend on query order.
    pub fn sort(&mut self) {
        self.hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| b.penetrating.cmp(&a.penetrating))
                .then_with(|| a.collider.cmp(&b.collider))
                .then_with(|| a.shape.0.cmp(&b.shape.0))
        });
    }

    pub fn hits(&self) -> &[CollisionHit] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
