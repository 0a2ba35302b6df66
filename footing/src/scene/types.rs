/*!
Data exchanged between the controller and a [`super::SceneQuery`] implementation.

This module contains no algorithms.
*/

use crate::math::Vec3;

/// Opaque handle to a world collider.
///
/// Ground references are lookups by identity; holding a `ColliderId` never
/// keeps the collider alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderId(pub u32);

/// Actor-side query geometry in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CastShape {
    Ball {
        center: Vec3,
        radius: f32,
    },
    /// Segment capsule between `a` and `b`.
    Capsule { a: Vec3, b: Vec3, radius: f32 },
}

impl CastShape {
    /// Geometric center of the shape.
    pub fn center(&self) -> Vec3 {
        match *self {
            CastShape::Ball { center, .. } => center,
            CastShape::Capsule { a, b, .. } => (a + b) * 0.5,
        }
    }

    /// The same shape moved by `offset`.
    pub fn translated(&self, offset: Vec3) -> Self {
        match *self {
            CastShape::Ball { center, radius } => CastShape::Ball {
                center: center + offset,
                radius,
            },
            CastShape::Capsule { a, b, radius } => CastShape::Capsule {
                a: a + offset,
                b: b + offset,
                radius,
            },
        }
    }

    /// World-space bounds `(mins, maxs)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        match *self {
            CastShape::Ball { center, radius } => {
                let r = Vec3::repeat(radius);
                (center - r, center + r)
            }
            CastShape::Capsule { a, b, radius } => {
                let r = Vec3::repeat(radius);
                (a.inf(&b) - r, a.sup(&b) + r)
            }
        }
    }
}

/// Nearest hit of a ray query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub collider: ColliderId,
    pub point: Vec3,
    /// Unit surface normal at `point`.
    pub normal: Vec3,
    /// Distance from the ray origin.
    pub distance: f32,
}

/// One hit of a swept-shape query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeHit {
    pub collider: ColliderId,
    /// Contact point on the swept shape at the time of impact.
    pub point: Vec3,
    /// Unit surface normal facing the swept shape.
    pub normal: Vec3,
    /// Distance travelled along the sweep before contact.
    pub distance: f32,
    /// Center of the swept shape when the sweep started.
    pub origin: Vec3,
    /// The shape already overlapped the collider when the sweep started.
    pub penetrating: bool,
}

/// Interpenetration of an actor shape with a collider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Penetration {
    pub collider: ColliderId,
    /// Unit direction that moves the actor shape out of the collider.
    pub direction: Vec3,
    pub depth: f32,
}

impl Penetration {
    /// Translation that resolves the overlap.
    #[inline]
    pub fn push_out(&self) -> Vec3 {
        self.direction * self.depth
    }
}

/// Layer mask plus explicit exclusions applied to every query.
#[derive(Clone, Copy, Debug)]
pub struct QueryFilter<'a> {
    pub layers: u32,
    pub exclude: &'a [ColliderId],
}

impl Default for QueryFilter<'_> {
    fn default() -> Self {
        Self {
            layers: u32::MAX,
            exclude: &[],
        }
    }
}

impl<'a> QueryFilter<'a> {
    pub fn new(layers: u32, exclude: &'a [ColliderId]) -> Self {
        Self { layers, exclude }
    }

    /// Whether a collider on `layer` with handle `id` passes the filter.
    #[inline]
    pub fn accepts(&self, id: ColliderId, layer: u32) -> bool {
        self.layers & layer != 0 && !self.exclude.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_honours_layers_and_exclusions() {
        let excluded = [ColliderId(3)];
        let filter = QueryFilter::new(0b0101, &excluded);
        assert!(filter.accepts(ColliderId(1), 0b0001));
        assert!(!filter.accepts(ColliderId(1), 0b0010));
        assert!(!filter.accepts(ColliderId(3), 0b0001));
    }

    #[test]
    fn capsule_bounds_cover_both_caps() {
        let shape = CastShape::Capsule {
            a: Vec3::new(0.0, 0.5, 0.0),
            b: Vec3::new(0.0, 1.5, 0.0),
            radius: 0.5,
        };
        let (mins, maxs) = shape.bounds();
        assert!((mins - Vec3::new(-0.5, 0.0, -0.5)).norm() < 1.0e-6);
        assert!((maxs - Vec3::new(0.5, 2.0, 0.5)).norm() < 1.0e-6);
        assert!((shape.center() - Vec3::new(0.0, 1.0, 0.0)).norm() < 1.0e-6);
    }
}
