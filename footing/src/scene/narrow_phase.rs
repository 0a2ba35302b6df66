use rapier3d::parry::{
    query::{self, Ray, ShapeCastOptions},
    shape as pshape,
};

use super::types::{CastShape, ColliderId, Penetration, RayHit, ShapeHit};
use crate::math::{Iso, Point, Quat, Vec3, iso};

/// Parry geometry for an actor-side [`CastShape`].
enum ActorShape {
    Ball(pshape::Ball),
    Capsule(pshape::Capsule),
}

impl ActorShape {
    fn as_dyn(&self) -> &dyn pshape::Shape {
        match self {
            ActorShape::Ball(b) => b,
            ActorShape::Capsule(c) => c,
        }
    }
}

/// Place a cast shape at its center with identity rotation so that parry's
/// shape-local normals coincide with world directions.
fn actor_shape(shape: &CastShape) -> (Iso, ActorShape) {
    let center = shape.center();
    let pose = iso(center, Quat::identity());
    let geom = match *shape {
        CastShape::Ball { radius, .. } => ActorShape::Ball(pshape::Ball::new(radius)),
        CastShape::Capsule { a, b, radius } => ActorShape::Capsule(pshape::Capsule::new(
            Point::from(a - center),
            Point::from(b - center),
            radius,
        )),
    };
    (pose, geom)
}

/// Cast a ray against one collider. `dir` must be unit length.
pub fn cast_ray(
    id: ColliderId,
    pose: &Iso,
    shape: &dyn pshape::Shape,
    origin: Vec3,
    dir: Vec3,
    max_distance: f32,
) -> Option<RayHit> {
    let ray = Ray::new(Point::from(origin), dir);
    let hit = shape.cast_ray_and_get_normal(pose, &ray, max_distance, true)?;

    // Rays starting inside a solid report a zero normal; face the ray instead.
    let normal = if hit.normal.norm_squared() > 1.0e-12 {
        hit.normal.normalize()
    } else {
        -dir
    };

    Some(RayHit {
        collider: id,
        point: origin + dir * hit.time_of_impact,
        normal,
        distance: hit.time_of_impact,
    })
}

/// Sweep an actor shape along unit `dir` against one collider.
///
/// The returned normal is the surface normal facing the actor. A sweep that
/// starts overlapping the collider reports `distance = 0` and `penetrating`.
pub fn cast_shape(
    id: ColliderId,
    pose: &Iso,
    shape: &dyn pshape::Shape,
    cast: &CastShape,
    dir: Vec3,
    max_distance: f32,
) -> Option<ShapeHit> {
    let (cast_pose, geom) = actor_shape(cast);

    let mut opts = ShapeCastOptions::with_max_time_of_impact(max_distance);
    opts.stop_at_penetration = true;
    opts.compute_impact_geometry_on_penetration = true;

    let hit = query::cast_shapes(
        &cast_pose,
        &dir,
        geom.as_dyn(),
        pose,
        &Vec3::zeros(),
        shape,
        opts,
    )
    .ok()??;

    let distance = hit.time_of_impact.max(0.0);
    let penetrating = hit.time_of_impact <= 0.0;

    // normal1 points out of the actor shape toward the collider; flip it so it
    // faces the actor, and keep it opposing the motion for genuine sweeps.
    let mut normal = -hit.normal1.into_inner();
    if !penetrating && normal.dot(&dir) > 0.0 {
        normal = -normal;
    }

    let center_at_hit = cast.center() + dir * distance;
    Some(ShapeHit {
        collider: id,
        point: center_at_hit + hit.witness1.coords,
        normal,
        distance,
        origin: cast.center(),
        penetrating,
    })
}

/// True if an actor shape overlaps one collider.
pub fn intersects(pose: &Iso, shape: &dyn pshape::Shape, cast: &CastShape) -> bool {
    let (cast_pose, geom) = actor_shape(cast);
    query::intersection_test(&cast_pose, geom.as_dyn(), pose, shape).unwrap_or(false)
}

/// Penetration depth and push-out direction of an actor shape into one collider.
///
/// The direction is the collider's outward surface normal at the contact, so
/// `direction * depth` moves the actor shape clear of it.
pub fn penetration(
    id: ColliderId,
    pose: &Iso,
    shape: &dyn pshape::Shape,
    cast: &CastShape,
) -> Option<Penetration> {
    if let Some(half) = shape.as_halfspace() {
        return halfspace_penetration(id, pose, half, cast);
    }

    let (cast_pose, geom) = actor_shape(cast);
    let contact = query::contact(&cast_pose, geom.as_dyn(), pose, shape, 0.0).ok()??;
    let depth = (-contact.dist).max(0.0);
    if depth <= 0.0 {
        return None;
    }

    // normal2 is the collider's outward normal in world space, pointing at the actor.
    Some(Penetration {
        collider: id,
        direction: contact.normal2.into_inner(),
        depth,
    })
}

/// Depth below a plane is the signed distance of the shape's deepest point.
fn halfspace_penetration(
    id: ColliderId,
    pose: &Iso,
    half: &pshape::HalfSpace,
    cast: &CastShape,
) -> Option<Penetration> {
    let normal = pose.rotation * half.normal.into_inner();
    let origin = pose.translation.vector;
    let height = |p: Vec3| (p - origin).dot(&normal);

    let depth = match *cast {
        CastShape::Ball { center, radius } => radius - height(center),
        CastShape::Capsule { a, b, radius } => radius - height(a).min(height(b)),
    };
    if depth <= 0.0 {
        return None;
    }

    Some(Penetration {
        collider: id,
        direction: normal,
        depth,
    })
}

/// Closest point on a collider to `point` (the point itself when inside).
pub fn closest_point(pose: &Iso, shape: &dyn pshape::Shape, point: Vec3) -> Vec3 {
    shape.project_point(pose, &Point::from(point), true).point.coords
}
