/*!
Math aliases and small vector helpers shared by every controller stage.

All helpers guard degenerate inputs with squared-length checks before
normalising, so callers can skip a branch instead of propagating NaNs.
*/

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;
pub type Point = na::Point3<f32>;

/// Squared lengths at or below this are treated as zero vectors.
pub const MIN_LEN_SQ: f32 = 1.0e-12;

/// Normalize `v`, or `None` when it is too short to have a direction.
#[inline]
pub fn try_normalize(v: Vec3) -> Option<Vec3> {
    let len_sq = v.norm_squared();
    if len_sq <= MIN_LEN_SQ || !len_sq.is_finite() {
        return None;
    }
    Some(v / len_sq.sqrt())
}

/// Component of `v` along the unit vector `n`.
#[inline]
pub fn along(v: Vec3, n: Vec3) -> Vec3 {
    n * v.dot(&n)
}

/// Component of `v` lying in the plane whose unit normal is `n`.
#[inline]
pub fn project_on_plane(v: Vec3, n: Vec3) -> Vec3 {
    v - n * v.dot(&n)
}

/// Unsigned angle between two vectors in degrees. Zero vectors yield 0.
pub fn angle_deg(a: Vec3, b: Vec3) -> f32 {
    let denom_sq = a.norm_squared() * b.norm_squared();
    if denom_sq <= MIN_LEN_SQ {
        return 0.0;
    }
    // atan2 form stays accurate for nearly parallel vectors.
    a.cross(&b).norm().atan2(a.dot(&b)).to_degrees()
}

/// Signed angle (degrees) from `from` to `to` measured about `axis`.
///
/// Both vectors are flattened onto the plane of `axis` first.
pub fn signed_angle_about(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    let a = project_on_plane(from, axis);
    let b = project_on_plane(to, axis);
    let angle = angle_deg(a, b);
    if a.cross(&b).dot(&axis) < 0.0 {
        -angle
    } else {
        angle
    }
}

/// Shortest rotation taking direction `from` onto direction `to`.
///
/// Handles the antiparallel case (where nalgebra has no unique answer) by
/// turning half a revolution about any axis perpendicular to `from`.
pub fn rotation_between(from: Vec3, to: Vec3) -> Quat {
    if let Some(q) = Quat::rotation_between(&from, &to) {
        return q;
    }
    let (Some(f), Some(_)) = (try_normalize(from), try_normalize(to)) else {
        return Quat::identity();
    };
    let helper = if f.x.abs() < 0.9 { Vec3::x() } else { Vec3::z() };
    let axis = na::Unit::new_normalize(f.cross(&helper));
    Quat::from_axis_angle(&axis, std::f32::consts::PI)
}

/// Rotate direction `from` toward `to` by at most `max_deg` degrees.
pub fn rotate_towards(from: Vec3, to: Vec3, max_deg: f32) -> Vec3 {
    let angle = angle_deg(from, to);
    if angle <= max_deg || angle <= f32::EPSILON {
        return to;
    }
    let full = rotation_between(from, to);
    let partial = Quat::identity().slerp(&full, (max_deg / angle).clamp(0.0, 1.0));
    partial * from
}

/// Twist component of `q` about the unit `axis` (swing-twist decomposition).
pub fn twist_about(q: &Quat, axis: Vec3) -> Quat {
    let raw = q.quaternion();
    let imag = raw.imag();
    let projected = axis * imag.dot(&axis);
    let twist = na::Quaternion::new(raw.w, projected.x, projected.y, projected.z);
    if twist.norm_squared() <= MIN_LEN_SQ {
        return Quat::identity();
    }
    Quat::new_normalize(twist)
}

/// Local "up" of a rotation (its +Y axis in world space).
#[inline]
pub fn up_of(q: &Quat) -> Vec3 {
    q * Vec3::y()
}

/// Local "forward" of a rotation. Forward is -Z, matching the yaw convention
/// `yaw = atan2(-dx, -dz)`.
#[inline]
pub fn forward_of(q: &Quat) -> Vec3 {
    q * -Vec3::z()
}

/// Yaw-only rotation about +Y that faces the planar direction `dir`.
///
/// Returns `None` if the planar part of `dir` is too small.
pub fn yaw_facing(dir: Vec3) -> Option<Quat> {
    let planar = Vec3::new(dir.x, 0.0, dir.z);
    if planar.norm_squared() <= MIN_LEN_SQ {
        return None;
    }
    let yaw = (-planar.x).atan2(-planar.z);
    Some(Quat::from_axis_angle(&Vec3::y_axis(), yaw))
}

/// Build an isometry from a translation and rotation.
#[inline]
pub fn iso(translation: Vec3, rotation: Quat) -> Iso {
    Iso::from_parts(na::Translation3::from(translation), rotation)
}

/// True if every component is finite.
#[inline]
pub fn is_finite(v: &Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}
