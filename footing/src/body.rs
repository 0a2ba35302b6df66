/*!
Actor collision volumes.

Body shapes are declared in the actor's local frame (feet at the origin, +Y
up, forward -Z) and turned into world-space [`CastShape`]s per query. Each
shape is flagged for the situations it participates in, so e.g. a low foot
sphere can be active in the air but stay out of the way of small ledges while
walking.
*/

use serde::{Deserialize, Serialize};

use crate::error::BodyError;
use crate::math::{Quat, Vec3, is_finite};
use crate::scene::CastShape;

/// Index of a shape in its owning [`BodyShapes`] table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyShapeHandle(pub usize);

/// Geometry of a body shape in actor-local space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BodyGeometry {
    Sphere {
        offset: [f32; 3],
        radius: f32,
    },
    Capsule {
        offset: [f32; 3],
        end_offset: [f32; 3],
        radius: f32,
    },
}

fn enabled() -> bool {
    true
}

/// Declarative description of one body shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyShapeDef {
    pub name: String,
    pub geometry: BodyGeometry,
    #[serde(default = "enabled")]
    pub is_enabled_on_ground: bool,
    #[serde(default = "enabled")]
    pub is_enabled_on_slope: bool,
    #[serde(default = "enabled")]
    pub is_enabled_above_ground: bool,
}

impl BodyShapeDef {
    /// Upright capsule whose bottom touches the feet.
    pub fn capsule(name: impl Into<String>, radius: f32, height: f32) -> Self {
        let top = (height - radius).max(radius);
        Self {
            name: name.into(),
            geometry: BodyGeometry::Capsule {
                offset: [0.0, radius, 0.0],
                end_offset: [0.0, top, 0.0],
                radius,
            },
            is_enabled_on_ground: true,
            is_enabled_on_slope: true,
            is_enabled_above_ground: true,
        }
    }

    pub fn sphere(name: impl Into<String>, offset: Vec3, radius: f32) -> Self {
        Self {
            name: name.into(),
            geometry: BodyGeometry::Sphere {
                offset: offset.into(),
                radius,
            },
            is_enabled_on_ground: true,
            is_enabled_on_slope: true,
            is_enabled_above_ground: true,
        }
    }
}

/// Situation used to select which body shapes take part in a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Support {
    Ground,
    Slope,
    Air,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BodyShape {
    pub name: String,
    pub geometry: BodyGeometry,
    pub is_enabled_on_ground: bool,
    pub is_enabled_on_slope: bool,
    pub is_enabled_above_ground: bool,
}

impl BodyShape {
    pub fn is_enabled_for(&self, support: Support) -> bool {
        match support {
            Support::Ground => self.is_enabled_on_ground,
            Support::Slope => self.is_enabled_on_slope,
            Support::Air => self.is_enabled_above_ground,
        }
    }

    /// World-space geometry for an actor at `position` with `rotation`.
    pub fn world_shape(&self, position: Vec3, rotation: &Quat) -> CastShape {
        match self.geometry {
            BodyGeometry::Sphere { offset, radius } => CastShape::Ball {
                center: position + rotation * Vec3::from(offset),
                radius,
            },
            BodyGeometry::Capsule {
                offset,
                end_offset,
                radius,
            } => CastShape::Capsule {
                a: position + rotation * Vec3::from(offset),
                b: position + rotation * Vec3::from(end_offset),
                radius,
            },
        }
    }
}

/// Ordered collision volume set owned by one actor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BodyShapes {
    shapes: Vec<BodyShape>,
}

impl BodyShapes {
    /// Validate and instantiate a declarative body description.
    pub fn from_defs(defs: &[BodyShapeDef]) -> Result<Self, BodyError> {
        if defs.is_empty() {
            return Err(BodyError::Empty);
        }

        let mut shapes = Vec::with_capacity(defs.len());
        for def in defs {
            let (radius, offsets_ok) = match def.geometry {
                BodyGeometry::Sphere { offset, radius } => {
                    (radius, is_finite(&Vec3::from(offset)))
                }
                BodyGeometry::Capsule {
                    offset,
                    end_offset,
                    radius,
                } => (
                    radius,
                    is_finite(&Vec3::from(offset)) && is_finite(&Vec3::from(end_offset)),
                ),
            };
            if !(radius > 0.0 && radius.is_finite()) {
                return Err(BodyError::BadRadius {
                    name: def.name.clone(),
                    radius,
                });
            }
            if !offsets_ok {
                return Err(BodyError::BadOffset {
                    name: def.name.clone(),
                });
            }
            shapes.push(BodyShape {
                name: def.name.clone(),
                geometry: def.geometry,
                is_enabled_on_ground: def.is_enabled_on_ground,
                is_enabled_on_slope: def.is_enabled_on_slope,
                is_enabled_above_ground: def.is_enabled_above_ground,
            });
        }

        Ok(Self { shapes })
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn get(&self, handle: BodyShapeHandle) -> Option<&BodyShape> {
        self.shapes.get(handle.0)
    }

    /// Shapes taking part in queries for the given support situation.
    pub fn enabled(&self, support: Support) -> impl Iterator<Item = (BodyShapeHandle, &BodyShape)> {
        self.shapes
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.is_enabled_for(support))
            .map(|(i, s)| (BodyShapeHandle(i), s))
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyShapeHandle, &BodyShape)> {
        self.shapes
            .iter()
            .enumerate()
            .map(|(i, s)| (BodyShapeHandle(i), s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_degenerate_bodies() {
        assert_eq!(BodyShapes::from_defs(&[]), Err(BodyError::Empty));

        let bad = BodyShapeDef::sphere("foot", Vec3::zeros(), 0.0);
        assert!(matches!(
            BodyShapes::from_defs(&[bad]),
            Err(BodyError::BadRadius { .. })
        ));

        let nan = BodyShapeDef::sphere("foot", Vec3::new(f32::NAN, 0.0, 0.0), 0.2);
        assert!(matches!(
            BodyShapes::from_defs(&[nan]),
            Err(BodyError::BadOffset { .. })
        ));
    }

    #[test]
    fn capsule_follows_actor_rotation() {
        let body = BodyShapes::from_defs(&[BodyShapeDef::capsule("torso", 0.3, 1.8)]).unwrap();
        let (_, torso) = body.iter().next().unwrap();

        let tilt = Quat::from_axis_angle(&Vec3::x_axis(), std::f32::consts::FRAC_PI_2);
        match torso.world_shape(Vec3::new(1.0, 0.0, 0.0), &tilt) {
            CastShape::Capsule { a, b, radius } => {
                assert!((radius - 0.3).abs() < 1.0e-6);
                assert!((a - Vec3::new(1.0, 0.0, 0.3)).norm() < 1.0e-5);
                assert!((b - Vec3::new(1.0, 0.0, 1.5)).norm() < 1.0e-5);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn enabled_filters_by_support() {
        let mut foot = BodyShapeDef::sphere("foot", Vec3::new(0.0, 0.2, 0.0), 0.2);
        foot.is_enabled_on_ground = false;
        let body =
            BodyShapes::from_defs(&[BodyShapeDef::capsule("torso", 0.3, 1.8), foot]).unwrap();

        assert_eq!(body.enabled(Support::Ground).count(), 1);
        assert_eq!(body.enabled(Support::Air).count(), 2);
        assert_eq!(
            body.enabled(Support::Ground).next().map(|(h, _)| h),
            Some(BodyShapeHandle(0))
        );
    }
}
