//! RON scenario description.
//!
//! A scenario names the world, the actor, and a frame-indexed script of
//! motion requests that stands in for an animation layer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use footing::{
    BodyShapeDef, ColliderDef, ColliderShapeDef, ControllerSettings, FixedStepClock, Quat, Vec3,
};

use crate::error::SimError;

fn default_frame_dt() -> f32 {
    1.0 / 60.0
}

fn default_fixed_dt() -> f32 {
    FixedStepClock::DEFAULT_FIXED_DT
}

fn default_max_frame_dt() -> f32 {
    FixedStepClock::DEFAULT_MAX_FRAME_DT
}

fn default_layer() -> u32 {
    1
}

fn default_tolerance() -> f32 {
    0.05
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub frames: usize,
    #[serde(default = "default_frame_dt")]
    pub frame_dt: f32,
    /// Gravity and force integration period.
    #[serde(default = "default_fixed_dt")]
    pub fixed_dt: f32,
    /// Frames longer than this are clamped before ticking.
    #[serde(default = "default_max_frame_dt")]
    pub max_frame_dt: f32,
    #[serde(default)]
    pub settings: ControllerSettings,
    pub body: Vec<BodyShapeDef>,
    #[serde(default)]
    pub start: [f32; 3],
    pub colliders: Vec<ColliderSpec>,
    #[serde(default)]
    pub movers: Vec<Mover>,
    #[serde(default)]
    pub script: Vec<Cue>,
    #[serde(default)]
    pub expect: Option<Expectation>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColliderSpec {
    pub id: u32,
    #[serde(default)]
    pub translation: [f32; 3],
    /// Euler angles about X, Y, Z in degrees.
    #[serde(default)]
    pub rotation_deg: [f32; 3],
    pub shape: ShapeSpec,
    #[serde(default = "default_layer")]
    pub layer: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum ShapeSpec {
    Plane { offset: f32 },
    Cuboid { half_extents: [f32; 3] },
    Sphere { radius: f32 },
    Capsule { radius: f32, half_height: f32 },
}

/// Kinematic motion applied to a collider every frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mover {
    pub collider: u32,
    /// Meters per second.
    #[serde(default)]
    pub velocity: [f32; 3],
    /// Degrees per second about world +Y.
    #[serde(default)]
    pub spin_deg: f32,
}

/// A request issued at the start of `frame`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cue {
    pub frame: usize,
    pub action: Action,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Action {
    Velocity([f32; 3]),
    MoveTo {
        target: [f32; 3],
        speed: f32,
        #[serde(default)]
        radius: f32,
    },
    Impulse([f32; 3]),
    Force {
        value: [f32; 3],
        #[serde(default)]
        duration: f32,
    },
    ClearForces,
    Rotate {
        yaw_deg: f32,
    },
    Ignore(u32),
    Unignore(u32),
    Ground(Option<u32>),
    Tilt(Option<[f32; 3]>),
}

/// Final-state check run after the last frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expectation {
    #[serde(default)]
    pub grounded: Option<bool>,
    #[serde(default)]
    pub ground: Option<u32>,
    #[serde(default)]
    pub position: Option<[f32; 3]>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, SimError> {
        Ok(ron::from_str(text)?)
    }

    pub fn clock(&self) -> FixedStepClock {
        FixedStepClock::new(self.fixed_dt).with_max_frame_dt(self.max_frame_dt)
    }

    pub fn start(&self) -> Vec3 {
        Vec3::from(self.start)
    }

    pub fn collider_defs(&self) -> Vec<ColliderDef> {
        self.colliders.iter().map(ColliderSpec::to_def).collect()
    }
}

impl ColliderSpec {
    pub fn rotation(&self) -> Quat {
        let [x, y, z] = self.rotation_deg;
        Quat::from_euler_angles(x.to_radians(), y.to_radians(), z.to_radians())
    }

    pub fn to_def(&self) -> ColliderDef {
        let shape = match self.shape {
            ShapeSpec::Plane { offset } => ColliderShapeDef::Plane {
                offset_along_normal: offset,
            },
            ShapeSpec::Cuboid { half_extents } => ColliderShapeDef::Cuboid {
                half_extents: Vec3::from(half_extents),
            },
            ShapeSpec::Sphere { radius } => ColliderShapeDef::Sphere { radius },
            ShapeSpec::Capsule {
                radius,
                half_height,
            } => ColliderShapeDef::CapsuleY {
                radius,
                half_height,
            },
        };
        ColliderDef::new(self.id, Vec3::from(self.translation), self.rotation(), shape)
            .with_layer(self.layer)
    }
}
