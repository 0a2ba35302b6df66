pub mod arena;
pub mod body;
pub mod clock;
pub mod constants;
pub mod controller;
pub mod error;
pub mod forces;
pub mod grounding;
pub mod history;
pub mod hooks;
pub mod math;
pub mod platform;
pub mod requests;
pub mod resolver;
pub mod scene;
pub mod settings;
pub mod slope;
pub mod state;
pub mod step;
pub mod tilt;
pub mod trace;

pub use body::{BodyGeometry, BodyShapeDef, BodyShapes};
pub use clock::FixedStepClock;
pub use controller::ActorController;
pub use error::{BodyError, ControllerError, SettingsError};
pub use grounding::GroundInfo;
pub use hooks::{ControllerHooks, NoHooks};
pub use math::{Iso, Quat, Vec3};
pub use requests::MotionRequests;
pub use scene::{ColliderDef, ColliderId, ColliderShapeDef, QueryFilter, SceneQuery, StaticWorld};
pub use settings::{ControllerSettings, FreezeAxes};
pub use state::KinematicState;
pub use tilt::TiltPhase;
pub use trace::{LogTrace, NoopTrace, Trace};
