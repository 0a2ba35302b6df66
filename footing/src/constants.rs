/*!
Controller tolerances and hard caps.

Tunables that vary per actor live in [`crate::settings::ControllerSettings`];
the values here are structural limits that keep every loop bounded and every
comparison robust. Distances are in meters, angles in degrees, time in seconds.
*/

/// Maximum number of resolution segments per frame update.
pub const MAX_SEGMENTS: usize = 20;

/// Distance kept between a body shape and the surface it was stopped against.
pub const COLLISION_BUFFER: f32 = 0.001;

/// Extra tolerance on top of skin width when deciding a direct ground hit.
pub const GROUND_EPSILON: f32 = 0.0001;

/// Sentinel surface distance used while no ground is detected at all.
pub const NO_GROUND_DISTANCE: f32 = f32::MAX;

/// Remaining movement below this squared length ends the segment loop (m^2).
pub const MIN_MOVE_SQ: f32 = 1.0e-8;

/// Fraction of the probe radius within which a lone support still grounds the actor.
pub const SINGLE_SUPPORT_RADIUS_FACTOR: f32 = 0.25;

/// Minimum horizontal spread between two supports that straddle a gap or edge.
pub const EDGE_SUPPORT_SPREAD_DEG: f32 = 60.0;

/// Upper bound on slope-boundary bisection iterations.
pub const MAX_SLOPE_BISECTIONS: usize = 24;

/// Surfaces whose angles differ by less than this are the same slope.
pub const SLOPE_MATCH_DEG: f32 = 0.5;

/// Normals tilted less than this from the reference up are flat.
pub const FLAT_ANGLE_DEG: f32 = 0.1;

/// Height above the feet that forward slope probes are cast from.
pub const SLOPE_PROBE_HEIGHT: f32 = 0.02;

/// Smallest step-speed multiplier applied to tiny step corrections.
pub const STEP_SPEED_MIN_FACTOR: f32 = 0.1;

/// Tilt residuals below this angle are considered converged.
pub const TILT_SETTLED_DEG: f32 = 0.01;

/// Number of snapshots averaged when checking ground-angle glitches.
pub const TILT_GLITCH_FRAMES: usize = 20;

/// Capacity reserved for the per-segment collision-hit arena.
pub const HIT_ARENA_CAPACITY: usize = 32;
