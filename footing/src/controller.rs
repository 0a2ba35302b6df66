/*!
Actor controller.

`ActorController` owns one actor's snapshot ring, forces, body shapes and
query buffers, and runs the stages of a frame in a fixed order:

1. `pre_update` hook, queued force requests, history shift, world up
2. borrowed movement for frames that ran without a fixed tick
3. rotation requests and platform carry
4. segmented movement resolution
5. step / penetration correction
6. tilt, rotation safety rollback, axis freezes
7. `pre_commit` hook, commit, landing rule, durations, platform contact point
8. `post_update` hook

[`ActorController::step`] drives both rates from real frame time; hosts with
their own fixed-step loop call [`ActorController::fixed_update`] and
[`ActorController::update`] directly.
*/

use log::debug;

use crate::body::{BodyShapeDef, BodyShapes, Support};
use crate::clock::FixedStepClock;
use crate::constants::{MIN_MOVE_SQ, TILT_GLITCH_FRAMES};
use crate::error::ControllerError;
use crate::forces::{Force, ForceAccumulator, TickParams};
use crate::history::StateHistory;
use crate::hooks::{ControllerHooks, NoHooks};
use crate::math::{Quat, Vec3, project_on_plane, try_normalize, twist_about, up_of};
use crate::platform::{self, ContactRefresh, PlatformCarry};
use crate::requests::{ForceRequest, MotionRequests};
use crate::resolver::{ResolveInput, Resolver};
use crate::scene::{CastShape, ColliderId, QueryFilter, SceneQuery};
use crate::settings::ControllerSettings;
use crate::state::KinematicState;
use crate::step::{self, StepAction, StepContext};
use crate::tilt::{TiltInput, TiltPhase, update_tilt};
use crate::trace::{NoopTrace, Trace};

pub struct ActorController {
    settings: ControllerSettings,
    body: BodyShapes,
    history: StateHistory,
    forces: ForceAccumulator,
    requests: MotionRequests,
    resolver: Resolver,
    guard: RotationGuard,
    clock: FixedStepClock,
    trace: Box<dyn Trace>,
    label: String,

    world_up: Vec3,
    /// Fixed ticks run since the last frame update.
    ticks_since_update: u32,
    grounded_duration: f32,
    fall_duration: f32,
    last_ground_normal: Option<Vec3>,
    tilt_phase: TiltPhase,
}

impl ActorController {
    /// Validate `settings` and `shapes` and build an actor standing at the origin.
    pub fn new(settings: ControllerSettings, shapes: &[BodyShapeDef]) -> Result<Self, ControllerError> {
        settings.validate()?;
        let body = BodyShapes::from_defs(shapes)?;
        let history = StateHistory::new(settings.history_len, KinematicState::default());
        let world_up = settings.world_up();
        let gravity = if settings.is_gravity_enabled {
            -world_up * settings.gravity
        } else {
            Vec3::zeros()
        };

        Ok(Self {
            settings,
            body,
            history,
            forces: ForceAccumulator::with_acceleration(gravity),
            requests: MotionRequests::default(),
            resolver: Resolver::new(),
            guard: RotationGuard::default(),
            clock: FixedStepClock::default(),
            trace: Box::new(NoopTrace),
            label: String::from("actor"),
            world_up,
            ticks_since_update: 0,
            grounded_duration: 0.0,
            fall_duration: 0.0,
            last_ground_normal: None,
            tilt_phase: TiltPhase::StableUpright,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_trace(mut self, trace: Box<dyn Trace>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_clock(mut self, clock: FixedStepClock) -> Self {
        self.clock = clock;
        self
    }

    /// Start the actor at `position` with an empty history.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.history = StateHistory::new(
            self.settings.history_len,
            KinematicState {
                position,
                ..Default::default()
            },
        );
        self
    }

    /// Teleport. The support is forgotten; velocity is kept.
    pub fn set_position(&mut self, position: Vec3) {
        let state = self.history.current_mut();
        state.position = position;
        state.clear_ground();
    }

    pub fn requests(&self) -> &MotionRequests {
        &self.requests
    }

    pub fn requests_mut(&mut self) -> &mut MotionRequests {
        &mut self.requests
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn body(&self) -> &BodyShapes {
        &self.body
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    /// Last committed snapshot.
    pub fn state(&self) -> &KinematicState {
        self.history.current()
    }

    pub fn previous(&self) -> &KinematicState {
        self.history.previous()
    }

    pub fn position(&self) -> Vec3 {
        self.state().position
    }

    pub fn rotation(&self) -> Quat {
        self.state().rotation
    }

    pub fn velocity(&self) -> Vec3 {
        self.state().velocity
    }

    pub fn is_grounded(&self) -> bool {
        self.state().is_grounded
    }

    /// Seconds the actor has been continuously grounded.
    pub fn grounded_duration(&self) -> f32 {
        self.grounded_duration
    }

    /// Seconds since the actor last stood on something.
    pub fn fall_duration(&self) -> f32 {
        self.fall_duration
    }

    /// Forces still pending or active.
    pub fn forces(&self) -> &[Force] {
        self.forces.forces()
    }

    pub fn accumulated_velocity(&self) -> Vec3 {
        self.forces.accumulated_velocity()
    }

    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    pub fn tilt_phase(&self) -> TiltPhase {
        self.tilt_phase
    }

    /// Advance real time by `frame_dt`: run the due fixed ticks, then one frame update.
    pub fn step<S: SceneQuery + ?Sized>(&mut self, scene: &S, frame_dt: f32) {
        self.step_with_hooks(scene, frame_dt, &mut NoHooks);
    }

    pub fn step_with_hooks<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        frame_dt: f32,
        hooks: &mut dyn ControllerHooks,
    ) {
        let (dt, ticks) = self.clock.advance(frame_dt);
        let fixed_dt = self.clock.fixed_dt();
        for _ in 0..ticks {
            self.fixed_update(fixed_dt);
        }
        self.update(scene, dt, hooks);
    }

    /// Integrate gravity and forces over one fixed tick.
    pub fn fixed_update(&mut self, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        self.drain_force_requests();

        let grounded = self.history.current().is_grounded;
        let gravity = if self.settings.is_gravity_enabled && !grounded {
            -self.world_up * self.settings.gravity
        } else {
            Vec3::zeros()
        };
        self.forces.fixed_tick(&TickParams {
            dt,
            mass: self.settings.mass,
            gravity,
            up: self.world_up,
            terminal_fall_speed: self.settings.terminal_fall_speed,
        });
        self.ticks_since_update += 1;
    }

    /// Run one variable-rate frame update.
    pub fn update<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        dt: f32,
        hooks: &mut dyn ControllerHooks,
    ) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        hooks.pre_update(&mut self.requests, self.history.current(), dt);
        self.drain_force_requests();

        self.history.shift();
        self.world_up = self.compute_world_up();
        let world_up = self.world_up;
        let average_angle = self.history.average_ground_angle(TILT_GLITCH_FRAMES);

        if self.ticks_since_update == 0 && dt > 0.0 {
            self.forces.borrow(dt);
        }
        self.ticks_since_update = 0;

        let settings = &self.settings;
        let label = self.label.as_str();
        let (current, prev) = self.history.split();

        // Rotation requests.
        let (mut yaw, mut tilt) = (prev.yaw, prev.tilt);
        if let Some(target) = self.requests.target_rotation {
            yaw = twist_about(&target, Vec3::y());
            tilt = target * yaw.inverse();
        }
        if self.requests.rotate_yaw != 0.0 {
            yaw = Quat::from_axis_angle(&Vec3::y_axis(), self.requests.rotate_yaw.to_radians()) * yaw;
        }
        tilt = self.requests.rotate_tilt * tilt;

        // Platform carry.
        let carry = if prev.is_grounded {
            platform::carry(scene, prev, up_of(&tilt))
        } else {
            PlatformCarry::default()
        };
        if carry.is_moving {
            yaw = (tilt.inverse() * carry.rotation * tilt) * yaw;
        }

        let actor_up = up_of(&tilt);
        let user = self.requests.take_movement(prev.position, dt);
        let force = self.forces.frame_movement(dt);
        let slide = slide_movement(settings, prev, world_up, dt);
        let total = user + force + slide + carry.movement;

        current.movement = user;
        current.movement_force_adjust = force;
        current.movement_slide_adjust = slide;
        current.movement_platform_adjust = carry.movement;
        current.rotation_platform_adjust = carry.rotation;

        let resolution = self.resolver.resolve(
            scene,
            settings,
            &self.body,
            &ResolveInput {
                position: prev.position,
                rotation: tilt * yaw,
                movement: total,
                platform_offset: carry.movement,
                actor_up,
                world_up,
                previous_angle: prev.ground_surface_angle,
                ignored: &self.requests.ignored,
                ground_override: self.requests.ground_override,
            },
            &mut *self.trace,
        );

        let mut position = resolution.position;
        resolution.ground.write_to(current);
        current.is_popping_up = resolution.is_popping_up;
        if let Some(hit) = resolution.collision {
            current.record_collision(hit.collider, hit.point, hit.normal, hit.origin);
        }

        // Step and penetration correction.
        let vertical_speed = self.forces.accumulated_velocity().dot(&world_up);
        let action = step::plan(
            settings,
            &resolution.ground,
            &StepContext {
                actor_up,
                movement: total,
                dt,
                was_grounded: prev.is_grounded,
                was_stepping_down: prev.is_stepping_down,
                on_moving_platform: carry.is_moving,
                is_rising: vertical_speed > 0.0,
            },
        );
        if action != StepAction::None {
            position += actor_up * action.offset();
            let mut ground = self.resolver.probe(
                scene,
                settings,
                &self.requests.ignored,
                position,
                actor_up,
                world_up,
            );
            if let Some(id) = self.requests.ground_override {
                ground.ground = Some(id);
            }
            ground.write_to(current);
        }
        current.is_stepping_up = matches!(action, StepAction::StepUp { settled: false, .. });
        current.is_stepping_down = matches!(action, StepAction::StepDown(_)) && !current.is_grounded;
        step::log_transition(
            label,
            prev.is_stepping_up,
            current.is_stepping_up,
            prev.is_stepping_down,
            current.is_stepping_down,
        );
        current.position = position;

        // Tilt.
        let tilted = update_tilt(
            settings,
            &TiltInput {
                tilt,
                world_up,
                override_up: self.requests.tilt_override,
                is_grounded: current.is_grounded,
                ground_normal: current.ground_surface_normal,
                ground_angle: current.ground_surface_angle,
                ground_distance: current.ground_surface_distance,
                last_ground_normal: self.last_ground_normal,
                is_falling: !current.is_grounded && vertical_speed < 0.0,
                average_angle,
                was_tilting: prev.is_tilting,
                dt,
            },
        );
        let mut new_tilt = tilted.tilt;
        let mut phase = tilted.phase;
        if new_tilt != tilt
            && self.guard.blocks(
                scene,
                settings,
                &self.body,
                &self.requests.ignored,
                current,
                new_tilt * yaw,
            )
        {
            debug!("[{label}] tilt rolled back, body would overlap geometry");
            new_tilt = tilt;
            phase = prev_phase(self.tilt_phase);
        }

        // Axis freezes.
        let freeze = settings.freeze;
        if freeze.position_x {
            position.x = prev.position.x;
        }
        if freeze.position_y {
            position.y = prev.position.y;
        }
        if freeze.position_z {
            position.z = prev.position.z;
        }
        if freeze.yaw {
            yaw = prev.yaw;
        }
        if freeze.tilt {
            new_tilt = prev.tilt;
            phase = prev_phase(self.tilt_phase);
        }

        // Commit.
        let mut rotation = new_tilt * yaw;
        current.position = position;
        current.yaw = yaw;
        current.tilt = new_tilt;
        current.rotation = rotation;
        hooks.pre_commit(current, &mut position, &mut rotation);
        if rotation != current.rotation {
            current.yaw = twist_about(&rotation, Vec3::y());
            current.tilt = rotation * current.yaw.inverse();
            current.rotation = rotation;
        }
        current.position = position;
        current.is_tilting = phase == TiltPhase::Transitioning;
        current.velocity = if dt > 0.0 {
            (position - prev.position) / dt
        } else {
            Vec3::zeros()
        };

        if phase != self.tilt_phase {
            debug!("[{label}] tilt {:?} -> {:?}", self.tilt_phase, phase);
            self.tilt_phase = phase;
        }

        if current.is_grounded {
            if !prev.is_grounded {
                debug!(
                    "[{label}] landed on {:?} after {:.2}s airborne",
                    current.ground, self.fall_duration
                );
                self.forces.settle_on_ground(world_up);
            }
            self.grounded_duration += dt;
            self.fall_duration = 0.0;
            self.last_ground_normal = Some(current.ground_surface_normal);
        } else {
            if prev.is_grounded {
                debug!("[{label}] left ground {:?}", prev.ground);
            }
            self.fall_duration += dt;
            self.grounded_duration = 0.0;
        }

        let lateral_force = project_on_plane(force + slide, actor_up);
        platform::update_contact(
            scene,
            current,
            ContactRefresh {
                has_user_movement: user.norm_squared() > MIN_MOVE_SQ,
                has_force_movement: lateral_force.norm_squared() > MIN_MOVE_SQ,
                was_corrected: action != StepAction::None || current.is_colliding,
            },
            label,
        );
        if let (Some(old), None) = (prev.ground, current.ground) {
            debug!("[{label}] detached from {old:?}");
        }

        hooks.post_update(current, dt);
        self.requests.clear_rotations();
    }

    fn drain_force_requests(&mut self) {
        for request in self.requests.forces.drain(..) {
            match request {
                ForceRequest::Force { value, duration } => self.forces.add_force(value, duration),
                ForceRequest::Impulse { value } => self.forces.add_impulse(value),
                ForceRequest::ClearAll => self.forces.clear_forces(),
            }
        }
    }

    fn compute_world_up(&self) -> Vec3 {
        if self.settings.is_gravity_relative {
            self.history
                .average_ground_normal(self.settings.gravity_relative_frames)
                .unwrap_or_else(|| self.settings.world_up())
        } else {
            self.settings.world_up()
        }
    }
}

/// A rolled-back or frozen tilt holds still.
fn prev_phase(phase: TiltPhase) -> TiltPhase {
    match phase {
        TiltPhase::Transitioning => TiltPhase::StableTilted,
        settled => settled,
    }
}

/// Downhill movement while standing on ground too steep to walk.
fn slide_movement(
    settings: &ControllerSettings,
    prev: &KinematicState,
    world_up: Vec3,
    dt: f32,
) -> Vec3 {
    if !settings.is_slope_sliding_enabled
        || !prev.is_grounded
        || prev.ground_surface_angle <= settings.max_slope_angle
    {
        return Vec3::zeros();
    }
    try_normalize(project_on_plane(-world_up, prev.ground_surface_normal))
        .map(|downhill| downhill * settings.slope_slide_speed * dt)
        .unwrap_or_else(Vec3::zeros)
}

/// Overlap test for a changed orientation.
#[derive(Debug, Default)]
struct RotationGuard {
    exclude: Vec<ColliderId>,
    overlaps: Vec<ColliderId>,
}

impl RotationGuard {
    /// Whether any enabled body shape would overlap geometry other than the support.
    fn blocks<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        settings: &ControllerSettings,
        body: &BodyShapes,
        ignored: &[ColliderId],
        state: &KinematicState,
        rotation: Quat,
    ) -> bool {
        self.exclude.clear();
        self.exclude.extend_from_slice(ignored);
        self.exclude.extend(state.ground);
        let filter = QueryFilter::new(settings.collision_layers, &self.exclude);

        let support = if !state.is_grounded {
            Support::Air
        } else if state.ground_surface_angle <= settings.max_slope_angle {
            Support::Ground
        } else {
            Support::Slope
        };

        for (_, shape) in body.enabled(support) {
            let world: CastShape = shape.world_shape(state.position, &rotation);
            self.overlaps.clear();
            scene.overlap_shape(&world, &filter, &mut self.overlaps);
            if !self.overlaps.is_empty() {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BodyError, SettingsError};
    use crate::math::{angle_deg, forward_of};
    use crate::scene::{ColliderDef, ColliderShapeDef, StaticWorld};

    const DT: f32 = 0.02;

    fn floor() -> ColliderDef {
        ColliderDef::new(
            1,
            Vec3::zeros(),
            Quat::identity(),
            ColliderShapeDef::Plane {
                offset_along_normal: 0.0,
            },
        )
    }

    fn body() -> Vec<BodyShapeDef> {
        vec![BodyShapeDef::capsule("body", 0.3, 1.8)]
    }

    fn actor(settings: ControllerSettings, position: Vec3) -> ActorController {
        ActorController::new(settings, &body())
            .unwrap()
            .with_position(position)
    }

    fn run(actor: &mut ActorController, world: &StaticWorld, frames: usize) {
        for _ in 0..frames {
            actor.step(world, DT);
        }
    }

    /// Flat floor with a ramp rising toward +X from x = 1.
    fn ramp_world(angle_deg: f32) -> StaticWorld {
        let tilt = Quat::from_axis_angle(&Vec3::z_axis(), angle_deg.to_radians());
        StaticWorld::build(vec![
            floor(),
            ColliderDef::new(
                2,
                Vec3::new(1.0, 0.0, 0.0),
                tilt,
                ColliderShapeDef::Plane {
                    offset_along_normal: 0.0,
                },
            ),
        ])
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let settings = ControllerSettings {
            skin_width: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            ActorController::new(settings, &body()),
            Err(ControllerError::Settings(SettingsError::Negative { name: "skin_width", .. }))
        ));
        assert!(matches!(
            ActorController::new(ControllerSettings::default(), &[]),
            Err(ControllerError::Body(BodyError::Empty))
        ));
    }

    #[test]
    fn drops_onto_the_floor_and_stays() {
        let world = StaticWorld::build(vec![floor()]);
        let settings = ControllerSettings::default();
        let mut actor = actor(settings.clone(), Vec3::new(0.0, 0.5, 0.0));
        run(&mut actor, &world, 60);

        assert!(actor.is_grounded());
        assert_eq!(actor.state().ground, Some(ColliderId(1)));
        assert!(actor.position().y >= 0.0 && actor.position().y <= settings.skin_width);
        assert_eq!(actor.accumulated_velocity(), Vec3::zeros());
        assert!(actor.grounded_duration() > 0.0);
        assert_eq!(actor.fall_duration(), 0.0);
    }

    #[test]
    fn falls_forever_without_ground() {
        let world = StaticWorld::build(Vec::new());
        let mut actor = actor(ControllerSettings::default(), Vec3::new(0.0, 10.0, 0.0));

        let mut last_speed = actor.accumulated_velocity().norm();
        for _ in 0..30 {
            actor.step(&world, DT);
            assert!(!actor.is_grounded());
            let speed = actor.accumulated_velocity().norm();
            assert!(speed > last_speed);
            last_speed = speed;
        }
        assert!(actor.position().y < 10.0);
        assert!(actor.fall_duration() > 0.5);
    }

    #[test]
    fn walks_the_requested_distance_on_open_ground() {
        let world = StaticWorld::build(vec![floor()]);
        let mut actor = actor(ControllerSettings::default(), Vec3::zeros());
        actor.requests_mut().set_target_velocity(Vec3::new(1.0, 0.0, 0.0));
        run(&mut actor, &world, 50);

        assert!((actor.position().x - 1.0).abs() < 1.0e-4);
        assert!(actor.is_grounded());
        assert!((actor.velocity().x - 1.0).abs() < 1.0e-3);
    }

    #[test]
    fn walkable_ramp_is_climbed() {
        let settings = ControllerSettings::default();
        let world = ramp_world(settings.max_slope_angle - 0.5);
        let mut actor = actor(settings, Vec3::zeros());
        actor.requests_mut().set_target_velocity(Vec3::new(1.0, 0.0, 0.0));
        run(&mut actor, &world, 100);

        let p = actor.position();
        assert!(p.x > 1.2, "stopped at {p:?}");
        assert!(p.y > 0.15, "stayed low at {p:?}");
    }

    #[test]
    fn steep_ramp_blocks_uphill_progress() {
        let settings = ControllerSettings::default();
        let world = ramp_world(settings.max_slope_angle + 1.0);
        let mut actor = actor(settings, Vec3::zeros());
        actor.requests_mut().set_target_velocity(Vec3::new(1.0, 0.0, 0.0));
        run(&mut actor, &world, 100);

        let p = actor.position();
        assert!(p.x < 1.0, "walked onto the ramp: {p:?}");
        assert!(p.y < 0.05, "climbed the ramp: {p:?}");
    }

    #[test]
    fn low_ledge_is_stepped_up_in_bounded_nudges() {
        let settings = ControllerSettings::default();
        let height = 0.2;
        let world = StaticWorld::build(vec![
            floor(),
            ColliderDef::new(
                2,
                Vec3::new(1.5, height * 0.5, 0.0),
                Quat::identity(),
                ColliderShapeDef::Cuboid {
                    half_extents: Vec3::new(1.0, height * 0.5, 5.0),
                },
            ),
        ]);
        let mut actor = actor(settings.clone(), Vec3::zeros());
        actor.requests_mut().set_target_velocity(Vec3::new(1.0, 0.0, 0.0));

        let mut last_y = actor.position().y;
        for _ in 0..90 {
            actor.step(&world, DT);
            let y = actor.position().y;
            assert!(y - last_y <= settings.max_step_height + 1.0e-4);
            last_y = y;
        }

        let p = actor.position();
        assert!(p.x > 0.5);
        assert!((p.y - height).abs() <= settings.skin_width, "ended at {p:?}");
        assert_eq!(actor.state().ground, Some(ColliderId(2)));
    }

    #[test]
    fn sliding_down_a_steep_plane_stays_outside_it() {
        let settings = ControllerSettings::default();
        assert!(settings.is_slope_sliding_enabled);
        // 60 degrees, rising toward +X through the origin.
        let tilt = Quat::from_axis_angle(&Vec3::z_axis(), 60f32.to_radians());
        let world = StaticWorld::build(vec![ColliderDef::new(
            1,
            Vec3::zeros(),
            tilt,
            ColliderShapeDef::Plane {
                offset_along_normal: 0.0,
            },
        )]);
        let normal = tilt * Vec3::y();
        let start = Vec3::new(0.0, 0.002, 0.0);
        let mut actor = actor(settings.clone(), start);

        let mut last = start;
        for frame in 0..60 {
            actor.step(&world, DT);
            let p = actor.position();
            assert!(p.dot(&normal) >= -settings.skin_width, "frame {frame}: feet inside at {p:?}");
            assert!((p - last).norm() < 0.5, "frame {frame}: jumped to {p:?}");
            last = p;
        }

        let p = actor.position();
        assert!(p.x < 0.0 && p.y < start.y, "did not slide downhill: {p:?}");
    }

    #[test]
    fn orients_to_a_walkable_slope_and_settles() {
        let settings = ControllerSettings {
            orient_to_ground: true,
            ..Default::default()
        };
        let tilt = Quat::from_axis_angle(&Vec3::z_axis(), 20f32.to_radians());
        let world = StaticWorld::build(vec![ColliderDef::new(
            1,
            Vec3::zeros(),
            tilt,
            ColliderShapeDef::Plane {
                offset_along_normal: 0.0,
            },
        )]);
        let normal = tilt * Vec3::y();
        let mut actor = actor(settings, Vec3::zeros());

        let mut residual = angle_deg(up_of(&actor.rotation()), normal);
        let mut transitioned = false;
        for _ in 0..60 {
            actor.step(&world, DT);
            let now = angle_deg(up_of(&actor.rotation()), normal);
            assert!(now <= residual + 1.0e-3, "tilt moved away: {residual} -> {now}");
            residual = now;
            transitioned |= actor.tilt_phase() == TiltPhase::Transitioning;
        }

        assert!(transitioned);
        assert!(residual < 0.5, "residual {residual}");
        assert!(actor.is_grounded());
        assert_eq!(actor.tilt_phase(), TiltPhase::StableTilted);
    }

    #[test]
    fn grounded_impulse_pushes_the_actor_along_the_floor() {
        let world = StaticWorld::build(vec![floor()]);
        let mut actor = actor(ControllerSettings::default(), Vec3::zeros());
        run(&mut actor, &world, 5);
        assert!(actor.is_grounded());

        // 50 N for one 0.02 s tick on 1 kg: 1 m/s sideways.
        actor.requests_mut().add_impulse(Vec3::new(50.0, 0.0, 0.0));
        run(&mut actor, &world, 30);

        assert!(actor.is_grounded());
        assert!((actor.position().x - 0.6).abs() < 1.0e-3, "at {:?}", actor.position());
        assert!((actor.accumulated_velocity().x - 1.0).abs() < 1.0e-4);
    }

    #[test]
    fn grounded_timed_force_accelerates_the_actor() {
        let world = StaticWorld::build(vec![floor()]);
        let mut actor = actor(ControllerSettings::default(), Vec3::zeros());
        run(&mut actor, &world, 5);

        actor.requests_mut().add_force(Vec3::new(0.0, 0.0, 20.0), 0.5);
        let mut last_z = actor.position().z;
        for _ in 0..30 {
            actor.step(&world, DT);
            assert!(actor.is_grounded());
            assert!(actor.position().z > last_z);
            last_z = actor.position().z;
        }
        assert!(last_z > 1.0, "z = {last_z}");
        assert!(actor.forces().is_empty());
    }

    #[test]
    fn first_frame_falls_before_any_fixed_tick() {
        let world = StaticWorld::build(Vec::new());
        let mut actor = actor(ControllerSettings::default(), Vec3::new(0.0, 10.0, 0.0));

        // Shorter than one fixed tick: the clock runs none this frame.
        actor.step(&world, 0.01);
        assert!(actor.accumulated_velocity().y < 0.0);
        assert!(actor.position().y < 10.0);
    }

    #[test]
    fn moving_platform_carries_the_actor() {
        let mut world = StaticWorld::build(vec![ColliderDef::new(
            5,
            Vec3::new(0.0, -0.25, 0.0),
            Quat::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(2.0, 0.25, 2.0),
            },
        )]);
        let settings = ControllerSettings::default();
        let mut actor = actor(settings.clone(), Vec3::zeros());
        actor.step(&world, DT);
        assert!(actor.is_grounded());

        for i in 1..=50 {
            world.set_pose(
                ColliderId(5),
                Vec3::new(0.02 * i as f32, -0.25, 0.0),
                Quat::identity(),
            );
            actor.step(&world, DT);
            assert!(actor.is_grounded());
        }

        let p = actor.position();
        assert!((p.x - 1.0).abs() < 1.0e-3, "carried to {p:?}");
        assert!(p.y >= -1.0e-4 && p.y <= settings.skin_width);
        assert!((actor.state().movement_platform_adjust.x - 0.02).abs() < 1.0e-4);
    }

    #[test]
    fn rotating_platform_swings_and_turns_the_actor() {
        let mut world = StaticWorld::build(vec![ColliderDef::new(
            5,
            Vec3::new(0.0, -0.25, 0.0),
            Quat::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(2.0, 0.25, 2.0),
            },
        )]);
        let mut actor = actor(ControllerSettings::default(), Vec3::new(1.0, 0.0, 0.0));
        actor.step(&world, DT);

        let frames = 50;
        for i in 1..=frames {
            let angle = std::f32::consts::FRAC_PI_2 * i as f32 / frames as f32;
            world.set_pose(
                ColliderId(5),
                Vec3::new(0.0, -0.25, 0.0),
                Quat::from_axis_angle(&Vec3::y_axis(), angle),
            );
            actor.step(&world, DT);
        }

        let p = actor.position();
        assert!((p.x).abs() < 1.0e-2 && (p.z + 1.0).abs() < 1.0e-2, "swung to {p:?}");
        let forward = forward_of(&actor.rotation());
        assert!(angle_deg(forward, -Vec3::x()) < 1.0);
    }

    #[test]
    fn impulse_jumps_and_lands_again() {
        let world = StaticWorld::build(vec![floor()]);
        let mut actor = actor(ControllerSettings::default(), Vec3::zeros());
        run(&mut actor, &world, 5);
        assert!(actor.is_grounded());

        // 250 N for one 0.02 s tick on 1 kg: 5 m/s upward.
        actor.requests_mut().add_impulse(Vec3::new(0.0, 250.0, 0.0));
        let mut peak: f32 = 0.0;
        for _ in 0..60 {
            actor.step(&world, DT);
            peak = peak.max(actor.position().y);
        }
        assert!(peak > 0.8, "peak {peak}");

        run(&mut actor, &world, 100);
        assert!(actor.is_grounded());
        assert!(actor.forces().is_empty());
    }

    #[test]
    fn ignored_collider_is_passed_through() {
        let wall = ColliderDef::new(
            2,
            Vec3::new(1.5, 1.0, 0.0),
            Quat::identity(),
            ColliderShapeDef::Cuboid {
                half_extents: Vec3::new(0.1, 1.0, 5.0),
            },
        );
        let world = StaticWorld::build(vec![floor(), wall]);
        let mut actor = actor(ControllerSettings::default(), Vec3::zeros());
        actor.requests_mut().ignore(ColliderId(2));
        actor.requests_mut().set_target_velocity(Vec3::new(1.0, 0.0, 0.0));
        run(&mut actor, &world, 150);

        assert!(actor.position().x > 2.5);
        assert!(!actor.state().is_colliding);
    }

    #[test]
    fn move_to_stops_on_the_acceptance_radius() {
        let world = StaticWorld::build(vec![floor()]);
        let mut actor = actor(ControllerSettings::default(), Vec3::zeros());
        actor
            .requests_mut()
            .move_to(Vec3::new(2.0, 0.0, 0.0), 2.0, 0.1);
        run(&mut actor, &world, 100);

        assert!((actor.position().x - 1.9).abs() < 1.0e-3);
        assert!(actor.requests().target_position.is_none());
    }

    #[test]
    fn frozen_axes_hold_still() {
        let world = StaticWorld::build(vec![floor()]);
        let mut settings = ControllerSettings::default();
        settings.freeze.position_x = true;
        settings.freeze.yaw = true;
        let mut actor = actor(settings, Vec3::zeros());
        actor
            .requests_mut()
            .set_target_velocity(Vec3::new(1.0, 0.0, 1.0));
        actor.requests_mut().rotate(90.0, Quat::identity());
        run(&mut actor, &world, 25);

        let p = actor.position();
        assert_eq!(p.x, 0.0);
        assert!((p.z - 0.5).abs() < 1.0e-4);
        assert_eq!(actor.state().yaw, Quat::identity());
    }

    #[test]
    fn yaw_request_turns_once() {
        let world = StaticWorld::build(vec![floor()]);
        let mut actor = actor(ControllerSettings::default(), Vec3::zeros());
        actor.requests_mut().rotate(90.0, Quat::identity());
        run(&mut actor, &world, 3);

        let forward = forward_of(&actor.rotation());
        assert!(angle_deg(forward, -Vec3::x()) < 1.0e-2);
        assert_eq!(actor.requests().rotate_yaw, 0.0);
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl ControllerHooks for Recorder {
        fn pre_update(&mut self, requests: &mut MotionRequests, _previous: &KinematicState, _dt: f32) {
            self.calls.push("pre_update");
            requests.add_movement(Vec3::new(0.1, 0.0, 0.0));
        }

        fn pre_commit(&mut self, _state: &KinematicState, position: &mut Vec3, _rotation: &mut Quat) {
            self.calls.push("pre_commit");
            position.z = 3.0;
        }

        fn post_update(&mut self, state: &KinematicState, _dt: f32) {
            self.calls.push("post_update");
            assert_eq!(state.position.z, 3.0);
        }
    }

    #[test]
    fn hooks_run_in_order_and_can_override_the_commit() {
        let world = StaticWorld::build(vec![floor()]);
        let mut actor = actor(ControllerSettings::default(), Vec3::zeros());
        let mut hooks = Recorder::default();
        actor.step_with_hooks(&world, DT, &mut hooks);

        assert_eq!(hooks.calls, ["pre_update", "pre_commit", "post_update"]);
        assert!((actor.position().x - 0.1).abs() < 1.0e-4);
        assert_eq!(actor.position().z, 3.0);
    }
}
