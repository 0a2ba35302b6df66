//! Frame loop for one scenario.

use std::fmt;

use log::{debug, info};

use footing::{ActorController, ColliderId, LogTrace, Quat, StaticWorld, Vec3};

use crate::error::SimError;
use crate::scenario::{Action, Mover, Scenario};

/// What happened over a run.
#[derive(Clone, Debug)]
pub struct Summary {
    pub name: String,
    pub frames: usize,
    pub position: Vec3,
    pub is_grounded: bool,
    pub ground: Option<ColliderId>,
    pub airborne_frames: usize,
    pub colliding_frames: usize,
    pub peak_height: f32,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario `{}` after {} frames", self.name, self.frames)?;
        writeln!(
            f,
            "  position  ({:.3}, {:.3}, {:.3})",
            self.position.x, self.position.y, self.position.z
        )?;
        writeln!(f, "  grounded  {} on {:?}", self.is_grounded, self.ground)?;
        writeln!(f, "  airborne  {} frames", self.airborne_frames)?;
        writeln!(f, "  colliding {} frames", self.colliding_frames)?;
        write!(f, "  peak      {:.3}", self.peak_height)
    }
}

/// Base pose of a moved collider, captured before the first frame.
struct MoverState {
    id: ColliderId,
    translation: Vec3,
    rotation: Quat,
    velocity: Vec3,
    spin: f32,
}

impl MoverState {
    fn new(mover: &Mover, scenario: &Scenario) -> Option<Self> {
        let spec = scenario.colliders.iter().find(|c| c.id == mover.collider)?;
        Some(Self {
            id: ColliderId(mover.collider),
            translation: Vec3::from(spec.translation),
            rotation: spec.rotation(),
            velocity: Vec3::from(mover.velocity),
            spin: mover.spin_deg.to_radians(),
        })
    }

    fn apply(&self, world: &mut StaticWorld, time: f32) {
        let spin = Quat::from_axis_angle(&Vec3::y_axis(), self.spin * time);
        world.set_pose(
            self.id,
            self.translation + self.velocity * time,
            spin * self.rotation,
        );
    }
}

pub fn run(scenario: &Scenario) -> Result<Summary, SimError> {
    let mut world = StaticWorld::build(scenario.collider_defs());
    let mut actor = ActorController::new(scenario.settings.clone(), &scenario.body)?
        .with_label(scenario.name.clone())
        .with_trace(Box::new(LogTrace::new(scenario.name.clone())))
        .with_clock(scenario.clock())
        .with_position(scenario.start());

    let mut movers = Vec::with_capacity(scenario.movers.len());
    for mover in &scenario.movers {
        match MoverState::new(mover, scenario) {
            Some(state) => movers.push(state),
            None => {
                return Err(SimError::Expectation {
                    name: scenario.name.clone(),
                    detail: format!("mover references unknown collider {}", mover.collider),
                });
            }
        }
    }

    let mut script: Vec<_> = scenario.script.iter().collect();
    script.sort_by_key(|cue| cue.frame);
    let mut next_cue = 0;

    let mut airborne_frames = 0;
    let mut colliding_frames = 0;
    let mut peak_height = f32::MIN;

    for frame in 0..scenario.frames {
        while let Some(cue) = script.get(next_cue).filter(|cue| cue.frame <= frame) {
            info!("[{}] frame {frame}: {:?}", scenario.name, cue.action);
            apply(&mut actor, &cue.action);
            next_cue += 1;
        }

        let time = (frame + 1) as f32 * scenario.frame_dt;
        for mover in &movers {
            mover.apply(&mut world, time);
        }

        actor.step(&world, scenario.frame_dt);

        let state = actor.state();
        if !state.is_grounded {
            airborne_frames += 1;
        }
        if state.is_colliding {
            colliding_frames += 1;
        }
        peak_height = peak_height.max(state.position.dot(&actor.world_up()));
        debug!(
            "[{}] frame {frame} pos ({:.3}, {:.3}, {:.3}) vel ({:.3}, {:.3}, {:.3}) grounded {} angle {:.1}",
            scenario.name,
            state.position.x,
            state.position.y,
            state.position.z,
            state.velocity.x,
            state.velocity.y,
            state.velocity.z,
            state.is_grounded,
            state.ground_surface_angle,
        );
    }

    let state = actor.state();
    let summary = Summary {
        name: scenario.name.clone(),
        frames: scenario.frames,
        position: state.position,
        is_grounded: state.is_grounded,
        ground: state.ground,
        airborne_frames,
        colliding_frames,
        peak_height,
    };
    check(scenario, &summary)?;
    Ok(summary)
}

fn apply(actor: &mut ActorController, action: &Action) {
    let requests = actor.requests_mut();
    match *action {
        Action::Velocity(v) => requests.set_target_velocity(Vec3::from(v)),
        Action::MoveTo {
            target,
            speed,
            radius,
        } => requests.move_to(Vec3::from(target), speed, radius),
        Action::Impulse(v) => requests.add_impulse(Vec3::from(v)),
        Action::Force { value, duration } => requests.add_force(Vec3::from(value), duration),
        Action::ClearForces => requests.clear_forces(),
        Action::Rotate { yaw_deg } => requests.rotate(yaw_deg, Quat::identity()),
        Action::Ignore(id) => requests.ignore(ColliderId(id)),
        Action::Unignore(id) => requests.unignore(ColliderId(id)),
        Action::Ground(id) => requests.set_ground(id.map(ColliderId)),
        Action::Tilt(up) => requests.set_tilt_override(up.map(Vec3::from)),
    }
}

fn check(scenario: &Scenario, summary: &Summary) -> Result<(), SimError> {
    let Some(expect) = &scenario.expect else {
        return Ok(());
    };
    let fail = |detail: String| SimError::Expectation {
        name: scenario.name.clone(),
        detail,
    };

    if let Some(grounded) = expect.grounded {
        if summary.is_grounded != grounded {
            return Err(fail(format!(
                "expected grounded = {grounded}, got {}",
                summary.is_grounded
            )));
        }
    }
    if let Some(ground) = expect.ground {
        if summary.ground != Some(ColliderId(ground)) {
            return Err(fail(format!(
                "expected ground {ground}, got {:?}",
                summary.ground
            )));
        }
    }
    if let Some(position) = expect.position {
        let error = (summary.position - Vec3::from(position)).norm();
        if error > expect.tolerance {
            return Err(fail(format!(
                "ended {error:.3} m from ({:.3}, {:.3}, {:.3})",
                position[0], position[1], position[2]
            )));
        }
    }
    Ok(())
}
