/*!
Force accumulation at the fixed tick rate.

Forces are integrated into an accumulated velocity once per fixed tick; the
variable-rate frame update consumes that velocity scaled by its own delta
time. Gravity is folded in here as well, while the actor is airborne.

Fixed ticks and frames do not interleave 1:1. When a frame runs without a
fixed tick, [`ForceAccumulator::borrow`] extrapolates the last tick's
acceleration into the velocity so motion does not stall for a frame, and the
next real tick pays that amount back.
*/

use crate::math::{MIN_LEN_SQ, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ForceKind {
    /// Applied on exactly one fixed tick, then removed.
    Impulse,
    /// Applied on every tick from `start` until `start + duration`.
    /// A zero duration never expires.
    Timed { duration: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Force {
    pub value: Vec3,
    pub kind: ForceKind,
    /// Accumulator time the force was queued at (seconds).
    pub start: f32,
}

impl Force {
    pub fn is_expired(&self, now: f32) -> bool {
        match self.kind {
            ForceKind::Impulse => false,
            ForceKind::Timed { duration } => duration > 0.0 && now >= self.start + duration,
        }
    }
}

/// Per-tick environment for [`ForceAccumulator::fixed_tick`].
#[derive(Clone, Copy, Debug)]
pub struct TickParams {
    pub dt: f32,
    pub mass: f32,
    /// Gravity acceleration to apply this tick (zero while grounded or disabled).
    pub gravity: Vec3,
    /// Gravity-relative up used for the terminal speed clamp.
    pub up: Vec3,
    pub terminal_fall_speed: f32,
}

#[derive(Clone, Debug, Default)]
pub struct ForceAccumulator {
    forces: Vec<Force>,
    accumulated_velocity: Vec3,
    /// Acceleration summed on the last fixed tick, reused when borrowing.
    last_accel: Vec3,
    /// Velocity pre-applied by frames that ran without a fixed tick.
    borrowed: Vec3,
    /// Seconds of fixed ticks integrated so far.
    time: f32,
}

impl ForceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator that borrows `accel` until its first fixed tick, so a frame
    /// that runs before any tick already falls.
    pub fn with_acceleration(accel: Vec3) -> Self {
        Self {
            last_accel: accel,
            ..Self::default()
        }
    }

    /// Queue a force that lasts `duration` seconds (0 = until removed).
    pub fn add_force(&mut self, value: Vec3, duration: f32) {
        self.forces.push(Force {
            value,
            kind: ForceKind::Timed {
                duration: duration.max(0.0),
            },
            start: self.time,
        });
    }

    /// Queue a one-tick impulse.
    pub fn add_impulse(&mut self, value: Vec3) {
        self.forces.push(Force {
            value,
            kind: ForceKind::Impulse,
            start: self.time,
        });
    }

    pub fn clear_forces(&mut self) {
        self.forces.clear();
    }

    /// Forces still pending or active.
    pub fn forces(&self) -> &[Force] {
        &self.forces
    }

    pub fn accumulated_velocity(&self) -> Vec3 {
        self.accumulated_velocity
    }

    pub fn set_accumulated_velocity(&mut self, velocity: Vec3) {
        self.accumulated_velocity = velocity;
        self.borrowed = Vec3::zeros();
    }

    /// Integrate one fixed tick.
    pub fn fixed_tick(&mut self, params: &TickParams) {
        let now = self.time;
        let inv_mass = if params.mass > 0.0 { 1.0 / params.mass } else { 0.0 };
        let mut accel = Vec3::zeros();

        for i in (0..self.forces.len()).rev() {
            let force = self.forces[i];
            if force.value.norm_squared() <= MIN_LEN_SQ || force.is_expired(now) {
                self.forces.remove(i);
                continue;
            }
            accel += force.value * inv_mass;
            if force.kind == ForceKind::Impulse {
                self.forces.remove(i);
            }
        }

        accel += params.gravity;

        self.accumulated_velocity += accel * params.dt - self.borrowed;
        self.borrowed = Vec3::zeros();
        self.last_accel = accel;
        self.time += params.dt;

        let vertical = self.accumulated_velocity.dot(&params.up);
        if vertical < -params.terminal_fall_speed {
            self.accumulated_velocity -= params.up * (vertical + params.terminal_fall_speed);
        }
    }

    /// Extrapolate the last tick's acceleration over a frame that had no fixed tick.
    pub fn borrow(&mut self, frame_dt: f32) {
        let amount = self.last_accel * frame_dt;
        self.accumulated_velocity += amount;
        self.borrowed += amount;
    }

    /// Variable-rate landing rule: drop the residual fall velocity on touchdown.
    /// Lateral motion and a jump in progress are kept.
    pub fn settle_on_ground(&mut self, up: Vec3) {
        let fall = self.accumulated_velocity.dot(&up);
        if fall < 0.0 {
            self.accumulated_velocity -= up * fall;
        }
        let borrowed = self.borrowed.dot(&up);
        if borrowed < 0.0 {
            self.borrowed -= up * borrowed;
        }
        let accel = self.last_accel.dot(&up);
        if accel < 0.0 {
            self.last_accel -= up * accel;
        }
    }

    /// Movement contributed by the accumulated velocity over one frame.
    #[inline]
    pub fn frame_movement(&self, frame_dt: f32) -> Vec3 {
        self.accumulated_velocity * frame_dt
    }
}
