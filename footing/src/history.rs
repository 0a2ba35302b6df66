/*!
Ring of kinematic snapshots.

The newest slot is the current (writable) state, the one before it is the
read-only previous state, and older slots feed trailing averages. `shift`
advances the ring in one step at frame start, so within a frame the previous
snapshot can never observe writes to the current one.
*/

use crate::math::{Vec3, try_normalize};
use crate::state::KinematicState;

#[derive(Clone, Debug)]
pub struct StateHistory {
    ring: Vec<KinematicState>,
    head: usize,
    /// Snapshots written so far (saturates at ring length).
    filled: usize,
    next_id: u64,
}

impl StateHistory {
    /// Ring of `len` snapshots (at least two: current and previous).
    pub fn new(len: usize, initial: KinematicState) -> Self {
        let len = len.max(2);
        Self {
            ring: vec![initial; len],
            head: 0,
            filled: 1,
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn current(&self) -> &KinematicState {
        &self.ring[self.head]
    }

    pub fn current_mut(&mut self) -> &mut KinematicState {
        &mut self.ring[self.head]
    }

    pub fn previous(&self) -> &KinematicState {
        self.back(1)
    }

    /// Current and previous together, for stages that read one and write the other.
    pub fn split(&mut self) -> (&mut KinematicState, &KinematicState) {
        let n = self.ring.len();
        let head = self.head;
        let prev = (head + n - 1) % n;
        if prev < head {
            let (lo, hi) = self.ring.split_at_mut(head);
            (&mut hi[0], &lo[prev])
        } else {
            let (lo, hi) = self.ring.split_at_mut(prev);
            (&mut lo[head], &hi[0])
        }
    }

    /// Snapshot `age` frames back (0 = current). Ages past the ring clamp to the oldest.
    pub fn back(&self, age: usize) -> &KinematicState {
        let n = self.ring.len();
        let age = age.min(n - 1);
        &self.ring[(self.head + n - age) % n]
    }

    /// Advance one frame: the current snapshot becomes previous and a cleared
    /// slot, seeded with the persistent facts, becomes current.
    pub fn shift(&mut self) {
        let n = self.ring.len();
        self.head = (self.head + 1) % n;
        self.filled = (self.filled + 1).min(n);

        let (current, previous) = self.split();
        current.clear();
        current.carry_from(previous);

        let id = self.next_id;
        self.next_id += 1;
        self.ring[self.head].id = id;
    }

    /// Up to `count` most recent snapshots, newest first, excluding the current one.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &KinematicState> {
        let available = self.filled.saturating_sub(1);
        (1..=count.min(available)).map(move |age| self.back(age))
    }

    /// Average ground normal over the most recent grounded snapshots.
    pub fn average_ground_normal(&self, count: usize) -> Option<Vec3> {
        let mut sum = Vec3::zeros();
        let mut any = false;
        for state in self.recent(count).filter(|s| s.is_grounded) {
            sum += state.ground_surface_normal;
            any = true;
        }
        if !any {
            return None;
        }
        try_normalize(sum)
    }

    /// Average ground surface angle over the most recent grounded snapshots.
    pub fn average_ground_angle(&self, count: usize) -> Option<f32> {
        let mut sum = 0.0;
        let mut n = 0usize;
        for state in self.recent(count).filter(|s| s.is_grounded) {
            sum += state.ground_surface_angle;
            n += 1;
        }
        (n > 0).then(|| sum / n as f32)
    }
}
