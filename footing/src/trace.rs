//! Optional per-update tracing injected into the resolver.
//!
//! Every method has a no-op default, so an implementation only overrides what it
//! wants to observe.

use log::trace;

use crate::arena::CollisionHit;
use crate::math::Vec3;
use crate::slope::SlopeHit;

pub trait Trace {
    /// A resolution segment is about to run.
    fn segment(&mut self, _index: usize, _position: Vec3, _remaining: Vec3) {}

    /// The nearest hit chosen for a segment.
    fn hit(&mut self, _index: usize, _hit: &CollisionHit) {}

    /// A slope change was detected ahead.
    fn slope(&mut self, _index: usize, _slope: &SlopeHit) {}

    /// The segment cap stopped resolution with movement left over.
    fn segment_cap(&mut self, _remaining: Vec3) {}

    /// The actor finished the update at `position` after `segments` segments.
    fn resolved(&mut self, _segments: usize, _position: Vec3) {}
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTrace;

impl Trace for NoopTrace {}

/// Forwards events to `log::trace!` tagged with an actor label.
#[derive(Clone, Debug)]
pub struct LogTrace {
    label: String,
}

impl LogTrace {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Trace for LogTrace {
    fn segment(&mut self, index: usize, position: Vec3, remaining: Vec3) {
        trace!(
            "[{}] segment {index} at ({:.3}, {:.3}, {:.3}) remaining ({:.4}, {:.4}, {:.4})",
            self.label, position.x, position.y, position.z, remaining.x, remaining.y, remaining.z
        );
    }

    fn hit(&mut self, index: usize, hit: &CollisionHit) {
        trace!(
            "[{}] segment {index} hit {:?} shape {} dist {:.4} normal ({:.3}, {:.3}, {:.3}){}{}",
            self.label,
            hit.collider,
            hit.shape.0,
            hit.distance,
            hit.normal.x,
            hit.normal.y,
            hit.normal.z,
            if hit.penetrating { " penetrating" } else { "" },
            if hit.is_support { " support" } else { "" },
        );
    }

    fn slope(&mut self, index: usize, slope: &SlopeHit) {
        trace!(
            "[{}] segment {index} slope {:?} angle {:.2}{}",
            self.label,
            slope.collider,
            slope.angle,
            if slope.is_blocked { " blocked" } else { "" },
        );
    }

    fn segment_cap(&mut self, remaining: Vec3) {
        trace!(
            "[{}] segment cap reached, dropped ({:.4}, {:.4}, {:.4})",
            self.label, remaining.x, remaining.y, remaining.z
        );
    }

    fn resolved(&mut self, segments: usize, position: Vec3) {
        trace!(
            "[{}] resolved in {segments} segments at ({:.3}, {:.3}, {:.3})",
            self.label, position.x, position.y, position.z
        );
    }
}
