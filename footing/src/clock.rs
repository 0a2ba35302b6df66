/// Splits variable frame time into fixed ticks.
///
/// Frame deltas are clamped to `max_frame_dt` so a long stall does not turn into
/// a burst of catch-up ticks.
#[derive(Clone, Debug)]
pub struct FixedStepClock {
    fixed_dt: f32,
    max_frame_dt: f32,
    accumulator: f32,
}

impl FixedStepClock {
    pub const DEFAULT_FIXED_DT: f32 = 0.02;
    pub const DEFAULT_MAX_FRAME_DT: f32 = 0.125;

    pub fn new(fixed_dt: f32) -> Self {
        Self {
            fixed_dt: if fixed_dt > 0.0 {
                fixed_dt
            } else {
                Self::DEFAULT_FIXED_DT
            },
            max_frame_dt: Self::DEFAULT_MAX_FRAME_DT,
            accumulator: 0.0,
        }
    }

    pub fn with_max_frame_dt(mut self, max_frame_dt: f32) -> Self {
        self.max_frame_dt = max_frame_dt.max(self.fixed_dt);
        self
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// Add one frame of real time; returns the clamped frame delta and the
    /// number of fixed ticks due.
    pub fn advance(&mut self, frame_dt: f32) -> (f32, u32) {
        let dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, self.max_frame_dt)
        } else {
            0.0
        };
        self.accumulator += dt;

        let mut ticks = 0;
        while self.accumulator >= self.fixed_dt {
            self.accumulator -= self.fixed_dt;
            ticks += 1;
        }
        (dt, ticks)
    }
}

impl Default for FixedStepClock {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FIXED_DT)
    }
}
