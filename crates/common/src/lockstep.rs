/// Fixed-tick accumulator.
///
/// Wall time comes in as variable frame deltas; simulation only ever
/// advances in whole ticks of `tick_dt`. The fractional remainder is
/// exposed as [`blend`] for interpolation.
///
/// [`blend`]: Lockstep::blend
#[derive(Debug, Clone, Copy)]
pub struct Lockstep {
    dt: f32,
    at: f32,
    ts: f32,
}

impl Lockstep {
    /// Highest accepted tick rate. Beyond this `dt` gets small enough
    /// that `at -= dt` can stop making progress in f32, and the
    /// accumulate loop would never drain.
    pub const MAX_UPS: u32 = 1000;

    pub fn new(ups: u32) -> Lockstep {
        Lockstep {
            dt: 1.0 / ups.clamp(1, Self::MAX_UPS) as f32,
            at: 0.0,
            ts: 1.0,
        }
    }

    pub fn tick_dt(&self) -> f32 {
        self.dt
    }

    /// Re-lock onto a different tick length, e.g. from a replay's
    /// `TickRate`. Drops the accumulated remainder. The rate is clamped
    /// to `1..=MAX_UPS`; command streams are not trusted input.
    pub fn set_ups(&mut self, ups: u32) {
        self.dt = 1.0 / ups.clamp(1, Self::MAX_UPS) as f32;
        self.at = 0.0;
    }

    /// Time scale: 0 pauses, 1 is real time.
    pub fn set_scale(&mut self, ts: f32) {
        self.ts = ts.max(0.0);
    }

    pub fn scale(&self) -> f32 {
        self.ts
    }

    pub fn reset(&mut self) {
        self.at = 0.0;
    }

    /// Fold a frame delta into the accumulator and return how many
    /// whole ticks to run.
    pub fn accumulate(&mut self, frame_dt: f32) -> u32 {
        self.at += frame_dt * self.ts;
        let mut n = 0;
        while self.at >= self.dt {
            self.at -= self.dt;
            n += 1;
        }
        n
    }

    /// Interpolation factor in `[0, 1)`: how far into the next tick the
    /// presentation clock sits.
    pub fn blend(&self) -> f32 {
        if self.dt > 0.0 { self.at / self.dt } else { 0.0 }
    }
}
