use glam::Vec3;
use tiltway_common::{Basis, flerp};
use tracing::trace;

use crate::world::ViewerWorld;

/// Generation index: the tick being received.
pub const CURR: usize = 0;
/// Generation index: the last completed tick.
pub const PREV: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoverLerp {
    pub path: usize,
    pub t: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallLerp {
    pub p: Vec3,
    pub e: Basis,
    pub pend: Basis,
    pub r: f32,
}

impl Default for BallLerp {
    fn default() -> Self {
        BallLerp {
            p: Vec3::ZERO,
            e: Basis::IDENTITY,
            pend: Basis::IDENTITY,
            r: 0.25,
        }
    }
}

/// Two generations of every dynamic field the renderer interpolates.
///
/// Commands write the `CURR` generation; [`copy`] promotes it to `PREV`
/// at tick boundaries; [`apply`] blends the two into the viewer world
/// without mutating either.
///
/// [`copy`]: LerpState::copy
/// [`apply`]: LerpState::apply
#[derive(Debug)]
pub struct LerpState {
    movers: Vec<[MoverLerp; 2]>,
    balls: Vec<[BallLerp; 2]>,
}

impl LerpState {
    pub fn new(world: &ViewerWorld) -> LerpState {
        let movers = world
            .layout
            .mover_paths
            .iter()
            .map(|&path| [MoverLerp { path, t: 0.0 }; 2])
            .collect();
        let balls = world
            .balls
            .iter()
            .map(|b| {
                [BallLerp {
                    p: b.p,
                    e: b.e,
                    pend: b.pend,
                    r: b.r,
                }; 2]
            })
            .collect();
        LerpState { movers, balls }
    }

    pub fn ball_count(&self) -> usize {
        self.balls.len()
    }

    /// Promote the received tick: previous takes the current values.
    pub fn copy(&mut self) {
        for m in &mut self.movers {
            m[PREV] = m[CURR];
        }
        for b in &mut self.balls {
            b[PREV] = b[CURR];
        }
    }

    /// Write the blend at `a` into the world. `a == 0` reproduces the
    /// previous generation exactly and `a == 1` the current one; the
    /// endpoints bypass the arithmetic so no rounding creeps in.
    pub fn apply(&self, world: &mut ViewerWorld, a: f32) {
        for (i, m) in self.movers.iter().enumerate() {
            world.mover_paths[i] = m[CURR].path;
            world.mover_times[i] = if m[PREV].path != m[CURR].path {
                // Crossed onto a new path this tick; times are not on
                // the same timeline, snap to current.
                m[CURR].t
            } else if a <= 0.0 {
                m[PREV].t
            } else if a >= 1.0 {
                m[CURR].t
            } else {
                flerp(m[PREV].t, m[CURR].t, a)
            };
        }
        for (i, b) in self.balls.iter().enumerate() {
            let out = &mut world.balls[i];
            if a <= 0.0 {
                out.p = b[PREV].p;
                out.e = b[PREV].e;
                out.pend = b[PREV].pend;
                out.r = b[PREV].r;
            } else if a >= 1.0 {
                out.p = b[CURR].p;
                out.e = b[CURR].e;
                out.pend = b[CURR].pend;
                out.r = b[CURR].r;
            } else {
                out.p = b[PREV].p.lerp(b[CURR].p, a);
                out.e = Basis::slerp(&b[PREV].e, &b[CURR].e, a);
                out.pend = Basis::slerp(&b[PREV].pend, &b[CURR].pend, a);
                out.r = flerp(b[PREV].r, b[CURR].r, a);
            }
        }
    }

    pub fn make_ball(&mut self) {
        self.balls.push([BallLerp::default(); 2]);
    }

    pub fn clear_balls(&mut self) {
        self.balls.clear();
    }

    /// Current-generation ball, if the index is live.
    pub fn ball_mut(&mut self, ui: usize) -> Option<&mut BallLerp> {
        match self.balls.get_mut(ui) {
            Some(b) => Some(&mut b[CURR]),
            None => {
                trace!(ui, "command for out-of-range ball ignored");
                None
            }
        }
    }

    /// Local mover advance for `StepSimulation`: enabled paths gain
    /// `dt`. Wraps are corrected by explicit `MovePath`/`MoveTime`.
    pub fn step_movers(&mut self, path_enabled: &[bool], dt: f32) {
        for m in &mut self.movers {
            if path_enabled.get(m[CURR].path).copied().unwrap_or(false) {
                m[CURR].t += dt;
            }
        }
    }

    pub fn set_mover_path(&mut self, mover: usize, path: usize, n_paths: usize) {
        if path >= n_paths {
            trace!(mover, path, "mover sent to out-of-range path ignored");
            return;
        }
        match self.movers.get_mut(mover) {
            Some(m) => m[CURR].path = path,
            None => trace!(mover, "out-of-range mover ignored"),
        }
    }

    pub fn set_mover_time(&mut self, mover: usize, t: f32) {
        match self.movers.get_mut(mover) {
            Some(m) => m[CURR].t = t,
            None => trace!(mover, "out-of-range mover ignored"),
        }
    }
}
