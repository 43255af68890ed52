use std::io::{Seek, Write};
use std::sync::Arc;

use glam::Vec3;
use tiltway_common::{ItemKind, Lockstep, MapVersion, Outcome, flerp};
use tiltway_level::LevelTemplate;
use tiltway_proto::replay::ReplayWriter;
use tiltway_proto::wire::WireError;
use tiltway_proto::{Command, CommandQueue};
use tracing::{debug, trace, warn};

use crate::lerp::{CURR, LerpState, PREV};
use crate::world::ViewerWorld;

/// Seconds for the goal/checkpoint intensity scalars to fade in or out.
const FADE_TIME: f32 = 1.0;

/// Camera-facing tilt state, kept in two generations like everything
/// else dynamic.
#[derive(Debug, Clone, Copy)]
struct TiltGen {
    x: Vec3,
    z: Vec3,
    rx: f32,
    rz: f32,
}

impl Default for TiltGen {
    fn default() -> Self {
        TiltGen {
            x: Vec3::X,
            z: Vec3::Z,
            rx: 0.0,
            rz: 0.0,
        }
    }
}

/// The viewer: applies the authority's command stream and nothing else.
///
/// The identical `apply` path serves live play and replay, which is the
/// determinism contract: a recorded stream reconstructs the same
/// presentation states the live viewer saw.
#[derive(Debug)]
pub struct ClientSession {
    world: ViewerWorld,
    lerp: LerpState,
    tilt: [TiltGen; 2],
    /// Goal-open visual intensity, fading toward its target at tick
    /// rate; two generations so it blends like geometry.
    goal_k: [f32; 2],
    jump_k: [f32; 2],
    chkp_k: [f32; 2],
    curr_ball: usize,
    timer: f32,
    coins: i32,
    status: Outcome,
    goal_open: bool,
    chkp_enabled: bool,
    jump_active: bool,
    ups: u32,
    map_name: String,
    map_compat: bool,
    first_update: bool,
    next_update: bool,
}

impl ClientSession {
    pub fn new(template: Arc<LevelTemplate>) -> ClientSession {
        let world = ViewerWorld::new(template);
        let lerp = LerpState::new(&world);
        ClientSession {
            world,
            lerp,
            tilt: [TiltGen::default(); 2],
            goal_k: [0.0; 2],
            jump_k: [0.0; 2],
            chkp_k: [1.0; 2],
            curr_ball: 0,
            timer: 0.0,
            coins: 0,
            status: Outcome::None,
            goal_open: false,
            chkp_enabled: true,
            jump_active: false,
            ups: tiltway_common::consts::UPS,
            map_name: String::new(),
            map_compat: true,
            first_update: true,
            next_update: false,
        }
    }

    /// Drain a queue into the session.
    pub fn sync(&mut self, queue: &mut CommandQueue) {
        while let Some(cmd) = queue.deq() {
            self.apply(&cmd);
        }
    }

    /// Drain a queue, recording every command before applying it. The
    /// stream on disk is exactly the stream this session consumed.
    pub fn sync_recorded<W: Write + Seek>(
        &mut self,
        queue: &mut CommandQueue,
        rec: &mut ReplayWriter<W>,
    ) -> Result<(), WireError> {
        while let Some(cmd) = queue.deq() {
            rec.record(&cmd)?;
            self.apply(&cmd);
        }
        Ok(())
    }

    /// Apply one command. Unknown indices are ignored; nothing here can
    /// fail.
    pub fn apply(&mut self, cmd: &Command) {
        // First command after a tick boundary promotes the generations.
        if self.next_update {
            self.lerp.copy();
            self.tilt[PREV] = self.tilt[CURR];
            self.goal_k[PREV] = self.goal_k[CURR];
            self.jump_k[PREV] = self.jump_k[CURR];
            self.chkp_k[PREV] = self.chkp_k[CURR];
            self.next_update = false;
        }
        match cmd {
            Command::EndOfTick => self.end_of_tick(),
            Command::MakeBall => {
                self.lerp.make_ball();
                self.world.balls.push(Default::default());
            }
            Command::ClearBalls => {
                self.lerp.clear_balls();
                self.world.balls.clear();
                self.curr_ball = 0;
            }
            Command::CurrentBall { ball } => {
                let ball = *ball as usize;
                if ball < self.lerp.ball_count() {
                    self.curr_ball = ball;
                } else {
                    trace!(ball, "current-ball out of range ignored");
                }
            }
            Command::MakeItem { p, kind, value } => {
                self.world.items.push(crate::world::ViewerItem {
                    p: *p,
                    kind: *kind,
                    value: *value,
                });
            }
            Command::ClearItems => self.world.items.clear(),
            Command::PickItem { item } => {
                match self.world.items.get_mut(*item as usize) {
                    Some(it) => it.kind = ItemKind::None,
                    None => trace!(item, "picked item out of range ignored"),
                }
            }
            Command::TiltAngles { x, z } => {
                self.tilt[CURR].rx = *x;
                self.tilt[CURR].rz = *z;
            }
            Command::TiltAxes { x, z } => {
                self.tilt[CURR].x = *x;
                self.tilt[CURR].z = *z;
            }
            Command::Timer { t } => self.timer = *t,
            Command::Coins { n } => self.coins = *n,
            Command::Status { outcome } => {
                debug!(?outcome, "status");
                self.status = *outcome;
            }
            Command::GoalOpen => self.goal_open = true,
            Command::JumpEnter => self.jump_active = true,
            Command::JumpExit => self.jump_active = false,
            Command::SwitchEnter { .. } | Command::SwitchExit { .. } => {}
            Command::SwitchToggle { switch } => {
                match self.world.switches_on.get_mut(*switch as usize) {
                    Some(on) => *on = !*on,
                    None => trace!(switch, "switch toggle out of range ignored"),
                }
            }
            Command::ChkpEnter { .. } | Command::ChkpExit { .. } => {}
            Command::ChkpToggle { chkp } => {
                match self.world.chkps_active.get_mut(*chkp as usize) {
                    Some(active) => *active = true,
                    None => trace!(chkp, "checkpoint toggle out of range ignored"),
                }
            }
            Command::ChkpDisable => self.chkp_enabled = false,
            Command::BallPosition { p } => {
                if let Some(b) = self.lerp.ball_mut(self.curr_ball) {
                    b.p = *p;
                }
            }
            Command::BallBasis { x, y } => {
                if let Some(b) = self.lerp.ball_mut(self.curr_ball) {
                    b.e = tiltway_common::Basis::from_xy(*x, *y);
                }
            }
            Command::BallPendulumBasis { x, y } => {
                if let Some(b) = self.lerp.ball_mut(self.curr_ball) {
                    b.pend = tiltway_common::Basis::from_xy(*x, *y);
                }
            }
            Command::BallRadius { r } => {
                if let Some(b) = self.lerp.ball_mut(self.curr_ball) {
                    b.r = *r;
                }
            }
            Command::PathFlag { path, flag } => {
                match self.world.path_enabled.get_mut(*path as usize) {
                    Some(f) => *f = *flag,
                    None => trace!(path, "path flag out of range ignored"),
                }
            }
            Command::MovePath { mover, path } => {
                self.lerp.set_mover_path(
                    *mover as usize,
                    *path as usize,
                    self.world.path_enabled.len(),
                );
            }
            Command::MoveTime { mover, t } => {
                self.lerp.set_mover_time(*mover as usize, *t);
            }
            Command::StepSimulation { dt } => {
                self.lerp.step_movers(&self.world.path_enabled, *dt);
            }
            Command::MapIdentity { name, version } => {
                self.map_name = name.clone();
                self.map_compat = version.compatible_with(&self.world.template().version());
                if !self.map_compat {
                    warn!(
                        stream = %version,
                        loaded = %self.world.template().version(),
                        "map version mismatch, display may be wrong"
                    );
                }
            }
            Command::TickRate { ups } => self.ups = (*ups).clamp(1, Lockstep::MAX_UPS),
        }
    }

    fn end_of_tick(&mut self) {
        if self.first_update {
            // Snap both generations to the prologue state.
            self.lerp.copy();
            self.tilt[PREV] = self.tilt[CURR];
            self.goal_k[CURR] = if self.goal_open { 1.0 } else { 0.0 };
            self.goal_k[PREV] = self.goal_k[CURR];
            self.jump_k[PREV] = self.jump_k[CURR];
            self.chkp_k[PREV] = self.chkp_k[CURR];
            self.lerp.apply(&mut self.world, 1.0);
            self.first_update = false;
        } else {
            // Cosmetic intensities advance once per tick.
            let dt = 1.0 / self.ups as f32;
            let goal_target = if self.goal_open { 1.0 } else { 0.0 };
            let jump_target = if self.jump_active { 1.0 } else { 0.0 };
            let chkp_target = if self.chkp_enabled { 1.0 } else { 0.0 };
            let step = dt / FADE_TIME;
            self.goal_k[CURR] = approach(self.goal_k[CURR], goal_target, step);
            self.jump_k[CURR] = approach(self.jump_k[CURR], jump_target, step);
            self.chkp_k[CURR] = approach(self.chkp_k[CURR], chkp_target, step);
        }
        self.next_update = true;
    }

    /// Blend the interpolation buffer into the world at `a`.
    pub fn apply_lerp(&mut self, a: f32) {
        self.lerp.apply(&mut self.world, a);
    }

    pub fn world(&self) -> &ViewerWorld {
        &self.world
    }

    /// Blended tilt angles at `a`, degrees.
    pub fn tilt_angles(&self, a: f32) -> (f32, f32) {
        (
            flerp(self.tilt[PREV].rx, self.tilt[CURR].rx, a),
            flerp(self.tilt[PREV].rz, self.tilt[CURR].rz, a),
        )
    }

    pub fn tilt_axes(&self) -> (Vec3, Vec3) {
        (self.tilt[CURR].x, self.tilt[CURR].z)
    }

    /// Blended goal-open intensity at `a`.
    pub fn goal_intensity(&self, a: f32) -> f32 {
        flerp(self.goal_k[PREV], self.goal_k[CURR], a)
    }

    pub fn jump_intensity(&self, a: f32) -> f32 {
        flerp(self.jump_k[PREV], self.jump_k[CURR], a)
    }

    pub fn chkp_intensity(&self, a: f32) -> f32 {
        flerp(self.chkp_k[PREV], self.chkp_k[CURR], a)
    }

    pub fn timer(&self) -> f32 {
        self.timer
    }

    pub fn coins(&self) -> i32 {
        self.coins
    }

    pub fn status(&self) -> Outcome {
        self.status
    }

    pub fn goal_open(&self) -> bool {
        self.goal_open
    }

    pub fn jump_active(&self) -> bool {
        self.jump_active
    }

    pub fn ups(&self) -> u32 {
        self.ups
    }

    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    /// False when the stream's map version does not match the loaded
    /// template. Non-fatal; the session keeps applying.
    pub fn map_compat(&self) -> bool {
        self.map_compat
    }

    pub fn stream_version_expectation(&self) -> MapVersion {
        self.world.template().version()
    }
}

fn approach(v: f32, target: f32, step: f32) -> f32 {
    if v < target {
        (v + step).min(target)
    } else {
        (v - step).max(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiltway_level::{BallSpec, BodySpec, ItemSpec, PathSpec, SwitchSpec, TemplateBuilder};

    fn arena() -> Arc<LevelTemplate> {
        Arc::new(
            TemplateBuilder::new("test/arena")
                .meta("version", "1.2")
                .plane(Vec3::Y, 0.0)
                .path(PathSpec::default())
                .body(BodySpec {
                    path: Some(0),
                    rot_path: None,
                })
                .item(ItemSpec {
                    p: Vec3::new(1.0, 0.25, 0.0),
                    kind: ItemKind::Coin,
                    value: 1,
                    body: None,
                })
                .switch(SwitchSpec {
                    p: Vec3::new(3.0, 0.0, 0.0),
                    r: 0.5,
                    body: None,
                    target_path: Some(0),
                    default_on: false,
                    timeout: 0.0,
                })
                .ball(BallSpec {
                    p: Vec3::new(0.0, 0.25, 0.0),
                    r: 0.25,
                })
                .finish()
                .unwrap(),
        )
    }

    #[test]
    fn clear_then_make_is_idempotent() {
        let mut s = ClientSession::new(arena());
        for _ in 0..2 {
            s.apply(&Command::ClearBalls);
            s.apply(&Command::MakeBall);
        }
        assert_eq!(s.world().balls.len(), 1);
        for _ in 0..2 {
            s.apply(&Command::ClearItems);
            s.apply(&Command::MakeItem {
                p: Vec3::ZERO,
                kind: ItemKind::Coin,
                value: 1,
            });
        }
        assert_eq!(s.world().items.len(), 1);
    }

    #[test]
    fn interpolation_endpoints_are_exact() {
        let a = Vec3::new(1.0, 0.3, -2.0);
        let b = Vec3::new(2.0, 0.7, -1.0);
        let mut s = ClientSession::new(arena());
        s.apply(&Command::BallPosition { p: a });
        s.apply(&Command::EndOfTick);
        s.apply(&Command::BallPosition { p: b });
        s.apply(&Command::EndOfTick);

        s.apply_lerp(0.0);
        assert_eq!(s.world().balls[0].p, a);
        s.apply_lerp(1.0);
        assert_eq!(s.world().balls[0].p, b);
        s.apply_lerp(0.5);
        assert_eq!(s.world().balls[0].p, a.lerp(b, 0.5));
    }

    #[test]
    fn apply_does_not_mutate_the_generations() {
        let mut s = ClientSession::new(arena());
        s.apply(&Command::BallPosition {
            p: Vec3::new(1.0, 0.0, 0.0),
        });
        s.apply(&Command::EndOfTick);
        s.apply(&Command::BallPosition {
            p: Vec3::new(3.0, 0.0, 0.0),
        });
        s.apply(&Command::EndOfTick);
        s.apply_lerp(0.7);
        let first = s.world().balls[0].p;
        s.apply_lerp(0.7);
        assert_eq!(s.world().balls[0].p, first);
    }

    #[test]
    fn generations_promote_only_at_end_of_tick() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let mut s = ClientSession::new(arena());
        s.apply(&Command::BallPosition { p: a });
        s.apply(&Command::EndOfTick);
        // Two writes inside one tick: only the last one counts, and the
        // previous generation still holds the prior tick.
        s.apply(&Command::BallPosition {
            p: Vec3::new(9.0, 9.0, 9.0),
        });
        s.apply(&Command::BallPosition {
            p: Vec3::new(2.0, 0.0, 0.0),
        });
        s.apply(&Command::EndOfTick);
        s.apply_lerp(0.0);
        assert_eq!(s.world().balls[0].p, a);
        s.apply_lerp(1.0);
        assert_eq!(s.world().balls[0].p, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let mut s = ClientSession::new(arena());
        s.apply(&Command::PickItem { item: 99 });
        s.apply(&Command::SwitchToggle { switch: 99 });
        s.apply(&Command::ChkpToggle { chkp: 99 });
        s.apply(&Command::PathFlag {
            path: 99,
            flag: false,
        });
        s.apply(&Command::MovePath {
            mover: 99,
            path: 0,
        });
        s.apply(&Command::MoveTime { mover: 99, t: 1.0 });
        s.apply(&Command::CurrentBall { ball: 42 });
        s.apply(&Command::EndOfTick);
        assert_eq!(s.world().items[0].kind, ItemKind::Coin);
        assert!(!s.world().switches_on[0]);
        assert!(s.world().path_enabled[0]);
        // The bad CurrentBall left ball 0 selected.
        s.apply(&Command::BallPosition { p: Vec3::ONE });
        s.apply(&Command::EndOfTick);
        s.apply_lerp(1.0);
        assert_eq!(s.world().balls[0].p, Vec3::ONE);
    }

    #[test]
    fn scoreboard_commands_mirror_state() {
        let mut s = ClientSession::new(arena());
        s.apply(&Command::Timer { t: 12.5 });
        s.apply(&Command::Coins { n: 7 });
        s.apply(&Command::Status {
            outcome: Outcome::Fall,
        });
        s.apply(&Command::TickRate { ups: 60 });
        assert_eq!(s.timer(), 12.5);
        assert_eq!(s.coins(), 7);
        assert_eq!(s.status(), Outcome::Fall);
        assert_eq!(s.ups(), 60);
    }

    #[test]
    fn version_mismatch_sets_compat_flag_only() {
        let mut s = ClientSession::new(arena());
        s.apply(&Command::MapIdentity {
            name: "test/arena".to_owned(),
            version: MapVersion::new(2, 0),
        });
        assert!(!s.map_compat());
        // Minor drift is fine.
        s.apply(&Command::MapIdentity {
            name: "test/arena".to_owned(),
            version: MapVersion::new(1, 9),
        });
        assert!(s.map_compat());
        assert_eq!(s.map_name(), "test/arena");
    }

    #[test]
    fn goal_intensity_ramps_after_goal_open() {
        let mut s = ClientSession::new(arena());
        s.apply(&Command::EndOfTick);
        assert_eq!(s.goal_intensity(1.0), 0.0);
        s.apply(&Command::GoalOpen);
        for _ in 0..10 {
            s.apply(&Command::EndOfTick);
        }
        let k = s.goal_intensity(1.0);
        assert!(k > 0.0 && k < 1.0, "k = {k}");
        for _ in 0..200 {
            s.apply(&Command::EndOfTick);
        }
        assert_eq!(s.goal_intensity(1.0), 1.0);
    }

    #[test]
    fn step_simulation_advances_only_enabled_paths() {
        let mut s = ClientSession::new(arena());
        s.apply(&Command::EndOfTick);
        s.apply(&Command::PathFlag {
            path: 0,
            flag: false,
        });
        s.apply(&Command::StepSimulation { dt: 0.5 });
        s.apply(&Command::EndOfTick);
        s.apply_lerp(1.0);
        assert_eq!(s.world().mover_times[0], 0.0);

        s.apply(&Command::PathFlag {
            path: 0,
            flag: true,
        });
        s.apply(&Command::StepSimulation { dt: 0.5 });
        s.apply(&Command::EndOfTick);
        s.apply_lerp(1.0);
        assert_eq!(s.world().mover_times[0], 0.5);
    }

    #[test]
    fn mover_position_rejects_unknown_index() {
        let mut s = ClientSession::new(arena());
        s.apply(&Command::EndOfTick);
        s.apply_lerp(1.0);
        assert!(s.world().mover_position(0).is_some());
        assert_eq!(s.world().mover_position(1), None);
        assert_eq!(s.world().mover_position(usize::MAX), None);
    }
}
