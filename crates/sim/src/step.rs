//! The fixed-tick stepper: integration, contact, movers, switches,
//! size morphing, and trigger-volume tests.
//!
//! Every function that takes a ball index treats an out-of-range index
//! as a no-op. Indices can arrive from outside the process; a bad one
//! must never take the session down.

use glam::Vec3;
use tiltway_common::{HitTest, ItemKind, consts};
use tiltway_proto::Command;
use tracing::trace;

use crate::world::World;

/// Pendulum spring toward world-up, rad/s^2 per radian of deflection.
const PEND_SPRING: f32 = 8.0;
/// Pendulum velocity damping per second.
const PEND_DAMP: f32 = 4.0;

/// Advance one ball by `dt` under gravity `g`: integrate velocity, then
/// position, then resolve plane contact and spin the bases.
///
/// Returns contact intensity in `[0, 1]`, zero when nothing was hit.
pub fn step_ball(world: &mut World, ui: usize, g: Vec3, dt: f32) -> f32 {
    let template = world.template.clone();
    let Some(ball) = world.balls.get_mut(ui) else {
        trace!(ui, "step for out-of-range ball ignored");
        return 0.0;
    };

    ball.v += g * dt;
    ball.p += ball.v * dt;

    let mut intensity: f32 = 0.0;
    let mut contact = None;
    for plane in &template.planes {
        let depth = plane.n.dot(ball.p) - plane.d - ball.r;
        // Shallow penetration only: a ball deeper than its own radius
        // has passed the surface and is left to the fall-out check.
        if depth < 0.0 && -depth < ball.r {
            ball.p -= plane.n * depth;
            let vn = ball.v.dot(plane.n);
            if vn < 0.0 {
                ball.v -= plane.n * (vn * (1.0 + consts::RESTITUTION));
                intensity = intensity.max((-vn / consts::BOUNCE_REF_SPEED).min(1.0));
            }
            contact = Some(plane.n);
        }
    }

    if let Some(n) = contact {
        // Rolling without slipping against the contact plane.
        ball.w = n.cross(ball.v) / ball.r;
    }
    let w = ball.w;
    ball.e.rotate(w, dt);

    // The pendulum seeks world-up against gravity, damped.
    let up = if g.length_squared() > 0.0 {
        -g.normalize()
    } else {
        Vec3::Y
    };
    let swing = ball.pend.y.cross(up);
    ball.pend_w += swing * (PEND_SPRING * dt);
    ball.pend_w *= (1.0 - PEND_DAMP * dt).max(0.0);
    let pw = ball.pend_w;
    ball.pend.rotate(pw, dt);

    intensity
}

/// Advance every mover whose path is enabled. Wrapping onto the next
/// path emits absolute corrections; normal advancement is implied by
/// the per-tick `StepSimulation`.
pub fn move_step(world: &mut World, dt: f32, emit: &mut impl FnMut(Command)) {
    for mi in 0..world.movers.len() {
        let path = world.movers[mi].path;
        if !world.path_enabled[path] {
            continue;
        }
        world.movers[mi].t += dt;
        let travel_time = world.template.paths[path].travel_time;
        if world.movers[mi].t >= travel_time {
            world.movers[mi].t -= travel_time;
            let next = world.template.paths[path].next;
            world.movers[mi].path = next;
            emit(Command::MovePath {
                mover: mi as u32,
                path: next as u32,
            });
            emit(Command::MoveTime {
                mover: mi as u32,
                t: world.movers[mi].t,
            });
        }
    }
}

/// Flip a path's enable flag, replicated.
pub fn set_path_flag(world: &mut World, path: usize, on: bool, emit: &mut impl FnMut(Command)) {
    let Some(flag) = world.path_enabled.get_mut(path) else {
        trace!(path, "flag for out-of-range path ignored");
        return;
    };
    *flag = on;
    emit(Command::PathFlag {
        path: path as u32,
        flag: on,
    });
}

/// Run switch countdowns: a switch held off its default reverts when
/// its timeout expires, toggling its target path back.
pub fn switch_step(world: &mut World, dt: f32, emit: &mut impl FnMut(Command)) {
    for si in 0..world.switches.len() {
        let spec = world.template.switches[si].clone();
        let sw = &mut world.switches[si];
        if spec.timeout > 0.0 && sw.on != spec.default_on {
            sw.t += dt;
            if sw.t >= spec.timeout {
                sw.on = spec.default_on;
                sw.t = 0.0;
                emit(Command::SwitchToggle { switch: si as u32 });
                if let Some(path) = spec.target_path {
                    set_path_flag(world, path, spec.default_on, emit);
                }
            }
        }
    }
}

/// Drive the ball radius toward its size preset. Moves the center
/// vertically by the radius delta so the floor contact point holds.
/// Returns true when the radius changed this tick.
pub fn ball_size_step(world: &mut World, ui: usize, dt: f32) -> bool {
    let Some(ball) = world.balls.get_mut(ui) else {
        return false;
    };
    if ball.r_vel == 0.0 {
        return false;
    }
    let target = ball.sizes[ball.size];
    let mut r = ball.r + ball.r_vel * dt;
    if (ball.r_vel > 0.0 && r >= target) || (ball.r_vel < 0.0 && r <= target) {
        r = target;
        ball.r_vel = 0.0;
    }
    ball.p.y += r - ball.r;
    ball.r = r;
    true
}

/// Move the size index one preset up or down and start the morph.
/// Returns false at the clamp ends or for a bad index.
pub fn set_ball_size(world: &mut World, ui: usize, grow: bool) -> bool {
    let Some(ball) = world.balls.get_mut(ui) else {
        trace!(ui, "size change for out-of-range ball ignored");
        return false;
    };
    let size = if grow {
        (ball.size + 1).min(ball.sizes.len() - 1)
    } else {
        ball.size.saturating_sub(1)
    };
    if size == ball.size {
        return false;
    }
    ball.size = size;
    ball.r_vel = (ball.sizes[size] - ball.r) / consts::GROW_TIME;
    true
}

/// First unconsumed item within pickup range, marked consumed.
pub fn test_items(world: &mut World, ui: usize) -> Option<(usize, ItemKind, i32)> {
    let ball = *world.balls.get(ui)?;
    for i in 0..world.items.len() {
        if world.items[i].kind == ItemKind::None {
            continue;
        }
        let wp = world.entity_world(world.items[i].p, world.items[i].body);
        if (wp - ball.p).length() < consts::ITEM_RADIUS + ball.r {
            let kind = world.items[i].kind;
            let value = world.items[i].value;
            world.items[i].kind = ItemKind::None;
            return Some((i, kind, value));
        }
    }
    None
}

fn column_test(ball_p: Vec3, ball_r: f32, center: Vec3, r: f32, height: f32) -> HitTest {
    let d = Vec3::new(ball_p.x - center.x, 0.0, ball_p.z - center.z).length();
    if ball_p.y < center.y - ball_r || ball_p.y > center.y + height {
        return HitTest::Outside;
    }
    if d + ball_r <= r {
        HitTest::Inside
    } else if d < r + ball_r {
        HitTest::Touch
    } else {
        HitTest::Outside
    }
}

/// Test the ball against every switch column, firing enter/toggle/exit
/// transitions. Returns `Inside` on the tick a switch toggles.
pub fn test_switches(world: &mut World, ui: usize, emit: &mut impl FnMut(Command)) -> HitTest {
    let Some(ball) = world.balls.get(ui).copied() else {
        return HitTest::Outside;
    };
    let mut result = HitTest::Outside;
    for si in 0..world.switches.len() {
        let spec = world.template.switches[si].clone();
        let wp = world.entity_world(spec.p, spec.body);
        let hit = column_test(ball.p, ball.r, wp, spec.r, consts::SWITCH_HEIGHT);
        let was_inside = world.switches[si].inside;
        match hit {
            HitTest::Inside if !was_inside => {
                world.switches[si].inside = true;
                emit(Command::SwitchEnter { switch: si as u32 });
                let on = !world.switches[si].on;
                world.switches[si].on = on;
                world.switches[si].t = 0.0;
                emit(Command::SwitchToggle { switch: si as u32 });
                if let Some(path) = spec.target_path {
                    set_path_flag(world, path, on, emit);
                }
                result = HitTest::Inside;
            }
            HitTest::Inside | HitTest::Touch => {
                if result == HitTest::Outside {
                    result = HitTest::Touch;
                }
            }
            HitTest::Outside if was_inside => {
                world.switches[si].inside = false;
                emit(Command::SwitchExit { switch: si as u32 });
            }
            HitTest::Outside => {}
        }
    }
    result
}

/// Goal column the ball is fully inside of, if any.
pub fn test_goals(world: &World, ui: usize) -> Option<usize> {
    let ball = world.balls.get(ui)?;
    (0..world.template.goals.len()).find(|&gi| {
        let spec = &world.template.goals[gi];
        let wp = world.entity_world(spec.p, spec.body);
        column_test(ball.p, ball.r, wp, spec.r, consts::GOAL_HEIGHT) == HitTest::Inside
    })
}

/// Jump pad test. `Inside` comes with the teleport destination,
/// preserving the ball's offset from the pad center.
pub fn test_jumps(world: &World, ui: usize) -> (HitTest, Vec3) {
    let Some(ball) = world.balls.get(ui) else {
        return (HitTest::Outside, Vec3::ZERO);
    };
    let mut result = (HitTest::Outside, Vec3::ZERO);
    for spec in &world.template.jumps {
        let wp = world.entity_world(spec.p, spec.body);
        match column_test(ball.p, ball.r, wp, spec.r, consts::JUMP_HEIGHT) {
            HitTest::Inside => {
                return (HitTest::Inside, spec.q + (ball.p - wp));
            }
            HitTest::Touch => result = (HitTest::Touch, Vec3::ZERO),
            HitTest::Outside => {}
        }
    }
    result
}

/// Checkpoint test: entering an inactive checkpoint activates it.
/// Returns the lowest-index active checkpoint, the respawn target.
pub fn test_chkps(world: &mut World, ui: usize, emit: &mut impl FnMut(Command)) -> Option<usize> {
    if let Some(ball) = world.balls.get(ui).copied() {
        for ci in 0..world.chkps.len() {
            let spec = world.template.chkps[ci].clone();
            let wp = world.entity_world(spec.p, spec.body);
            let hit = column_test(ball.p, ball.r, wp, spec.r, consts::SWITCH_HEIGHT);
            let was_inside = world.chkps[ci].inside;
            match hit {
                HitTest::Inside | HitTest::Touch if !was_inside => {
                    world.chkps[ci].inside = true;
                    emit(Command::ChkpEnter { chkp: ci as u32 });
                    if !world.chkps[ci].active {
                        world.chkps[ci].active = true;
                        emit(Command::ChkpToggle { chkp: ci as u32 });
                    }
                }
                HitTest::Outside if was_inside => {
                    world.chkps[ci].inside = false;
                    emit(Command::ChkpExit { chkp: ci as u32 });
                }
                _ => {}
            }
        }
    }
    world.chkps.iter().position(|c| c.active)
}
