use std::sync::Arc;

use glam::{Quat, Vec3};
use tiltway_common::{Basis, ItemKind, consts};
use tiltway_level::{LevelTemplate, MoverLayout};

/// Runtime state of one motion timeline: which path segment a body is
/// on and how far along it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mover {
    pub path: usize,
    pub t: f32,
}

/// The rolling ball. `e` is the rolling body basis, `pend`/`pend_w`
/// the pendulum sub-body that swings inside it.
#[derive(Debug, Clone, Copy)]
pub struct Ball {
    pub p: Vec3,
    pub v: Vec3,
    pub w: Vec3,
    pub e: Basis,
    pub pend: Basis,
    pub pend_w: Vec3,
    pub r: f32,
    /// Radius change per second while morphing between sizes.
    pub r_vel: f32,
    pub sizes: [f32; 3],
    pub size: usize,
}

impl Ball {
    pub fn new(p: Vec3, r: f32) -> Ball {
        Ball {
            p,
            v: Vec3::ZERO,
            w: Vec3::ZERO,
            e: Basis::IDENTITY,
            pend: Basis::IDENTITY,
            pend_w: Vec3::ZERO,
            r,
            r_vel: 0.0,
            sizes: consts::SIZE_FACTORS.map(|f| f * r),
            size: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub p: Vec3,
    pub kind: ItemKind,
    pub value: i32,
    pub body: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct Switch {
    pub on: bool,
    pub inside: bool,
    pub t: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Chkp {
    pub active: bool,
    pub inside: bool,
}

/// Mutable world state of the authority, built over a shared template.
///
/// Arrays only ever grow through their create commands and shrink
/// through their clear commands; indices handed out stay stable for the
/// life of the session.
#[derive(Debug)]
pub struct World {
    pub(crate) template: Arc<LevelTemplate>,
    pub(crate) layout: MoverLayout,
    pub movers: Vec<Mover>,
    pub path_enabled: Vec<bool>,
    pub items: Vec<Item>,
    pub switches: Vec<Switch>,
    pub chkps: Vec<Chkp>,
    pub balls: Vec<Ball>,
}

impl World {
    pub fn new(template: Arc<LevelTemplate>) -> World {
        let layout = template.mover_layout();
        let movers = layout
            .mover_paths
            .iter()
            .map(|&path| Mover { path, t: 0.0 })
            .collect();
        let path_enabled = template.paths.iter().map(|p| p.enabled).collect();
        let items = template
            .items
            .iter()
            .map(|s| Item {
                p: s.p,
                kind: s.kind,
                value: s.value,
                body: s.body,
            })
            .collect();
        let switches = template
            .switches
            .iter()
            .map(|s| Switch {
                on: s.default_on,
                inside: false,
                t: 0.0,
            })
            .collect();
        let chkps = vec![Chkp::default(); template.chkps.len()];
        let balls = template.balls.iter().map(|b| Ball::new(b.p, b.r)).collect();
        World {
            template,
            layout,
            movers,
            path_enabled,
            items,
            switches,
            chkps,
            balls,
        }
    }

    pub fn template(&self) -> &Arc<LevelTemplate> {
        &self.template
    }

    /// World translation contributed by a mover, zero when unbound.
    pub fn mover_translation(&self, mi: Option<usize>) -> Vec3 {
        mi.map_or(Vec3::ZERO, |i| {
            let m = &self.movers[i];
            self.template.path_point(m.path, m.t)
        })
    }

    /// World rotation contributed by a mover, identity when unbound.
    pub fn mover_rotation(&self, mj: Option<usize>) -> Quat {
        mj.map_or(Quat::IDENTITY, |j| {
            let m = &self.movers[j];
            self.template.path_orient(m.path, m.t)
        })
    }

    /// Mover pair of an entity's carrying body.
    pub fn entity_movers(&self, body: Option<usize>) -> (Option<usize>, Option<usize>) {
        self.template.entity_movers(&self.layout, body)
    }

    /// World position of an entity local point carried by `body`.
    pub fn entity_world(&self, local: Vec3, body: Option<usize>) -> Vec3 {
        let (mi, mj) = self.entity_movers(body);
        self.mover_rotation(mj) * local + self.mover_translation(mi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use tiltway_level::{BallSpec, BodySpec, ItemSpec, PathSpec, TemplateBuilder};

    fn moving_floor() -> Arc<LevelTemplate> {
        Arc::new(
            TemplateBuilder::new("test/moving")
                .plane(Vec3::Y, 0.0)
                .path(PathSpec {
                    p: Vec3::ZERO,
                    travel_time: 2.0,
                    next: 1,
                    ..Default::default()
                })
                .path(PathSpec {
                    p: Vec3::new(4.0, 0.0, 0.0),
                    travel_time: 2.0,
                    next: 0,
                    ..Default::default()
                })
                .body(BodySpec {
                    path: Some(0),
                    rot_path: None,
                })
                .item(ItemSpec {
                    p: Vec3::new(0.0, 0.5, 0.0),
                    kind: tiltway_common::ItemKind::Coin,
                    value: 1,
                    body: Some(0),
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
    fn world_mirrors_template_counts() {
        let w = World::new(moving_floor());
        assert_eq!(w.movers.len(), 1);
        assert_eq!(w.items.len(), 1);
        assert_eq!(w.balls.len(), 1);
        assert_eq!(w.path_enabled, vec![true, true]);
    }

    #[test]
    fn carried_item_follows_its_mover() {
        let mut w = World::new(moving_floor());
        let item_p = w.items[0].p;
        let at_start = w.entity_world(item_p, w.items[0].body);
        w.movers[0].t = 1.0;
        let mid = w.entity_world(item_p, w.items[0].body);
        assert_eq!(at_start, Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(mid, Vec3::new(2.0, 0.5, 0.0));
    }

    #[test]
    fn unbound_entity_stays_put() {
        let w = World::new(moving_floor());
        assert_eq!(w.entity_world(Vec3::ONE, None), Vec3::ONE);
    }

    #[test]
    fn ball_sizes_scale_from_template_radius() {
        let w = World::new(moving_floor());
        let b = &w.balls[0];
        assert_eq!(b.sizes, [0.125, 0.25, 0.375]);
        assert_eq!(b.size, 1);
        assert_eq!(b.r, 0.25);
    }
}
