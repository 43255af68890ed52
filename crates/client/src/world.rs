use std::sync::Arc;

use glam::Vec3;
use tiltway_common::{Basis, ItemKind};
use tiltway_level::{LevelTemplate, MoverLayout};

/// Presentation state of one ball: what the renderer draws after the
/// interpolation blend is applied.
#[derive(Debug, Clone, Copy)]
pub struct ViewerBall {
    pub p: Vec3,
    pub e: Basis,
    pub pend: Basis,
    pub r: f32,
}

impl Default for ViewerBall {
    fn default() -> Self {
        ViewerBall {
            p: Vec3::ZERO,
            e: Basis::IDENTITY,
            pend: Basis::IDENTITY,
            r: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewerItem {
    pub p: Vec3,
    pub kind: ItemKind,
    pub value: i32,
}

/// The viewer's world: only what rendering needs. No velocities, no
/// collision state; those stay on the authority.
#[derive(Debug)]
pub struct ViewerWorld {
    template: Arc<LevelTemplate>,
    pub(crate) layout: MoverLayout,
    /// Blended mover placement, written by the interpolation apply.
    pub mover_paths: Vec<usize>,
    pub mover_times: Vec<f32>,
    pub path_enabled: Vec<bool>,
    pub items: Vec<ViewerItem>,
    pub switches_on: Vec<bool>,
    pub chkps_active: Vec<bool>,
    pub balls: Vec<ViewerBall>,
}

impl ViewerWorld {
    /// Seed from the template. The session prologue rebuilds balls and
    /// items through commands; everything else starts at template state.
    pub fn new(template: Arc<LevelTemplate>) -> ViewerWorld {
        let layout = template.mover_layout();
        let mover_paths = layout.mover_paths.clone();
        let mover_times = vec![0.0; layout.mover_paths.len()];
        let path_enabled = template.paths.iter().map(|p| p.enabled).collect();
        let items = template
            .items
            .iter()
            .map(|s| ViewerItem {
                p: s.p,
                kind: s.kind,
                value: s.value,
            })
            .collect();
        let switches_on = template.switches.iter().map(|s| s.default_on).collect();
        let chkps_active = vec![false; template.chkps.len()];
        let balls = template
            .balls
            .iter()
            .map(|b| ViewerBall {
                p: b.p,
                r: b.r,
                ..Default::default()
            })
            .collect();
        ViewerWorld {
            template,
            layout,
            mover_paths,
            mover_times,
            path_enabled,
            items,
            switches_on,
            chkps_active,
            balls,
        }
    }

    pub fn template(&self) -> &Arc<LevelTemplate> {
        &self.template
    }

    /// World position of a mover, from the blended placement. `None`
    /// for an index the template never defined.
    pub fn mover_position(&self, mover: usize) -> Option<Vec3> {
        let path = *self.mover_paths.get(mover)?;
        let t = *self.mover_times.get(mover)?;
        Some(self.template.path_point(path, t))
    }
}
