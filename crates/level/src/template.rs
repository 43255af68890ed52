use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiltway_common::{ItemKind, MapVersion, smooth};

/// Template validation failure.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("path {path} links to out-of-range path {next}")]
    BadPathLink { path: usize, next: usize },
    #[error("body {body} references out-of-range path {path}")]
    BadBodyPath { body: usize, path: usize },
    #[error("{entity} {index} references out-of-range body {body}")]
    BadEntityBody {
        entity: &'static str,
        index: usize,
        body: usize,
    },
    #[error("switch {switch} targets out-of-range path {path}")]
    BadSwitchTarget { switch: usize, path: usize },
    #[error("template has no ball start")]
    NoBall,
    #[error("template not found: {0}")]
    NotFound(String),
}

/// A waypoint on a motion timeline. A body on this path travels toward
/// [`PathSpec::next`] over [`PathSpec::travel_time`] seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSpec {
    pub p: Vec3,
    /// Body orientation at this waypoint, slerped toward the next.
    pub orientation: Quat,
    pub travel_time: f32,
    pub next: usize,
    /// Initial enable flag; switches may flip it at runtime.
    pub enabled: bool,
    /// Smoothstep easing instead of linear travel.
    pub smooth: bool,
}

impl Default for PathSpec {
    fn default() -> Self {
        PathSpec {
            p: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            travel_time: 1.0,
            next: 0,
            enabled: true,
            smooth: false,
        }
    }
}

/// A rigid body that carries entities. `path` drives translation,
/// `rot_path` drives orientation; they may name the same path.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BodySpec {
    pub path: Option<usize>,
    pub rot_path: Option<usize>,
}

/// Collision halfspace: solid where `n · p < d`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlaneSpec {
    pub n: Vec3,
    pub d: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSpec {
    pub p: Vec3,
    pub kind: ItemKind,
    pub value: i32,
    pub body: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchSpec {
    pub p: Vec3,
    pub r: f32,
    pub body: Option<usize>,
    /// Path whose enable flag this switch drives.
    pub target_path: Option<usize>,
    /// Initial toggle state.
    pub default_on: bool,
    /// Seconds until an off-default toggle reverts; zero means never.
    pub timeout: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSpec {
    pub p: Vec3,
    pub r: f32,
    pub body: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JumpSpec {
    pub p: Vec3,
    /// Teleport destination.
    pub q: Vec3,
    pub r: f32,
    pub body: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChkpSpec {
    pub p: Vec3,
    pub r: f32,
    pub body: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallSpec {
    pub p: Vec3,
    pub r: f32,
}

impl Default for BallSpec {
    fn default() -> Self {
        BallSpec {
            p: Vec3::ZERO,
            r: 0.25,
        }
    }
}

/// How runtime movers map onto the template.
///
/// One mover per distinct body path; a body whose translation and
/// rotation paths coincide shares a single mover for both. The authority
/// and the viewer derive the same layout so mover indices agree on the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoverLayout {
    /// Initial path index of each mover.
    pub mover_paths: Vec<usize>,
    /// `(translation mover, rotation mover)` per body.
    pub body_movers: Vec<(Option<usize>, Option<usize>)>,
}

/// The immutable half of a level, shared read-only by every session.
///
/// All cross-references (path links, body indices, switch targets) are
/// validated by [`TemplateBuilder::finish`], so lookups through a built
/// template cannot go out of range.
#[derive(Debug, Serialize, Deserialize)]
pub struct LevelTemplate {
    name: String,
    version: MapVersion,
    meta: BTreeMap<String, String>,
    pub paths: Vec<PathSpec>,
    pub bodies: Vec<BodySpec>,
    pub planes: Vec<PlaneSpec>,
    pub items: Vec<ItemSpec>,
    pub switches: Vec<SwitchSpec>,
    pub goals: Vec<GoalSpec>,
    pub jumps: Vec<JumpSpec>,
    pub chkps: Vec<ChkpSpec>,
    pub balls: Vec<BallSpec>,
    bounds_min_y: f32,
}

impl LevelTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> MapVersion {
        self.version
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    /// Metadata as a JSON object, for tooling output.
    pub fn meta_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "version": self.version.to_string(),
            "meta": self.meta,
        })
    }

    /// Lowest point of the playable volume; falling this far (plus the
    /// fall margin) ends the session.
    pub fn bounds_min_y(&self) -> f32 {
        self.bounds_min_y
    }

    /// Position along a path timeline, `t` seconds after its waypoint.
    pub fn path_point(&self, path: usize, t: f32) -> Vec3 {
        let a = &self.paths[path];
        let b = &self.paths[a.next];
        let s = if a.travel_time > 0.0 {
            (t / a.travel_time).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let s = if a.smooth { smooth(s) } else { s };
        a.p.lerp(b.p, s)
    }

    /// Orientation along a path timeline.
    pub fn path_orient(&self, path: usize, t: f32) -> Quat {
        let a = &self.paths[path];
        let b = &self.paths[a.next];
        let s = if a.travel_time > 0.0 {
            (t / a.travel_time).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let s = if a.smooth { smooth(s) } else { s };
        a.orientation.slerp(b.orientation, s).normalize()
    }

    pub fn mover_layout(&self) -> MoverLayout {
        let mut mover_paths = Vec::new();
        let mut body_movers = Vec::with_capacity(self.bodies.len());
        for body in &self.bodies {
            let mi = body.path.map(|p| {
                mover_paths.push(p);
                mover_paths.len() - 1
            });
            let mj = match (body.path, body.rot_path) {
                (Some(p), Some(q)) if p == q => mi,
                (_, Some(q)) => {
                    mover_paths.push(q);
                    Some(mover_paths.len() - 1)
                }
                (_, None) => None,
            };
            body_movers.push((mi, mj));
        }
        MoverLayout {
            mover_paths,
            body_movers,
        }
    }

    /// Mover pair of an entity's carrying body, if any.
    pub fn entity_movers(
        &self,
        layout: &MoverLayout,
        body: Option<usize>,
    ) -> (Option<usize>, Option<usize>) {
        body.map_or((None, None), |b| layout.body_movers[b])
    }
}

/// Builds and validates a [`LevelTemplate`].
///
/// Parsing level files is a front-end concern; this is the programmatic
/// interface those front ends (and tests) target.
#[derive(Debug, Default)]
pub struct TemplateBuilder {
    name: String,
    meta: BTreeMap<String, String>,
    paths: Vec<PathSpec>,
    bodies: Vec<BodySpec>,
    planes: Vec<PlaneSpec>,
    items: Vec<ItemSpec>,
    switches: Vec<SwitchSpec>,
    goals: Vec<GoalSpec>,
    jumps: Vec<JumpSpec>,
    chkps: Vec<ChkpSpec>,
    balls: Vec<BallSpec>,
    floor_y: Option<f32>,
}

impl TemplateBuilder {
    pub fn new(name: &str) -> Self {
        TemplateBuilder {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Set a metadata entry. The `version` key is parsed leniently as
    /// `major.minor` at build time.
    pub fn meta(mut self, key: &str, value: &str) -> Self {
        self.meta.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn path(mut self, spec: PathSpec) -> Self {
        self.paths.push(spec);
        self
    }

    pub fn body(mut self, spec: BodySpec) -> Self {
        self.bodies.push(spec);
        self
    }

    pub fn plane(mut self, n: Vec3, d: f32) -> Self {
        self.planes.push(PlaneSpec {
            n: n.normalize(),
            d,
        });
        self
    }

    pub fn item(mut self, spec: ItemSpec) -> Self {
        self.items.push(spec);
        self
    }

    pub fn switch(mut self, spec: SwitchSpec) -> Self {
        self.switches.push(spec);
        self
    }

    pub fn goal(mut self, spec: GoalSpec) -> Self {
        self.goals.push(spec);
        self
    }

    pub fn jump(mut self, spec: JumpSpec) -> Self {
        self.jumps.push(spec);
        self
    }

    pub fn chkp(mut self, spec: ChkpSpec) -> Self {
        self.chkps.push(spec);
        self
    }

    pub fn ball(mut self, spec: BallSpec) -> Self {
        self.balls.push(spec);
        self
    }

    /// Override the computed lowest point of the playable volume.
    pub fn floor(mut self, y: f32) -> Self {
        self.floor_y = Some(y);
        self
    }

    pub fn finish(self) -> Result<LevelTemplate, TemplateError> {
        for (i, p) in self.paths.iter().enumerate() {
            if p.next >= self.paths.len() {
                return Err(TemplateError::BadPathLink {
                    path: i,
                    next: p.next,
                });
            }
        }
        for (i, b) in self.bodies.iter().enumerate() {
            for path in [b.path, b.rot_path].into_iter().flatten() {
                if path >= self.paths.len() {
                    return Err(TemplateError::BadBodyPath { body: i, path });
                }
            }
        }
        self.check_bodies("item", self.items.iter().map(|s| s.body))?;
        self.check_bodies("switch", self.switches.iter().map(|s| s.body))?;
        self.check_bodies("goal", self.goals.iter().map(|s| s.body))?;
        self.check_bodies("jump", self.jumps.iter().map(|s| s.body))?;
        self.check_bodies("checkpoint", self.chkps.iter().map(|s| s.body))?;
        for (i, s) in self.switches.iter().enumerate() {
            if let Some(path) = s.target_path
                && path >= self.paths.len()
            {
                return Err(TemplateError::BadSwitchTarget { switch: i, path });
            }
        }
        if self.balls.is_empty() {
            return Err(TemplateError::NoBall);
        }

        let bounds_min_y = self.floor_y.unwrap_or_else(|| {
            self.balls
                .iter()
                .map(|b| b.p.y)
                .chain(self.items.iter().map(|i| i.p.y))
                .chain(self.goals.iter().map(|g| g.p.y))
                .chain(self.paths.iter().map(|p| p.p.y))
                .fold(f32::INFINITY, f32::min)
        });

        let version = self
            .meta
            .get("version")
            .map(|s| MapVersion::parse_lenient(s))
            .unwrap_or_default();

        Ok(LevelTemplate {
            name: self.name,
            version,
            meta: self.meta,
            paths: self.paths,
            bodies: self.bodies,
            planes: self.planes,
            items: self.items,
            switches: self.switches,
            goals: self.goals,
            jumps: self.jumps,
            chkps: self.chkps,
            balls: self.balls,
            bounds_min_y,
        })
    }

    fn check_bodies(
        &self,
        entity: &'static str,
        bodies: impl Iterator<Item = Option<usize>>,
    ) -> Result<(), TemplateError> {
        for (index, body) in bodies.enumerate() {
            if let Some(body) = body
                && body >= self.bodies.len()
            {
                return Err(TemplateError::BadEntityBody {
                    entity,
                    index,
                    body,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_floor() -> TemplateBuilder {
        TemplateBuilder::new("test/flat")
            .plane(Vec3::Y, 0.0)
            .ball(BallSpec {
                p: Vec3::new(0.0, 0.25, 0.0),
                r: 0.25,
            })
    }

    #[test]
    fn builds_with_version_from_meta() {
        let t = flat_floor().meta("version", "2.3").finish().unwrap();
        assert_eq!(t.version(), MapVersion::new(2, 3));
        assert_eq!(t.name(), "test/flat");
    }

    #[test]
    fn malformed_version_defaults() {
        let t = flat_floor().meta("version", "latest").finish().unwrap();
        assert_eq!(t.version(), MapVersion::default());
    }

    #[test]
    fn missing_ball_is_an_error() {
        let err = TemplateBuilder::new("empty").finish().unwrap_err();
        assert!(matches!(err, TemplateError::NoBall));
    }

    #[test]
    fn dangling_path_link_is_an_error() {
        let err = flat_floor()
            .path(PathSpec {
                next: 7,
                ..Default::default()
            })
            .finish()
            .unwrap_err();
        assert!(matches!(err, TemplateError::BadPathLink { path: 0, next: 7 }));
    }

    #[test]
    fn dangling_entity_body_is_an_error() {
        let err = flat_floor()
            .item(ItemSpec {
                p: Vec3::ZERO,
                kind: ItemKind::Coin,
                value: 1,
                body: Some(3),
            })
            .finish()
            .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::BadEntityBody {
                entity: "item",
                index: 0,
                body: 3,
            }
        ));
    }

    #[test]
    fn path_point_lerps_between_waypoints() {
        let t = flat_floor()
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
            .finish()
            .unwrap();
        assert_eq!(t.path_point(0, 0.0), Vec3::ZERO);
        assert_eq!(t.path_point(0, 1.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(t.path_point(0, 2.0), Vec3::new(4.0, 0.0, 0.0));
        // Time past the waypoint clamps rather than overshooting.
        assert_eq!(t.path_point(0, 5.0), Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn smooth_path_eases_midpoint() {
        let t = flat_floor()
            .path(PathSpec {
                p: Vec3::ZERO,
                travel_time: 1.0,
                next: 1,
                smooth: true,
                ..Default::default()
            })
            .path(PathSpec {
                p: Vec3::new(1.0, 0.0, 0.0),
                travel_time: 1.0,
                next: 0,
                smooth: true,
                ..Default::default()
            })
            .finish()
            .unwrap();
        // Smoothstep is still 0.5 at the midpoint but slower near the ends.
        assert!(t.path_point(0, 0.25).x < 0.25);
        assert_eq!(t.path_point(0, 0.5).x, 0.5);
        assert!(t.path_point(0, 0.75).x > 0.75);
    }

    #[test]
    fn mover_layout_shares_mover_for_coincident_paths() {
        let t = flat_floor()
            .path(PathSpec::default())
            .path(PathSpec {
                next: 1,
                ..Default::default()
            })
            .body(BodySpec {
                path: Some(0),
                rot_path: Some(0),
            })
            .body(BodySpec {
                path: Some(0),
                rot_path: Some(1),
            })
            .body(BodySpec {
                path: None,
                rot_path: None,
            })
            .finish()
            .unwrap();
        let layout = t.mover_layout();
        assert_eq!(layout.body_movers[0], (Some(0), Some(0)));
        assert_eq!(layout.body_movers[1], (Some(1), Some(2)));
        assert_eq!(layout.body_movers[2], (None, None));
        assert_eq!(layout.mover_paths, vec![0, 0, 1]);
    }

    #[test]
    fn floor_override_wins_over_computed_bounds() {
        let t = flat_floor().floor(-10.0).finish().unwrap();
        assert_eq!(t.bounds_min_y(), -10.0);
    }
}
