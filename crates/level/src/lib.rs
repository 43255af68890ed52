//! Level templates for the tiltway engine.
//!
//! A [`template::LevelTemplate`] is the immutable half of a level: path
//! waypoints, entity placements, collision planes, and metadata. Both the
//! authority and the viewer hold the same template behind an `Arc` and
//! never mutate it; everything that moves lives in the per-role world
//! state built on top of it.
//!
//! [`loader::LevelLoader`] builds templates on a worker thread so a
//! running session never blocks on loading.

pub mod loader;
pub mod template;

pub use loader::{LevelLoader, LoadEvent, TemplateSource};
pub use template::{
    BallSpec, BodySpec, ChkpSpec, GoalSpec, ItemSpec, JumpSpec, LevelTemplate, MoverLayout,
    PathSpec, PlaneSpec, SwitchSpec, TemplateBuilder, TemplateError,
};
