//! Viewer side of the tiltway engine.
//!
//! A [`session::ClientSession`] never simulates: it applies the
//! authority's command stream to a reduced world and keeps two
//! generations of every dynamic field in a [`lerp::LerpState`], so the
//! renderer can ask for any blend between the last two completed ticks.
//! The same apply path consumes a live queue and a replay file.
//!
//! # Invariants
//!
//! - Generations promote only at `EndOfTick`; `apply(0)` and `apply(1)`
//!   reproduce the previous and current tick exactly.
//! - Malformed or out-of-range commands are ignored, never fatal.

pub mod lerp;
pub mod replay;
pub mod session;
pub mod world;

pub use lerp::LerpState;
pub use replay::ReplayPlayer;
pub use session::ClientSession;
pub use world::ViewerWorld;
