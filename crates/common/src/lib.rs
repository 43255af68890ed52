//! Shared math and small types for the tiltway engine.
//!
//! Everything here is used by both the authoritative simulation and the
//! viewer, so it must stay free of any role-specific state.

pub mod consts;
pub mod lockstep;
pub mod math;
pub mod types;

pub use lockstep::Lockstep;
pub use math::{Basis, flerp, smooth};
pub use types::{HitTest, ItemKind, MapVersion, Outcome};
