//! Authoritative simulation for the tiltway engine.
//!
//! [`server::ServerSession`] owns the only mutable world in a session.
//! It advances in fixed ticks under a [`Lockstep`] accumulator
//! and mirrors every mutation as a command, so a viewer fed that stream
//! reconstructs the same state without running any physics of its own.
//!
//! # Invariants
//!
//! - A tick is the only unit of progress; partial ticks never mutate
//!   the world.
//! - Identical template, config, and per-tick inputs produce an
//!   identical command stream.
//! - Out-of-range entity indices are ignored, never fatal.

pub mod server;
pub mod step;
pub mod tilt;
pub mod world;

pub use server::{ServerSession, SessionConfig};
pub use tiltway_common::Lockstep;
pub use tilt::Tilt;
pub use world::World;
