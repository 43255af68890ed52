//! Command protocol for the tiltway engine.
//!
//! Every mutation the authority makes to its world is mirrored as a
//! [`cmd::Command`]. The same tagged little-endian encoding serves as
//! the live replication channel and as the replay file body, so a
//! recorded session replays through exactly the code path that consumed
//! it live.
//!
//! # Invariants
//!
//! - Commands form a total order; exactly one `EndOfTick` closes each
//!   simulation tick.
//! - Unknown tags are skipped via the length byte; a stream written by a
//!   newer authority still plays on an older viewer.
//! - Entity indices on the wire are untrusted: consumers bounds-check
//!   and ignore, they never fail.

pub mod cmd;
pub mod queue;
pub mod replay;
pub mod wire;

pub use cmd::Command;
pub use queue::CommandQueue;
pub use replay::{ReplayError, ReplayHeader, ReplayReader, ReplayWriter};
pub use wire::{WireError, get_cmd, put_cmd};
