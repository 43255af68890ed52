//! Tuning constants shared by the authority and the viewer.

use glam::Vec3;

/// Default simulation updates per second.
pub const UPS: u32 = 90;

/// Gravity while the session is live.
pub const GRAVITY_DN: Vec3 = Vec3::new(0.0, -9.8, 0.0);
/// Gravity after the goal outcome: the ball floats up.
pub const GRAVITY_UP: Vec3 = Vec3::new(0.0, 9.8, 0.0);

/// Seconds for the ball radius to morph between size presets.
pub const GROW_TIME: f32 = 0.5;
/// Size presets relative to the template radius, indexed by size 0/1/2.
pub const SIZE_FACTORS: [f32; 3] = [0.5, 1.0, 1.5];

/// Seconds the ball is held frozen before the jump teleport completes.
pub const JUMP_HOLD: f32 = 0.5;
/// Seconds until a jump pad re-arms after the ball leaves it.
pub const JUMP_ARM: f32 = 1.0;

/// Velocity kept along the contact normal after a bounce.
pub const RESTITUTION: f32 = 0.75;
/// Normal speed at which a bounce reports full intensity.
pub const BOUNCE_REF_SPEED: f32 = 6.0;

/// Distance below the template's lowest point that counts as falling out.
pub const FALL_MARGIN: f32 = 1.75;

/// Maximum tilt angle per axis, in degrees.
pub const ANGLE_BOUND: f32 = 20.0;
/// Seconds for the tilt to close most of the gap to the requested angles.
pub const TILT_RESPONSE: f32 = 0.05;

/// Pickup radius of an item, added to the ball radius.
pub const ITEM_RADIUS: f32 = 0.15;
/// Height of the goal trigger column.
pub const GOAL_HEIGHT: f32 = 3.0;
/// Height of the switch trigger column.
pub const SWITCH_HEIGHT: f32 = 2.0;
/// Height of the jump trigger column.
pub const JUMP_HEIGHT: f32 = 2.0;

/// Playback speed ladder for replays, slowest to fastest.
pub const SPEED_FACTORS: [f32; 9] = [0.0, 0.125, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0];
/// Index of normal speed in [`SPEED_FACTORS`].
pub const SPEED_NORMAL: usize = 4;
