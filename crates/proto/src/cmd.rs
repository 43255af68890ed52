use glam::Vec3;
use tiltway_common::{ItemKind, MapVersion, Outcome};

/// Wire tags, one per command variant. Values are frozen: replays on
/// disk depend on them. New commands append, nothing is reused.
pub mod tag {
    pub const END_OF_TICK: u8 = 1;
    pub const MAKE_BALL: u8 = 2;
    pub const CLEAR_BALLS: u8 = 3;
    pub const CURRENT_BALL: u8 = 4;
    pub const MAKE_ITEM: u8 = 5;
    pub const CLEAR_ITEMS: u8 = 6;
    pub const PICK_ITEM: u8 = 7;
    pub const TILT_ANGLES: u8 = 8;
    pub const TILT_AXES: u8 = 9;
    pub const TIMER: u8 = 10;
    pub const COINS: u8 = 11;
    pub const STATUS: u8 = 12;
    pub const GOAL_OPEN: u8 = 13;
    pub const JUMP_ENTER: u8 = 14;
    pub const JUMP_EXIT: u8 = 15;
    pub const SWITCH_ENTER: u8 = 16;
    pub const SWITCH_TOGGLE: u8 = 17;
    pub const SWITCH_EXIT: u8 = 18;
    pub const CHKP_ENTER: u8 = 19;
    pub const CHKP_TOGGLE: u8 = 20;
    pub const CHKP_EXIT: u8 = 21;
    pub const CHKP_DISABLE: u8 = 22;
    pub const BALL_POSITION: u8 = 23;
    pub const BALL_BASIS: u8 = 24;
    pub const BALL_PEND_BASIS: u8 = 25;
    pub const BALL_RADIUS: u8 = 26;
    pub const PATH_FLAG: u8 = 27;
    pub const MOVE_PATH: u8 = 28;
    pub const MOVE_TIME: u8 = 29;
    pub const STEP_SIMULATION: u8 = 30;
    pub const MAP_IDENTITY: u8 = 31;
    pub const TICK_RATE: u8 = 32;
}

/// One replicated state mutation.
///
/// The authority emits these; the viewer (live or replay) applies them.
/// Orientation commands carry only two basis axes, the third is derived
/// on receipt.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Tick delimiter; promotes the viewer's interpolation generations.
    EndOfTick,
    MakeBall,
    ClearBalls,
    CurrentBall { ball: u32 },
    MakeItem { p: Vec3, kind: ItemKind, value: i32 },
    ClearItems,
    PickItem { item: u32 },
    TiltAngles { x: f32, z: f32 },
    TiltAxes { x: Vec3, z: Vec3 },
    Timer { t: f32 },
    Coins { n: i32 },
    Status { outcome: Outcome },
    GoalOpen,
    JumpEnter,
    JumpExit,
    SwitchEnter { switch: u32 },
    SwitchToggle { switch: u32 },
    SwitchExit { switch: u32 },
    ChkpEnter { chkp: u32 },
    ChkpToggle { chkp: u32 },
    ChkpExit { chkp: u32 },
    ChkpDisable,
    BallPosition { p: Vec3 },
    BallBasis { x: Vec3, y: Vec3 },
    BallPendulumBasis { x: Vec3, y: Vec3 },
    BallRadius { r: f32 },
    PathFlag { path: u32, flag: bool },
    MovePath { mover: u32, path: u32 },
    MoveTime { mover: u32, t: f32 },
    /// Advance viewer-side movers locally by `dt` instead of shipping
    /// absolute times every tick. Keeps replays small.
    StepSimulation { dt: f32 },
    MapIdentity { name: String, version: MapVersion },
    /// First command of every session; locks the consumer's tick length.
    TickRate { ups: u32 },
}

impl Command {
    pub fn tag(&self) -> u8 {
        match self {
            Command::EndOfTick => tag::END_OF_TICK,
            Command::MakeBall => tag::MAKE_BALL,
            Command::ClearBalls => tag::CLEAR_BALLS,
            Command::CurrentBall { .. } => tag::CURRENT_BALL,
            Command::MakeItem { .. } => tag::MAKE_ITEM,
            Command::ClearItems => tag::CLEAR_ITEMS,
            Command::PickItem { .. } => tag::PICK_ITEM,
            Command::TiltAngles { .. } => tag::TILT_ANGLES,
            Command::TiltAxes { .. } => tag::TILT_AXES,
            Command::Timer { .. } => tag::TIMER,
            Command::Coins { .. } => tag::COINS,
            Command::Status { .. } => tag::STATUS,
            Command::GoalOpen => tag::GOAL_OPEN,
            Command::JumpEnter => tag::JUMP_ENTER,
            Command::JumpExit => tag::JUMP_EXIT,
            Command::SwitchEnter { .. } => tag::SWITCH_ENTER,
            Command::SwitchToggle { .. } => tag::SWITCH_TOGGLE,
            Command::SwitchExit { .. } => tag::SWITCH_EXIT,
            Command::ChkpEnter { .. } => tag::CHKP_ENTER,
            Command::ChkpToggle { .. } => tag::CHKP_TOGGLE,
            Command::ChkpExit { .. } => tag::CHKP_EXIT,
            Command::ChkpDisable => tag::CHKP_DISABLE,
            Command::BallPosition { .. } => tag::BALL_POSITION,
            Command::BallBasis { .. } => tag::BALL_BASIS,
            Command::BallPendulumBasis { .. } => tag::BALL_PEND_BASIS,
            Command::BallRadius { .. } => tag::BALL_RADIUS,
            Command::PathFlag { .. } => tag::PATH_FLAG,
            Command::MovePath { .. } => tag::MOVE_PATH,
            Command::MoveTime { .. } => tag::MOVE_TIME,
            Command::StepSimulation { .. } => tag::STEP_SIMULATION,
            Command::MapIdentity { .. } => tag::MAP_IDENTITY,
            Command::TickRate { .. } => tag::TICK_RATE,
        }
    }
}
