use std::io::{self, Read, Write};

use glam::Vec3;
use thiserror::Error;
use tiltway_common::{ItemKind, MapVersion, Outcome};
use tracing::trace;

use crate::cmd::{Command, tag};

/// Wire-level decode/encode failure. Unknown tags are not an error,
/// they are skipped; this covers genuinely broken streams.
#[derive(Debug, Error)]
pub enum WireError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("truncated command record")]
    Truncated,
    #[error("string field is not valid utf-8")]
    BadString,
    #[error("command payload too large ({0} bytes)")]
    Oversize(usize),
}

// Little-endian primitives, shared with the replay header.

pub fn put_u8<W: Write>(w: &mut W, v: u8) -> Result<(), WireError> {
    w.write_all(&[v])?;
    Ok(())
}

pub fn put_u32<W: Write>(w: &mut W, v: u32) -> Result<(), WireError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn put_i32<W: Write>(w: &mut W, v: i32) -> Result<(), WireError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn put_f32<W: Write>(w: &mut W, v: f32) -> Result<(), WireError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn put_vec3<W: Write>(w: &mut W, v: Vec3) -> Result<(), WireError> {
    put_f32(w, v.x)?;
    put_f32(w, v.y)?;
    put_f32(w, v.z)
}

/// `u8` length-prefixed UTF-8.
pub fn put_string<W: Write>(w: &mut W, s: &str) -> Result<(), WireError> {
    if s.len() > u8::MAX as usize {
        return Err(WireError::Oversize(s.len()));
    }
    put_u8(w, s.len() as u8)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), WireError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            WireError::Truncated
        } else {
            WireError::Io(e)
        }
    })
}

pub fn get_u8<R: Read>(r: &mut R) -> Result<u8, WireError> {
    let mut b = [0u8; 1];
    fill(r, &mut b)?;
    Ok(b[0])
}

pub fn get_u32<R: Read>(r: &mut R) -> Result<u32, WireError> {
    let mut b = [0u8; 4];
    fill(r, &mut b)?;
    Ok(u32::from_le_bytes(b))
}

pub fn get_i32<R: Read>(r: &mut R) -> Result<i32, WireError> {
    let mut b = [0u8; 4];
    fill(r, &mut b)?;
    Ok(i32::from_le_bytes(b))
}

pub fn get_f32<R: Read>(r: &mut R) -> Result<f32, WireError> {
    let mut b = [0u8; 4];
    fill(r, &mut b)?;
    Ok(f32::from_le_bytes(b))
}

pub fn get_vec3<R: Read>(r: &mut R) -> Result<Vec3, WireError> {
    Ok(Vec3::new(get_f32(r)?, get_f32(r)?, get_f32(r)?))
}

pub fn get_string<R: Read>(r: &mut R) -> Result<String, WireError> {
    let len = get_u8(r)? as usize;
    let mut buf = vec![0u8; len];
    fill(r, &mut buf)?;
    String::from_utf8(buf).map_err(|_| WireError::BadString)
}

/// Encode one command: `u8` tag, `u8` payload length, payload.
///
/// The length byte is what lets an old consumer skip a command it does
/// not know.
pub fn put_cmd<W: Write>(w: &mut W, cmd: &Command) -> Result<(), WireError> {
    let mut payload = Vec::new();
    encode_payload(&mut payload, cmd)?;
    if payload.len() > u8::MAX as usize {
        return Err(WireError::Oversize(payload.len()));
    }
    put_u8(w, cmd.tag())?;
    put_u8(w, payload.len() as u8)?;
    w.write_all(&payload)?;
    Ok(())
}

/// Decode the next command. `Ok(None)` is a clean end of stream (EOF on
/// a record boundary); records with unrecognized tags are skipped.
pub fn get_cmd<R: Read>(r: &mut R) -> Result<Option<Command>, WireError> {
    loop {
        let mut tag_byte = [0u8; 1];
        if r.read(&mut tag_byte)? == 0 {
            return Ok(None);
        }
        let len = get_u8(r)? as usize;
        let mut payload = vec![0u8; len];
        fill(r, &mut payload)?;
        match decode_payload(tag_byte[0], &payload)? {
            Some(cmd) => return Ok(Some(cmd)),
            None => {
                trace!(tag = tag_byte[0], len, "skipping unknown command");
            }
        }
    }
}

fn encode_payload(p: &mut Vec<u8>, cmd: &Command) -> Result<(), WireError> {
    match cmd {
        Command::EndOfTick
        | Command::MakeBall
        | Command::ClearBalls
        | Command::ClearItems
        | Command::GoalOpen
        | Command::JumpEnter
        | Command::JumpExit
        | Command::ChkpDisable => {}
        Command::CurrentBall { ball } => put_u32(p, *ball)?,
        Command::MakeItem { p: pos, kind, value } => {
            put_vec3(p, *pos)?;
            put_i32(p, kind.to_i32())?;
            put_i32(p, *value)?;
        }
        Command::PickItem { item } => put_u32(p, *item)?,
        Command::TiltAngles { x, z } => {
            put_f32(p, *x)?;
            put_f32(p, *z)?;
        }
        Command::TiltAxes { x, z } => {
            put_vec3(p, *x)?;
            put_vec3(p, *z)?;
        }
        Command::Timer { t } => put_f32(p, *t)?,
        Command::Coins { n } => put_i32(p, *n)?,
        Command::Status { outcome } => put_i32(p, outcome.to_i32())?,
        Command::SwitchEnter { switch }
        | Command::SwitchToggle { switch }
        | Command::SwitchExit { switch } => put_u32(p, *switch)?,
        Command::ChkpEnter { chkp } | Command::ChkpToggle { chkp } | Command::ChkpExit { chkp } => {
            put_u32(p, *chkp)?
        }
        Command::BallPosition { p: pos } => put_vec3(p, *pos)?,
        Command::BallBasis { x, y } | Command::BallPendulumBasis { x, y } => {
            put_vec3(p, *x)?;
            put_vec3(p, *y)?;
        }
        Command::BallRadius { r } => put_f32(p, *r)?,
        Command::PathFlag { path, flag } => {
            put_u32(p, *path)?;
            put_u8(p, *flag as u8)?;
        }
        Command::MovePath { mover, path } => {
            put_u32(p, *mover)?;
            put_u32(p, *path)?;
        }
        Command::MoveTime { mover, t } => {
            put_u32(p, *mover)?;
            put_f32(p, *t)?;
        }
        Command::StepSimulation { dt } => put_f32(p, *dt)?,
        Command::MapIdentity { name, version } => {
            put_string(p, name)?;
            put_i32(p, version.major)?;
            put_i32(p, version.minor)?;
        }
        Command::TickRate { ups } => put_u32(p, *ups)?,
    }
    Ok(())
}

fn decode_payload(t: u8, mut p: &[u8]) -> Result<Option<Command>, WireError> {
    let p = &mut p;
    let cmd = match t {
        tag::END_OF_TICK => Command::EndOfTick,
        tag::MAKE_BALL => Command::MakeBall,
        tag::CLEAR_BALLS => Command::ClearBalls,
        tag::CURRENT_BALL => Command::CurrentBall { ball: get_u32(p)? },
        tag::MAKE_ITEM => Command::MakeItem {
            p: get_vec3(p)?,
            kind: ItemKind::from_i32(get_i32(p)?),
            value: get_i32(p)?,
        },
        tag::CLEAR_ITEMS => Command::ClearItems,
        tag::PICK_ITEM => Command::PickItem { item: get_u32(p)? },
        tag::TILT_ANGLES => Command::TiltAngles {
            x: get_f32(p)?,
            z: get_f32(p)?,
        },
        tag::TILT_AXES => Command::TiltAxes {
            x: get_vec3(p)?,
            z: get_vec3(p)?,
        },
        tag::TIMER => Command::Timer { t: get_f32(p)? },
        tag::COINS => Command::Coins { n: get_i32(p)? },
        tag::STATUS => Command::Status {
            outcome: Outcome::from_i32(get_i32(p)?),
        },
        tag::GOAL_OPEN => Command::GoalOpen,
        tag::JUMP_ENTER => Command::JumpEnter,
        tag::JUMP_EXIT => Command::JumpExit,
        tag::SWITCH_ENTER => Command::SwitchEnter { switch: get_u32(p)? },
        tag::SWITCH_TOGGLE => Command::SwitchToggle { switch: get_u32(p)? },
        tag::SWITCH_EXIT => Command::SwitchExit { switch: get_u32(p)? },
        tag::CHKP_ENTER => Command::ChkpEnter { chkp: get_u32(p)? },
        tag::CHKP_TOGGLE => Command::ChkpToggle { chkp: get_u32(p)? },
        tag::CHKP_EXIT => Command::ChkpExit { chkp: get_u32(p)? },
        tag::CHKP_DISABLE => Command::ChkpDisable,
        tag::BALL_POSITION => Command::BallPosition { p: get_vec3(p)? },
        tag::BALL_BASIS => Command::BallBasis {
            x: get_vec3(p)?,
            y: get_vec3(p)?,
        },
        tag::BALL_PEND_BASIS => Command::BallPendulumBasis {
            x: get_vec3(p)?,
            y: get_vec3(p)?,
        },
        tag::BALL_RADIUS => Command::BallRadius { r: get_f32(p)? },
        tag::PATH_FLAG => Command::PathFlag {
            path: get_u32(p)?,
            flag: get_u8(p)? != 0,
        },
        tag::MOVE_PATH => Command::MovePath {
            mover: get_u32(p)?,
            path: get_u32(p)?,
        },
        tag::MOVE_TIME => Command::MoveTime {
            mover: get_u32(p)?,
            t: get_f32(p)?,
        },
        tag::STEP_SIMULATION => Command::StepSimulation { dt: get_f32(p)? },
        tag::MAP_IDENTITY => Command::MapIdentity {
            name: get_string(p)?,
            version: MapVersion::new(get_i32(p)?, get_i32(p)?),
        },
        tag::TICK_RATE => Command::TickRate { ups: get_u32(p)? },
        _ => return Ok(None),
    };
    Ok(Some(cmd))
}
