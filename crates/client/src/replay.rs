use std::io::Read;

use tiltway_common::{Lockstep, consts};
use tiltway_proto::Command;
use tiltway_proto::replay::{ReplayError, ReplayHeader, ReplayReader};
use tiltway_proto::wire::WireError;
use tracing::debug;

use crate::session::ClientSession;

/// Plays a recorded command stream against a [`ClientSession`].
///
/// The player runs its own lockstep: wall time accumulates, and each
/// whole tick feeds the session one tick's worth of commands (up to and
/// including `EndOfTick`). The stream's own `TickRate` re-locks the
/// tick length, so a replay recorded at any rate plays back correctly.
pub struct ReplayPlayer<R: Read> {
    reader: ReplayReader<R>,
    lockstep: Lockstep,
    speed: usize,
    done: bool,
}

impl<R: Read> ReplayPlayer<R> {
    pub fn open(r: R) -> Result<ReplayPlayer<R>, ReplayError> {
        let reader = ReplayReader::open(r)?;
        Ok(ReplayPlayer {
            reader,
            lockstep: Lockstep::new(consts::UPS),
            speed: consts::SPEED_NORMAL,
            done: false,
        })
    }

    pub fn header(&self) -> &ReplayHeader {
        self.reader.header()
    }

    pub fn done(&self) -> bool {
        self.done
    }

    /// Interpolation factor for the presentation frame.
    pub fn blend(&self) -> f32 {
        self.lockstep.blend()
    }

    pub fn tick_dt(&self) -> f32 {
        self.lockstep.tick_dt()
    }

    /// Set playback speed by ladder index; out-of-ladder indices clamp.
    pub fn set_speed(&mut self, idx: usize) {
        self.speed = idx.min(consts::SPEED_FACTORS.len() - 1);
        self.lockstep.set_scale(consts::SPEED_FACTORS[self.speed]);
        debug!(factor = consts::SPEED_FACTORS[self.speed], "replay speed");
    }

    pub fn speed_up(&mut self) {
        self.set_speed(self.speed + 1);
    }

    pub fn speed_down(&mut self) {
        self.set_speed(self.speed.saturating_sub(1));
    }

    /// Advance by a frame of wall time. Returns false once the stream
    /// is exhausted.
    pub fn step(
        &mut self,
        frame_dt: f32,
        session: &mut ClientSession,
    ) -> Result<bool, WireError> {
        if self.done {
            return Ok(false);
        }
        let ticks = self.lockstep.accumulate(frame_dt);
        for _ in 0..ticks {
            if !self.run_tick(session)? {
                self.done = true;
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Feed exactly one tick of commands. Returns false at end of
    /// stream.
    pub fn run_tick(&mut self, session: &mut ClientSession) -> Result<bool, WireError> {
        loop {
            let Some(cmd) = self.reader.next_cmd()? else {
                return Ok(false);
            };
            if let Command::TickRate { ups } = &cmd {
                self.lockstep.set_ups(*ups);
            }
            let end = cmd == Command::EndOfTick;
            session.apply(&cmd);
            if end {
                return Ok(true);
            }
        }
    }
}
