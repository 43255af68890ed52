use std::io::{self, Read, Seek, SeekFrom, Write};

use serde::Serialize;
use thiserror::Error;
use tiltway_common::Outcome;
use tracing::debug;

use crate::cmd::Command;
use crate::wire::{
    self, WireError, get_i32, get_string, get_u32, put_i32, put_string, put_u32,
};

pub const REPLAY_MAGIC: u32 = 0x3152_5754; // "TWR1"
pub const REPLAY_VERSION: u32 = 2;
/// Oldest format this reader still accepts.
pub const REPLAY_VERSION_MIN: u32 = 1;

/// Byte offset of the result triple (time, coins, outcome), patched in
/// place when a recording session ends.
const RESULT_OFFSET: u64 = 8;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("not a replay file")]
    BadMagic,
    #[error("replay version {0} is older than the supported minimum {REPLAY_VERSION_MIN}")]
    TooOld(u32),
    #[error("replay version {0} is newer than the supported {REPLAY_VERSION}")]
    TooNew(u32),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Replay file header. Result fields are written as zero/`None` at
/// creation and patched by [`ReplayWriter::set_result`] when the
/// session ends, so an interrupted recording is still readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayHeader {
    /// Elapsed time at finish, in centiseconds.
    pub time_cs: i32,
    pub coins: i32,
    pub outcome: Outcome,
    pub mode: i32,
    pub player: String,
    /// ISO-8601 timestamp of the recording.
    pub date: String,
    /// Screenshot image name.
    pub shot: String,
    /// Level template name.
    pub file: String,
    pub level_time: i32,
    pub level_goal: i32,
    pub score: i32,
    pub balls: i32,
    pub times: i32,
}

/// Writes a replay: header, then the captured command stream.
pub struct ReplayWriter<W: Write + Seek> {
    w: W,
}

impl<W: Write + Seek> ReplayWriter<W> {
    pub fn create(mut w: W, header: &ReplayHeader) -> Result<ReplayWriter<W>, ReplayError> {
        put_u32(&mut w, REPLAY_MAGIC)?;
        put_u32(&mut w, REPLAY_VERSION)?;
        put_i32(&mut w, header.time_cs)?;
        put_i32(&mut w, header.coins)?;
        put_i32(&mut w, header.outcome.to_i32())?;
        put_i32(&mut w, header.mode)?;
        put_string(&mut w, &header.player)?;
        put_string(&mut w, &header.date)?;
        put_string(&mut w, &header.shot)?;
        put_string(&mut w, &header.file)?;
        put_i32(&mut w, header.level_time)?;
        put_i32(&mut w, header.level_goal)?;
        put_i32(&mut w, header.score)?;
        put_i32(&mut w, header.balls)?;
        put_i32(&mut w, header.times)?;
        Ok(ReplayWriter { w })
    }

    /// Append one command to the stream.
    pub fn record(&mut self, cmd: &Command) -> Result<(), WireError> {
        wire::put_cmd(&mut self.w, cmd)
    }

    /// Patch the result triple in the header without disturbing the
    /// stream position.
    pub fn set_result(
        &mut self,
        outcome: Outcome,
        coins: i32,
        time_cs: i32,
    ) -> Result<(), ReplayError> {
        let pos = self.w.stream_position()?;
        self.w.seek(SeekFrom::Start(RESULT_OFFSET))?;
        put_i32(&mut self.w, time_cs)?;
        put_i32(&mut self.w, coins)?;
        put_i32(&mut self.w, outcome.to_i32())?;
        self.w.seek(SeekFrom::Start(pos))?;
        debug!(?outcome, coins, time_cs, "patched replay result");
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), io::Error> {
        self.w.flush()
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

/// Reads a replay: validates the header, then yields the command
/// stream one record at a time.
pub struct ReplayReader<R: Read> {
    r: R,
    header: ReplayHeader,
}

impl<R: Read> ReplayReader<R> {
    pub fn open(mut r: R) -> Result<ReplayReader<R>, ReplayError> {
        if get_u32(&mut r)? != REPLAY_MAGIC {
            return Err(ReplayError::BadMagic);
        }
        let version = get_u32(&mut r)?;
        if version < REPLAY_VERSION_MIN {
            return Err(ReplayError::TooOld(version));
        }
        if version > REPLAY_VERSION {
            return Err(ReplayError::TooNew(version));
        }
        let header = ReplayHeader {
            time_cs: get_i32(&mut r)?,
            coins: get_i32(&mut r)?,
            outcome: Outcome::from_i32(get_i32(&mut r)?),
            mode: get_i32(&mut r)?,
            player: get_string(&mut r)?,
            date: get_string(&mut r)?,
            shot: get_string(&mut r)?,
            file: get_string(&mut r)?,
            level_time: get_i32(&mut r)?,
            level_goal: get_i32(&mut r)?,
            score: get_i32(&mut r)?,
            balls: get_i32(&mut r)?,
            times: get_i32(&mut r)?,
        };
        debug!(file = %header.file, date = %header.date, "opened replay");
        Ok(ReplayReader { r, header })
    }

    pub fn header(&self) -> &ReplayHeader {
        &self.header
    }

    /// Next command, or `None` at a clean end of stream.
    pub fn next_cmd(&mut self) -> Result<Option<Command>, WireError> {
        wire::get_cmd(&mut self.r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> ReplayHeader {
        ReplayHeader {
            mode: 1,
            player: "tester".to_owned(),
            date: "2025-06-01T12:00:00".to_owned(),
            shot: "shot/flat.png".to_owned(),
            file: "test/flat".to_owned(),
            level_time: 6000,
            level_goal: 10,
            balls: 2,
            ..Default::default()
        }
    }

    #[test]
    fn header_round_trip() {
        let mut w = ReplayWriter::create(Cursor::new(Vec::new()), &sample_header()).unwrap();
        w.record(&Command::TickRate { ups: 90 }).unwrap();
        w.record(&Command::EndOfTick).unwrap();
        let buf = w.into_inner().into_inner();

        let mut r = ReplayReader::open(Cursor::new(buf)).unwrap();
        assert_eq!(*r.header(), sample_header());
        assert_eq!(r.next_cmd().unwrap(), Some(Command::TickRate { ups: 90 }));
        assert_eq!(r.next_cmd().unwrap(), Some(Command::EndOfTick));
        assert_eq!(r.next_cmd().unwrap(), None);
    }

    #[test]
    fn set_result_patches_in_place() {
        let mut w = ReplayWriter::create(Cursor::new(Vec::new()), &sample_header()).unwrap();
        w.record(&Command::EndOfTick).unwrap();
        w.set_result(Outcome::Goal, 25, 1234).unwrap();
        // The stream keeps growing after the patch.
        w.record(&Command::EndOfTick).unwrap();
        let buf = w.into_inner().into_inner();

        let mut r = ReplayReader::open(Cursor::new(buf)).unwrap();
        assert_eq!(r.header().outcome, Outcome::Goal);
        assert_eq!(r.header().coins, 25);
        assert_eq!(r.header().time_cs, 1234);
        assert_eq!(r.next_cmd().unwrap(), Some(Command::EndOfTick));
        assert_eq!(r.next_cmd().unwrap(), Some(Command::EndOfTick));
        assert_eq!(r.next_cmd().unwrap(), None);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let buf = vec![0u8; 64];
        assert!(matches!(
            ReplayReader::open(Cursor::new(buf)),
            Err(ReplayError::BadMagic)
        ));
    }

    #[test]
    fn future_version_is_rejected_distinctly() {
        let mut buf = Vec::new();
        put_u32(&mut buf, REPLAY_MAGIC).unwrap();
        put_u32(&mut buf, REPLAY_VERSION + 1).unwrap();
        assert!(matches!(
            ReplayReader::open(Cursor::new(buf)),
            Err(ReplayError::TooNew(_))
        ));
    }

    #[test]
    fn ancient_version_is_rejected_distinctly() {
        let mut buf = Vec::new();
        put_u32(&mut buf, REPLAY_MAGIC).unwrap();
        put_u32(&mut buf, 0).unwrap();
        assert!(matches!(
            ReplayReader::open(Cursor::new(buf)),
            Err(ReplayError::TooOld(0))
        ));
    }

    #[test]
    fn file_backed_replay_survives_reopen() {
        let file = tempfile::tempfile().unwrap();
        let mut w = ReplayWriter::create(file, &sample_header()).unwrap();
        w.record(&Command::Timer { t: 60.0 }).unwrap();
        w.set_result(Outcome::Fall, 3, 500).unwrap();
        w.flush().unwrap();

        let mut file = w.into_inner();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut r = ReplayReader::open(file).unwrap();
        assert_eq!(r.header().outcome, Outcome::Fall);
        assert_eq!(r.next_cmd().unwrap(), Some(Command::Timer { t: 60.0 }));
    }
}
