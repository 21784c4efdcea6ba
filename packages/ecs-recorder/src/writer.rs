//! Appends frames to an open recording file: the global header once, then
//! one keyframe or delta per call to [`FlightRecorder::capture_frame`], and
//! a trailing length-prefixed sidecar blob on [`FlightRecorder::finish`].
//!
//! Grounded in the teacher's `FileWal` (`ecsdb/src/persistence/file_wal.rs`):
//! a `BufWriter<File>` opened through `OpenOptions`, a fixed-size header
//! written once, manual `to_le_bytes` framing per record rather than a
//! serde-derived wire format. Unlike the WAL this never rotates across
//! files -- one recording is one file, a flight recorder's "record until
//! stopped" shape rather than a log that grows forever.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use ecs_runtime::Repository;

use crate::config::RecorderConfig;
use crate::encode::encode_frame_payload;
use crate::error::Result;
use crate::format::{FrameKind, GlobalHeader, Sidecar, FRAME_FLAG_COMPRESSED, PROTOCOL_VERSION, SIDECAR_MAGIC};

/// Appends frames of a live [`Repository`] to a recording file on disk.
pub struct FlightRecorder {
    file: BufWriter<File>,
    config: RecorderConfig,
    frames_since_keyframe: u32,
    baseline_tick: u64,
    frame_count: u32,
}

impl FlightRecorder {
    /// Creates a new recording file at `path`, writing the global header
    /// and an opening keyframe of `repo`'s current state. Truncates any
    /// existing file at `path`.
    pub fn create(path: impl AsRef<Path>, config: RecorderConfig, repo: &mut Repository) -> Result<Self> {
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
        let mut file = BufWriter::new(file);
        let start_tick = repo.current_tick() as u64;
        file.write_all(&GlobalHeader { protocol_version: PROTOCOL_VERSION, start_tick }.encode())?;

        let mut recorder = Self {
            file,
            config,
            frames_since_keyframe: 0,
            baseline_tick: start_tick,
            frame_count: 0,
        };
        recorder.write_frame(repo, FrameKind::Keyframe)?;
        Ok(recorder)
    }

    /// Captures one frame of `repo`'s current tick: a keyframe every
    /// `keyframe_interval` frames (per [`RecorderConfig`]), a delta against
    /// the last keyframe otherwise.
    pub fn capture_frame(&mut self, repo: &mut Repository) -> Result<()> {
        let kind = if self.frames_since_keyframe >= self.config.keyframe_interval.max(1) {
            FrameKind::Keyframe
        } else {
            FrameKind::Delta
        };
        self.write_frame(repo, kind)
    }

    fn write_frame(&mut self, repo: &mut Repository, kind: FrameKind) -> Result<()> {
        let tick = repo.current_tick() as u64;
        let payload = encode_frame_payload(repo, kind, self.baseline_tick, self.config.compress);
        let flags = if self.config.compress { FRAME_FLAG_COMPRESSED } else { 0 };
        let crc = crc32fast::hash(&payload);

        self.file.write_all(&tick.to_le_bytes())?;
        self.file.write_all(&[kind.to_byte(), flags])?;
        self.file.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.file.write_all(&crc.to_le_bytes())?;
        self.file.write_all(&payload)?;

        self.frame_count += 1;
        match kind {
            FrameKind::Keyframe => {
                self.baseline_tick = tick;
                self.frames_since_keyframe = 0;
            }
            FrameKind::Delta => self.frames_since_keyframe += 1,
        }
        tracing::debug!(tick, frame_count = self.frame_count, ?kind, "frame written to recording");
        Ok(())
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Flushes pending writes and appends the trailing sidecar blob:
    /// `ECSS` magic, bincode-encoded [`Sidecar`], then the blob's own byte
    /// length as a `u32` trailer so a reader can locate it by seeking from
    /// the end of the file without scanning frames first.
    pub fn finish(mut self, wall_clock_millis: u64, tags: Vec<(String, String)>) -> Result<()> {
        let sidecar = Sidecar {
            protocol_version: PROTOCOL_VERSION,
            app_version: self.config.app_version.clone(),
            frame_count: self.frame_count,
            wall_clock_millis,
            tags,
        };
        let encoded = bincode::serialize(&sidecar)?;
        self.file.write_all(&SIDECAR_MAGIC.to_le_bytes())?;
        self.file.write_all(&encoded)?;
        let trailer_len = (4 + encoded.len()) as u32;
        self.file.write_all(&trailer_len.to_le_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecs_runtime::RuntimeConfig;

    #[test]
    fn create_then_capture_then_finish_leaves_a_well_formed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.bin");
        let mut repo = Repository::new(RuntimeConfig::default());

        let mut rec = FlightRecorder::create(&path, RecorderConfig::default(), &mut repo).unwrap();
        repo.tick().unwrap();
        rec.capture_frame(&mut repo).unwrap();
        repo.tick().unwrap();
        rec.capture_frame(&mut repo).unwrap();
        assert_eq!(rec.frame_count(), 3);
        rec.finish(0, vec![("map".to_string(), "arena".to_string())]).unwrap();

        let metadata = std::fs::metadata(&path).unwrap();
        assert!(metadata.len() > crate::format::GLOBAL_HEADER_SIZE as u64);
    }
}
