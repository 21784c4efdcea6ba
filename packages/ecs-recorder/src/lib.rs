//! Flight recorder: frame delta/keyframe capture, the recording file format
//! and a seeking reader that reconstructs any prior tick.
//!
//! `ecs-core`/`ecs-runtime` know nothing about persistence; this crate is
//! the one place that turns a live [`ecs_runtime::Repository`] into bytes
//! on disk and back. `writer::FlightRecorder` appends frames to an open
//! file, sanitizing dead slots before every chunk copy (§6.1's byte-
//! determinism invariant, P3); `reader::RecordingReader` indexes frame
//! offsets by tick on open and drives `seek_to` by replaying the nearest
//! keyframe followed by successive deltas (§6.2).

pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

pub use config::RecorderConfig;
pub use error::{Error, Result};
pub use format::{FrameKind, GlobalHeader, Sidecar};
pub use reader::{FrameSummary, RecordingReader};
pub use writer::FlightRecorder;
