//! Recorder error type, grounded in the teacher's `EcsDbError`
//! (`ecsdb/src/error.rs`): one `thiserror` enum per crate, `Io`/codec
//! variants carried via `#[from]`, domain variants named after the
//! invariant they guard.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("runtime error: {0}")]
    Runtime(#[from] ecs_runtime::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("bad recording magic")]
    BadMagic,

    #[error("unsupported recording protocol version {0}")]
    UnsupportedVersion(u32),

    #[error("checksum mismatch in recording frame at tick {0}")]
    ChecksumMismatch(u64),

    #[error("truncated recording at byte offset {0}")]
    Truncated(u64),

    #[error("no keyframe at or before tick {0}")]
    NoKeyframeBefore(u64),

    #[error("schema mismatch: recording component ordinal {0} has no counterpart in target repository")]
    SchemaMismatch(u16),
}

pub type Result<T> = std::result::Result<T, Error>;
