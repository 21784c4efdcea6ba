//! Error kinds surfaced by the phase scheduler, repository facade and
//! snapshot providers. Wraps `ecs_core::Error` via `#[from]` so a caller
//! working only against this crate never has to reach down to `ecs-core`
//! to match on a storage-level failure.

use thiserror::Error;

use crate::phase::{Permission, Phase};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] ecs_core::Error),

    #[error("write violates phase permission {permission:?} during phase {phase:?}")]
    PermissionViolation { phase: Phase, permission: Permission },

    #[error("phase transition from {from:?} to {to:?} is not forward-only within a frame")]
    InvalidPhaseTransition { from: Phase, to: Phase },

    #[error("singleton type '{0}' was accessed before it was set")]
    SingletonNotSet(String),

    #[error("snapshot pool for '{0}' is exhausted")]
    PoolExhausted(&'static str),

    #[error("repository has already been disposed")]
    Disposed,
}
