//! Recorder configuration, mirroring `ecs_runtime::RuntimeConfig`'s shape:
//! a plain struct with a `Default` impl, no builder.

/// Configuration for a [`crate::writer::FlightRecorder`].
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Write a keyframe every `keyframe_interval` frames (1 means every
    /// frame is a keyframe). Must be at least 1.
    pub keyframe_interval: u32,
    /// Compress each frame's component-chunk payloads with `zstd` level 3.
    /// Off by default: matches the teacher's `FLAG_COMPRESSED` convention
    /// of being an opt-in, not the default, storage/CPU tradeoff.
    pub compress: bool,
    /// Application version string stored in the sidecar metadata block.
    pub app_version: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            keyframe_interval: 60,
            compress: false,
            app_version: String::from("unknown"),
        }
    }
}
