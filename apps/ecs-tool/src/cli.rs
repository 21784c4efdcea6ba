use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a recording's global header, sidecar (if present) and frame list.
    RecordingInfo {
        /// Path to the recording file.
        path: PathBuf,
    },

    /// Seek a recording to a tick and print the reconstructed stats.
    ///
    /// Runs against a bare repository with no component types registered,
    /// so component values themselves aren't printed -- only what's
    /// schema-independent: entity liveness, tick, chunk commit ratio.
    RecordingSeek {
        /// Path to the recording file.
        path: PathBuf,

        /// Tick to reconstruct.
        #[arg(short, long)]
        tick: u64,
    },

    /// List every component/event/singleton ordinal a recording mentions.
    /// Ordinal-only: a recording carries no type names, only a process's
    /// live type registry does.
    RecordingTypes {
        /// Path to the recording file.
        path: PathBuf,
    },
}
