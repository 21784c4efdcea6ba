use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chunk commit/decommit throughput over the raw storage layer.
    ChunkCommit {
        /// Entity count to commit sequentially.
        #[arg(short, long, default_value_t = 100_000)]
        entity_count: u32,
    },

    /// Query enumeration throughput over populated entity headers.
    QueryEnumerate {
        /// Entity count to populate before enumerating.
        #[arg(short, long, default_value_t = 100_000)]
        entity_count: u32,

        /// Percentage of entities matching the query mask.
        #[arg(short, long, default_value_t = 100)]
        match_percent: u8,
    },

    /// Event bus publish/swap/consume throughput.
    EventPublish {
        /// Events published per tick.
        #[arg(short, long, default_value_t = 10_000)]
        events_per_tick: usize,

        /// Ticks to simulate.
        #[arg(short, long, default_value_t = 1_000)]
        ticks: usize,
    },

    /// Flight recorder frame-capture throughput.
    FrameCapture {
        /// Entities carrying a component in the recorded repository.
        #[arg(short, long, default_value_t = 50_000)]
        entity_count: u32,

        /// Frames to capture.
        #[arg(short, long, default_value_t = 500)]
        frames: u32,

        /// Keyframe interval.
        #[arg(short, long, default_value_t = 60)]
        keyframe_interval: u32,
    },

    /// Run every benchmark with default parameters.
    All,
}
