//! Performance benchmarks for the deterministic ECS core.
//!
//! CLI tool for running throughput measurements against the storage,
//! query, event and recorder layers directly (complementing the
//! criterion-driven benches under each crate's `benches/`).

mod benchmarks;
mod cli;
mod utils;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::ChunkCommit { entity_count } => {
            if entity_count == 0 {
                eprintln!("Error: entity_count must be greater than 0");
                std::process::exit(1);
            }
            benchmarks::chunk_commit::run(entity_count);
        }
        Commands::QueryEnumerate { entity_count, match_percent } => {
            if match_percent > 100 {
                eprintln!("Error: match_percent must be between 0 and 100");
                std::process::exit(1);
            }
            benchmarks::query_enumerate::run(entity_count, match_percent);
        }
        Commands::EventPublish { events_per_tick, ticks } => {
            benchmarks::event_publish::run(events_per_tick, ticks);
        }
        Commands::FrameCapture { entity_count, frames, keyframe_interval } => {
            if keyframe_interval == 0 {
                eprintln!("Error: keyframe_interval must be greater than 0");
                std::process::exit(1);
            }
            benchmarks::frame_capture::run(entity_count, frames, keyframe_interval);
        }
        Commands::All => {
            utils::run_all_benchmarks();
        }
    }
}
