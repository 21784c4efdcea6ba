//! Binary wiring the repository, tick loop, flight recorder and the
//! inspection API into one running process. Grounded in the teacher's
//! `db-server`: clap-parsed arguments, `tracing-subscriber` initialized
//! once at startup, a multi-threaded tokio runtime, graceful shutdown on
//! Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use ecs_api::{ApiConfig, AppState, Router, Server};
use ecs_recorder::{FlightRecorder, RecorderConfig};
use ecs_runtime::{PublishedView, Repository, RuntimeConfig};
use parking_lot::Mutex;

/// Runs a deterministic ECS simulation core with an inspection/control API.
#[derive(Parser, Debug)]
#[command(name = "ecs-server", version, about)]
struct Args {
    /// Address the inspection API binds to.
    #[arg(long, default_value = "127.0.0.1:7777")]
    bind: SocketAddr,

    /// Simulation tick rate in Hz.
    #[arg(long, default_value_t = 60)]
    tickrate: u32,

    /// Maximum live entity count.
    #[arg(long, default_value_t = 65536)]
    max_entities: u32,

    /// If set, records every tick to this file.
    #[arg(long)]
    record: Option<std::path::PathBuf>,

    /// Keyframe interval when recording.
    #[arg(long, default_value_t = 120)]
    keyframe_interval: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = RuntimeConfig::default();
    config.core.max_entities = args.max_entities;

    let mut repo = Repository::new(config);
    let recorder = match &args.record {
        Some(path) => {
            let rec_config = RecorderConfig { keyframe_interval: args.keyframe_interval, ..Default::default() };
            Some(FlightRecorder::create(path, rec_config, &mut repo)?)
        }
        None => None,
    };

    let replica = Arc::new(Mutex::new(repo.new_like()));

    let mut published_initial = repo.new_like();
    published_initial.sync_from(&repo, None, false, &[]);
    let live = Arc::new(PublishedView::new(published_initial));

    let state = AppState::new(live.clone(), replica, ApiConfig { bind_addr: args.bind, ..Default::default() });
    let router = Router::new(state);
    let server = Server::new(router);

    let tick_interval = std::time::Duration::from_secs_f64(1.0 / args.tickrate.max(1) as f64);
    let tick_handle = tokio::spawn(tick_loop(repo, live, recorder, tick_interval));

    tokio::select! {
        result = server.serve(args.bind) => result.map_err(anyhow::Error::from)?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }

    tick_handle.abort();
    Ok(())
}

/// Owns the live repository exclusively -- nothing else ever gets a
/// mutable reference to it. Every tick, after mutating it, publishes a
/// synced read-only replica for `ecs-api`'s inspection handlers to read
/// lock-free; the live repository itself is never shared.
async fn tick_loop(
    mut repo: Repository,
    live: Arc<PublishedView>,
    mut recorder: Option<FlightRecorder>,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(err) = repo.tick() {
            tracing::warn!(error = %err, "tick failed");
            continue;
        }
        if let Some(rec) = recorder.as_mut() {
            if let Err(err) = rec.capture_frame(&mut repo) {
                tracing::warn!(error = %err, "frame capture failed");
            }
        }
        let mut view = repo.new_like();
        view.sync_from(&repo, None, false, &[]);
        live.publish(view);
    }
}
