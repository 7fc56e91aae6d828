//! Host node daemon: connects to the device, spawns the sender, receiver
//! and background roles, then runs the interactive front end until EOF or
//! quit. All cross-role traffic goes through bounded queues; the mirror log
//! and the console are the only locked resources.

mod background;
mod config;
mod frontend;
mod pipeline;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use meteo_core::mirror::MirrorLog;

use pipeline::{Console, SharedMirror, QUEUE_DEPTH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they do not tear through the interactive prompt.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cfg = config::load();
    info!(device = %cfg.device_addr, "connecting");
    let stream = TcpStream::connect(&cfg.device_addr)
        .await
        .with_context(|| format!("connecting to device at {}", cfg.device_addr))?;
    info!("device link up");
    let (reader, writer) = stream.into_split();

    let mirror: SharedMirror = Arc::new(Mutex::new(MirrorLog::new(cfg.mirror_capacity)));
    let console: Console = Arc::new(Mutex::new(()));

    let (command_tx, command_rx) = mpsc::channel(QUEUE_DEPTH);
    let (reply_tx, reply_rx) = mpsc::channel(QUEUE_DEPTH);
    let (background_tx, background_rx) = mpsc::channel(QUEUE_DEPTH);

    tokio::spawn(pipeline::run_sender(command_rx, writer));
    tokio::spawn(pipeline::run_receiver(
        reader,
        mirror.clone(),
        reply_tx.clone(),
        background_tx.clone(),
    ));
    tokio::spawn(background::run_background(
        background_rx,
        command_tx.clone(),
        reply_tx,
        mirror.clone(),
        console.clone(),
    ));

    frontend::run(
        reply_rx,
        command_tx,
        background_tx,
        mirror,
        console,
        Duration::from_millis(cfg.reply_timeout_ms),
    )
    .await?;

    info!("monitor closed");
    Ok(())
}
