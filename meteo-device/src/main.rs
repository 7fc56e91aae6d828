//! Sensor node daemon.
//!
//! One `select!` loop owns everything: the 1 Hz tick (clock, sampling,
//! alarm), the listener (a single host link at a time, standing in for the
//! serial line) and the link bytes. Sampling and protocol dispatch never
//! overlap because they run in the same loop.

mod config;
mod handler;
mod sensor;
mod station;
mod store_file;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use meteo_core::config::ConfigBlock;
use meteo_core::protocol::Response;
use meteo_core::store::NvStore;
use meteo_core::wire::{encode_frame, FrameReassembler};

use sensor::{Sensor, SimulatedSensor, StatusDisplay, TraceDisplay};
use station::Station;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut cfg = config::load();
    if cfg.log_capacity < 2 {
        warn!(capacity = cfg.log_capacity, "log capacity too small, using 30");
        cfg.log_capacity = 30;
    }
    info!(store = %cfg.store_path.display(), listen = %cfg.listen_addr, "device starting");

    let store = store_file::FileStore::open(&cfg.store_path)
        .with_context(|| format!("opening store image {}", cfg.store_path.display()))?;
    let defaults = ConfigBlock {
        capacity: cfg.log_capacity,
        ..ConfigBlock::default()
    };
    let (mut station, reset) = Station::open(store, defaults).context("restoring device state")?;
    if reset {
        warn!("persistent block failed validation, reset to defaults");
    } else {
        let clock = station.clock();
        info!(
            hour = clock.hour,
            minute = clock.minute,
            "state restored from store"
        );
    }

    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("binding {}", cfg.listen_addr))?;

    let mut sensor = SimulatedSensor::new();
    let mut display = TraceDisplay::new();
    let mut tick = tokio::time::interval(std::time::Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut link: Option<TcpStream> = None;
    let mut reassembler = FrameReassembler::new();
    let mut buf = [0u8; 256];

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if let Err(e) = run_tick(&mut station, &mut sensor, &mut display, &mut link).await {
                    error!(error = %e, "tick failed");
                }
            }
            accepted = listener.accept(), if link.is_none() => {
                match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "host connected");
                        reassembler = FrameReassembler::new();
                        link = Some(stream);
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
            read = read_link(&mut link, &mut buf) => {
                match read {
                    Ok(0) => {
                        info!("host disconnected");
                        link = None;
                    }
                    Ok(n) => {
                        if let Err(e) =
                            serve_frames(&mut station, &mut reassembler, &buf[..n], &mut link).await
                        {
                            warn!(error = %e, "link write failed");
                            link = None;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "link read failed");
                        link = None;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
    Ok(())
}

/// Read from the link when there is one; park forever otherwise so the
/// select loop ignores this arm.
async fn read_link(link: &mut Option<TcpStream>, buf: &mut [u8]) -> std::io::Result<usize> {
    match link.as_mut() {
        Some(stream) => stream.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn run_tick<S: NvStore>(
    station: &mut Station<S>,
    sensor: &mut dyn Sensor,
    display: &mut dyn StatusDisplay,
    link: &mut Option<TcpStream>,
) -> anyhow::Result<()> {
    let outcome = station.tick(sensor)?;
    display.show(station.display_pattern());
    if outcome.half_full {
        debug!("pending entries reached half capacity");
        if let Some(stream) = link.as_mut() {
            let frame = encode_frame(&Response::HalfFullNotice.encode());
            if stream.write_all(&frame).await.is_err() {
                *link = None;
            }
        }
    }
    Ok(())
}

/// Feed received bytes through the reassembler and answer each complete
/// frame in order: one message in, one message out.
async fn serve_frames<S: NvStore>(
    station: &mut Station<S>,
    reassembler: &mut FrameReassembler,
    bytes: &[u8],
    link: &mut Option<TcpStream>,
) -> std::io::Result<()> {
    for frame in reassembler.drain(bytes) {
        let Some(response) = handler::handle_frame(station, &frame) else {
            continue;
        };
        if let Some(stream) = link.as_mut() {
            stream.write_all(&encode_frame(&response.encode())).await?;
        }
    }
    Ok(())
}
