//! Background task: the periodic-transfer timer, the processing thresholds
//! and the commands it answers locally, plus the report printed when a
//! periodic transfer lands.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use meteo_core::aggregate::{summarize, TimeWindow};
use meteo_core::protocol::Request;
use meteo_core::sample::Sample;

use crate::pipeline::{Console, FrontReply, LocalReply, SharedMirror};

/// Commands answered without touching the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCommand {
    CheckTransferPeriod,
    SetTransferPeriod { minutes: u8 },
    CheckThresholds,
    SetThresholds { temperature: u8, luminosity: u8 },
    Aggregate { window: TimeWindow },
}

/// Everything that can land in the background task's inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMsg {
    Local(LocalCommand),
    /// Unsolicited device notice: shorten the polling interval.
    HalfFull,
    /// A periodic transfer was merged into the mirror.
    PeriodicDone { merged: usize },
    PeriodicFailed,
}

struct BackgroundState {
    /// Transfer period in minutes; 0 leaves the timer disarmed.
    period_minutes: u8,
    threshold_temperature: u8,
    threshold_luminosity: u8,
    next_fire: Option<Instant>,
}

impl BackgroundState {
    fn new() -> Self {
        Self {
            period_minutes: 0,
            threshold_temperature: 25,
            threshold_luminosity: 2,
            next_fire: None,
        }
    }

    fn rearm(&mut self, minutes: u8) {
        self.period_minutes = minutes;
        self.next_fire = if minutes == 0 {
            None
        } else {
            Some(Instant::now() + Duration::from_secs(u64::from(minutes) * 60))
        };
    }
}

pub async fn run_background(
    mut inbox: mpsc::Receiver<BackgroundMsg>,
    commands: mpsc::Sender<Request>,
    replies: mpsc::Sender<FrontReply>,
    mirror: SharedMirror,
    console: Console,
) {
    let mut state = BackgroundState::new();
    loop {
        tokio::select! {
            msg = inbox.recv() => {
                let Some(msg) = msg else { break };
                handle(&mut state, msg, &replies, &mirror, &console).await;
            }
            _ = fire_at(state.next_fire) => {
                state.rearm(state.period_minutes);
                debug!("periodic transfer timer fired");
                if commands.send(Request::StartPeriodicTransfer).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("background task stopped");
}

/// Sleep until the deadline, or park forever while the timer is disarmed.
async fn fire_at(at: Option<Instant>) {
    match at {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn handle(
    state: &mut BackgroundState,
    msg: BackgroundMsg,
    replies: &mpsc::Sender<FrontReply>,
    mirror: &SharedMirror,
    console: &Console,
) {
    match msg {
        BackgroundMsg::Local(LocalCommand::CheckTransferPeriod) => {
            let _ = replies
                .send(FrontReply::Local(LocalReply::TransferPeriod {
                    minutes: state.period_minutes,
                }))
                .await;
        }
        BackgroundMsg::Local(LocalCommand::SetTransferPeriod { minutes }) => {
            state.rearm(minutes);
            let _ = replies
                .send(FrontReply::Local(LocalReply::PeriodUpdated))
                .await;
        }
        BackgroundMsg::Local(LocalCommand::CheckThresholds) => {
            let _ = replies
                .send(FrontReply::Local(LocalReply::Thresholds {
                    temperature: state.threshold_temperature,
                    luminosity: state.threshold_luminosity,
                }))
                .await;
        }
        BackgroundMsg::Local(LocalCommand::SetThresholds {
            temperature,
            luminosity,
        }) => {
            state.threshold_temperature = temperature;
            state.threshold_luminosity = luminosity;
            let _ = replies
                .send(FrontReply::Local(LocalReply::ThresholdsUpdated))
                .await;
        }
        BackgroundMsg::Local(LocalCommand::Aggregate { window }) => {
            let result = {
                let mirror = mirror.lock().await;
                summarize(mirror.iter_valid(), &window)
            };
            let _ = replies
                .send(FrontReply::Local(LocalReply::Aggregates(result)))
                .await;
        }
        BackgroundMsg::HalfFull => {
            state.rearm(1);
            let _guard = console.lock().await;
            println!("device log half full: periodic transfer set to 1 minute");
        }
        BackgroundMsg::PeriodicDone { merged } => {
            let flagged: Vec<Sample> = {
                let mut mirror = mirror.lock().await;
                mirror
                    .drain_unread()
                    .into_iter()
                    .filter(|s| {
                        s.temperature > state.threshold_temperature
                            || s.luminosity > state.threshold_luminosity
                    })
                    .collect()
            };
            let _guard = console.lock().await;
            println!(
                "periodic transfer complete: {merged} entries merged, {} above thresholds",
                flagged.len()
            );
            for s in &flagged {
                println!(
                    "  {:02}:{:02}:{:02}  temperature {:3}  luminosity {}",
                    s.hour, s.minute, s.second, s.temperature, s.luminosity
                );
            }
        }
        BackgroundMsg::PeriodicFailed => {
            let _guard = console.lock().await;
            println!("periodic transfer failed");
        }
    }
}
