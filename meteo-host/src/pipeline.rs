//! Channel plumbing plus the sender and receiver tasks.
//!
//! Roles communicate only through bounded queues. The mirror log and the
//! console are the only shared resources; both sit behind a lock held for
//! one cursor-consistent operation at a time, never across a queue wait.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use meteo_core::aggregate::Aggregates;
use meteo_core::mirror::MirrorLog;
use meteo_core::protocol::{Opcode, Request, Response, TransferKind};
use meteo_core::wire::{encode_frame, FrameReassembler};

use crate::background::BackgroundMsg;

/// Bound on every pipeline queue.
pub const QUEUE_DEPTH: usize = 32;

pub type SharedMirror = Arc<Mutex<MirrorLog>>;

/// Held while a multi-line report prints so roles do not interleave output.
pub type Console = Arc<Mutex<()>>;

/// What lands on the front end's reply queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontReply {
    /// A device response routed by opcode (everything but transfers).
    Device(Response),
    /// A transfer response already merged into the mirror.
    Transferred { kind: TransferKind, merged: usize },
    /// Answer to a command the background task served locally.
    Local(LocalReply),
}

/// Replies produced without touching the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalReply {
    TransferPeriod { minutes: u8 },
    PeriodUpdated,
    Thresholds { temperature: u8, luminosity: u8 },
    ThresholdsUpdated,
    Aggregates(Option<Aggregates>),
}

/// Drain the outbound queue, one framed write at a time, in submission order.
pub async fn run_sender(mut commands: mpsc::Receiver<Request>, mut writer: OwnedWriteHalf) {
    while let Some(request) = commands.recv().await {
        let frame = encode_frame(&request.encode());
        if let Err(e) = writer.write_all(&frame).await {
            warn!(error = %e, "link write failed, sender stopping");
            break;
        }
    }
    debug!("sender stopped");
}

/// Reassemble frames off the link and route each one: transfers are merged
/// into the mirror before anyone hears about them, periodic results and
/// half-full notices go to the background task, everything else to the
/// front end.
pub async fn run_receiver(
    mut reader: OwnedReadHalf,
    mirror: SharedMirror,
    replies: mpsc::Sender<FrontReply>,
    background: mpsc::Sender<BackgroundMsg>,
) {
    let mut reassembler = FrameReassembler::new();
    let mut buf = [0u8; 1024];
    'link: loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "link read failed");
                break;
            }
        };
        for frame in reassembler.drain(&buf[..n]) {
            let routed = match Response::decode(&frame) {
                Ok(Response::Transfer { kind, entries }) => {
                    let merged = entries.len();
                    mirror.lock().await.merge_all(&entries);
                    match kind {
                        TransferKind::Periodic => background
                            .send(BackgroundMsg::PeriodicDone { merged })
                            .await
                            .is_ok(),
                        TransferKind::Current | TransferKind::FromIndex => replies
                            .send(FrontReply::Transferred { kind, merged })
                            .await
                            .is_ok(),
                    }
                }
                Ok(Response::HalfFullNotice) => {
                    background.send(BackgroundMsg::HalfFull).await.is_ok()
                }
                Ok(Response::Failure { opcode }) if opcode == Opcode::PeriodicTransfer => {
                    background.send(BackgroundMsg::PeriodicFailed).await.is_ok()
                }
                Ok(response) => replies.send(FrontReply::Device(response)).await.is_ok(),
                Err(e) => {
                    debug!(error = %e, "dropping undecodable frame");
                    true
                }
            };
            if !routed {
                break 'link;
            }
        }
    }
    debug!("receiver stopped");
}
