//! Synchronous front end: one textual command per protocol or local
//! operation. Each command drains stale replies, enqueues, then blocks on
//! the reply queue with a bounded timeout; a timeout means "no response"
//! and the in-flight request is left to die quietly.

use std::time::Duration;

use anyhow::anyhow;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use meteo_core::protocol::{Opcode, Request, Response};
use meteo_core::sample::{Sample, TimeOfDay};
use meteo_core::aggregate::TimeWindow;

use crate::background::{BackgroundMsg, LocalCommand};
use crate::pipeline::{Console, FrontReply, LocalReply, SharedMirror};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Device(Request),
    Local(LocalCommand),
    MirrorInfo,
    MirrorList { count: usize, offset: Option<usize> },
    MirrorDelete,
    Help,
    Quit,
}

/// Parse one input line. `Ok(None)` for a blank line; `Err` carries the
/// complaint shown to the user. Arguments are only checked to be numeric
/// and well-counted here; value ranges are the device's business.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, args)) = words.split_first() else {
        return Ok(None);
    };
    let cmd = match (name, args.len()) {
        ("rc", 0) => Command::Device(Request::ReadClock),
        ("sc", 3) => Command::Device(Request::SetClock {
            hour: num(args[0])?,
            minute: num(args[1])?,
            second: num(args[2])?,
        }),
        ("rtl", 0) => Command::Device(Request::ReadMeasurements),
        ("rp", 0) => Command::Device(Request::ReadParameters),
        ("mmp", 1) => Command::Device(Request::SetMonitoringPeriod { seconds: num(args[0])? }),
        ("mta", 1) => Command::Device(Request::SetAlarmDuration { seconds: num(args[0])? }),
        ("ra", 0) => Command::Device(Request::ReadAlarmSettings),
        ("dtl", 2) => Command::Device(Request::SetAlarmThresholds {
            temperature: num(args[0])?,
            luminosity: num(args[1])?,
        }),
        ("aa", 1) => match num(args[0])? {
            0 => Command::Device(Request::SetAlarmEnabled { enabled: false }),
            1 => Command::Device(Request::SetAlarmEnabled { enabled: true }),
            _ => return Err("flag must be 0 or 1".into()),
        },
        ("ir", 0) => Command::Device(Request::LogInfo),
        ("trc", 1) => Command::Device(Request::TransferCurrent { count: num(args[0])? }),
        ("tri", 2) => Command::Device(Request::TransferFromIndex {
            count: num(args[0])?,
            offset: num(args[1])?,
        }),
        ("irl", 0) => Command::MirrorInfo,
        ("lr", 1) => Command::MirrorList {
            count: num_usize(args[0])?,
            offset: None,
        },
        ("lr", 2) => Command::MirrorList {
            count: num_usize(args[0])?,
            offset: Some(num_usize(args[1])?),
        },
        ("dr", 0) => Command::MirrorDelete,
        ("cpt", 0) => Command::Local(LocalCommand::CheckTransferPeriod),
        ("mpt", 1) => Command::Local(LocalCommand::SetTransferPeriod { minutes: num(args[0])? }),
        ("cttl", 0) => Command::Local(LocalCommand::CheckThresholds),
        ("dttl", 2) => Command::Local(LocalCommand::SetThresholds {
            temperature: num(args[0])?,
            luminosity: num(args[1])?,
        }),
        ("pr", 0) => Command::Local(LocalCommand::Aggregate {
            window: TimeWindow::unbounded(),
        }),
        ("pr", 3) => Command::Local(LocalCommand::Aggregate {
            window: TimeWindow::since(time(args, 0)?),
        }),
        ("pr", 6) => Command::Local(LocalCommand::Aggregate {
            window: TimeWindow::between(time(args, 0)?, time(args, 3)?),
        }),
        ("help" | "sos", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => return Err(format!("unknown command or wrong arguments: {name}")),
    };
    Ok(Some(cmd))
}

fn num(word: &str) -> Result<u8, String> {
    word.parse().map_err(|_| format!("not a byte value: {word}"))
}

fn num_usize(word: &str) -> Result<usize, String> {
    word.parse().map_err(|_| format!("not a number: {word}"))
}

fn time(args: &[&str], at: usize) -> Result<TimeOfDay, String> {
    Ok(TimeOfDay::new(num(args[at])?, num(args[at + 1])?, num(args[at + 2])?))
}

fn opcode_label(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::ReadClock => "read clock",
        Opcode::SetClock => "set clock",
        Opcode::ReadMeasurements => "read temperature and luminosity",
        Opcode::ReadParameters => "read parameters",
        Opcode::SetMonitoringPeriod => "modify monitoring period",
        Opcode::SetAlarmDuration => "modify alarm duration",
        Opcode::ReadAlarmSettings => "read alarms",
        Opcode::SetAlarmThresholds => "define alarm thresholds",
        Opcode::SetAlarmEnabled => "activate/deactivate alarms",
        Opcode::LogInfo => "log info",
        Opcode::TransferCurrent => "transfer from current position",
        Opcode::TransferFromIndex => "transfer from index",
        Opcode::HalfFullNotice => "half-full notice",
        Opcode::StartPeriodicTransfer | Opcode::PeriodicTransfer => "periodic transfer",
    }
}

fn entry_line(s: &Sample) -> String {
    format!(
        "  {:02}:{:02}:{:02}  temperature {:3}  luminosity {}",
        s.hour, s.minute, s.second, s.temperature, s.luminosity
    )
}

/// One printable block per reply.
pub fn render(reply: &FrontReply) -> String {
    match reply {
        FrontReply::Device(response) => render_response(response),
        FrontReply::Transferred { kind, merged } => format!(
            "{}: {merged} entries merged into the local mirror",
            opcode_label(kind.opcode())
        ),
        FrontReply::Local(local) => render_local(local),
    }
}

fn render_response(response: &Response) -> String {
    match response {
        Response::Clock {
            hour,
            minute,
            second,
        } => format!("clock: {hour:02}:{minute:02}:{second:02}"),
        Response::Measurements {
            temperature,
            luminosity,
        } => format!("temperature {temperature}, luminosity {luminosity}"),
        Response::Parameters {
            monitoring_period,
            alarm_duration,
        } => format!("monitoring period {monitoring_period} s, alarm duration {alarm_duration} s"),
        Response::AlarmSettings {
            temperature,
            luminosity,
            enabled,
        } => format!(
            "alarm thresholds: temperature {temperature}, luminosity {luminosity}, {}",
            if *enabled { "enabled" } else { "disabled" }
        ),
        Response::LogInfo {
            capacity,
            count_valid,
            transfer_index,
            write_index,
        } => format!(
            "device log: capacity {capacity}, valid {count_valid}, read index {transfer_index}, write index {write_index}"
        ),
        Response::Ack { opcode } => format!("{}: ok", opcode_label(*opcode)),
        Response::Failure { opcode } => format!("{}: error", opcode_label(*opcode)),
        // Transfers and notices are rerouted before they reach the front
        // end; render them anyway rather than panic on a stray one.
        Response::Transfer { kind, entries } => format!(
            "{}: {} entries",
            opcode_label(kind.opcode()),
            entries.len()
        ),
        Response::HalfFullNotice => "half-full notice".to_string(),
    }
}

fn render_local(local: &LocalReply) -> String {
    match local {
        LocalReply::TransferPeriod { minutes: 0 } => "transfer period: disabled".to_string(),
        LocalReply::TransferPeriod { minutes } => format!("transfer period: {minutes} minutes"),
        LocalReply::PeriodUpdated => "transfer period: ok".to_string(),
        LocalReply::Thresholds {
            temperature,
            luminosity,
        } => format!("processing thresholds: temperature {temperature}, luminosity {luminosity}"),
        LocalReply::ThresholdsUpdated => "processing thresholds: ok".to_string(),
        LocalReply::Aggregates(None) => "no entries match the window".to_string(),
        LocalReply::Aggregates(Some(agg)) => format!(
            "{} entries: temperature max {} min {} mean {}; luminosity max {} min {} mean {}",
            agg.matched,
            agg.temperature.max,
            agg.temperature.min,
            agg.temperature.mean,
            agg.luminosity.max,
            agg.luminosity.min,
            agg.luminosity.mean
        ),
    }
}

fn help_text() -> &'static str {
    "commands:\n\
     rc                    read clock\n\
     sc <h> <m> <s>        set clock\n\
     rtl                   read temperature and luminosity\n\
     rp                    read parameters (period, alarm duration)\n\
     mmp <p>               modify monitoring period (seconds, 0 disables)\n\
     mta <t>               modify alarm duration (seconds)\n\
     ra                    read alarms\n\
     dtl <t> <l>           define alarm thresholds\n\
     aa <0|1>              activate/deactivate alarms\n\
     ir                    device log info\n\
     trc <n>               transfer n entries from the read position\n\
     tri <n> <i>           transfer n entries from index i (0 = oldest)\n\
     irl                   local mirror info\n\
     lr <n> [i]            list n mirror entries (from index i, 0 = oldest)\n\
     dr                    delete mirror entries\n\
     cpt                   check transfer period\n\
     mpt <p>               modify transfer period (minutes, 0 disables)\n\
     cttl                  check processing thresholds\n\
     dttl <t> <l>          define processing thresholds\n\
     pr [t1 [t2]]          aggregate over a time window (each t is h m s)\n\
     help                  this list\n\
     quit                  exit\n"
}

pub async fn run(
    mut replies: mpsc::Receiver<FrontReply>,
    commands: mpsc::Sender<Request>,
    background: mpsc::Sender<BackgroundMsg>,
    mirror: SharedMirror,
    console: Console,
    reply_timeout: Duration,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    {
        let _guard = console.lock().await;
        println!("weather station monitor; type help for the command list");
    }
    loop {
        {
            let _guard = console.lock().await;
            print!("cmd> ");
            std::io::Write::flush(&mut std::io::stdout())?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(complaint) => {
                let _guard = console.lock().await;
                println!("invalid command: {complaint}");
                continue;
            }
        };
        match command {
            Command::Quit => break,
            Command::Help => {
                let _guard = console.lock().await;
                print!("{}", help_text());
            }
            Command::MirrorInfo => {
                let info = mirror.lock().await.info();
                let _guard = console.lock().await;
                println!(
                    "local mirror: capacity {}, valid {}, read index {}, write index {}",
                    info.capacity, info.count_valid, info.read_index, info.write_index
                );
            }
            Command::MirrorList { count, offset } => {
                let entries = {
                    let mut mirror = mirror.lock().await;
                    match offset {
                        Some(offset) => mirror.read_from_index(count, offset),
                        None => mirror.read_unread(count),
                    }
                };
                let _guard = console.lock().await;
                for entry in &entries {
                    println!("{}", entry_line(entry));
                }
                println!("{} entries listed from the local mirror", entries.len());
            }
            Command::MirrorDelete => {
                mirror.lock().await.clear();
                let _guard = console.lock().await;
                println!("local mirror cleared");
            }
            Command::Device(request) => {
                drain_stale(&mut replies);
                commands
                    .send(request)
                    .await
                    .map_err(|_| anyhow!("sender task is gone"))?;
                await_and_print(&mut replies, &console, reply_timeout).await;
            }
            Command::Local(local) => {
                drain_stale(&mut replies);
                background
                    .send(BackgroundMsg::Local(local))
                    .await
                    .map_err(|_| anyhow!("background task is gone"))?;
                await_and_print(&mut replies, &console, reply_timeout).await;
            }
        }
    }
    Ok(())
}

/// Throw away replies a prior timed-out command left behind.
fn drain_stale(replies: &mut mpsc::Receiver<FrontReply>) {
    while replies.try_recv().is_ok() {}
}

async fn await_and_print(
    replies: &mut mpsc::Receiver<FrontReply>,
    console: &Console,
    reply_timeout: Duration,
) {
    let line = match tokio::time::timeout(reply_timeout, replies.recv()).await {
        Err(_) => "no response".to_string(),
        Ok(None) => "pipeline closed".to_string(),
        Ok(Some(reply)) => render(&reply),
    };
    let _guard = console.lock().await;
    println!("{line}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteo_core::aggregate::{Aggregates, Stats};
    use meteo_core::protocol::TransferKind;

    #[test]
    fn parse_device_commands() {
        assert_eq!(
            parse("rc").unwrap(),
            Some(Command::Device(Request::ReadClock))
        );
        assert_eq!(
            parse("sc 12 30 15").unwrap(),
            Some(Command::Device(Request::SetClock {
                hour: 12,
                minute: 30,
                second: 15
            }))
        );
        assert_eq!(
            parse("tri 4 2").unwrap(),
            Some(Command::Device(Request::TransferFromIndex {
                count: 4,
                offset: 2
            }))
        );
    }

    #[test]
    fn parse_local_and_mirror_commands() {
        assert_eq!(
            parse("mpt 3").unwrap(),
            Some(Command::Local(LocalCommand::SetTransferPeriod {
                minutes: 3
            }))
        );
        assert_eq!(
            parse("lr 10").unwrap(),
            Some(Command::MirrorList {
                count: 10,
                offset: None
            })
        );
        assert_eq!(
            parse("lr 10 2").unwrap(),
            Some(Command::MirrorList {
                count: 10,
                offset: Some(2)
            })
        );
        assert_eq!(parse("dr").unwrap(), Some(Command::MirrorDelete));
    }

    #[test]
    fn parse_aggregation_windows() {
        assert_eq!(
            parse("pr").unwrap(),
            Some(Command::Local(LocalCommand::Aggregate {
                window: TimeWindow::unbounded()
            }))
        );
        assert_eq!(
            parse("pr 22 0 0").unwrap(),
            Some(Command::Local(LocalCommand::Aggregate {
                window: TimeWindow::since(TimeOfDay::new(22, 0, 0))
            }))
        );
        assert_eq!(
            parse("pr 22 0 0 2 0 0").unwrap(),
            Some(Command::Local(LocalCommand::Aggregate {
                window: TimeWindow::between(TimeOfDay::new(22, 0, 0), TimeOfDay::new(2, 0, 0))
            }))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("sc 12 30").is_err());
        assert!(parse("sc twelve 30 0").is_err());
        assert!(parse("frobnicate").is_err());
        assert!(parse("aa 2").is_err());
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn render_covers_the_common_replies() {
        assert_eq!(
            render(&FrontReply::Device(Response::Clock {
                hour: 9,
                minute: 5,
                second: 0
            })),
            "clock: 09:05:00"
        );
        assert_eq!(
            render(&FrontReply::Device(Response::Failure {
                opcode: Opcode::SetClock
            })),
            "set clock: error"
        );
        assert_eq!(
            render(&FrontReply::Transferred {
                kind: TransferKind::Current,
                merged: 3
            }),
            "transfer from current position: 3 entries merged into the local mirror"
        );
        assert_eq!(
            render(&FrontReply::Local(LocalReply::TransferPeriod { minutes: 0 })),
            "transfer period: disabled"
        );
    }

    #[test]
    fn render_aggregates() {
        let agg = Aggregates {
            matched: 4,
            temperature: Stats {
                min: 18,
                max: 25,
                mean: 21,
            },
            luminosity: Stats {
                min: 0,
                max: 3,
                mean: 1,
            },
        };
        assert_eq!(
            render(&FrontReply::Local(LocalReply::Aggregates(Some(agg)))),
            "4 entries: temperature max 25 min 18 mean 21; luminosity max 3 min 0 mean 1"
        );
        assert_eq!(
            render(&FrontReply::Local(LocalReply::Aggregates(None))),
            "no entries match the window"
        );
    }
}
