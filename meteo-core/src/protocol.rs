//! Wire protocol: opcodes and the per-command request/response contracts.
//!
//! Stateless per message. Every response leads with the opcode it answers,
//! so an asynchronous receiver can route replies without request ids.

use crate::sample::{Sample, SAMPLE_WIRE_SIZE};

/// Success status byte in set-command responses.
pub const STATUS_OK: u8 = 0x00;
/// Generic failure status byte; answers any malformed or rejected request.
pub const STATUS_ERROR: u8 = 0xFF;

/// Every opcode on the wire, request and response sides combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    ReadClock = 0xC0,
    SetClock = 0xC1,
    ReadMeasurements = 0xC2,
    ReadParameters = 0xC3,
    SetMonitoringPeriod = 0xC4,
    SetAlarmDuration = 0xC5,
    ReadAlarmSettings = 0xC6,
    SetAlarmThresholds = 0xC7,
    SetAlarmEnabled = 0xC8,
    LogInfo = 0xC9,
    TransferCurrent = 0xCA,
    TransferFromIndex = 0xCB,
    /// Unsolicited device-to-host notice; has no request form.
    HalfFullNotice = 0xCC,
    StartPeriodicTransfer = 0xD5,
    /// Response opcode to [`Opcode::StartPeriodicTransfer`], distinct so the
    /// receiver can route periodic transfers away from the front end.
    PeriodicTransfer = 0xD6,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xC0 => Some(Self::ReadClock),
            0xC1 => Some(Self::SetClock),
            0xC2 => Some(Self::ReadMeasurements),
            0xC3 => Some(Self::ReadParameters),
            0xC4 => Some(Self::SetMonitoringPeriod),
            0xC5 => Some(Self::SetAlarmDuration),
            0xC6 => Some(Self::ReadAlarmSettings),
            0xC7 => Some(Self::SetAlarmThresholds),
            0xC8 => Some(Self::SetAlarmEnabled),
            0xC9 => Some(Self::LogInfo),
            0xCA => Some(Self::TransferCurrent),
            0xCB => Some(Self::TransferFromIndex),
            0xCC => Some(Self::HalfFullNotice),
            0xD5 => Some(Self::StartPeriodicTransfer),
            0xD6 => Some(Self::PeriodicTransfer),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// Error decoding a frame body into a request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty frame body")]
    Empty,
    #[error("unknown opcode {opcode:#04x}")]
    UnknownOpcode { opcode: u8 },
    #[error("bad arguments for {opcode:?}")]
    BadArguments { opcode: Opcode },
    #[error("bad payload for {opcode:?}")]
    BadPayload { opcode: Opcode },
    #[error("{opcode:?} has no request form")]
    NotARequest { opcode: Opcode },
    #[error("{opcode:?} has no response form")]
    NotAResponse { opcode: Opcode },
}

/// One variant per request opcode. Decoding enforces the declared argument
/// count and static value ranges; capacity-dependent checks (transfer count
/// and offset) belong to the device log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    ReadClock,
    SetClock { hour: u8, minute: u8, second: u8 },
    ReadMeasurements,
    ReadParameters,
    SetMonitoringPeriod { seconds: u8 },
    SetAlarmDuration { seconds: u8 },
    ReadAlarmSettings,
    SetAlarmThresholds { temperature: u8, luminosity: u8 },
    SetAlarmEnabled { enabled: bool },
    LogInfo,
    TransferCurrent { count: u8 },
    TransferFromIndex { count: u8, offset: u8 },
    StartPeriodicTransfer,
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::ReadClock => Opcode::ReadClock,
            Request::SetClock { .. } => Opcode::SetClock,
            Request::ReadMeasurements => Opcode::ReadMeasurements,
            Request::ReadParameters => Opcode::ReadParameters,
            Request::SetMonitoringPeriod { .. } => Opcode::SetMonitoringPeriod,
            Request::SetAlarmDuration { .. } => Opcode::SetAlarmDuration,
            Request::ReadAlarmSettings => Opcode::ReadAlarmSettings,
            Request::SetAlarmThresholds { .. } => Opcode::SetAlarmThresholds,
            Request::SetAlarmEnabled { .. } => Opcode::SetAlarmEnabled,
            Request::LogInfo => Opcode::LogInfo,
            Request::TransferCurrent { .. } => Opcode::TransferCurrent,
            Request::TransferFromIndex { .. } => Opcode::TransferFromIndex,
            Request::StartPeriodicTransfer => Opcode::StartPeriodicTransfer,
        }
    }

    /// Frame body: opcode byte followed by the argument bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = vec![self.opcode().byte()];
        match *self {
            Request::SetClock {
                hour,
                minute,
                second,
            } => body.extend_from_slice(&[hour, minute, second]),
            Request::SetMonitoringPeriod { seconds } => body.push(seconds),
            Request::SetAlarmDuration { seconds } => body.push(seconds),
            Request::SetAlarmThresholds {
                temperature,
                luminosity,
            } => body.extend_from_slice(&[temperature, luminosity]),
            Request::SetAlarmEnabled { enabled } => body.push(u8::from(enabled)),
            Request::TransferCurrent { count } => body.push(count),
            Request::TransferFromIndex { count, offset } => {
                body.extend_from_slice(&[count, offset])
            }
            Request::ReadClock
            | Request::ReadMeasurements
            | Request::ReadParameters
            | Request::ReadAlarmSettings
            | Request::LogInfo
            | Request::StartPeriodicTransfer => {}
        }
        body
    }

    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let (&op, args) = body.split_first().ok_or(DecodeError::Empty)?;
        let opcode = Opcode::from_byte(op).ok_or(DecodeError::UnknownOpcode { opcode: op })?;
        let bad = DecodeError::BadArguments { opcode };
        match opcode {
            Opcode::ReadClock => args.is_empty().then_some(Request::ReadClock).ok_or(bad),
            Opcode::SetClock => match *args {
                [hour, minute, second] if hour <= 23 && minute <= 59 && second <= 59 => {
                    Ok(Request::SetClock {
                        hour,
                        minute,
                        second,
                    })
                }
                _ => Err(bad),
            },
            Opcode::ReadMeasurements => args
                .is_empty()
                .then_some(Request::ReadMeasurements)
                .ok_or(bad),
            Opcode::ReadParameters => args
                .is_empty()
                .then_some(Request::ReadParameters)
                .ok_or(bad),
            Opcode::SetMonitoringPeriod => match *args {
                [seconds] if seconds <= 99 => Ok(Request::SetMonitoringPeriod { seconds }),
                _ => Err(bad),
            },
            Opcode::SetAlarmDuration => match *args {
                [seconds] if seconds <= 60 => Ok(Request::SetAlarmDuration { seconds }),
                _ => Err(bad),
            },
            Opcode::ReadAlarmSettings => args
                .is_empty()
                .then_some(Request::ReadAlarmSettings)
                .ok_or(bad),
            Opcode::SetAlarmThresholds => match *args {
                [temperature, luminosity] if temperature <= 50 && luminosity <= 3 => {
                    Ok(Request::SetAlarmThresholds {
                        temperature,
                        luminosity,
                    })
                }
                _ => Err(bad),
            },
            Opcode::SetAlarmEnabled => match *args {
                [flag] if flag <= 1 => Ok(Request::SetAlarmEnabled { enabled: flag == 1 }),
                _ => Err(bad),
            },
            Opcode::LogInfo => args.is_empty().then_some(Request::LogInfo).ok_or(bad),
            Opcode::TransferCurrent => match *args {
                [count] => Ok(Request::TransferCurrent { count }),
                _ => Err(bad),
            },
            Opcode::TransferFromIndex => match *args {
                [count, offset] => Ok(Request::TransferFromIndex { count, offset }),
                _ => Err(bad),
            },
            Opcode::StartPeriodicTransfer => args
                .is_empty()
                .then_some(Request::StartPeriodicTransfer)
                .ok_or(bad),
            Opcode::HalfFullNotice | Opcode::PeriodicTransfer => {
                Err(DecodeError::NotARequest { opcode })
            }
        }
    }
}

/// Which transfer command a stream of entries answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Current,
    FromIndex,
    Periodic,
}

impl TransferKind {
    pub fn opcode(self) -> Opcode {
        match self {
            TransferKind::Current => Opcode::TransferCurrent,
            TransferKind::FromIndex => Opcode::TransferFromIndex,
            TransferKind::Periodic => Opcode::PeriodicTransfer,
        }
    }
}

/// One variant per response shape. `Ack`/`Failure` carry the opcode they
/// answer; data responses are tied to their opcode by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Clock {
        hour: u8,
        minute: u8,
        second: u8,
    },
    Measurements {
        temperature: u8,
        luminosity: u8,
    },
    Parameters {
        monitoring_period: u8,
        alarm_duration: u8,
    },
    AlarmSettings {
        temperature: u8,
        luminosity: u8,
        enabled: bool,
    },
    LogInfo {
        capacity: u8,
        count_valid: u8,
        transfer_index: u8,
        write_index: u8,
    },
    Ack {
        opcode: Opcode,
    },
    Failure {
        opcode: Opcode,
    },
    Transfer {
        kind: TransferKind,
        entries: Vec<Sample>,
    },
    HalfFullNotice,
}

impl Response {
    pub fn opcode(&self) -> Opcode {
        match self {
            Response::Clock { .. } => Opcode::ReadClock,
            Response::Measurements { .. } => Opcode::ReadMeasurements,
            Response::Parameters { .. } => Opcode::ReadParameters,
            Response::AlarmSettings { .. } => Opcode::ReadAlarmSettings,
            Response::LogInfo { .. } => Opcode::LogInfo,
            Response::Ack { opcode } | Response::Failure { opcode } => *opcode,
            Response::Transfer { kind, .. } => kind.opcode(),
            Response::HalfFullNotice => Opcode::HalfFullNotice,
        }
    }

    /// Frame body: opcode byte followed by the payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = vec![self.opcode().byte()];
        match self {
            Response::Clock {
                hour,
                minute,
                second,
            } => body.extend_from_slice(&[*hour, *minute, *second]),
            Response::Measurements {
                temperature,
                luminosity,
            } => body.extend_from_slice(&[*temperature, *luminosity]),
            Response::Parameters {
                monitoring_period,
                alarm_duration,
            } => body.extend_from_slice(&[*monitoring_period, *alarm_duration]),
            Response::AlarmSettings {
                temperature,
                luminosity,
                enabled,
            } => body.extend_from_slice(&[*temperature, *luminosity, u8::from(*enabled)]),
            Response::LogInfo {
                capacity,
                count_valid,
                transfer_index,
                write_index,
            } => body.extend_from_slice(&[*capacity, *count_valid, *transfer_index, *write_index]),
            Response::Ack { .. } => body.push(STATUS_OK),
            Response::Failure { .. } => body.push(STATUS_ERROR),
            Response::Transfer { entries, .. } => {
                for entry in entries {
                    body.extend_from_slice(&entry.to_wire());
                }
            }
            Response::HalfFullNotice => {}
        }
        body
    }

    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let (&op, payload) = body.split_first().ok_or(DecodeError::Empty)?;
        let opcode = Opcode::from_byte(op).ok_or(DecodeError::UnknownOpcode { opcode: op })?;
        let bad = DecodeError::BadPayload { opcode };
        if payload == [STATUS_ERROR] {
            return Ok(Response::Failure { opcode });
        }
        match opcode {
            Opcode::ReadClock => match *payload {
                [hour, minute, second] => Ok(Response::Clock {
                    hour,
                    minute,
                    second,
                }),
                _ => Err(bad),
            },
            Opcode::ReadMeasurements => match *payload {
                [temperature, luminosity] => Ok(Response::Measurements {
                    temperature,
                    luminosity,
                }),
                _ => Err(bad),
            },
            Opcode::ReadParameters => match *payload {
                [monitoring_period, alarm_duration] => Ok(Response::Parameters {
                    monitoring_period,
                    alarm_duration,
                }),
                _ => Err(bad),
            },
            Opcode::ReadAlarmSettings => match *payload {
                [temperature, luminosity, flag] => Ok(Response::AlarmSettings {
                    temperature,
                    luminosity,
                    enabled: flag != 0,
                }),
                _ => Err(bad),
            },
            Opcode::LogInfo => match *payload {
                [capacity, count_valid, transfer_index, write_index] => Ok(Response::LogInfo {
                    capacity,
                    count_valid,
                    transfer_index,
                    write_index,
                }),
                _ => Err(bad),
            },
            Opcode::SetClock
            | Opcode::SetMonitoringPeriod
            | Opcode::SetAlarmDuration
            | Opcode::SetAlarmThresholds
            | Opcode::SetAlarmEnabled => match *payload {
                [STATUS_OK] => Ok(Response::Ack { opcode }),
                _ => Err(bad),
            },
            Opcode::TransferCurrent => decode_entries(payload, TransferKind::Current, bad),
            Opcode::TransferFromIndex => decode_entries(payload, TransferKind::FromIndex, bad),
            Opcode::PeriodicTransfer => decode_entries(payload, TransferKind::Periodic, bad),
            Opcode::HalfFullNotice => payload
                .is_empty()
                .then_some(Response::HalfFullNotice)
                .ok_or(bad),
            Opcode::StartPeriodicTransfer => Err(DecodeError::NotAResponse { opcode }),
        }
    }
}

fn decode_entries(
    payload: &[u8],
    kind: TransferKind,
    bad: DecodeError,
) -> Result<Response, DecodeError> {
    if payload.len() % SAMPLE_WIRE_SIZE != 0 {
        return Err(bad);
    }
    let mut entries = Vec::with_capacity(payload.len() / SAMPLE_WIRE_SIZE);
    for chunk in payload.chunks_exact(SAMPLE_WIRE_SIZE) {
        let mut record = [0u8; SAMPLE_WIRE_SIZE];
        record.copy_from_slice(chunk);
        entries.push(Sample::from_wire(&record));
    }
    Ok(Response::Transfer { kind, entries })
}
