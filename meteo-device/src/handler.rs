//! Protocol dispatch: one request in, one response out, mutating the
//! station. Argument counts and static ranges are enforced by the decoder;
//! capacity-dependent checks come back from the log as structured
//! rejections and turn into same-opcode failures here.

use meteo_core::devlog::LogError;
use meteo_core::protocol::{DecodeError, Opcode, Request, Response, TransferKind};
use meteo_core::sample::TimeOfDay;
use meteo_core::store::NvStore;

use crate::station::{AlarmState, Station};

impl<S: NvStore> Station<S> {
    pub fn handle(&mut self, request: Request) -> Response {
        let opcode = request.opcode();
        match request {
            Request::ReadClock => Response::Clock {
                hour: self.clock.hour,
                minute: self.clock.minute,
                second: self.clock.second,
            },
            Request::SetClock {
                hour,
                minute,
                second,
            } => match self.config.set_clock(&mut self.store, hour, minute) {
                Ok(()) => {
                    self.clock = TimeOfDay::new(hour, minute, second);
                    Response::Ack { opcode }
                }
                Err(e) => store_failure(opcode, &e.into()),
            },
            Request::ReadMeasurements => Response::Measurements {
                temperature: self.current_temperature,
                luminosity: self.current_luminosity,
            },
            Request::ReadParameters => Response::Parameters {
                monitoring_period: self.config.monitoring_period,
                alarm_duration: self.config.alarm_duration,
            },
            Request::SetMonitoringPeriod { seconds } => {
                match self.config.set_monitoring_period(&mut self.store, seconds) {
                    Ok(()) => Response::Ack { opcode },
                    Err(e) => store_failure(opcode, &e.into()),
                }
            }
            Request::SetAlarmDuration { seconds } => {
                match self.config.set_alarm_duration(&mut self.store, seconds) {
                    Ok(()) => Response::Ack { opcode },
                    Err(e) => store_failure(opcode, &e.into()),
                }
            }
            Request::ReadAlarmSettings => Response::AlarmSettings {
                temperature: self.config.alarm_temperature,
                luminosity: self.config.alarm_luminosity,
                enabled: self.config.alarm_enabled,
            },
            Request::SetAlarmThresholds {
                temperature,
                luminosity,
            } => {
                match self
                    .config
                    .set_alarm_thresholds(&mut self.store, temperature, luminosity)
                {
                    Ok(()) => Response::Ack { opcode },
                    Err(e) => store_failure(opcode, &e.into()),
                }
            }
            Request::SetAlarmEnabled { enabled } => {
                match self.config.set_alarm_enabled(&mut self.store, enabled) {
                    Ok(()) => {
                        self.alarm = if enabled {
                            AlarmState::Latched
                        } else {
                            AlarmState::Idle
                        };
                        Response::Ack { opcode }
                    }
                    Err(e) => store_failure(opcode, &e.into()),
                }
            }
            Request::LogInfo => {
                let info = self.log.info();
                Response::LogInfo {
                    capacity: info.capacity,
                    count_valid: info.count_valid,
                    transfer_index: info.transfer_index,
                    write_index: info.write_index,
                }
            }
            Request::TransferCurrent { count } => {
                match self.log.transfer_from_current(&mut self.store, count) {
                    Ok(entries) => Response::Transfer {
                        kind: TransferKind::Current,
                        entries,
                    },
                    Err(e) => log_failure(opcode, &e),
                }
            }
            Request::TransferFromIndex { count, offset } => {
                match self.log.transfer_from_index(&mut self.store, count, offset) {
                    Ok(entries) => Response::Transfer {
                        kind: TransferKind::FromIndex,
                        entries,
                    },
                    Err(e) => log_failure(opcode, &e),
                }
            }
            // Periodic transfers answer under their own response opcode so
            // the host can tell them apart from command-driven transfers,
            // failures included.
            Request::StartPeriodicTransfer => match self.log.drain_pending(&mut self.store) {
                Ok(entries) => Response::Transfer {
                    kind: TransferKind::Periodic,
                    entries,
                },
                Err(e) => log_failure(Opcode::PeriodicTransfer, &e),
            },
        }
    }
}

/// Decode a frame body and answer it. Malformed arguments get the
/// same-opcode failure; frames with no request form are dropped.
pub fn handle_frame<S: NvStore>(station: &mut Station<S>, frame: &[u8]) -> Option<Response> {
    match Request::decode(frame) {
        Ok(request) => Some(station.handle(request)),
        Err(DecodeError::BadArguments { opcode }) => {
            let opcode = if opcode == Opcode::StartPeriodicTransfer {
                Opcode::PeriodicTransfer
            } else {
                opcode
            };
            Some(Response::Failure { opcode })
        }
        Err(e) => {
            tracing::debug!(error = %e, "dropping frame");
            None
        }
    }
}

fn log_failure(opcode: Opcode, err: &LogError) -> Response {
    match err {
        LogError::Store(_) => tracing::warn!(?opcode, error = %err, "store failed during dispatch"),
        _ => tracing::debug!(?opcode, error = %err, "request rejected"),
    }
    Response::Failure { opcode }
}

fn store_failure(opcode: Opcode, err: &LogError) -> Response {
    log_failure(opcode, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteo_core::config::ConfigBlock;
    use meteo_core::sample::Sample;
    use meteo_core::store::MemStore;

    use crate::sensor::Sensor;

    struct FixedSensor(u8, u8);

    impl Sensor for FixedSensor {
        fn read_temperature(&mut self) -> u8 {
            self.0
        }
        fn read_luminosity(&mut self) -> u8 {
            self.1
        }
    }

    fn station() -> Station<MemStore> {
        let (station, _) =
            Station::open(MemStore::for_capacity(30), ConfigBlock::default()).unwrap();
        station
    }

    /// Fill the log with `n` distinct samples without running the clock.
    fn seed(station: &mut Station<MemStore>, n: u8) {
        let mut sensor = FixedSensor(0, 0);
        station
            .config
            .set_monitoring_period(&mut station.store, 1)
            .unwrap();
        for i in 0..n {
            sensor.0 = 10 + i;
            sensor.1 = i % 4;
            station.tick(&mut sensor).unwrap();
        }
    }

    #[test]
    fn set_then_read_clock() {
        let mut st = station();
        let ack = st.handle(Request::SetClock {
            hour: 12,
            minute: 30,
            second: 15,
        });
        assert_eq!(
            ack,
            Response::Ack {
                opcode: Opcode::SetClock
            }
        );
        assert_eq!(
            st.handle(Request::ReadClock),
            Response::Clock {
                hour: 12,
                minute: 30,
                second: 15
            }
        );
    }

    #[test]
    fn parameters_follow_their_setters() {
        let mut st = station();
        st.handle(Request::SetMonitoringPeriod { seconds: 9 });
        st.handle(Request::SetAlarmDuration { seconds: 7 });
        assert_eq!(
            st.handle(Request::ReadParameters),
            Response::Parameters {
                monitoring_period: 9,
                alarm_duration: 7
            }
        );
    }

    #[test]
    fn alarm_settings_roundtrip() {
        let mut st = station();
        st.handle(Request::SetAlarmThresholds {
            temperature: 30,
            luminosity: 1,
        });
        st.handle(Request::SetAlarmEnabled { enabled: true });
        assert_eq!(
            st.handle(Request::ReadAlarmSettings),
            Response::AlarmSettings {
                temperature: 30,
                luminosity: 1,
                enabled: true
            }
        );
        assert_eq!(st.alarm(), AlarmState::Latched);
        st.handle(Request::SetAlarmEnabled { enabled: false });
        assert_eq!(st.alarm(), AlarmState::Idle);
    }

    #[test]
    fn transfer_current_drains_pending() {
        let mut st = station();
        seed(&mut st, 3);
        let resp = st.handle(Request::TransferCurrent { count: 10 });
        match resp {
            Response::Transfer { kind, entries } => {
                assert_eq!(kind, TransferKind::Current);
                assert_eq!(entries.len(), 3);
                assert_eq!(entries[0].temperature, 10);
            }
            other => panic!("unexpected response {other:?}"),
        }
        // Drained: the next transfer is empty.
        assert_eq!(
            st.handle(Request::TransferCurrent { count: 10 }),
            Response::Transfer {
                kind: TransferKind::Current,
                entries: vec![]
            }
        );
    }

    #[test]
    fn transfer_count_above_capacity_fails() {
        let mut st = station();
        assert_eq!(
            st.handle(Request::TransferCurrent { count: 31 }),
            Response::Failure {
                opcode: Opcode::TransferCurrent
            }
        );
    }

    #[test]
    fn transfer_from_index_offset_beyond_valid_fails() {
        let mut st = station();
        seed(&mut st, 2);
        assert_eq!(
            st.handle(Request::TransferFromIndex { count: 1, offset: 2 }),
            Response::Failure {
                opcode: Opcode::TransferFromIndex
            }
        );
    }

    #[test]
    fn periodic_transfer_returns_all_pending() {
        let mut st = station();
        seed(&mut st, 4);
        let resp = st.handle(Request::StartPeriodicTransfer);
        match resp {
            Response::Transfer { kind, entries } => {
                assert_eq!(kind, TransferKind::Periodic);
                assert_eq!(entries.len(), 4);
            }
            other => panic!("unexpected response {other:?}"),
        }
        let info = st.handle(Request::LogInfo);
        match info {
            Response::LogInfo { count_valid, .. } => assert_eq!(count_valid, 4),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn measurements_track_the_latest_sample() {
        let mut st = station();
        seed(&mut st, 2);
        assert_eq!(
            st.handle(Request::ReadMeasurements),
            Response::Measurements {
                temperature: 11,
                luminosity: 1
            }
        );
    }

    #[test]
    fn bad_arguments_get_a_same_opcode_failure() {
        let mut st = station();
        let resp = handle_frame(&mut st, &[Opcode::SetClock.byte(), 24, 0, 0]);
        assert_eq!(
            resp,
            Some(Response::Failure {
                opcode: Opcode::SetClock
            })
        );
    }

    #[test]
    fn unknown_and_notice_frames_are_dropped() {
        let mut st = station();
        assert_eq!(handle_frame(&mut st, &[0x42]), None);
        assert_eq!(handle_frame(&mut st, &[Opcode::HalfFullNotice.byte()]), None);
        assert_eq!(handle_frame(&mut st, &[]), None);
    }

    #[test]
    fn transferred_entries_carry_their_sample_times() {
        let mut st = station();
        seed(&mut st, 1);
        let resp = st.handle(Request::TransferCurrent { count: 1 });
        let Response::Transfer { entries, .. } = resp else {
            panic!("expected transfer");
        };
        let expected = Sample::new(entries[0].time_of_day(), 10, 0);
        assert_eq!(entries[0], expected);
        assert_eq!(entries[0].second, 1, "sampled on the first tick");
    }
}
