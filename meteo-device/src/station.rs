//! Device node state: the config block, the circular log, the clock, the
//! latest measurements and the alarm, all owned by one value. Protocol
//! dispatch and the sampling tick both run in the daemon's single loop, so
//! they are mutually exclusive over the log cursors by construction.

use meteo_core::config::{ConfigBlock, Restore};
use meteo_core::devlog::{Append, DeviceLog, LogError};
use meteo_core::sample::{Sample, TimeOfDay, LUMINOSITY_MAX};
use meteo_core::store::{NvStore, StoreError};

use crate::sensor::Sensor;

/// Alarm signal progression: idle until a threshold breach, signaling for
/// the configured duration, then latched until explicitly disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    Signaling { remaining: u8 },
    Latched,
}

/// Events a tick can raise for the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// The pending count just reached half the capacity; the unsolicited
    /// notice must go out.
    pub half_full: bool,
}

pub struct Station<S: NvStore> {
    pub(crate) store: S,
    pub(crate) config: ConfigBlock,
    pub(crate) log: DeviceLog,
    pub(crate) clock: TimeOfDay,
    pub(crate) current_temperature: u8,
    pub(crate) current_luminosity: u8,
    pub(crate) alarm: AlarmState,
    heartbeat: bool,
}

impl<S: NvStore> Station<S> {
    /// Restore config and log from the store, or reset both to `defaults`
    /// when the persisted block fails validation. The second value reports
    /// whether a reset happened.
    pub fn open(mut store: S, defaults: ConfigBlock) -> Result<(Self, bool), StoreError> {
        let (config, reset) = match ConfigBlock::restore(&mut store, defaults)? {
            Restore::Restored(c) => (c, false),
            Restore::Reset(c) => (c, true),
        };
        let log = if reset {
            let log = DeviceLog::fresh(config.capacity);
            log.persist_all(&mut store)?;
            log
        } else {
            DeviceLog::restore(&store, config.capacity)?
        };
        let alarm = if config.alarm_enabled {
            AlarmState::Latched
        } else {
            AlarmState::Idle
        };
        let clock = TimeOfDay::new(config.clock_hours, config.clock_minutes, 0);
        Ok((
            Self {
                store,
                config,
                log,
                clock,
                current_temperature: 0,
                current_luminosity: 0,
                alarm,
                heartbeat: false,
            },
            reset,
        ))
    }

    pub fn clock(&self) -> TimeOfDay {
        self.clock
    }

    pub fn alarm(&self) -> AlarmState {
        self.alarm
    }

    /// One second of device time: advance the clock, sample when the
    /// monitoring period says so, run the alarm countdown.
    pub fn tick(&mut self, sensor: &mut dyn Sensor) -> Result<TickOutcome, LogError> {
        self.heartbeat = !self.heartbeat;
        self.advance_clock()?;

        // Countdown runs before sampling so a fresh trigger signals for the
        // full configured duration.
        if let AlarmState::Signaling { remaining } = self.alarm {
            let remaining = remaining.saturating_sub(1);
            self.alarm = if remaining == 0 {
                AlarmState::Latched
            } else {
                AlarmState::Signaling { remaining }
            };
        }

        let mut outcome = TickOutcome::default();
        let period = self.config.monitoring_period;
        if period != 0 && self.clock.second % period == 0 {
            let temperature = sensor.read_temperature();
            let luminosity = sensor.read_luminosity().min(LUMINOSITY_MAX);
            self.current_temperature = temperature;
            self.current_luminosity = luminosity;

            if self.alarm == AlarmState::Idle
                && (temperature > self.config.alarm_temperature
                    || luminosity > self.config.alarm_luminosity)
            {
                self.alarm = AlarmState::Signaling {
                    remaining: self.config.alarm_duration,
                };
                self.config.set_alarm_enabled(&mut self.store, true)?;
            }

            let sample = Sample::new(self.clock, temperature, luminosity);
            if let Append::Stored { half_full } = self.log.append(&mut self.store, sample)? {
                outcome.half_full = half_full;
            }
        }

        Ok(outcome)
    }

    /// 4-bit status pattern: luminosity level in the low two bits, alarm in
    /// bit 2, heartbeat in bit 3.
    pub fn display_pattern(&self) -> u8 {
        let mut pattern = self.current_luminosity & 0b0011;
        if self.alarm != AlarmState::Idle {
            pattern |= 0b0100;
        }
        if self.heartbeat {
            pattern |= 0b1000;
        }
        pattern
    }

    fn advance_clock(&mut self) -> Result<(), StoreError> {
        self.clock.second += 1;
        if self.clock.second == 60 {
            self.clock.second = 0;
            self.clock.minute += 1;
            if self.clock.minute == 60 {
                self.clock.minute = 0;
                self.clock.hour = (self.clock.hour + 1) % 24;
            }
            // Hours and minutes persist on rollover; seconds never do.
            let (hour, minute) = (self.clock.hour, self.clock.minute);
            self.config.set_clock(&mut self.store, hour, minute)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteo_core::store::{layout, MemStore};

    struct FixedSensor {
        temperature: u8,
        luminosity: u8,
    }

    impl Sensor for FixedSensor {
        fn read_temperature(&mut self) -> u8 {
            self.temperature
        }
        fn read_luminosity(&mut self) -> u8 {
            self.luminosity
        }
    }

    fn station() -> Station<MemStore> {
        let store = MemStore::for_capacity(30);
        let (station, reset) = Station::open(store, ConfigBlock::default()).unwrap();
        assert!(reset, "blank store must reset to defaults");
        station
    }

    #[test]
    fn restart_restores_config_and_cursors() {
        let mut first = station();
        let mut sensor = FixedSensor {
            temperature: 21,
            luminosity: 1,
        };
        for _ in 0..20 {
            first.tick(&mut sensor).unwrap();
        }
        let valid = first.log.count_valid();
        assert!(valid > 0);

        let (second, reset) = Station::open(first.store.clone(), ConfigBlock::default()).unwrap();
        assert!(!reset);
        assert_eq!(second.log.count_valid(), valid);
        assert_eq!(second.clock.second, 0);
    }

    #[test]
    fn sampling_follows_the_monitoring_period_and_dedups() {
        let mut st = station();
        st.config.set_monitoring_period(&mut st.store, 2).unwrap();
        let mut sensor = FixedSensor {
            temperature: 21,
            luminosity: 1,
        };
        for _ in 0..10 {
            st.tick(&mut sensor).unwrap();
        }
        // Constant readings: only the first matching tick stores an entry.
        assert_eq!(st.log.count_valid(), 1);
        assert_eq!(st.current_temperature, 21);
    }

    #[test]
    fn disabled_period_never_samples() {
        let mut st = station();
        st.config.set_monitoring_period(&mut st.store, 0).unwrap();
        let mut sensor = FixedSensor {
            temperature: 21,
            luminosity: 1,
        };
        for _ in 0..10 {
            st.tick(&mut sensor).unwrap();
        }
        assert_eq!(st.log.count_valid(), 0);
    }

    #[test]
    fn threshold_breach_signals_then_latches() {
        let mut st = station();
        st.config.set_monitoring_period(&mut st.store, 1).unwrap();
        st.config.set_alarm_duration(&mut st.store, 3).unwrap();
        let mut sensor = FixedSensor {
            temperature: 40,
            luminosity: 1,
        };
        st.tick(&mut sensor).unwrap();
        assert!(matches!(st.alarm(), AlarmState::Signaling { .. }));
        // The breach persists the enabled flag.
        assert_eq!(st.store.read_byte(layout::ALARM_ENABLED).unwrap(), 1);
        for _ in 0..3 {
            st.tick(&mut sensor).unwrap();
        }
        assert_eq!(st.alarm(), AlarmState::Latched);
    }

    #[test]
    fn clock_rollover_is_persisted() {
        let mut st = station();
        st.config.set_monitoring_period(&mut st.store, 0).unwrap();
        let mut sensor = FixedSensor {
            temperature: 21,
            luminosity: 1,
        };
        for _ in 0..60 {
            st.tick(&mut sensor).unwrap();
        }
        assert_eq!(st.clock().minute, 1);
        assert_eq!(st.store.read_byte(layout::CLOCK_MINUTES).unwrap(), 1);
        assert_eq!(
            st.store.read_byte(layout::CHECKSUM).unwrap(),
            ConfigBlock::stored_checksum(&st.store).unwrap()
        );
    }

    #[test]
    fn display_pattern_reflects_luminosity_and_alarm() {
        let mut st = station();
        st.config.set_monitoring_period(&mut st.store, 1).unwrap();
        let mut sensor = FixedSensor {
            temperature: 40,
            luminosity: 3,
        };
        st.tick(&mut sensor).unwrap();
        let pattern = st.display_pattern();
        assert_eq!(pattern & 0b0011, 3);
        assert_eq!(pattern & 0b0100, 0b0100);
    }
}
