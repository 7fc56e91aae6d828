//! Persisted device configuration: a validated fixed-offset block guarded by
//! a magic marker and a 1-byte checksum. Sole authority for recovering state
//! after a restart.

use crate::store::{layout, NvStore, StoreError};

/// Marker byte at offset 0. Anything else means the block was never written
/// (or not by us) and must not be trusted.
pub const MAGIC_MARKER: u8 = 0xAA;

/// The configuration fields, mirrored in RAM while the device runs. Every
/// setter persists the touched byte and refreshes the stored checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigBlock {
    /// Log capacity in entries.
    pub capacity: u8,
    /// Monitoring period in seconds; 0 disables sampling.
    pub monitoring_period: u8,
    /// Alarm signal duration in seconds.
    pub alarm_duration: u8,
    /// Temperature threshold for the alarm.
    pub alarm_temperature: u8,
    /// Luminosity threshold for the alarm.
    pub alarm_luminosity: u8,
    pub alarm_enabled: bool,
    pub clock_hours: u8,
    pub clock_minutes: u8,
}

impl Default for ConfigBlock {
    fn default() -> Self {
        Self {
            capacity: 30,
            monitoring_period: 5,
            alarm_duration: 3,
            alarm_temperature: 25,
            alarm_luminosity: 2,
            alarm_enabled: false,
            clock_hours: 0,
            clock_minutes: 0,
        }
    }
}

/// Outcome of the boot-time validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restore {
    /// Marker and checksum matched; every field comes from the store.
    Restored(ConfigBlock),
    /// The block was untrusted and has been reset to defaults. The caller
    /// must also reset and persist the log cursors.
    Reset(ConfigBlock),
}

impl ConfigBlock {
    /// Low byte of the sum of the marker and every config field, in layout
    /// order. This is what the checksum slot must hold.
    pub fn checksum(&self) -> u8 {
        MAGIC_MARKER
            .wrapping_add(self.capacity)
            .wrapping_add(self.monitoring_period)
            .wrapping_add(self.alarm_duration)
            .wrapping_add(self.alarm_temperature)
            .wrapping_add(self.alarm_luminosity)
            .wrapping_add(u8::from(self.alarm_enabled))
            .wrapping_add(self.clock_hours)
            .wrapping_add(self.clock_minutes)
    }

    /// Checksum recomputed from the stored bytes rather than the RAM copy.
    pub fn stored_checksum<S: NvStore>(store: &S) -> Result<u8, StoreError> {
        let mut sum: u8 = 0;
        for offset in layout::MAGIC..layout::CHECKSUM {
            sum = sum.wrapping_add(store.read_byte(offset)?);
        }
        Ok(sum)
    }

    /// Validate and restore the block, or reset the store to defaults when
    /// the marker or the checksum does not hold.
    pub fn restore<S: NvStore>(store: &mut S, defaults: ConfigBlock) -> Result<Restore, StoreError> {
        let marker = store.read_byte(layout::MAGIC)?;
        let stored = store.read_byte(layout::CHECKSUM)?;
        if marker != MAGIC_MARKER || stored != Self::stored_checksum(store)? {
            defaults.write_all(store)?;
            return Ok(Restore::Reset(defaults));
        }
        Ok(Restore::Restored(Self {
            capacity: store.read_byte(layout::CAPACITY)?,
            monitoring_period: store.read_byte(layout::MONITORING_PERIOD)?,
            alarm_duration: store.read_byte(layout::ALARM_DURATION)?,
            alarm_temperature: store.read_byte(layout::ALARM_TEMPERATURE)?,
            alarm_luminosity: store.read_byte(layout::ALARM_LUMINOSITY)?,
            alarm_enabled: store.read_byte(layout::ALARM_ENABLED)? != 0,
            clock_hours: store.read_byte(layout::CLOCK_HOURS)?,
            clock_minutes: store.read_byte(layout::CLOCK_MINUTES)?,
        }))
    }

    /// Write the marker, every field and the checksum.
    pub fn write_all<S: NvStore>(&self, store: &mut S) -> Result<(), StoreError> {
        store.write_byte(layout::MAGIC, MAGIC_MARKER)?;
        store.write_byte(layout::CAPACITY, self.capacity)?;
        store.write_byte(layout::MONITORING_PERIOD, self.monitoring_period)?;
        store.write_byte(layout::ALARM_DURATION, self.alarm_duration)?;
        store.write_byte(layout::ALARM_TEMPERATURE, self.alarm_temperature)?;
        store.write_byte(layout::ALARM_LUMINOSITY, self.alarm_luminosity)?;
        store.write_byte(layout::ALARM_ENABLED, u8::from(self.alarm_enabled))?;
        store.write_byte(layout::CLOCK_HOURS, self.clock_hours)?;
        store.write_byte(layout::CLOCK_MINUTES, self.clock_minutes)?;
        self.write_checksum(store)
    }

    fn write_checksum<S: NvStore>(&self, store: &mut S) -> Result<(), StoreError> {
        store.write_byte(layout::CHECKSUM, self.checksum())
    }

    pub fn set_monitoring_period<S: NvStore>(
        &mut self,
        store: &mut S,
        seconds: u8,
    ) -> Result<(), StoreError> {
        self.monitoring_period = seconds;
        store.write_byte(layout::MONITORING_PERIOD, seconds)?;
        self.write_checksum(store)
    }

    pub fn set_alarm_duration<S: NvStore>(
        &mut self,
        store: &mut S,
        seconds: u8,
    ) -> Result<(), StoreError> {
        self.alarm_duration = seconds;
        store.write_byte(layout::ALARM_DURATION, seconds)?;
        self.write_checksum(store)
    }

    pub fn set_alarm_thresholds<S: NvStore>(
        &mut self,
        store: &mut S,
        temperature: u8,
        luminosity: u8,
    ) -> Result<(), StoreError> {
        self.alarm_temperature = temperature;
        self.alarm_luminosity = luminosity;
        store.write_byte(layout::ALARM_TEMPERATURE, temperature)?;
        store.write_byte(layout::ALARM_LUMINOSITY, luminosity)?;
        self.write_checksum(store)
    }

    pub fn set_alarm_enabled<S: NvStore>(
        &mut self,
        store: &mut S,
        enabled: bool,
    ) -> Result<(), StoreError> {
        self.alarm_enabled = enabled;
        store.write_byte(layout::ALARM_ENABLED, u8::from(enabled))?;
        self.write_checksum(store)
    }

    /// Persist the clock hours and minutes. Seconds are never persisted;
    /// they restart at zero after a reboot.
    pub fn set_clock<S: NvStore>(
        &mut self,
        store: &mut S,
        hours: u8,
        minutes: u8,
    ) -> Result<(), StoreError> {
        self.clock_hours = hours;
        self.clock_minutes = minutes;
        store.write_byte(layout::CLOCK_HOURS, hours)?;
        store.write_byte(layout::CLOCK_MINUTES, minutes)?;
        self.write_checksum(store)
    }
}
