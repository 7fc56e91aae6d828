//! Hardware seams: the temperature/luminosity sensor and the 4-bit status
//! display, behind traits so the daemon can run without the board.

use meteo_core::sample::LUMINOSITY_MAX;

/// Current readings from the environment.
pub trait Sensor {
    /// Temperature as a small unsigned integer (degrees).
    fn read_temperature(&mut self) -> u8;
    /// Luminosity level, 0..=3.
    fn read_luminosity(&mut self) -> u8;
}

/// Deterministic stand-in for the ADC/I2C hardware: a slow triangular
/// temperature drift around 20 degrees and a luminosity level that steps
/// through its range.
pub struct SimulatedSensor {
    step: u32,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self { step: 0 }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for SimulatedSensor {
    fn read_temperature(&mut self) -> u8 {
        self.step = self.step.wrapping_add(1);
        let phase = (self.step / 4) % 16;
        let offset = if phase < 8 { phase } else { 15 - phase };
        18 + offset as u8
    }

    fn read_luminosity(&mut self) -> u8 {
        ((self.step / 16) % (u32::from(LUMINOSITY_MAX) + 1)) as u8
    }
}

/// Renders the device status pattern (luminosity level in the low bits,
/// alarm and heartbeat above).
pub trait StatusDisplay {
    fn show(&mut self, pattern: u8);
}

/// Display that logs pattern changes instead of driving LEDs.
pub struct TraceDisplay {
    last: Option<u8>,
}

impl TraceDisplay {
    pub fn new() -> Self {
        Self { last: None }
    }
}

impl Default for TraceDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDisplay for TraceDisplay {
    fn show(&mut self, pattern: u8) {
        if self.last != Some(pattern) {
            tracing::debug!(pattern = format_args!("{pattern:04b}"), "status display");
            self.last = Some(pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_luminosity_stays_in_range() {
        let mut sensor = SimulatedSensor::new();
        for _ in 0..200 {
            sensor.read_temperature();
            assert!(sensor.read_luminosity() <= LUMINOSITY_MAX);
        }
    }

    #[test]
    fn simulated_temperature_varies() {
        let mut sensor = SimulatedSensor::new();
        let readings: Vec<u8> = (0..64).map(|_| sensor.read_temperature()).collect();
        assert!(readings.iter().any(|&t| t != readings[0]));
        assert!(readings.iter().all(|&t| (18..=25).contains(&t)));
    }
}
