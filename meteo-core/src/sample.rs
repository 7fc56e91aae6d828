//! Sample and time-of-day value types shared by both nodes.

/// Highest luminosity level the sensor reports (2-bit scale).
pub const LUMINOSITY_MAX: u8 = 3;

/// Size of one log entry on the wire and in the persistent store.
pub const SAMPLE_WIRE_SIZE: usize = 5;

/// Device-local clock reading. The clock is hours:minutes:seconds with no
/// date and no wall-clock synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            hour,
            minute,
            second,
        }
    }

    /// Seconds since midnight; the comparison key for window matching.
    pub fn seconds_of_day(&self) -> u32 {
        u32::from(self.hour) * 3600 + u32::from(self.minute) * 60 + u32::from(self.second)
    }
}

/// One monitoring sample: when it was taken plus the two sensor readings.
/// Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub temperature: u8,
    pub luminosity: u8,
}

impl Sample {
    pub fn new(time: TimeOfDay, temperature: u8, luminosity: u8) -> Self {
        Self {
            hour: time.hour,
            minute: time.minute,
            second: time.second,
            temperature,
            luminosity,
        }
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::new(self.hour, self.minute, self.second)
    }

    /// Fixed 5-byte record: hour, minute, second, temperature, luminosity.
    pub fn to_wire(&self) -> [u8; SAMPLE_WIRE_SIZE] {
        [
            self.hour,
            self.minute,
            self.second,
            self.temperature,
            self.luminosity,
        ]
    }

    pub fn from_wire(bytes: &[u8; SAMPLE_WIRE_SIZE]) -> Self {
        Self {
            hour: bytes[0],
            minute: bytes[1],
            second: bytes[2],
            temperature: bytes[3],
            luminosity: bytes[4],
        }
    }
}
