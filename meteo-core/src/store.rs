//! Non-volatile byte store: the persistence seam under the config block and
//! the device log. The device daemon backs it with a file image; tests use
//! the in-memory store.

use crate::sample::SAMPLE_WIRE_SIZE;

/// Byte offsets of the persistent image. One byte per config field, then the
/// log cursors, then fixed-size entry records.
pub mod layout {
    pub const MAGIC: usize = 0x00;
    pub const CAPACITY: usize = 0x01;
    pub const MONITORING_PERIOD: usize = 0x02;
    pub const ALARM_DURATION: usize = 0x03;
    pub const ALARM_TEMPERATURE: usize = 0x04;
    pub const ALARM_LUMINOSITY: usize = 0x05;
    pub const ALARM_ENABLED: usize = 0x06;
    pub const CLOCK_HOURS: usize = 0x07;
    pub const CLOCK_MINUTES: usize = 0x08;
    pub const CHECKSUM: usize = 0x09;
    pub const LOG_READ_INDEX: usize = 0x0A;
    pub const LOG_WRITE_INDEX: usize = 0x0B;
    pub const LOG_COUNT_VALID: usize = 0x0C;
    pub const LOG_TRANSFER_INDEX: usize = 0x0D;
    pub const LOG_COUNT_PENDING: usize = 0x0E;
    pub const LOG_ENTRIES: usize = 0x0F;
}

/// Total image size for a log of `capacity` entries.
pub fn image_size(capacity: u8) -> usize {
    layout::LOG_ENTRIES + usize::from(capacity) * SAMPLE_WIRE_SIZE
}

/// Offset of the first byte of the entry record in `slot`.
pub fn entry_offset(slot: u8) -> usize {
    layout::LOG_ENTRIES + usize::from(slot) * SAMPLE_WIRE_SIZE
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store offset {offset} out of range")]
    OutOfRange { offset: usize },
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-addressed persistent storage.
pub trait NvStore {
    fn read_byte(&self, offset: usize) -> Result<u8, StoreError>;
    fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), StoreError>;
}

/// Volatile store over a plain byte buffer. Used by tests and as the model
/// for file-backed implementations.
#[derive(Debug, Clone)]
pub struct MemStore {
    bytes: Vec<u8>,
}

impl MemStore {
    /// Zero-filled image sized for a log of `capacity` entries.
    pub fn for_capacity(capacity: u8) -> Self {
        Self {
            bytes: vec![0; image_size(capacity)],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl NvStore for MemStore {
    fn read_byte(&self, offset: usize) -> Result<u8, StoreError> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or(StoreError::OutOfRange { offset })
    }

    fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), StoreError> {
        match self.bytes.get_mut(offset) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoreError::OutOfRange { offset }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_store_read_write() {
        let mut store = MemStore::for_capacity(4);
        store.write_byte(layout::MAGIC, 0xAA).unwrap();
        assert_eq!(store.read_byte(layout::MAGIC).unwrap(), 0xAA);
        assert_eq!(store.read_byte(layout::CAPACITY).unwrap(), 0);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mut store = MemStore::for_capacity(2);
        let end = image_size(2);
        assert!(matches!(
            store.read_byte(end),
            Err(StoreError::OutOfRange { .. })
        ));
        assert!(matches!(
            store.write_byte(end, 1),
            Err(StoreError::OutOfRange { .. })
        ));
    }

    #[test]
    fn entry_offsets_do_not_overlap_cursors() {
        assert_eq!(entry_offset(0), layout::LOG_ENTRIES);
        assert_eq!(entry_offset(1) - entry_offset(0), SAMPLE_WIRE_SIZE);
        assert!(entry_offset(0) > layout::LOG_COUNT_PENDING);
    }
}
