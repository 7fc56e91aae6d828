//! Circular sample log on the sensor node.
//!
//! Three cursors share one ring: `write_index` (next free slot),
//! `read_index` (slot of the most recently stored entry, the dedup
//! reference) and `transfer_index` (oldest slot not yet transferred). All
//! mutation goes through this value; every operation persists the cursors
//! it touched before returning.

use crate::sample::Sample;
use crate::store::{entry_offset, layout, NvStore, StoreError};

/// Cursor snapshot served by the log-info command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogInfo {
    pub capacity: u8,
    pub count_valid: u8,
    pub transfer_index: u8,
    pub write_index: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("requested count {count} exceeds capacity {capacity}")]
    CountOutOfRange { count: u8, capacity: u8 },
    #[error("offset {offset} is outside the {valid} valid entries")]
    OffsetOutOfRange { offset: u8, valid: u8 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an append did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// Entry written. `half_full` is set the moment the pending count
    /// reaches half the capacity, and must surface as the unsolicited
    /// notice on the link.
    Stored { half_full: bool },
    /// Same temperature and luminosity as the last stored entry; skipped.
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLog {
    capacity: u8,
    write_index: u8,
    read_index: u8,
    transfer_index: u8,
    count_valid: u8,
    count_pending: u8,
}

impl DeviceLog {
    /// Factory-fresh cursor state: the write cursor starts one slot ahead of
    /// the dedup cursor, and nothing is valid or pending yet.
    pub fn fresh(capacity: u8) -> Self {
        Self {
            capacity,
            write_index: 1,
            read_index: 0,
            transfer_index: 1,
            count_valid: 0,
            count_pending: 0,
        }
    }

    /// Rebuild the cursors from the store after a restart.
    pub fn restore<S: NvStore>(store: &S, capacity: u8) -> Result<Self, StoreError> {
        Ok(Self {
            capacity,
            write_index: store.read_byte(layout::LOG_WRITE_INDEX)?,
            read_index: store.read_byte(layout::LOG_READ_INDEX)?,
            transfer_index: store.read_byte(layout::LOG_TRANSFER_INDEX)?,
            count_valid: store.read_byte(layout::LOG_COUNT_VALID)?,
            count_pending: store.read_byte(layout::LOG_COUNT_PENDING)?,
        })
    }

    /// Persist every cursor, used when the store is reset to defaults.
    pub fn persist_all<S: NvStore>(&self, store: &mut S) -> Result<(), StoreError> {
        store.write_byte(layout::LOG_WRITE_INDEX, self.write_index)?;
        store.write_byte(layout::LOG_READ_INDEX, self.read_index)?;
        store.write_byte(layout::LOG_TRANSFER_INDEX, self.transfer_index)?;
        store.write_byte(layout::LOG_COUNT_VALID, self.count_valid)?;
        store.write_byte(layout::LOG_COUNT_PENDING, self.count_pending)
    }

    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    pub fn count_valid(&self) -> u8 {
        self.count_valid
    }

    pub fn count_pending(&self) -> u8 {
        self.count_pending
    }

    pub fn write_index(&self) -> u8 {
        self.write_index
    }

    pub fn transfer_index(&self) -> u8 {
        self.transfer_index
    }

    pub fn info(&self) -> LogInfo {
        LogInfo {
            capacity: self.capacity,
            count_valid: self.count_valid,
            transfer_index: self.transfer_index,
            write_index: self.write_index,
        }
    }

    /// Slot of the logically oldest live entry, regardless of transfer state.
    pub fn oldest_slot(&self) -> u8 {
        let cap = usize::from(self.capacity);
        let oldest =
            (usize::from(self.write_index) + cap - usize::from(self.count_valid)) % cap;
        oldest as u8
    }

    fn next_slot(&self, slot: u8) -> u8 {
        (slot + 1) % self.capacity
    }

    /// Entry at `slot`, no cursor mutation. Building block for transfers;
    /// callers pass slots below the capacity.
    pub fn read_at<S: NvStore>(&self, store: &S, slot: u8) -> Result<Sample, StoreError> {
        let base = entry_offset(slot);
        let mut record = [0u8; crate::sample::SAMPLE_WIRE_SIZE];
        for (i, byte) in record.iter_mut().enumerate() {
            *byte = store.read_byte(base + i)?;
        }
        Ok(Sample::from_wire(&record))
    }

    fn write_entry<S: NvStore>(
        &self,
        store: &mut S,
        slot: u8,
        sample: &Sample,
    ) -> Result<(), StoreError> {
        let base = entry_offset(slot);
        for (i, byte) in sample.to_wire().iter().enumerate() {
            store.write_byte(base + i, *byte)?;
        }
        Ok(())
    }

    /// Append one sample, skipping value-duplicates of the last stored
    /// entry. When the pending count is already saturated the oldest
    /// untransferred entry is overwritten and `transfer_index` is dragged
    /// along with the write cursor: the loss is silent on the wire but
    /// observable through the cursors.
    pub fn append<S: NvStore>(&mut self, store: &mut S, sample: Sample) -> Result<Append, LogError> {
        let last = self.read_at(store, self.read_index)?;
        if last.temperature == sample.temperature && last.luminosity == sample.luminosity {
            return Ok(Append::Duplicate);
        }

        self.write_entry(store, self.write_index, &sample)?;

        let mut half_full = false;
        if self.count_pending < self.capacity {
            self.count_pending += 1;
            if self.count_pending == self.capacity / 2 {
                half_full = true;
            }
            store.write_byte(layout::LOG_COUNT_PENDING, self.count_pending)?;
        }

        self.write_index = self.next_slot(self.write_index);
        if self.count_pending == self.capacity {
            self.transfer_index = self.write_index;
            store.write_byte(layout::LOG_TRANSFER_INDEX, self.transfer_index)?;
        }
        if self.count_valid < self.capacity {
            self.count_valid += 1;
            store.write_byte(layout::LOG_COUNT_VALID, self.count_valid)?;
        }
        store.write_byte(layout::LOG_WRITE_INDEX, self.write_index)?;

        self.read_index = self.next_slot(self.read_index);
        store.write_byte(layout::LOG_READ_INDEX, self.read_index)?;

        Ok(Append::Stored { half_full })
    }

    /// Up to `count` entries starting at `transfer_index`, each one marked
    /// transferred as it is read. Stops early when nothing is pending.
    pub fn transfer_from_current<S: NvStore>(
        &mut self,
        store: &mut S,
        count: u8,
    ) -> Result<Vec<Sample>, LogError> {
        if count > self.capacity {
            return Err(LogError::CountOutOfRange {
                count,
                capacity: self.capacity,
            });
        }
        let mut out = Vec::new();
        while out.len() < usize::from(count) && self.count_pending > 0 {
            out.push(self.read_at(store, self.transfer_index)?);
            self.count_pending -= 1;
            self.transfer_index = self.next_slot(self.transfer_index);
        }
        store.write_byte(layout::LOG_COUNT_PENDING, self.count_pending)?;
        store.write_byte(layout::LOG_TRANSFER_INDEX, self.transfer_index)?;
        Ok(out)
    }

    /// The periodic-transfer body: every pending entry.
    pub fn drain_pending<S: NvStore>(&mut self, store: &mut S) -> Result<Vec<Sample>, LogError> {
        self.transfer_from_current(store, self.capacity)
    }

    /// Up to `count` entries starting `offset` slots past the oldest valid
    /// entry, stopping once the scan wraps into the write cursor. A scanned
    /// slot that coincides with `transfer_index` is additionally marked
    /// transferred, so this command both inspects and drains.
    ///
    /// All rejections happen before any cursor mutation.
    pub fn transfer_from_index<S: NvStore>(
        &mut self,
        store: &mut S,
        count: u8,
        offset: u8,
    ) -> Result<Vec<Sample>, LogError> {
        if count > self.capacity {
            return Err(LogError::CountOutOfRange {
                count,
                capacity: self.capacity,
            });
        }
        if offset >= self.capacity || offset >= self.count_valid {
            return Err(LogError::OffsetOutOfRange {
                offset,
                valid: self.count_valid,
            });
        }
        let mut slot =
            ((usize::from(self.oldest_slot()) + usize::from(offset)) % usize::from(self.capacity))
                as u8;
        let mut out = Vec::new();
        for _ in 0..count {
            out.push(self.read_at(store, slot)?);
            if slot == self.transfer_index && self.count_pending > 0 {
                self.transfer_index = self.next_slot(self.transfer_index);
                self.count_pending -= 1;
            }
            slot = self.next_slot(slot);
            if slot == self.write_index {
                break;
            }
        }
        store.write_byte(layout::LOG_COUNT_PENDING, self.count_pending)?;
        store.write_byte(layout::LOG_TRANSFER_INDEX, self.transfer_index)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::TimeOfDay;
    use crate::store::MemStore;

    fn sample(temperature: u8, luminosity: u8) -> Sample {
        Sample::new(TimeOfDay::new(10, 0, 0), temperature, luminosity)
    }

    fn fresh(capacity: u8) -> (DeviceLog, MemStore) {
        let mut store = MemStore::for_capacity(capacity);
        let log = DeviceLog::fresh(capacity);
        log.persist_all(&mut store).unwrap();
        (log, store)
    }

    #[test]
    fn counts_never_exceed_capacity() {
        let (mut log, mut store) = fresh(5);
        for i in 0..40u8 {
            log.append(&mut store, sample(i, i % 4)).unwrap();
            assert!(log.count_pending() <= log.count_valid());
            assert!(log.count_valid() <= log.capacity());
        }
    }

    #[test]
    fn duplicate_append_changes_nothing() {
        let (mut log, mut store) = fresh(6);
        log.append(&mut store, sample(20, 1)).unwrap();
        let before = log;
        let outcome = log.append(&mut store, sample(20, 1)).unwrap();
        assert_eq!(outcome, Append::Duplicate);
        assert_eq!(log, before);
    }

    #[test]
    fn saturated_append_drags_transfer_cursor() {
        let (mut log, mut store) = fresh(4);
        for i in 0..4u8 {
            log.append(&mut store, sample(10 + i, 0)).unwrap();
        }
        assert_eq!(log.count_pending(), 4);
        log.append(&mut store, sample(40, 1)).unwrap();
        assert_eq!(log.transfer_index(), log.write_index());
        assert_eq!(log.count_pending(), 4);
    }

    #[test]
    fn transfer_from_current_returns_min_of_count_and_pending() {
        let (mut log, mut store) = fresh(8);
        for i in 0..3u8 {
            log.append(&mut store, sample(10 + i, 0)).unwrap();
        }
        let got = log.transfer_from_current(&mut store, 7).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(log.count_pending(), 0);
        // Nothing left: a further transfer is empty, not an error.
        assert!(log.transfer_from_current(&mut store, 2).unwrap().is_empty());
    }

    #[test]
    fn transfer_from_current_rejects_count_above_capacity() {
        let (mut log, mut store) = fresh(4);
        let err = log.transfer_from_current(&mut store, 5).unwrap_err();
        assert!(matches!(err, LogError::CountOutOfRange { count: 5, .. }));
    }

    #[test]
    fn transfer_from_index_starts_at_the_oldest_entry() {
        let (mut log, mut store) = fresh(4);
        // Six distinct appends on a capacity-4 ring: the two oldest are gone.
        for i in 0..6u8 {
            log.append(&mut store, sample(10 + i, 0)).unwrap();
        }
        let oldest = log.read_at(&store, log.oldest_slot()).unwrap();
        let got = log.transfer_from_index(&mut store, 1, 0).unwrap();
        assert_eq!(got, vec![oldest]);
        assert_eq!(oldest.temperature, 12);
    }

    #[test]
    fn transfer_from_index_returns_second_and_third_oldest() {
        let (mut log, mut store) = fresh(8);
        for i in 0..3u8 {
            log.append(&mut store, sample(10 + i, 0)).unwrap();
        }
        let got = log.transfer_from_index(&mut store, 2, 1).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].temperature, 11);
        assert_eq!(got[1].temperature, 12);
    }

    #[test]
    fn transfer_from_index_stops_at_the_write_cursor() {
        let (mut log, mut store) = fresh(8);
        for i in 0..3u8 {
            log.append(&mut store, sample(10 + i, 0)).unwrap();
        }
        let got = log.transfer_from_index(&mut store, 8, 0).unwrap();
        assert_eq!(got.len(), 3);
    }

    #[test]
    fn transfer_from_index_rejects_offset_beyond_valid() {
        let (mut log, mut store) = fresh(8);
        for i in 0..3u8 {
            log.append(&mut store, sample(10 + i, 0)).unwrap();
        }
        let before = log;
        let err = log.transfer_from_index(&mut store, 1, 3).unwrap_err();
        assert!(matches!(err, LogError::OffsetOutOfRange { offset: 3, .. }));
        assert_eq!(log, before, "rejection must not move any cursor");
    }

    #[test]
    fn transfer_from_index_drains_pending_when_crossing_it() {
        let (mut log, mut store) = fresh(8);
        for i in 0..4u8 {
            log.append(&mut store, sample(10 + i, 0)).unwrap();
        }
        assert_eq!(log.count_pending(), 4);
        // Scan everything from the oldest: the scan crosses transfer_index
        // on every pending slot.
        log.transfer_from_index(&mut store, 4, 0).unwrap();
        assert_eq!(log.count_pending(), 0);
    }

    #[test]
    fn dedup_sequence_on_capacity_four() {
        let (mut log, mut store) = fresh(4);
        let readings = [(10, 1), (10, 1), (12, 2), (15, 0), (15, 0)];
        for (t, l) in readings {
            log.append(&mut store, sample(t, l)).unwrap();
        }
        assert_eq!(log.count_valid(), 3);
    }

    #[test]
    fn half_full_fires_exactly_at_the_crossing() {
        let (mut log, mut store) = fresh(4);
        let first = log.append(&mut store, sample(10, 0)).unwrap();
        assert_eq!(first, Append::Stored { half_full: false });
        let second = log.append(&mut store, sample(11, 0)).unwrap();
        assert_eq!(second, Append::Stored { half_full: true });
        let third = log.append(&mut store, sample(12, 0)).unwrap();
        assert_eq!(third, Append::Stored { half_full: false });
        // Drain below the midpoint and refill: the notice fires again.
        log.transfer_from_current(&mut store, 3).unwrap();
        log.append(&mut store, sample(13, 0)).unwrap();
        let refill = log.append(&mut store, sample(14, 0)).unwrap();
        assert_eq!(refill, Append::Stored { half_full: true });
    }

    #[test]
    fn cursors_survive_a_restart() {
        let (mut log, mut store) = fresh(6);
        for i in 0..4u8 {
            log.append(&mut store, sample(10 + i, 0)).unwrap();
        }
        log.transfer_from_current(&mut store, 2).unwrap();
        let restored = DeviceLog::restore(&store, 6).unwrap();
        assert_eq!(restored, log);
        // Entries are still addressable through the restored cursors.
        let entry = restored.read_at(&store, restored.transfer_index()).unwrap();
        assert_eq!(entry.temperature, 12);
    }
}
