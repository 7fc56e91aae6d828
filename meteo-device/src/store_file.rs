//! File-backed persistent image standing in for the device EEPROM.
//!
//! The whole image is read once at open; byte writes update the RAM copy
//! and write through to the file at the same offset.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::unix::fs::FileExt;
use std::path::Path;

use meteo_core::store::{image_size, NvStore, StoreError};

pub struct FileStore {
    file: File,
    image: Vec<u8>,
}

impl FileStore {
    /// Open or create the image file, zero-extended to hold the largest
    /// possible log so a stored capacity never outgrows the file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let size = image_size(u8::MAX);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let mut image = Vec::with_capacity(size);
        file.read_to_end(&mut image)?;
        if image.len() < size {
            image.resize(size, 0);
            file.set_len(size as u64)?;
        }
        Ok(Self { file, image })
    }
}

impl NvStore for FileStore {
    fn read_byte(&self, offset: usize) -> Result<u8, StoreError> {
        self.image
            .get(offset)
            .copied()
            .ok_or(StoreError::OutOfRange { offset })
    }

    fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), StoreError> {
        let slot = self
            .image
            .get_mut(offset)
            .ok_or(StoreError::OutOfRange { offset })?;
        *slot = value;
        self.file.write_at(&[value], offset as u64)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteo_core::store::layout;
    use std::path::PathBuf;

    struct TempPath(PathBuf);

    impl TempPath {
        fn new(tag: &str) -> Self {
            Self(std::env::temp_dir().join(format!("meteo-store-{}-{}", tag, std::process::id())))
        }
    }

    impl Drop for TempPath {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn bytes_survive_a_reopen() {
        let path = TempPath::new("reopen");
        {
            let mut store = FileStore::open(&path.0).unwrap();
            store.write_byte(layout::MAGIC, 0xAA).unwrap();
            store.write_byte(layout::CLOCK_HOURS, 17).unwrap();
        }
        let store = FileStore::open(&path.0).unwrap();
        assert_eq!(store.read_byte(layout::MAGIC).unwrap(), 0xAA);
        assert_eq!(store.read_byte(layout::CLOCK_HOURS).unwrap(), 17);
    }

    #[test]
    fn fresh_image_reads_as_zeros() {
        let path = TempPath::new("fresh");
        let store = FileStore::open(&path.0).unwrap();
        assert_eq!(store.read_byte(layout::MAGIC).unwrap(), 0);
        assert_eq!(store.read_byte(image_size(u8::MAX) - 1).unwrap(), 0);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let path = TempPath::new("range");
        let mut store = FileStore::open(&path.0).unwrap();
        let end = image_size(u8::MAX);
        assert!(store.write_byte(end, 1).is_err());
        assert!(store.read_byte(end).is_err());
    }
}
