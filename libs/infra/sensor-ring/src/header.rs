//! Ring header layout.

use std::sync::atomic::{AtomicU64, Ordering};

use crc32fast::Hasher;

use crate::error::SensorError;

pub const MAGIC: u32 = u32::from_le_bytes(*b"SMRB");
pub const EXPECTED_VERSION: u16 = 1;
pub const SLOT_SIZE: u32 = 4096;
pub const SLOT_COUNT: u32 = 2048;

/// Mirrors the writer's header layout byte-for-byte. Atomics give the
/// acquire/release semantics needed without a lock; this struct is only
/// ever accessed through a pointer into the mapped region, never owned
/// or copied.
#[repr(C)]
pub struct RawHeader {
    pub magic: u32,
    pub version: u16,
    pub reserved: u16,
    pub slot_size: u32,
    pub slot_count: u32,
    pub write_index: AtomicU64,
    pub heartbeat_wall_ms: AtomicU64,
    pub header_crc32: u32,
    pub _pad: u32,
}

impl RawHeader {
    /// # Safety
    /// `ptr` must point to at least `size_of::<RawHeader>()` readable bytes
    /// for the lifetime of the returned reference.
    pub unsafe fn from_ptr<'a>(ptr: *const u8) -> &'a RawHeader {
        &*(ptr as *const RawHeader)
    }

    pub fn validate(&self) -> Result<(), SensorError> {
        if self.magic != MAGIC {
            return Err(SensorError::InvalidHeader(format!(
                "bad magic: {:#x}",
                self.magic
            )));
        }
        if self.version != EXPECTED_VERSION {
            return Err(SensorError::InvalidHeader(format!(
                "unsupported version: {}",
                self.version
            )));
        }
        if self.slot_size != SLOT_SIZE {
            return Err(SensorError::InvalidHeader(format!(
                "unexpected slot size: {}",
                self.slot_size
            )));
        }
        if self.slot_count != SLOT_COUNT {
            return Err(SensorError::InvalidHeader(format!(
                "unexpected slot count: {}",
                self.slot_count
            )));
        }

        let mut hasher = Hasher::new();
        hasher.update(&self.magic.to_le_bytes());
        hasher.update(&self.version.to_le_bytes());
        hasher.update(&self.reserved.to_le_bytes());
        hasher.update(&self.slot_size.to_le_bytes());
        hasher.update(&self.slot_count.to_le_bytes());
        if hasher.finalize() != self.header_crc32 {
            return Err(SensorError::InvalidHeader("header CRC mismatch".into()));
        }
        Ok(())
    }

    pub fn load_write_index(&self) -> u64 {
        self.write_index.load(Ordering::Acquire)
    }

    pub fn load_heartbeat_wall_ms(&self) -> u64 {
        self.heartbeat_wall_ms.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_matches_ascii_smrb() {
        assert_eq!(MAGIC.to_le_bytes(), *b"SMRB");
    }
}
