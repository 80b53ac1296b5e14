//! Reserved backup region.
//!
//! The region is carved out of DDR by the boot configuration and survives
//! the image swap. Its base and size are published in two runtime
//! configuration words so the new image can find it again.

use log::warn;
use plm_hwinit::{Mmio, WORD_SIZE};

/// Contiguous `[start, start + size)` range reserved for the backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupRegion {
    start: u64,
    size: u64,
}

impl BackupRegion {
    /// Validate a region.
    ///
    /// A zero base or size means "not configured". The base must be word
    /// aligned and the range must not wrap.
    pub fn new(start: u64, size: u64) -> Option<Self> {
        if start == 0 || size == 0 || start % WORD_SIZE as u64 != 0 {
            return None;
        }
        start.checked_add(size)?;
        Some(Self { start, size })
    }

    /// Region described by the persisted base/size words.
    pub fn from_words(addr: u32, size: u32) -> Option<Self> {
        Self::new(u64::from(addr), u64::from(size))
    }

    /// Read the persisted words from the register file.
    pub fn load<R: Mmio + ?Sized>(regs: &R, addr_reg: u32, size_reg: u32) -> Option<Self> {
        let addr = regs.read32(addr_reg);
        let size = regs.read32(size_reg);
        let region = Self::from_words(addr, size);
        if region.is_none() && (addr != 0 || size != 0) {
            warn!("ignoring malformed backup region {:#x} (+{:#x})", addr, size);
        }
        region
    }

    /// Publish the region for the next image.
    ///
    /// Returns `false` (and writes nothing) when the region does not fit
    /// the 32-bit configuration words.
    pub fn persist<R: Mmio + ?Sized>(&self, regs: &mut R, addr_reg: u32, size_reg: u32) -> bool {
        let (Ok(addr), Ok(size)) = (u32::try_from(self.start), u32::try_from(self.size)) else {
            return false;
        };
        regs.write32(addr_reg, addr);
        regs.write32(size_reg, size);
        true
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// One past the last byte.
    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn can_hold(&self, bytes: u64) -> bool {
        bytes <= self.size
    }
}
