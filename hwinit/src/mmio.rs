//! Memory-mapped register access.
//!
//! All PMC registers are 32 bits wide and live below 4GB, so register
//! addresses are `u32`. Wider values (image addresses) are split across
//! high/low register pairs.

/// 32-bit register file.
///
/// `read32` takes `&self` because hardware reads are side-effect free from
/// the caller's point of view. Fakes that need to script read sequences
/// use interior mutability.
pub trait Mmio {
    /// Read a 32-bit register.
    fn read32(&self, addr: u32) -> u32;

    /// Write a 32-bit register.
    fn write32(&mut self, addr: u32, value: u32);

    /// Read-modify-write the bits selected by `mask`.
    fn modify32(&mut self, addr: u32, mask: u32, value: u32) {
        let current = self.read32(addr);
        self.write32(addr, (current & !mask) | (value & mask));
    }

    /// Read a 64-bit value stored as a high/low register pair.
    fn read_split64(&self, high: u32, low: u32) -> u64 {
        (u64::from(self.read32(high)) << 32) | u64::from(self.read32(low))
    }

    /// Write a 64-bit value as a high/low register pair (low word first).
    fn write_split64(&mut self, high: u32, low: u32, value: u64) {
        self.write32(low, value as u32);
        self.write32(high, (value >> 32) as u32);
    }
}

impl<T: Mmio + ?Sized> Mmio for &mut T {
    #[inline]
    fn read32(&self, addr: u32) -> u32 {
        (**self).read32(addr)
    }

    #[inline]
    fn write32(&mut self, addr: u32, value: u32) {
        (**self).write32(addr, value)
    }
}

/// Volatile access to the real register space.
///
/// Zero-sized so that code generic over `Mmio` collapses to plain
/// volatile loads and stores. The relocated trampoline depends on this:
/// it must not call anything it did not carry with it.
#[derive(Debug, Clone, Copy)]
pub struct PhysicalMmio {
    _private: (),
}

impl PhysicalMmio {
    /// Create a handle to the physical register space.
    ///
    /// # Safety
    /// Every address later passed to `read32`/`write32` must be a valid,
    /// 4-byte aligned device register on this platform.
    #[inline(always)]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Mmio for PhysicalMmio {
    #[inline(always)]
    fn read32(&self, addr: u32) -> u32 {
        // Safety: upheld by the contract of PhysicalMmio::new
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    #[inline(always)]
    fn write32(&mut self, addr: u32, value: u32) {
        // Safety: upheld by the contract of PhysicalMmio::new
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }

    // The defaults are not forced inline; restated here so they are

    #[inline(always)]
    fn modify32(&mut self, addr: u32, mask: u32, value: u32) {
        let current = self.read32(addr);
        self.write32(addr, (current & !mask) | (value & mask));
    }

    #[inline(always)]
    fn read_split64(&self, high: u32, low: u32) -> u64 {
        (u64::from(self.read32(high)) << 32) | u64::from(self.read32(low))
    }

    #[inline(always)]
    fn write_split64(&mut self, high: u32, low: u32, value: u64) {
        self.write32(low, value as u32);
        self.write32(high, (value >> 32) as u32);
    }
}
