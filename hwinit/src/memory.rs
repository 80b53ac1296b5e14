//! Physical memory access.
//!
//! The update manager moves bytes between three kinds of memory it does
//! not own: the live data structures of other modules, the reserved backup
//! region, and the candidate image. All of it is reached through the
//! [`Memory`] trait so that bounds are checked in one place.
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Memory (trait)                                              │
//! │    read(addr, buf)  write(addr, data)  fill(addr, len, b)    │
//! │                                                              │
//! │  PhysicalMemory  - raw pointer copies, target only           │
//! │  SparseMemory    - mapped segments, faults outside (testing) │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Native word size of the management processor, in bytes.
///
/// Registered structure lengths and every serialized record are multiples
/// of this.
pub const WORD_SIZE: usize = 4;

/// Chunk used by the default `fill` implementation.
const FILL_CHUNK: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

/// Memory access errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Access falls outside addressable (or mapped) memory
    #[error("access at {addr:#x} (+{len:#x}) is out of range")]
    OutOfRange { addr: u64, len: usize },
}

// ═══════════════════════════════════════════════════════════════════════════
// MEMORY TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Byte-addressed memory.
pub trait Memory {
    /// Copy `buf.len()` bytes starting at `addr` into `buf`.
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Copy `data` to memory starting at `addr`.
    fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), MemoryError>;

    /// Set `len` bytes starting at `addr` to `byte`.
    fn fill(&mut self, addr: u64, len: usize, byte: u8) -> Result<(), MemoryError> {
        let chunk = [byte; FILL_CHUNK];
        let mut done = 0usize;
        while done < len {
            let n = (len - done).min(FILL_CHUNK);
            self.write(addr + done as u64, &chunk[..n])?;
            done += n;
        }
        Ok(())
    }

    /// Read a little-endian word.
    fn read_u32(&self, addr: u64) -> Result<u32, MemoryError> {
        let mut word = [0u8; WORD_SIZE];
        self.read(addr, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    /// Write a little-endian word.
    fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), MemoryError> {
        self.write(addr, &value.to_le_bytes())
    }
}

impl<T: Memory + ?Sized> Memory for &mut T {
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        (**self).read(addr, buf)
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), MemoryError> {
        (**self).write(addr, data)
    }

    fn fill(&mut self, addr: u64, len: usize, byte: u8) -> Result<(), MemoryError> {
        (**self).fill(addr, len, byte)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PHYSICAL MEMORY
// ═══════════════════════════════════════════════════════════════════════════

/// Direct access to the processor's physical address space.
#[derive(Debug)]
pub struct PhysicalMemory {
    _private: (),
}

impl PhysicalMemory {
    /// Create a handle to physical memory.
    ///
    /// # Safety
    /// The caller guarantees that every range later passed to `read`,
    /// `write` or `fill` is mapped, accessible, and not concurrently
    /// mutated by anything else. On the management processor this holds
    /// for registered data structures and the reserved backup region.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    /// Convert a physical range into a host pointer, rejecting ranges the
    /// address width cannot express.
    fn host_ptr(addr: u64, len: usize) -> Result<usize, MemoryError> {
        let base = usize::try_from(addr).map_err(|_| MemoryError::OutOfRange { addr, len })?;
        base.checked_add(len)
            .ok_or(MemoryError::OutOfRange { addr, len })?;
        Ok(base)
    }
}

impl Memory for PhysicalMemory {
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        let src = Self::host_ptr(addr, buf.len())? as *const u8;
        // Safety: range validity upheld by the contract of PhysicalMemory::new
        unsafe { core::ptr::copy_nonoverlapping(src, buf.as_mut_ptr(), buf.len()) };
        Ok(())
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), MemoryError> {
        let dst = Self::host_ptr(addr, data.len())? as *mut u8;
        // Safety: range validity upheld by the contract of PhysicalMemory::new
        unsafe { core::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len()) };
        Ok(())
    }

    fn fill(&mut self, addr: u64, len: usize, byte: u8) -> Result<(), MemoryError> {
        let dst = Self::host_ptr(addr, len)? as *mut u8;
        // Safety: range validity upheld by the contract of PhysicalMemory::new
        unsafe { core::ptr::write_bytes(dst, byte, len) };
        Ok(())
    }
}
