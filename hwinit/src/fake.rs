//! Host-side fakes for registers and memory.
//!
//! Used by unit tests here and, through the `testing` feature, by the
//! integration tests of the crates above.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::memory::{Memory, MemoryError};
use crate::mmio::Mmio;

// ═══════════════════════════════════════════════════════════════════════════
// FAKE REGISTER FILE
// ═══════════════════════════════════════════════════════════════════════════

/// Register file backed by a map.
///
/// Unset registers read as zero. A register can be given a script of
/// successive read values; once the script runs dry reads fall back to the
/// stored value. Every write is journaled in order.
#[derive(Debug, Default)]
pub struct FakeRegisterFile {
    values: BTreeMap<u32, u32>,
    scripts: RefCell<BTreeMap<u32, VecDeque<u32>>>,
    reads: RefCell<BTreeMap<u32, usize>>,
    writes: Vec<(u32, u32)>,
}

impl FakeRegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset a register without journaling a write.
    pub fn set(&mut self, addr: u32, value: u32) {
        self.values.insert(addr, value);
    }

    /// Current stored value of a register.
    pub fn get(&self, addr: u32) -> u32 {
        self.values.get(&addr).copied().unwrap_or(0)
    }

    /// Queue values returned by the next reads of `addr`.
    pub fn script(&mut self, addr: u32, values: &[u32]) {
        self.scripts
            .borrow_mut()
            .entry(addr)
            .or_default()
            .extend(values.iter().copied());
    }

    /// All writes, oldest first.
    pub fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }

    /// Values written to one register, oldest first.
    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    /// How many times `addr` has been read.
    pub fn read_count(&self, addr: u32) -> usize {
        self.reads.borrow().get(&addr).copied().unwrap_or(0)
    }
}

impl Mmio for FakeRegisterFile {
    fn read32(&self, addr: u32) -> u32 {
        *self.reads.borrow_mut().entry(addr).or_default() += 1;
        if let Some(script) = self.scripts.borrow_mut().get_mut(&addr) {
            if let Some(value) = script.pop_front() {
                return value;
            }
        }
        self.get(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.writes.push((addr, value));
        self.values.insert(addr, value);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SPARSE MEMORY
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct Segment {
    base: u64,
    bytes: Vec<u8>,
}

impl Segment {
    fn offset_of(&self, addr: u64, len: usize) -> Option<usize> {
        let start = addr.checked_sub(self.base)?;
        let end = start.checked_add(len as u64)?;
        (end <= self.bytes.len() as u64).then_some(start as usize)
    }
}

/// Memory made of explicitly mapped segments.
///
/// Any access that does not fall entirely inside one segment fails with
/// [`MemoryError::OutOfRange`] and touches nothing, so tests can prove
/// that code never strays past a bound.
#[derive(Debug, Default)]
pub struct SparseMemory {
    segments: Vec<Segment>,
    write_log: Vec<(u64, usize)>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `len` zeroed bytes at `base`.
    pub fn map(&mut self, base: u64, len: usize) -> &mut Self {
        self.map_bytes(base, &vec![0u8; len])
    }

    /// Map a segment initialised from `bytes`.
    pub fn map_bytes(&mut self, base: u64, bytes: &[u8]) -> &mut Self {
        self.segments.push(Segment {
            base,
            bytes: bytes.to_vec(),
        });
        self
    }

    /// Copy out `len` bytes at `addr`.
    ///
    /// # Panics
    /// If the range is not mapped. Test helper only.
    pub fn bytes(&self, addr: u64, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        self.read(addr, &mut out)
            .unwrap_or_else(|e| panic!("unmapped test read: {e}"));
        out
    }

    /// Every successful write as `(addr, len)`, oldest first.
    pub fn write_log(&self) -> &[(u64, usize)] {
        &self.write_log
    }

    /// True if any successful write touched `[addr, addr + len)`.
    pub fn was_written(&self, addr: u64, len: usize) -> bool {
        let end = addr + len as u64;
        self.write_log
            .iter()
            .any(|&(a, l)| a < end && a + l as u64 > addr)
    }

    fn segment(&self, addr: u64, len: usize) -> Result<(usize, usize), MemoryError> {
        self.segments
            .iter()
            .enumerate()
            .find_map(|(i, s)| s.offset_of(addr, len).map(|off| (i, off)))
            .ok_or(MemoryError::OutOfRange { addr, len })
    }
}

impl Memory for SparseMemory {
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        let (idx, off) = self.segment(addr, buf.len())?;
        buf.copy_from_slice(&self.segments[idx].bytes[off..off + buf.len()]);
        Ok(())
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), MemoryError> {
        let (idx, off) = self.segment(addr, data.len())?;
        self.segments[idx].bytes[off..off + data.len()].copy_from_slice(data);
        self.write_log.push((addr, data.len()));
        Ok(())
    }
}
