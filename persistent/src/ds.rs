//! Data Structure Registry
//!
//! Every module that wants state carried across an update registers a
//! [`DsDescriptor`] here at start-up. Descriptors are never removed; the
//! registry's iteration order (registration order) is the order in which
//! records are written to the backup region.
//!
//! A descriptor's identity is the pair `(module, structure)`. Both images
//! must agree on it, which is what lets the new image match stored records
//! to its own live structures even when their layouts have drifted.

use alloc::vec::Vec;
use core::fmt;

use log::debug;
use plm_hwinit::{Memory, MemoryError, WORD_SIZE};

use crate::backup::{BACKUP_HEADER_SIZE, DS_HEADER_SIZE};
use crate::error::{HandlerError, PersistError, Result};

/// Bytes moved per step when copying between memory ranges.
const COPY_CHUNK: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════
// IDENTITY
// ═══════════════════════════════════════════════════════════════════════════

/// Firmware module identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub u16);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Identity of one registered structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DsId {
    pub module: ModuleId,
    pub structure: u16,
}

impl DsId {
    pub const fn new(module: ModuleId, structure: u16) -> Self {
        Self { module, structure }
    }
}

impl fmt::Display for DsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#04x}", self.module, self.structure)
    }
}

/// Format version of a structure.
///
/// `lowest_compatible` is the oldest stored version this image still
/// knows how to take back. Records older than that are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsVersion {
    pub version: u8,
    pub lowest_compatible: u8,
}

impl DsVersion {
    pub const fn new(version: u8, lowest_compatible: u8) -> Self {
        Self {
            version,
            lowest_compatible,
        }
    }

    /// Version that accepts every older record.
    pub const fn any(version: u8) -> Self {
        Self::new(version, 0)
    }

    pub fn accepts(&self, stored: u8) -> bool {
        stored >= self.lowest_compatible
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HANDLERS
// ═══════════════════════════════════════════════════════════════════════════

/// Store/restore callbacks for one structure.
///
/// Handlers receive a memory view that only accepts writes inside the
/// range they own: the record payload for `store`, the live structure for
/// `restore`. Reads are unrestricted.
pub trait DsOps {
    /// Serialize the live structure into `desc.len()` bytes at `dest`.
    fn store(
        &self,
        desc: &DsDescriptor,
        mem: &mut dyn Memory,
        dest: u64,
    ) -> core::result::Result<(), HandlerError> {
        copy_range(mem, desc.addr(), dest, desc.len())?;
        Ok(())
    }

    /// Bring a stored payload of `stored_len` bytes at `src` back into the
    /// live structure.
    ///
    /// The default copies the common prefix and zeroes whatever the live
    /// structure has beyond it.
    fn restore(
        &self,
        desc: &DsDescriptor,
        mem: &mut dyn Memory,
        src: u64,
        stored_len: usize,
    ) -> core::result::Result<(), HandlerError> {
        let common = stored_len.min(desc.len());
        copy_range(mem, src, desc.addr(), common)?;
        if desc.len() > common {
            mem.fill(desc.addr() + common as u64, desc.len() - common, 0)?;
        }
        Ok(())
    }
}

/// Plain byte copy in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteCopy;

impl DsOps for ByteCopy {}

static BYTE_COPY: ByteCopy = ByteCopy;

/// Copy `len` bytes from `src` to `dst` through a small stack buffer.
pub fn copy_range(
    mem: &mut dyn Memory,
    src: u64,
    dst: u64,
    len: usize,
) -> core::result::Result<(), MemoryError> {
    let mut chunk = [0u8; COPY_CHUNK];
    let mut done = 0usize;
    while done < len {
        let n = (len - done).min(COPY_CHUNK);
        mem.read(src + done as u64, &mut chunk[..n])?;
        mem.write(dst + done as u64, &chunk[..n])?;
        done += n;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// DESCRIPTOR
// ═══════════════════════════════════════════════════════════════════════════

/// One registered structure.
#[derive(Clone, Copy)]
pub struct DsDescriptor {
    id: DsId,
    version: DsVersion,
    addr: u64,
    len: usize,
    ops: &'static dyn DsOps,
}

impl DsDescriptor {
    /// Describe `len` bytes of live state at `addr`, copied byte for byte.
    pub fn new(id: DsId, version: DsVersion, addr: u64, len: usize) -> Self {
        Self {
            id,
            version,
            addr,
            len,
            ops: &BYTE_COPY,
        }
    }

    /// Use custom store/restore handlers.
    pub fn with_ops(mut self, ops: &'static dyn DsOps) -> Self {
        self.ops = ops;
        self
    }

    pub fn id(&self) -> DsId {
        self.id
    }

    pub fn version(&self) -> DsVersion {
        self.version
    }

    /// Live address in this image.
    pub fn addr(&self) -> u64 {
        self.addr
    }

    /// Live length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ops(&self) -> &'static dyn DsOps {
        self.ops
    }

    /// Bytes this structure occupies in the backup region.
    pub fn record_size(&self) -> u64 {
        (DS_HEADER_SIZE + self.len) as u64
    }
}

impl fmt::Debug for DsDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsDescriptor")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("len", &self.len)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════

/// Registered structures, in registration order.
#[derive(Debug, Default)]
pub struct DataStructureRegistry {
    entries: Vec<DsDescriptor>,
}

impl DataStructureRegistry {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a descriptor.
    ///
    /// Rejects a second registration of the same identity and lengths that
    /// are not a whole number of words.
    pub fn register(&mut self, desc: DsDescriptor) -> Result<()> {
        if desc.len % WORD_SIZE != 0 {
            return Err(PersistError::Misaligned {
                id: desc.id,
                len: desc.len,
            });
        }
        if self.get(desc.id).is_some() {
            return Err(PersistError::Duplicate { id: desc.id });
        }

        debug!(
            "registered structure {} v{} ({} bytes at {:#x})",
            desc.id, desc.version.version, desc.len, desc.addr
        );
        self.entries.push(desc);
        Ok(())
    }

    /// Look up a descriptor by module and structure id.
    pub fn get_descriptor(&self, module: ModuleId, structure: u16) -> Option<&DsDescriptor> {
        self.get(DsId::new(module, structure))
    }

    pub fn get(&self, id: DsId) -> Option<&DsDescriptor> {
        self.entries.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DsDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes `store_all` will write: backup header plus every record.
    pub fn serialized_size(&self) -> u64 {
        BACKUP_HEADER_SIZE as u64 + self.entries.iter().map(|d| d.record_size()).sum::<u64>()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// WRITE WINDOW
// ═══════════════════════════════════════════════════════════════════════════

/// Memory view that refuses writes outside `[start, end)`.
pub(crate) struct Window<'a> {
    inner: &'a mut dyn Memory,
    start: u64,
    end: u64,
}

impl<'a> Window<'a> {
    pub(crate) fn new(inner: &'a mut dyn Memory, start: u64, len: usize) -> Self {
        Self {
            inner,
            start,
            end: start + len as u64,
        }
    }

    fn check(&self, addr: u64, len: usize) -> core::result::Result<(), MemoryError> {
        let inside = addr >= self.start
            && addr
                .checked_add(len as u64)
                .is_some_and(|end| end <= self.end);
        if inside {
            Ok(())
        } else {
            Err(MemoryError::OutOfRange { addr, len })
        }
    }
}

impl Memory for Window<'_> {
    fn read(&self, addr: u64, buf: &mut [u8]) -> core::result::Result<(), MemoryError> {
        self.inner.read(addr, buf)
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> core::result::Result<(), MemoryError> {
        self.check(addr, data.len())?;
        self.inner.write(addr, data)
    }

    fn fill(&mut self, addr: u64, len: usize, byte: u8) -> core::result::Result<(), MemoryError> {
        self.check(addr, len)?;
        self.inner.fill(addr, len, byte)
    }
}
