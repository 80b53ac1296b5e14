use plm_hwinit::{Memory, MemoryError, WORD_SIZE};

use crate::ds::{DsDescriptor, DsId, DsVersion, ModuleId};

/// Layout version this image writes and accepts.
pub const BACKUP_FORMAT_VERSION: u32 = 1;

/// Encoded size of [`BackupHeader`].
pub const BACKUP_HEADER_SIZE: usize = 3 * WORD_SIZE;

/// Encoded size of [`DsHeader`].
pub const DS_HEADER_SIZE: usize = 3 * WORD_SIZE;

// ═══════════════════════════════════════════════════════════════════════════
// BACKUP HEADER
// ═══════════════════════════════════════════════════════════════════════════

/// Leading header of the backup region.
///
/// ```text
/// word0  format version
/// word1  header size in bytes
/// word2  payload size in words (all records, headers included)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupHeader {
    pub version: u32,
    pub header_size: u32,
    pub payload_words: u32,
}

impl BackupHeader {
    /// Header for `payload_words` words of records in the current format.
    pub const fn new(payload_words: u32) -> Self {
        Self {
            version: BACKUP_FORMAT_VERSION,
            header_size: BACKUP_HEADER_SIZE as u32,
            payload_words,
        }
    }

    pub fn payload_bytes(&self) -> u64 {
        u64::from(self.payload_words) * WORD_SIZE as u64
    }

    pub fn encode(&self) -> [u8; BACKUP_HEADER_SIZE] {
        let mut out = [0u8; BACKUP_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..8].copy_from_slice(&self.header_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.payload_words.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8; BACKUP_HEADER_SIZE]) -> Self {
        Self {
            version: word(bytes, 0),
            header_size: word(bytes, 1),
            payload_words: word(bytes, 2),
        }
    }

    pub fn read_from(mem: &dyn Memory, addr: u64) -> Result<Self, MemoryError> {
        let mut raw = [0u8; BACKUP_HEADER_SIZE];
        mem.read(addr, &mut raw)?;
        Ok(Self::decode(&raw))
    }

    pub fn write_to(&self, mem: &mut dyn Memory, addr: u64) -> Result<(), MemoryError> {
        mem.write(addr, &self.encode())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RECORD HEADER
// ═══════════════════════════════════════════════════════════════════════════

/// Header written in front of every stored structure.
///
/// ```text
/// word0  module id (bits 0-15) | structure id (bits 16-31)
/// word1  version (bits 0-7)    | lowest compatible version (bits 8-15)
/// word2  payload length in bytes
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsHeader {
    pub id: DsId,
    pub version: DsVersion,
    pub len: u32,
}

impl DsHeader {
    pub fn for_descriptor(desc: &DsDescriptor) -> Self {
        Self {
            id: desc.id(),
            version: desc.version(),
            len: desc.len() as u32,
        }
    }

    pub fn encode(&self) -> [u8; DS_HEADER_SIZE] {
        let ident = u32::from(self.id.module.0) | (u32::from(self.id.structure) << 16);
        let version =
            u32::from(self.version.version) | (u32::from(self.version.lowest_compatible) << 8);

        let mut out = [0u8; DS_HEADER_SIZE];
        out[0..4].copy_from_slice(&ident.to_le_bytes());
        out[4..8].copy_from_slice(&version.to_le_bytes());
        out[8..12].copy_from_slice(&self.len.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8; DS_HEADER_SIZE]) -> Self {
        let ident = word(bytes, 0);
        let version = word(bytes, 1);
        Self {
            id: DsId::new(ModuleId(ident as u16), (ident >> 16) as u16),
            version: DsVersion::new(version as u8, (version >> 8) as u8),
            len: word(bytes, 2),
        }
    }

    pub fn read_from(mem: &dyn Memory, addr: u64) -> Result<Self, MemoryError> {
        let mut raw = [0u8; DS_HEADER_SIZE];
        mem.read(addr, &mut raw)?;
        Ok(Self::decode(&raw))
    }

    pub fn write_to(&self, mem: &mut dyn Memory, addr: u64) -> Result<(), MemoryError> {
        mem.write(addr, &self.encode())
    }
}

fn word(bytes: &[u8], index: usize) -> u32 {
    let at = index * WORD_SIZE;
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
