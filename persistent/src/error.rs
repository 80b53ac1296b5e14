//! Backup and restore errors.

use plm_hwinit::MemoryError;
use thiserror::Error;

use crate::ds::DsId;

/// Result type for this crate.
pub type Result<T> = core::result::Result<T, PersistError>;

/// Failure reported by a store/restore handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Handler refused the data; the code is handler-defined
    #[error("handler rejected the data (code {0:#x})")]
    Rejected(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PersistError {
    // ─────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────
    #[error("structure {id} registered twice")]
    Duplicate { id: DsId },

    #[error("structure {id} length {len} is not a multiple of the word size")]
    Misaligned { id: DsId, len: usize },

    // ─────────────────────────────────────────────────────────────────────
    // Region
    // ─────────────────────────────────────────────────────────────────────
    #[error("backup region of {capacity} bytes cannot hold {needed} bytes")]
    RegionTooSmall { needed: u64, capacity: u64 },

    #[error("structure {id} would end at offset {end:#x}, past region size {capacity:#x}")]
    Overflow { id: DsId, end: u64, capacity: u64 },

    // ─────────────────────────────────────────────────────────────────────
    // Restore
    // ─────────────────────────────────────────────────────────────────────
    #[error("backup format version {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("backup header size {found}, expected {expected}")]
    HeaderSizeMismatch { found: u32, expected: u32 },

    #[error("backup region is corrupt at offset {offset:#x}")]
    Corrupt { offset: u64 },

    #[error("structure {id} stored at version {stored}, oldest accepted is {lowest}")]
    IncompatibleVersion { id: DsId, stored: u8, lowest: u8 },

    // ─────────────────────────────────────────────────────────────────────
    // Data movement
    // ─────────────────────────────────────────────────────────────────────
    #[error("handler for structure {id} failed: {source}")]
    Handler { id: DsId, source: HandlerError },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
