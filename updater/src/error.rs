//! Update errors.
//!
//! Every error has a stable status code. Codes are what a requester sees
//! in its acknowledgement and what lands in the firmware error register
//! when the handoff fails.

use plm_persistent::{ModuleId, PersistError};
use thiserror::Error;

use crate::gate::GateError;
use crate::handoff::RomError;

/// Result type for update operations.
pub type Result<T> = core::result::Result<T, UpdateError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UpdateError {
    /// Backup region missing or malformed when an update is requested
    #[error("no valid backup region reserved")]
    InvalidRegion,

    /// Backup region missing or malformed when the new image resumes
    #[error("no valid backup region to restore from")]
    InvalidRegionAtRestore,

    #[error("backup region of {capacity} bytes is smaller than the {needed} bytes required")]
    InsufficientRegion { needed: u64, capacity: u64 },

    /// Image store holds no image
    #[error("image store is empty")]
    ImageStore,

    #[error("an update is already in progress")]
    InProgress,

    #[error("module {module} refused to initiate shutdown")]
    ShutdownInitiate { module: ModuleId },

    #[error("in-place update disabled by fuse")]
    Disabled,

    /// A deferred task ran with no update pending
    #[error("no pending update for this task")]
    TaskNotFound,

    #[error("watchdog could not be quiesced")]
    Watchdog,

    #[error("boot ROM rejected the handoff: {0}")]
    Rom(RomError),

    #[error(transparent)]
    Incompatible(#[from] GateError),

    #[error("module {module} failed to complete shutdown (code {code:#x})")]
    ShutdownComplete { module: ModuleId, code: u32 },

    #[error("backup failed: {0}")]
    Backup(PersistError),

    #[error("restore failed: {0}")]
    Restore(PersistError),

    #[error("module {module} registered twice")]
    DuplicateModule { module: ModuleId },

    #[error("data structure registration failed: {0}")]
    Registration(PersistError),
}

impl UpdateError {
    /// Stable status code.
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidRegion => 0x200,
            Self::InvalidRegionAtRestore => 0x201,
            Self::InsufficientRegion { .. } => 0x202,
            Self::ImageStore => 0x203,
            Self::InProgress => 0x206,
            Self::ShutdownInitiate { .. } => 0x207,
            Self::Disabled => 0x208,
            Self::TaskNotFound => 0x209,
            Self::Watchdog => 0x20A,
            Self::Rom(_) => 0x20D,
            Self::Incompatible(_) => 0x20E,
            Self::ShutdownComplete { .. } => 0x20F,
            Self::Backup(_) => 0x210,
            Self::Restore(_) => 0x211,
            Self::DuplicateModule { .. } => 0x212,
            Self::Registration(_) => 0x213,
        }
    }

    /// True for errors raised before anything was changed.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidRegion
                | Self::InsufficientRegion { .. }
                | Self::ImageStore
                | Self::InProgress
                | Self::Disabled
                | Self::Incompatible(_)
        )
    }
}
