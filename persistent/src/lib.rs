//! Update-Surviving State
//!
//! Keeps the operational state of every firmware module alive across an
//! in-place image replacement. Modules register the data structures they
//! want carried over; just before handoff the old image serializes all of
//! them into a reserved memory region, and the new image walks that region
//! and copies each record back into its own live copy.
//!
//! # Architecture
//!
//! ```text
//!   old image                                  new image
//!   ─────────                                  ─────────
//!   DataStructureRegistry                      DataStructureRegistry
//!          │ store_all()                               ▲ restore_all()
//!          ▼                                           │
//!   ┌────────────────────────── BackupRegion ──────────┴───────────┐
//!   │ BackupHeader │ DsHeader │ payload │ DsHeader │ payload │ ... │
//!   └──────────────────────────────────────────────────────────────┘
//!        12 bytes     12 bytes   len        12 bytes   len
//! ```
//!
//! The two images are built separately, so a structure may have grown or
//! shrunk between them. The stored length says how much was written; the
//! live descriptor says how much the new image can take. See
//! [`backup::restore_all`] for the exact rules.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod backup;
pub mod ds;
pub mod error;
pub mod region;

pub use backup::{
    restore_all, store_all, BackupHeader, DsHeader, RestoreReport, StoreReport,
    BACKUP_FORMAT_VERSION, BACKUP_HEADER_SIZE, DS_HEADER_SIZE,
};
pub use ds::{ByteCopy, DataStructureRegistry, DsDescriptor, DsId, DsOps, DsVersion, ModuleId};
pub use error::{HandlerError, PersistError, Result};
pub use region::BackupRegion;
