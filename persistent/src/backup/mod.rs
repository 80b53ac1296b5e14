//! Backup region format and the two passes over it.
//!
//! All fields are little-endian 32-bit words. A region holds one
//! [`BackupHeader`] followed by back-to-back records, each a [`DsHeader`]
//! and its payload. Payload lengths are word multiples, so every header
//! stays word aligned.

mod header;
mod restore;
mod store;

pub use header::{
    BackupHeader, DsHeader, BACKUP_FORMAT_VERSION, BACKUP_HEADER_SIZE, DS_HEADER_SIZE,
};
pub use restore::{restore_all, RestoreReport};
pub use store::{store_all, StoreReport};
