use log::{debug, info, warn};
use plm_hwinit::{Memory, WORD_SIZE};

use super::header::{
    BackupHeader, DsHeader, BACKUP_FORMAT_VERSION, BACKUP_HEADER_SIZE, DS_HEADER_SIZE,
};
use crate::ds::{DataStructureRegistry, Window};
use crate::error::{PersistError, Result};
use crate::region::BackupRegion;

/// Outcome of a successful [`restore_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Records applied to a live structure
    pub restored: usize,
    /// Records with no live counterpart in this image
    pub skipped: usize,
}

/// Apply every record in `region` to the matching live structure.
///
/// For each record whose identity is registered here:
///
/// - stored older than the live `lowest_compatible` version: fatal
/// - stored shorter than live: copy it, zero the rest of the live copy
/// - stored longer than live: copy the live length, ignore the remainder
///
/// Records nobody registered are skipped. Header version or size
/// disagreement, or a payload that does not fit the region, is fatal
/// before anything is written.
pub fn restore_all(
    registry: &DataStructureRegistry,
    mem: &mut dyn Memory,
    region: BackupRegion,
) -> Result<RestoreReport> {
    if !region.can_hold(BACKUP_HEADER_SIZE as u64) {
        return Err(PersistError::RegionTooSmall {
            needed: BACKUP_HEADER_SIZE as u64,
            capacity: region.size(),
        });
    }

    let header = BackupHeader::read_from(mem, region.start())?;
    if header.version != BACKUP_FORMAT_VERSION {
        return Err(PersistError::VersionMismatch {
            found: header.version,
            expected: BACKUP_FORMAT_VERSION,
        });
    }
    if header.header_size != BACKUP_HEADER_SIZE as u32 {
        return Err(PersistError::HeaderSizeMismatch {
            found: header.header_size,
            expected: BACKUP_HEADER_SIZE as u32,
        });
    }

    let limit = BACKUP_HEADER_SIZE as u64 + header.payload_bytes();
    if limit > region.size() {
        return Err(PersistError::Corrupt { offset: 0 });
    }

    let mut report = RestoreReport::default();
    let mut offset = BACKUP_HEADER_SIZE as u64;

    while offset < limit {
        if offset + DS_HEADER_SIZE as u64 > limit {
            return Err(PersistError::Corrupt { offset });
        }
        let record = DsHeader::read_from(mem, region.start() + offset)?;
        let stored_len = record.len as usize;
        let end = offset + (DS_HEADER_SIZE + stored_len) as u64;
        if stored_len % WORD_SIZE != 0 || end > limit {
            return Err(PersistError::Corrupt { offset });
        }

        match registry.get(record.id) {
            None => {
                warn!("no live structure for stored {}, skipping", record.id);
                report.skipped += 1;
            }
            Some(desc) => {
                let live = desc.version();
                if !live.accepts(record.version.version) {
                    return Err(PersistError::IncompatibleVersion {
                        id: record.id,
                        stored: record.version.version,
                        lowest: live.lowest_compatible,
                    });
                }
                if stored_len != desc.len() {
                    debug!(
                        "{} changed size: stored {} bytes, live {}",
                        record.id,
                        stored_len,
                        desc.len()
                    );
                }

                let payload = region.start() + offset + DS_HEADER_SIZE as u64;
                let mut window = Window::new(mem, desc.addr(), desc.len());
                desc.ops()
                    .restore(desc, &mut window, payload, stored_len)
                    .map_err(|source| PersistError::Handler {
                        id: desc.id(),
                        source,
                    })?;
                report.restored += 1;
            }
        }
        offset = end;
    }

    info!(
        "restored {} structures, skipped {}",
        report.restored, report.skipped
    );
    Ok(report)
}
