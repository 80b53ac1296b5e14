use log::{debug, info};
use plm_hwinit::{Memory, WORD_SIZE};

use super::header::{BackupHeader, DsHeader, BACKUP_HEADER_SIZE, DS_HEADER_SIZE};
use crate::ds::{DataStructureRegistry, Window};
use crate::error::{PersistError, Result};
use crate::region::BackupRegion;

/// Outcome of a successful [`store_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreReport {
    /// Records written
    pub records: usize,
    /// Bytes used, backup header included
    pub bytes: u64,
}

/// Serialize every registered structure into `region`.
///
/// Records are written in registration order. A record whose end would
/// pass the region bound is refused before any of its bytes are written;
/// in that case the leading header still announces an empty payload, so a
/// later restore finds nothing to apply.
pub fn store_all(
    registry: &DataStructureRegistry,
    mem: &mut dyn Memory,
    region: BackupRegion,
) -> Result<StoreReport> {
    if !region.can_hold(BACKUP_HEADER_SIZE as u64) {
        return Err(PersistError::RegionTooSmall {
            needed: BACKUP_HEADER_SIZE as u64,
            capacity: region.size(),
        });
    }

    // Placeholder: empty payload until every record is in place
    BackupHeader::new(0).write_to(mem, region.start())?;

    let mut offset = BACKUP_HEADER_SIZE as u64;
    let mut records = 0usize;

    for desc in registry.iter() {
        let end = offset + desc.record_size();
        if end > region.size() {
            return Err(PersistError::Overflow {
                id: desc.id(),
                end,
                capacity: region.size(),
            });
        }

        let record = region.start() + offset;
        let payload = record + DS_HEADER_SIZE as u64;
        DsHeader::for_descriptor(desc).write_to(mem, record)?;

        let mut window = Window::new(mem, payload, desc.len());
        desc.ops()
            .store(desc, &mut window, payload)
            .map_err(|source| PersistError::Handler {
                id: desc.id(),
                source,
            })?;

        debug!("stored {} ({} bytes) at {:#x}", desc.id(), desc.len(), record);
        offset = end;
        records += 1;
    }

    let payload_words = (offset - BACKUP_HEADER_SIZE as u64) / WORD_SIZE as u64;
    BackupHeader::new(payload_words as u32).write_to(mem, region.start())?;

    info!(
        "backed up {} structures ({} of {} bytes)",
        records,
        offset,
        region.size()
    );
    Ok(StoreReport {
        records,
        bytes: offset,
    })
}
