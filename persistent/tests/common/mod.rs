//! Shared fixtures: a board with live structures and a backup region.

#![allow(dead_code)]

use plm_hwinit::SparseMemory;
use plm_persistent::{BackupRegion, DataStructureRegistry, DsDescriptor, DsId, DsVersion, ModuleId};

/// Live data of the running image.
pub const LIVE_BASE: u64 = 0x1000_0000;
/// Live data of the replacement image (different link addresses).
pub const NEW_LIVE_BASE: u64 = 0x2000_0000;
/// Reserved backup region.
pub const REGION_BASE: u64 = 0x4000_0000;
/// Mapped bytes behind the region, so overruns would be visible.
pub const REGION_MAPPED: usize = 0x1000;

pub const PLM: ModuleId = ModuleId(0x01);
pub const LOADER: ModuleId = ModuleId(0x07);

/// Deterministic non-zero bytes.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8) | 1).collect()
}

pub fn id(module: ModuleId, structure: u16) -> DsId {
    DsId::new(module, structure)
}

/// Memory with a live area, a second live area and the region mapped.
pub fn board() -> SparseMemory {
    let mut mem = SparseMemory::new();
    mem.map(LIVE_BASE, 0x1000)
        .map(NEW_LIVE_BASE, 0x1000)
        .map(REGION_BASE, REGION_MAPPED);
    mem
}

pub fn region(size: u64) -> BackupRegion {
    BackupRegion::new(REGION_BASE, size).expect("valid test region")
}

/// Registry of the running image: an 8-byte and a 16-byte structure.
pub fn old_image(mem: &mut SparseMemory) -> DataStructureRegistry {
    use plm_hwinit::Memory;

    let mut reg = DataStructureRegistry::new();
    mem.write(LIVE_BASE, &pattern(8, 0x10)).unwrap();
    mem.write(LIVE_BASE + 0x100, &pattern(16, 0x40)).unwrap();
    reg.register(DsDescriptor::new(id(PLM, 1), DsVersion::any(1), LIVE_BASE, 8))
        .unwrap();
    reg.register(DsDescriptor::new(
        id(LOADER, 2),
        DsVersion::any(1),
        LIVE_BASE + 0x100,
        16,
    ))
    .unwrap();
    reg
}
