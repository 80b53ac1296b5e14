//! Pre-flight checks on a candidate image.
//!
//! The compatibility rules themselves (identification strings, version
//! tables) belong to the integrator. The core only needs a yes or an
//! error code, and it asks before anything irreversible happens.

use plm_hwinit::{Memory, Mmio};
use thiserror::Error;

use crate::config::RegisterMap;
use crate::request::CandidateImage;

/// Rejection from a compatibility gate, with a gate-defined code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("candidate image rejected (code {0:#x})")]
pub struct GateError(pub u32);

/// Decides whether a candidate image may replace the running one.
pub trait CompatibilityGate {
    fn check(&mut self, image: &CandidateImage, mem: &dyn Memory) -> Result<(), GateError>;
}

impl<F> CompatibilityGate for F
where
    F: FnMut(&CandidateImage, &dyn Memory) -> Result<(), GateError>,
{
    fn check(&mut self, image: &CandidateImage, mem: &dyn Memory) -> Result<(), GateError> {
        self(image, mem)
    }
}

/// Gate that accepts every image.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl CompatibilityGate for AcceptAll {
    fn check(&mut self, _image: &CandidateImage, _mem: &dyn Memory) -> Result<(), GateError> {
        Ok(())
    }
}

/// Gate comparing a little-endian word at a fixed offset of the image.
///
/// Typical use is a platform or family identifier the loader places at a
/// known position in the image header.
#[derive(Debug, Clone, Copy)]
pub struct HeaderWordGate {
    pub offset: u64,
    pub expected: u32,
    /// Code reported on mismatch
    pub code: u32,
}

impl CompatibilityGate for HeaderWordGate {
    fn check(&mut self, image: &CandidateImage, mem: &dyn Memory) -> Result<(), GateError> {
        let found = mem
            .read_u32(image.addr + self.offset)
            .map_err(|_| GateError(self.code))?;
        if found == self.expected {
            Ok(())
        } else {
            Err(GateError(self.code))
        }
    }
}

/// True when the fuse disabling in-place update is blown.
pub fn update_disabled<R: Mmio + ?Sized>(regs: &R, map: &RegisterMap) -> bool {
    regs.read32(map.fuse) & map.fuse_disable_mask != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use plm_hwinit::{FakeRegisterFile, SparseMemory};

    fn image(addr: u64) -> CandidateImage {
        CandidateImage { addr, size: None }
    }

    #[test]
    fn test_closure_gate() {
        let mem = SparseMemory::new();
        let mut gate = |img: &CandidateImage, _: &dyn Memory| {
            if img.addr == 0x1000 {
                Ok(())
            } else {
                Err(GateError(7))
            }
        };
        assert!(gate.check(&image(0x1000), &mem).is_ok());
        assert_eq!(gate.check(&image(0x2000), &mem), Err(GateError(7)));
    }

    #[test]
    fn test_header_word_gate() {
        let mut mem = SparseMemory::new();
        mem.map_bytes(0x8000, &[0, 0, 0, 0, 0x78, 0x56, 0x34, 0x12]);
        let mut gate = HeaderWordGate {
            offset: 4,
            expected: 0x1234_5678,
            code: 0x33,
        };
        assert!(gate.check(&image(0x8000), &mem).is_ok());

        gate.expected = 0;
        assert_eq!(gate.check(&image(0x8000), &mem), Err(GateError(0x33)));
        // Unmapped image header
        assert_eq!(gate.check(&image(0x9000), &mem), Err(GateError(0x33)));
    }

    #[test]
    fn test_fuse_bit() {
        let map = RegisterMap::default();
        let mut regs = FakeRegisterFile::new();
        assert!(!update_disabled(&regs, &map));
        regs.set(map.fuse, map.fuse_disable_mask | 0x1);
        assert!(update_disabled(&regs, &map));
    }
}
