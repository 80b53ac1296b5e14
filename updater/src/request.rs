//! Update requests.

use alloc::boxed::Box;

use plm_hwinit::Mmio;

use crate::config::RegisterMap;
use crate::error::{Result, UpdateError};

/// Where the replacement image lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Physical address given by the requester
    Address(u64),
    /// The image store published in the runtime configuration area
    ImageStore,
}

/// Resolved candidate image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateImage {
    pub addr: u64,
    /// Known only for images taken from the image store
    pub size: Option<u32>,
}

impl ImageSource {
    /// Turn the source into an address.
    pub fn resolve<R: Mmio + ?Sized>(&self, regs: &R, map: &RegisterMap) -> Result<CandidateImage> {
        match *self {
            Self::Address(addr) => Ok(CandidateImage { addr, size: None }),
            Self::ImageStore => {
                let addr = regs.read_split64(map.image_store_addr_high, map.image_store_addr_low);
                let size = regs.read32(map.image_store_size);
                if addr == 0 || size == 0 {
                    return Err(UpdateError::ImageStore);
                }
                Ok(CandidateImage {
                    addr,
                    size: Some(size),
                })
            }
        }
    }
}

/// Receives the deferred answer to an accepted request.
pub trait Acknowledge {
    fn acknowledge(&mut self, result: Result<()>);
}

/// A trigger-update request.
pub struct UpdateRequest {
    pub source: ImageSource,
    /// Called exactly once if the request is accepted
    pub requester: Option<Box<dyn Acknowledge>>,
}

impl UpdateRequest {
    /// Update from an explicit address, nobody to acknowledge.
    pub fn at(addr: u64) -> Self {
        Self {
            source: ImageSource::Address(addr),
            requester: None,
        }
    }

    /// Update from the image store.
    pub fn from_image_store() -> Self {
        Self {
            source: ImageSource::ImageStore,
            requester: None,
        }
    }

    pub fn acknowledged_by(mut self, requester: Box<dyn Acknowledge>) -> Self {
        self.requester = Some(requester);
        self
    }
}
