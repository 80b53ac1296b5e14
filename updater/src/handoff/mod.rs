//! Handoff to the boot ROM.
//!
//! The last thing the old image does. [`HandoffChannel`] is the seam:
//! the orchestrator calls `relocate_and_jump` and never sees control
//! again. On hardware that is [`RomHandoff`], which copies the trampoline
//! to the safe address and enters it; tests substitute a fake.

pub mod rom;

#[cfg(target_os = "none")]
pub mod trampoline;

pub use rom::{
    handshake, record_failure, request_service, terminal, trigger_por, HandoffArgs, RomError,
    RomService, HANDOFF_ERROR_CODE,
};

use crate::config::UpdateConfig;

/// One-way transfer of control to a new image.
pub trait HandoffChannel {
    /// Relocate the handoff routine and run it for `image`.
    ///
    /// Interrupts and exceptions are masked before the relocated copy is
    /// entered. Success continues in the new image; failure ends in a
    /// reset or a debug spin.
    fn relocate_and_jump(&mut self, image: u64) -> !;
}

/// Handoff through the relocated trampoline.
#[derive(Debug, Clone, Copy)]
pub struct RomHandoff {
    config: UpdateConfig,
}

impl RomHandoff {
    /// # Safety
    /// `config.regs.safe_addr` must be writable, executable memory that
    /// nothing else uses from this point on, large enough for the
    /// trampoline and its arguments.
    pub unsafe fn new(config: UpdateConfig) -> Self {
        Self { config }
    }

    pub fn args(&self, image: u64) -> HandoffArgs {
        HandoffArgs::new(&self.config, image)
    }
}

#[cfg(target_os = "none")]
impl HandoffChannel for RomHandoff {
    fn relocate_and_jump(&mut self, image: u64) -> ! {
        let args = self.args(image);
        // Safety: safe_addr ownership is the contract of RomHandoff::new
        unsafe { trampoline::relocate_and_enter(self.config.regs.safe_addr as usize, &args) }
    }
}
