//! Boot ROM request/acknowledge protocol.
//!
//! Everything here is plain register traffic over [`Mmio`], so the same
//! code runs from the relocated trampoline (on [`PhysicalMmio`]) and in
//! tests (on a fake register file). Functions used by the trampoline are
//! `#[inline(always)]`: the relocated copy cannot call back into the image
//! it was copied from.
//!
//! [`PhysicalMmio`]: plm_hwinit::PhysicalMmio
//!
//! ```text
//!   PMC                                   ROM
//!   ───                                   ───
//!   scratch_low/high ← image address
//!   rom_int          ← PlmUpdate mask ──▶ re-validate image
//!   wfi                                   │
//!   poll rom_int_reason  ◀── ack bit ─────┘
//!   rom_int_reason   ← mask (clear)
//!   boot_err == 0 ?  ── yes ──▶ jump reset_vector
//!                    ── no  ──▶ fw_err, delay, POR (or spin)
//! ```

use plm_hwinit::{delay_spins, spin_forever, Mmio};
use thiserror::Error;

use crate::config::{RegisterMap, TerminalAction, UpdateConfig, MILLI_SEC};

/// Status written to the firmware error register when the handoff fails.
pub const HANDOFF_ERROR_CODE: u32 = 0x20D;

// ═══════════════════════════════════════════════════════════════════════════
// ROM SERVICES
// ═══════════════════════════════════════════════════════════════════════════

/// Services the ROM performs on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RomService {
    /// Device-management channel signature
    DmeChannelSignature = 0,
    /// Measurement register extension
    PcrExtend = 1,
    Sha2Hash = 2,
    /// In-place firmware update
    PlmUpdate = 3,
}

/// Request/acknowledge bit of each service, indexed by discriminant.
const SERVICE_MASKS: [u32; 4] = [1 << 0, 1 << 1, 1 << 2, 1 << 3];

impl RomService {
    pub const ALL: [Self; 4] = [
        Self::DmeChannelSignature,
        Self::PcrExtend,
        Self::Sha2Hash,
        Self::PlmUpdate,
    ];

    #[inline(always)]
    pub const fn mask(self) -> u32 {
        SERVICE_MASKS[self as usize]
    }

    /// Service whose bit alone is set in `reason`.
    pub fn from_reason(reason: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.mask() == reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RomError {
    #[error("ROM did not acknowledge within the poll budget")]
    Timeout,

    #[error("ROM reported boot error {0:#x}")]
    BootError(u32),

    /// The update service is only reachable through the handoff
    #[error("ROM service {0:?} cannot be requested directly")]
    InvalidRequest(RomService),
}

// ═══════════════════════════════════════════════════════════════════════════
// HANDOFF ARGUMENTS
// ═══════════════════════════════════════════════════════════════════════════

/// Everything the trampoline needs, as plain words.
///
/// Copied next to the relocated code so the trampoline never has to look
/// at memory owned by the old image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct HandoffArgs {
    pub image_low: u32,
    pub image_high: u32,
    pub scratch_low: u32,
    pub scratch_high: u32,
    pub rom_int: u32,
    pub rom_int_reason: u32,
    pub boot_err: u32,
    pub fw_err: u32,
    pub reset_ctrl: u32,
    pub por_mask: u32,
    pub ipor_delay: u32,
    pub reset_vector: u32,
    pub poll_budget: u32,
    /// Non-zero: spin instead of resetting on failure
    pub spin_on_failure: u32,
}

impl HandoffArgs {
    pub fn new(config: &UpdateConfig, image: u64) -> Self {
        let map: &RegisterMap = &config.regs;
        Self {
            image_low: image as u32,
            image_high: (image >> 32) as u32,
            scratch_low: map.scratch_low,
            scratch_high: map.scratch_high,
            rom_int: map.rom_int,
            rom_int_reason: map.rom_int_reason,
            boot_err: map.boot_err,
            fw_err: map.fw_err,
            reset_ctrl: map.reset_ctrl,
            por_mask: map.por_mask,
            ipor_delay: map.ipor_delay,
            reset_vector: map.reset_vector,
            poll_budget: config.rom_poll_budget,
            spin_on_failure: u32::from(config.terminal == TerminalAction::Spin),
        }
    }

    pub fn image(&self) -> u64 {
        (u64::from(self.image_high) << 32) | u64::from(self.image_low)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PROTOCOL
// ═══════════════════════════════════════════════════════════════════════════

/// Raise `mask` on `rom_int` and poll `reason` for the same bits.
///
/// `wait` runs once after the request is raised. The reason bits are
/// cleared again on acknowledgement.
#[inline(always)]
fn raise_and_wait<R, W>(
    regs: &mut R,
    rom_int: u32,
    reason: u32,
    mask: u32,
    budget: u32,
    mut wait: W,
) -> Result<(), RomError>
where
    R: Mmio + ?Sized,
    W: FnMut(),
{
    regs.write32(rom_int, mask);
    wait();

    let mut acked = false;
    for _ in 0..budget {
        if regs.read32(reason) & mask == mask {
            acked = true;
            break;
        }
    }
    if !acked {
        return Err(RomError::Timeout);
    }

    regs.write32(reason, mask);
    Ok(())
}

/// Ask the ROM for one of its ordinary services.
pub fn request_service<R: Mmio + ?Sized>(
    regs: &mut R,
    map: &RegisterMap,
    service: RomService,
    budget: u32,
) -> Result<(), RomError> {
    if service == RomService::PlmUpdate {
        return Err(RomError::InvalidRequest(service));
    }
    raise_and_wait(regs, map.rom_int, map.rom_int_reason, service.mask(), budget, || {})
}

/// Hand the candidate image to the ROM and wait for its verdict.
///
/// `Ok` means the ROM accepted the image and the caller must jump to
/// `args.reset_vector`.
#[inline(always)]
pub fn handshake<R, W>(regs: &mut R, args: &HandoffArgs, wait: W) -> Result<(), RomError>
where
    R: Mmio + ?Sized,
    W: FnMut(),
{
    regs.write32(args.scratch_low, args.image_low);
    regs.write32(args.scratch_high, args.image_high);

    raise_and_wait(
        regs,
        args.rom_int,
        args.rom_int_reason,
        RomService::PlmUpdate.mask(),
        args.poll_budget,
        wait,
    )?;

    match regs.read32(args.boot_err) {
        0 => Ok(()),
        err => Err(RomError::BootError(err)),
    }
}

/// Leave a trace of the failure where the next boot can see it.
#[inline(always)]
pub fn record_failure<R: Mmio + ?Sized>(regs: &mut R, args: &HandoffArgs, err: RomError) {
    let detail = match err {
        RomError::BootError(code) => code & 0xFFFF,
        _ => 0,
    };
    regs.write32(args.fw_err, (HANDOFF_ERROR_CODE << 16) | detail);
}

/// Assert the power-on reset.
#[inline(always)]
pub fn trigger_por<R: Mmio + ?Sized>(regs: &mut R, args: &HandoffArgs) {
    regs.modify32(args.reset_ctrl, args.por_mask, args.por_mask);
}

/// End of the line after a failed handoff.
#[inline(always)]
pub fn terminal<R: Mmio + ?Sized>(regs: &mut R, args: &HandoffArgs, err: RomError) -> ! {
    record_failure(regs, args, err);
    if args.spin_on_failure != 0 {
        spin_forever();
    }

    let delay_ms = regs.read32(args.ipor_delay);
    delay_spins(delay_ms.saturating_mul(MILLI_SEC));
    trigger_por(regs, args);
    spin_forever()
}
