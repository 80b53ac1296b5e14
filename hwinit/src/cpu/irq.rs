//! Interrupt and exception masking.
//!
//! Masking is one-way on the update path: once the orchestrator reaches
//! relocation nothing outside the trampoline may run, so there is no
//! matching "enable" here.

#[cfg(not(target_os = "none"))]
use core::sync::atomic::{AtomicBool, Ordering};

/// Simulated mask state for hosted builds.
#[cfg(not(target_os = "none"))]
static SIMULATED_MASKED: AtomicBool = AtomicBool::new(false);

/// Mask external interrupts and asynchronous exceptions.
#[inline(always)]
pub fn disable_interrupts_and_exceptions() {
    #[cfg(all(target_os = "none", target_arch = "aarch64"))]
    unsafe {
        // D, A, I, F
        core::arch::asm!("msr daifset, #0xf", options(nomem, nostack));
    }

    #[cfg(all(target_os = "none", target_arch = "arm"))]
    unsafe {
        core::arch::asm!("cpsid aif", options(nomem, nostack));
    }

    #[cfg(all(target_os = "none", any(target_arch = "riscv32", target_arch = "riscv64")))]
    unsafe {
        // mstatus.MIE
        core::arch::asm!("csrci mstatus, 0x8", options(nomem, nostack));
    }

    #[cfg(all(target_os = "none", target_arch = "x86_64"))]
    unsafe {
        core::arch::asm!("cli", options(nomem, nostack));
    }

    #[cfg(not(target_os = "none"))]
    SIMULATED_MASKED.store(true, Ordering::SeqCst);
}

/// Check whether interrupts are currently masked.
pub fn interrupts_masked() -> bool {
    #[cfg(all(target_os = "none", target_arch = "aarch64"))]
    {
        let daif: u64;
        unsafe { core::arch::asm!("mrs {}, daif", out(reg) daif, options(nomem, nostack)) };
        return daif & (1 << 7) != 0;
    }

    #[cfg(all(target_os = "none", target_arch = "arm"))]
    {
        let cpsr: u32;
        unsafe { core::arch::asm!("mrs {}, cpsr", out(reg) cpsr, options(nomem, nostack)) };
        return cpsr & (1 << 7) != 0;
    }

    #[cfg(all(target_os = "none", any(target_arch = "riscv32", target_arch = "riscv64")))]
    {
        let mstatus: usize;
        unsafe { core::arch::asm!("csrr {}, mstatus", out(reg) mstatus, options(nomem, nostack)) };
        return mstatus & 0x8 == 0;
    }

    #[cfg(all(target_os = "none", target_arch = "x86_64"))]
    {
        let rflags: u64;
        unsafe { core::arch::asm!("pushfq; pop {}", out(reg) rflags) };
        return (rflags & 0x200) == 0;
    }

    #[cfg(not(target_os = "none"))]
    SIMULATED_MASKED.load(Ordering::SeqCst)
}

/// Reset the simulated mask (hosted builds only).
#[cfg(not(target_os = "none"))]
pub fn reset_simulated_mask() {
    SIMULATED_MASKED.store(false, Ordering::SeqCst);
}
