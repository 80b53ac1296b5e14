//! Low-power wait, bounded delays and the terminal spin.

/// Put the core into its low-power wait until the next event.
///
/// On Arm `wfi` wakes on a pending interrupt even while interrupts are
/// masked, which is what the ROM handshake relies on.
#[inline(always)]
pub fn wait_for_interrupt() {
    #[cfg(all(target_os = "none", any(target_arch = "aarch64", target_arch = "arm")))]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }

    #[cfg(all(target_os = "none", any(target_arch = "riscv32", target_arch = "riscv64")))]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }

    // hlt with IF=0 never wakes; just yield the pipeline
    #[cfg(any(not(target_os = "none"), target_arch = "x86_64"))]
    core::hint::spin_loop();
}

/// Busy-wait for `spins` iterations.
#[inline(always)]
pub fn delay_spins(spins: u32) {
    for _ in 0..spins {
        core::hint::spin_loop();
    }
}

/// Park the core forever. Used where a debugger is expected to attach.
#[inline(always)]
pub fn spin_forever() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
