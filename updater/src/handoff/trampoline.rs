//! Relocated handoff routine.
//!
//! The code between `__plm_trampoline_start` and `__plm_trampoline_end`
//! (the `.plm_trampoline` output section, see the board linker script) is
//! copied to the safe address together with its [`HandoffArgs`], then
//! called there. Everything it runs is inlined into
//! [`trampoline_entry`]; the only targets it reaches outside itself are
//! device registers and the reset vector.
//!
//! ```text
//!   safe_addr
//!   ┌──────────────────────────┐
//!   │ .plm_trampoline code     │  ← entry = safe_addr + (entry - start)
//!   ├──────────────────────────┤  (aligned)
//!   │ HandoffArgs              │
//!   └──────────────────────────┘
//! ```

use core::mem::align_of;
use core::ptr::{addr_of, copy_nonoverlapping, write_volatile};
use core::sync::atomic::{compiler_fence, Ordering};

use plm_hwinit::{disable_interrupts_and_exceptions, wait_for_interrupt, PhysicalMmio};

use super::rom::{handshake, terminal, HandoffArgs};

extern "C" {
    static __plm_trampoline_start: u8;
    static __plm_trampoline_end: u8;
}

type Entry = unsafe extern "C" fn(*const HandoffArgs) -> !;
type ResetVector = unsafe extern "C" fn() -> !;

#[link_section = ".plm_trampoline"]
#[inline(never)]
unsafe extern "C" fn trampoline_entry(args: *const HandoffArgs) -> ! {
    // Borrowed in place: copying the block out could become a memcpy call
    let args = &*args;
    let mut regs = PhysicalMmio::new();

    match handshake(&mut regs, args, wait_for_interrupt) {
        Ok(()) => {
            let vector: ResetVector = core::mem::transmute(args.reset_vector as usize);
            vector()
        }
        Err(err) => terminal(&mut regs, args, err),
    }
}

/// Copy the trampoline and its arguments to `safe_addr` and enter it.
///
/// # Safety
/// `safe_addr` must be writable and executable, unused by anything else,
/// and large enough for the trampoline section plus [`HandoffArgs`].
pub unsafe fn relocate_and_enter(safe_addr: usize, args: &HandoffArgs) -> ! {
    let start = addr_of!(__plm_trampoline_start) as usize;
    let end = addr_of!(__plm_trampoline_end) as usize;
    let code_len = end - start;
    let entry_offset = trampoline_entry as usize - start;

    let align = align_of::<HandoffArgs>();
    let args_addr = (safe_addr + code_len + align - 1) & !(align - 1);

    copy_nonoverlapping(start as *const u8, safe_addr as *mut u8, code_len);
    write_volatile(args_addr as *mut HandoffArgs, *args);
    compiler_fence(Ordering::SeqCst);
    sync_instruction_cache();

    disable_interrupts_and_exceptions();

    let entry: Entry = core::mem::transmute(safe_addr + entry_offset);
    entry(args_addr as *const HandoffArgs)
}

/// Make freshly written code visible to instruction fetch.
#[inline(always)]
unsafe fn sync_instruction_cache() {
    #[cfg(target_arch = "aarch64")]
    core::arch::asm!("dsb ish", "ic iallu", "dsb ish", "isb", options(nostack));

    #[cfg(target_arch = "arm")]
    core::arch::asm!(
        "mcr p15, 0, {0}, c7, c5, 0",
        "dsb",
        "isb",
        in(reg) 0u32,
        options(nostack)
    );

    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    core::arch::asm!("fence.i", options(nostack));
}
