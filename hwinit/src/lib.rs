//! Hardware Access Layer
//!
//! The narrow slice of hardware the update manager is allowed to touch.
//! Everything above this crate talks to registers and memory through the
//! [`Mmio`] and [`Memory`] traits, so the same orchestration code runs on
//! the platform management controller and inside host-side tests.
//!
//! # Architecture
//!
//! ```text
//!   plm-updater / plm-persistent
//!        │              │
//!        ▼              ▼
//!   ┌─────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐
//!   │  Mmio   │   │  Memory  │   │   cpu     │   │  logger  │
//!   │ (regs)  │   │ (DDR/RAM)│   │ irq/halt  │   │  (log)   │
//!   └────┬────┘   └────┬─────┘   └─────┬─────┘   └────┬─────┘
//!        │             │               │              │
//!   PhysicalMmio  PhysicalMemory   inline asm    ring buffer + sink
//!   FakeRegisterFile  SparseMemory   (host: simulated)
//! ```
//!
//! # What This Crate Does NOT Do
//!
//! - Decide *what* to write (that's the updater)
//! - Know about backup formats (that's persistent)

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod cpu;
pub mod logger;
pub mod memory;
pub mod mmio;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

// ═══════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════

pub use cpu::{
    delay_spins, disable_interrupts_and_exceptions, interrupts_masked, spin_forever,
    wait_for_interrupt,
};
pub use logger::{BufferLogger, LogLine, LOGGER};
pub use memory::{Memory, MemoryError, PhysicalMemory, WORD_SIZE};
pub use mmio::{Mmio, PhysicalMmio};

#[cfg(any(test, feature = "testing"))]
pub use fake::{FakeRegisterFile, SparseMemory};
