//! CPU Control
//!
//! The handful of processor operations the update path needs.
//!
//! # Modules
//!
//! - `irq` - Interrupt and exception masking
//! - `halt` - Low-power wait, bounded delays and terminal spin
//!
//! On bare-metal targets these compile to inline assembly. Hosted builds
//! (tests) get a simulated implementation with the same observable state.

pub mod halt;
pub mod irq;

pub use halt::{delay_spins, spin_forever, wait_for_interrupt};
pub use irq::{disable_interrupts_and_exceptions, interrupts_masked};
