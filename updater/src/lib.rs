//! In-Place Firmware Update
//!
//! Replaces the running platform management firmware with a new image on
//! a live system, without a power cycle, keeping the operational state of
//! every registered module.
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────────────┐
//!   request ─────────▶ │    UpdateContext     │ ◀── resume() in new image
//!                      │  (orchestrator.rs)   │
//!                      └──┬──────┬──────┬─────┘
//!                         │      │      │
//!        ┌────────────────┘      │      └──────────────┐
//!        ▼                       ▼                     ▼
//!   ModuleTable            plm-persistent         HandoffChannel
//!   (module.rs)            store/restore          (handoff/)
//!   initiate/complete/     DataStructureRegistry   ROM handshake,
//!   abort                                          trampoline
//! ```
//!
//! # Failure Classes
//!
//! | Class    | Examples                                  | Outcome                 |
//! |----------|-------------------------------------------|-------------------------|
//! | Rejected | in progress, fuse, region, gate           | nothing changed         |
//! | Shutdown | initiate refused / complete failed        | abort / degraded        |
//! | Backup   | overflow, handler failure                 | old image keeps running |
//! | Handoff  | ROM timeout, boot error                   | reset or debug spin     |
//!
//! Only the last class is unrecoverable, and it never returns to software.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod gate;
pub mod handoff;
pub mod module;
pub mod orchestrator;
pub mod request;
pub mod scheduler;
pub mod state;
pub mod watchdog;

pub use config::{RegisterMap, TerminalAction, UpdateConfig, WatchdogPolicy};
pub use error::{Result, UpdateError};
pub use gate::{AcceptAll, CompatibilityGate, GateError, HeaderWordGate};
pub use handoff::{HandoffArgs, HandoffChannel, RomError, RomHandoff, RomService};
pub use module::{
    CompletePass, ModuleShutdownState, ModuleTable, ShutdownPhase, ShutdownResponse, Shutdownable,
};
pub use orchestrator::{UpdateContext, UpdatePhase, UpdateTask};
pub use request::{Acknowledge, CandidateImage, ImageSource, UpdateRequest};
pub use scheduler::TaskQueue;
pub use state::{UpdateFlag, UpdateState};
pub use watchdog::{ErrorActions, Watchdog, WatchdogError};

// Re-exported so integrators need only this crate for registration
pub use plm_persistent::{DsDescriptor, DsId, DsOps, DsVersion, ModuleId};
