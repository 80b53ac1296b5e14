//! Module shutdown lifecycle.
//!
//! Modules that own live state register here, optionally with a
//! [`Shutdownable`] handler. The table drives every state transition; a
//! module never moves itself.
//!
//! ```text
//!            initiate              complete
//!   Normal ───────────▶ Initiated ───────────▶ Completed
//!     ▲                    │
//!     └────── abort ───────┘
//! ```
//!
//! A module without a handler has nothing to drain and follows the same
//! transitions without being called.

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{debug, warn};
use plm_persistent::ModuleId;

use crate::error::{Result, UpdateError};

/// Phase passed to a module's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownPhase {
    /// Stop accepting new external work
    Initiate = 1,
    /// Confirm all state is quiescent
    Complete = 2,
    /// Return to normal operation
    Abort = 3,
}

/// Answer of a module's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownResponse {
    Success,
    /// Work still in flight; ask again later
    RetryLater,
    /// Handler-defined failure code
    Failure(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleShutdownState {
    Normal,
    ShutdownInitiated,
    ShutdownCompleted,
}

/// Module-side shutdown handler.
pub trait Shutdownable {
    fn shutdown(&mut self, phase: ShutdownPhase) -> ShutdownResponse;
}

/// Outcome of one pass of [`ModuleTable::complete_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletePass {
    /// Every module is shut down
    Done,
    /// This module asked to be called again
    RetryLater(ModuleId),
    /// This module failed outright
    Failed(ModuleId, u32),
}

struct ModuleEntry {
    id: ModuleId,
    handler: Option<Box<dyn Shutdownable>>,
    state: ModuleShutdownState,
}

impl ModuleEntry {
    fn call(&mut self, phase: ShutdownPhase) -> ShutdownResponse {
        match self.handler.as_mut() {
            Some(handler) => handler.shutdown(phase),
            None => ShutdownResponse::Success,
        }
    }
}

/// Registered modules, in registration order.
#[derive(Default)]
pub struct ModuleTable {
    entries: Vec<ModuleEntry>,
}

impl ModuleTable {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, id: ModuleId, handler: Option<Box<dyn Shutdownable>>) -> Result<()> {
        if self.entries.iter().any(|e| e.id == id) {
            return Err(UpdateError::DuplicateModule { module: id });
        }
        self.entries.push(ModuleEntry {
            id,
            handler,
            state: ModuleShutdownState::Normal,
        });
        Ok(())
    }

    pub fn state(&self, id: ModuleId) -> Option<ModuleShutdownState> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// Ask every module, most dependent first, to initiate shutdown.
    ///
    /// On the first refusal every module initiated so far is aborted,
    /// newest first, and the refusing module is returned.
    pub fn initiate_all(&mut self) -> core::result::Result<(), ModuleId> {
        for idx in (0..self.entries.len()).rev() {
            let entry = &mut self.entries[idx];
            if entry.state != ModuleShutdownState::Normal {
                continue;
            }
            match entry.call(ShutdownPhase::Initiate) {
                ShutdownResponse::Success => {
                    entry.state = ModuleShutdownState::ShutdownInitiated;
                }
                response => {
                    let failed = entry.id;
                    warn!("module {} refused shutdown: {:?}", failed, response);
                    self.abort_after(idx);
                    return Err(failed);
                }
            }
        }
        Ok(())
    }

    /// Abort the modules initiated before the one at `idx` refused.
    ///
    /// Initiation runs from the end of the table, so walking forward from
    /// `idx` aborts the newest first.
    fn abort_after(&mut self, idx: usize) {
        for entry in self.entries[idx + 1..].iter_mut() {
            if entry.state == ModuleShutdownState::ShutdownInitiated {
                Self::abort_entry(entry);
            }
        }
    }

    /// Abort every module still in `ShutdownInitiated`.
    pub fn abort_all(&mut self) {
        for entry in self.entries.iter_mut() {
            if entry.state == ModuleShutdownState::ShutdownInitiated {
                Self::abort_entry(entry);
            }
        }
    }

    fn abort_entry(entry: &mut ModuleEntry) {
        let response = entry.call(ShutdownPhase::Abort);
        if response != ShutdownResponse::Success {
            warn!("module {} abort returned {:?}", entry.id, response);
        }
        entry.state = ModuleShutdownState::Normal;
    }

    /// Ask every initiated module, most dependent first, to confirm it is
    /// quiescent. Modules already completed are not asked again.
    pub fn complete_all(&mut self) -> CompletePass {
        for entry in self.entries.iter_mut().rev() {
            if entry.state != ModuleShutdownState::ShutdownInitiated {
                continue;
            }
            match entry.call(ShutdownPhase::Complete) {
                ShutdownResponse::Success => {
                    debug!("module {} shut down", entry.id);
                    entry.state = ModuleShutdownState::ShutdownCompleted;
                }
                ShutdownResponse::RetryLater => return CompletePass::RetryLater(entry.id),
                ShutdownResponse::Failure(code) => return CompletePass::Failed(entry.id, code),
            }
        }
        CompletePass::Done
    }
}
