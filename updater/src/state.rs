//! Process-wide update state.
//!
//! The one piece of update state other contexts look at (command handlers
//! checking for re-entrancy, drivers deciding whether this is a warm
//! start after an update). Only the orchestrator writes it.

use core::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateState {
    /// No update running
    Idle = 0,
    /// Request accepted, old image shutting down
    InProgress = 1,
    /// This image was started by an update
    Done = 2,
}

impl UpdateState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::InProgress,
            2 => Self::Done,
            _ => Self::Idle,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InProgress => "in progress",
            Self::Done => "done",
        }
    }
}

/// Atomic holder of [`UpdateState`].
#[derive(Debug)]
pub struct UpdateFlag(AtomicU8);

impl UpdateFlag {
    pub const fn new() -> Self {
        Self(AtomicU8::new(UpdateState::Idle as u8))
    }

    pub fn get(&self) -> UpdateState {
        UpdateState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub fn is_in_progress(&self) -> bool {
        self.get() == UpdateState::InProgress
    }

    pub fn is_done(&self) -> bool {
        self.get() == UpdateState::Done
    }

    pub(crate) fn set(&self, state: UpdateState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Claim the flag for a new update.
    ///
    /// Succeeds from `Idle` or `Done` and returns the state it replaced, so
    /// a refused request can put it back. `None` if an update already runs.
    pub(crate) fn try_begin(&self) -> Option<UpdateState> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current == UpdateState::InProgress as u8 {
                return None;
            }
            match self.0.compare_exchange(
                current,
                UpdateState::InProgress as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(prior) => return Some(UpdateState::from_raw(prior)),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for UpdateFlag {
    fn default() -> Self {
        Self::new()
    }
}
