//! Cooperative, tick-driven task queue.
//!
//! The management processor has one core and no preemption. Work that must
//! not run inside the caller's context is pushed here and picked up by the
//! main loop once due. Tasks that become due on the same tick run in the
//! order they were pushed.

use alloc::vec::Vec;

struct Scheduled<T> {
    due: u64,
    seq: u64,
    task: T,
}

pub struct TaskQueue<T> {
    now: u64,
    seq: u64,
    pending: Vec<Scheduled<T>>,
}

impl<T> TaskQueue<T> {
    pub const fn new() -> Self {
        Self {
            now: 0,
            seq: 0,
            pending: Vec::new(),
        }
    }

    /// Current tick.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Queue `task` to run `delay_ticks` from now.
    pub fn push(&mut self, task: T, delay_ticks: u32) {
        self.pending.push(Scheduled {
            due: self.now + u64::from(delay_ticks),
            seq: self.seq,
            task,
        });
        self.seq += 1;
    }

    /// Let `ticks` pass.
    pub fn advance(&mut self, ticks: u32) {
        self.now += u64::from(ticks);
    }

    /// Take the oldest task that is due.
    pub fn pop_due(&mut self) -> Option<T> {
        let now = self.now;
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, s)| s.due <= now)
            .min_by_key(|(_, s)| (s.due, s.seq))
            .map(|(i, _)| i)?;
        Some(self.pending.remove(idx).task)
    }

    /// Tick at which the next task becomes due.
    pub fn next_due(&self) -> Option<u64> {
        self.pending.iter().map(|s| s.due).min()
    }

    /// Drop every task matching `pred`; returns how many were dropped.
    pub fn remove<F: FnMut(&T) -> bool>(&mut self, mut pred: F) -> usize {
        let before = self.pending.len();
        self.pending.retain(|s| !pred(&s.task));
        before - self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
