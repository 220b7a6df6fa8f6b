//! Auto-close timer queue
//!
//! Deadlines are checked when the host calls `tick`. A handle that has been
//! cancelled never fires, and a handle that is replaced by a newer one is
//! ignored by the manager at fire time.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use hashbrown::HashMap;

use super::OverlayKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    /// Ordered by deadline, ties broken by scheduling order
    pending: BTreeMap<(NaiveDateTime, TimerHandle), OverlayKey>,
    deadlines: HashMap<TimerHandle, NaiveDateTime>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, key: OverlayKey, deadline: NaiveDateTime) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.pending.insert((deadline, handle), key);
        self.deadlines.insert(handle, deadline);
        handle
    }

    /// Returns `false` if the handle already fired or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle) {
            Some(deadline) => self.pending.remove(&(deadline, handle)).is_some(),
            None => false,
        }
    }

    /// Remove and return every timer whose deadline is at or before `now`
    pub fn take_due(&mut self, now: NaiveDateTime) -> Vec<(TimerHandle, OverlayKey)> {
        let mut due = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            let (deadline, handle) = *entry.key();
            if deadline > now {
                break;
            }
            let key = entry.remove();
            self.deadlines.remove(&handle);
            due.push((handle, key));
        }
        due
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle)
    }

    pub fn next_deadline(&self) -> Option<NaiveDateTime> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
