//! Wall-clock source
//!
//! Time-range conditions and auto-close timers read the time through
//! [`Clock`] so tests can drive virtual time with [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};

pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Virtual clock. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Clock starting today at `hour:minute`
    pub fn at(hour: u32, minute: u32) -> Self {
        let start = Local::now()
            .date_naive()
            .and_hms_opt(hour, minute, 0)
            .unwrap_or_default();
        Self::new(start)
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(delta) = chrono::Duration::from_std(by)
            && let Some(next) = self.now.get().checked_add_signed(delta)
        {
            self.now.set(next);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

/// Minutes since midnight
pub fn minutes_of_day(time: &NaiveDateTime) -> u32 {
    time.hour() * 60 + time.minute()
}
