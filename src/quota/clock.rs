//! Calendar-day source for quota bucketing.

use std::sync::{Arc, RwLock};

use chrono::{Days, Local, NaiveDate};

/// Calendar day used to bucket usage counts.
pub type CalendarDay = NaiveDate;

/// Source of the current calendar day.
pub trait Clock: Send + Sync {
    /// The calendar day a reservation made right now belongs to.
    fn today(&self) -> CalendarDay;
}

/// Clock backed by the host's local date.
///
/// The quota boundary follows the machine's local midnight; no timezone
/// normalization is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> CalendarDay {
        Local::now().date_naive()
    }
}

/// Clock whose date is set explicitly.
///
/// Clones share the same date, so a test can keep a handle and advance the
/// clock seen by a running reservoir.
#[derive(Debug, Clone)]
pub struct ManualClock {
    day: Arc<RwLock<CalendarDay>>,
}

impl ManualClock {
    /// Create a clock fixed at the given day.
    pub fn new(day: CalendarDay) -> Self {
        Self {
            day: Arc::new(RwLock::new(day)),
        }
    }

    /// Set the current day.
    pub fn set(&self, day: CalendarDay) {
        if let Ok(mut current) = self.day.write() {
            *current = day;
        }
    }

    /// Move the clock forward by whole days.
    pub fn advance_days(&self, days: u64) {
        if let Ok(mut current) = self.day.write() {
            if let Some(next) = current.checked_add_days(Days::new(days)) {
                *current = next;
            }
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> CalendarDay {
        match self.day.read() {
            Ok(day) => *day,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
