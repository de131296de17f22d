//! Per-day usage counts.

use std::collections::BTreeMap;

use chrono::Days;
use serde::{Deserialize, Serialize};

use super::clock::CalendarDay;

/// Composite key identifying one resource's bucket on one day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UsageKey {
    pub resource: String,
    pub day: CalendarDay,
}

/// Reservations granted per resource per calendar day.
///
/// Buckets that were never written read as zero. The record is stored as a
/// single JSON document keyed by ISO date, then resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageRecord {
    days: BTreeMap<CalendarDay, BTreeMap<String, u32>>,
}

impl UsageRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count granted for `resource` on `day`.
    pub fn count(&self, resource: &str, day: CalendarDay) -> u32 {
        self.days
            .get(&day)
            .and_then(|counts| counts.get(resource))
            .copied()
            .unwrap_or(0)
    }

    /// Increment the bucket for `resource` on `day`, returning the new count.
    pub(crate) fn increment(&mut self, resource: &str, day: CalendarDay) -> u32 {
        let count = self
            .days
            .entry(day)
            .or_default()
            .entry(resource.to_string())
            .or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Drop every day strictly older than `today - retention_days`.
    ///
    /// Returns the number of day buckets removed. A retention of zero keeps
    /// everything.
    pub(crate) fn prune(&mut self, today: CalendarDay, retention_days: u64) -> usize {
        if retention_days == 0 {
            return 0;
        }
        let Some(cutoff) = today.checked_sub_days(Days::new(retention_days)) else {
            return 0;
        };
        let before = self.days.len();
        self.days.retain(|day, _| *day >= cutoff);
        before - self.days.len()
    }

    /// Counts for a single day, by resource name.
    pub fn day(&self, day: CalendarDay) -> Option<&BTreeMap<String, u32>> {
        self.days.get(&day)
    }

    /// Days that have at least one bucket.
    pub fn days(&self) -> impl Iterator<Item = CalendarDay> + '_ {
        self.days.keys().copied()
    }

    /// Iterate every bucket in day, then resource order.
    pub fn iter(&self) -> impl Iterator<Item = (UsageKey, u32)> + '_ {
        self.days.iter().flat_map(|(day, counts)| {
            counts.iter().map(move |(resource, count)| {
                (
                    UsageKey {
                        resource: resource.clone(),
                        day: *day,
                    },
                    *count,
                )
            })
        })
    }

    /// Whether no reservation has ever been recorded.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
