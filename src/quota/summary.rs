//! Diagnostics view of today's quota usage.

use serde::{Deserialize, Serialize};

use super::clock::CalendarDay;
use super::config::ResourceSpec;
use super::record::UsageRecord;

/// Usage of a single resource on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub name: String,
    pub capacity: u32,
    pub used: u32,
    pub remaining: u32,
}

impl ResourceStatus {
    /// Whether no reservations remain today.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Summary of quota usage for one day, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub day: CalendarDay,
    pub resources: Vec<ResourceStatus>,
    /// Number of days with recorded usage
    pub days_tracked: usize,
}

impl UsageSummary {
    /// Build a summary of `day` from a usage record.
    pub fn from_record(resources: &[ResourceSpec], record: &UsageRecord, day: CalendarDay) -> Self {
        let resources = resources
            .iter()
            .map(|spec| {
                let used = record.count(&spec.name, day);
                ResourceStatus {
                    name: spec.name.clone(),
                    capacity: spec.daily_capacity,
                    used,
                    remaining: spec.daily_capacity.saturating_sub(used),
                }
            })
            .collect();

        Self {
            day,
            resources,
            days_tracked: record.days().count(),
        }
    }

    /// Reservations still available across all resources.
    pub fn total_remaining(&self) -> u64 {
        self.resources.iter().map(|r| u64::from(r.remaining)).sum()
    }

    /// Whether every resource is at capacity.
    pub fn is_exhausted(&self) -> bool {
        self.resources.iter().all(ResourceStatus::is_exhausted)
    }

    /// The resource the next reservation would be granted from.
    pub fn next_available(&self) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| !r.is_exhausted())
            .map(|r| r.name.as_str())
    }

    /// Format as a human-readable string.
    pub fn format(&self) -> String {
        let mut output = format!("## Quota Summary ({})\n\n", self.day);

        for status in &self.resources {
            output.push_str(&format!(
                "**{}**: {}/{} used, {} remaining [{}]\n",
                status.name,
                status.used,
                status.capacity,
                status.remaining,
                if status.is_exhausted() { "EXHAUSTED" } else { "OK" }
            ));
        }

        match self.next_available() {
            Some(name) => output.push_str(&format!("**Next Reservation**: {}\n", name)),
            None => output.push_str("**Next Reservation**: none until tomorrow\n"),
        }
        output.push_str(&format!("**Days Tracked**: {}\n", self.days_tracked));

        output
    }
}
