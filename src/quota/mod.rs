//! Daily quota reservations for generative-AI models.
//!
//! # Overview
//!
//! The quota system consists of:
//! - **QuotaConfig**: Ordered list of models with their daily capacity
//! - **QuotaReservoir**: Grants at most `daily_capacity` reservations per model per day
//! - **KeyValueStore**: Durable storage for the per-day usage record
//! - **Clock**: Source of the calendar day used to bucket usage
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use modelquota::quota::{MemoryStore, QuotaConfig, QuotaReservoir, Reservation};
//!
//! let config = QuotaConfig::empty()
//!     .with_resource("gemini-2.5-pro", 100)
//!     .with_resource("gemini-2.5-flash", 250);
//!
//! let reservoir = QuotaReservoir::from_config(&config, Arc::new(MemoryStore::new()))?;
//!
//! match reservoir.reserve().await? {
//!     Reservation::Granted(grant) => call_model(&grant.resource).await,
//!     Reservation::Exhausted { .. } => show_limit_message(),
//! }
//! ```

mod clock;
mod config;
mod record;
mod reservoir;
mod store;
mod summary;

pub use self::clock::{CalendarDay, Clock, LocalClock, ManualClock};
pub use self::config::{validate_resources, ConfigError, QuotaConfig, ResourceSpec, ENV_PREFIX};
pub use self::record::{UsageKey, UsageRecord};
pub use self::reservoir::{
    Dispatch, Grant, QuotaError, QuotaReservoir, QuotaResult, Reservation, USAGE_KEY,
};
pub use self::store::{FileStore, KeyValueStore, MemoryStore, StoreError, StoreResult};
pub use self::summary::{ResourceStatus, UsageSummary};
