//! Per-model daily quota reservoir.
//!
//! Callers reserve one unit of a model's daily capacity before sending a
//! request to it. Reservations are serialized so no model is granted more
//! than its configured capacity on a calendar day, and counts are persisted
//! so limits survive restarts.

pub mod quota;

pub use quota::{QuotaConfig, QuotaError, QuotaReservoir, QuotaResult, Reservation};
