//! fw-testkit
//!
//! In-memory stand-ins for the two ports of the reconciliation engine,
//! shared by the scenario tests.

mod gateway;
mod store;

use chrono::{DateTime, Duration, TimeZone, Utc};
use fw_reconcile::{BitPosition, Sample};

pub use gateway::ScriptedGateway;
pub use store::{EpisodeRecord, MemoryFaultLog};

/// 2025-03-01T12:00:00Z, the reference "now" of the scenarios.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// `t0` shifted by whole minutes (negative = earlier).
pub fn at_min(offset: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(offset)
}

/// Build a history from `(minutes relative to t0, value)` pairs.
pub fn history(points: &[(i64, f64)]) -> Vec<Sample> {
    points
        .iter()
        .map(|(m, v)| Sample::new(at_min(*m), *v))
        .collect()
}

/// Bit position from a literal known to be in range.
pub fn bit(n: u32) -> BitPosition {
    BitPosition::new(n).unwrap_or_else(|| panic!("bit {n} out of range"))
}
