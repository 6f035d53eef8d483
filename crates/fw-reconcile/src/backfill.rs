//! Onset recovery for newly detected faults.
//!
//! A fault is usually noticed some time after it started. Instead of
//! stamping it with the detection time, the engine scans a bounded window of
//! history for the most recent 0 -> 1 transition of the bit.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::bits::{BitPosition, Bitmask};
use crate::types::Sample;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("no rising edge for bit {bit} in lookback window")]
pub struct EdgeNotFound {
    pub bit: BitPosition,
}

pub fn lookback_start(now: DateTime<Utc>, lookback: Duration) -> DateTime<Utc> {
    now - lookback
}

/// Timestamp of the most recent rising edge of `bit` in `samples`.
///
/// `samples` must be ascending by time. The bit is assumed clear before the
/// first sample. Samples that do not narrow to a 32-bit mask are treated as
/// absent: they neither produce an edge nor replace the previous value.
pub fn find_rising_edge(
    samples: &[Sample],
    bit: BitPosition,
) -> Result<DateTime<Utc>, EdgeNotFound> {
    let mut previous = Bitmask::EMPTY;
    let mut edge: Option<DateTime<Utc>> = None;

    for s in samples {
        let Some(current) = Bitmask::from_sample(s.value) else {
            continue;
        };
        if !previous.is_set(bit) && current.is_set(bit) {
            edge = Some(s.ts);
        }
        previous = current;
    }

    edge.ok_or(EdgeNotFound { bit })
}
