//! fw-reconcile
//!
//! Fault-lifecycle reconciliation for bitmask status fields.
//!
//! One reconciliation cycle compares the latest bitmask of a
//! (site, field, equipment) unit against the episodes the fault log still
//! holds open:
//! - open episodes whose bit cleared are closed at the processing time
//! - active, described bits with no episode on record are opened, with the
//!   start time recovered from the most recent rising edge in history
//!
//! The engine is stateless across cycles. Everything it needs is re-read
//! from the gateway and the store, so a crashed run heals on the next one.
//! No concrete I/O lives in this crate; adapters implement [`ports`].

pub mod backfill;
pub mod bits;
mod engine;
pub mod ports;
mod types;

pub use backfill::{find_rising_edge, lookback_start, EdgeNotFound, DEFAULT_LOOKBACK_DAYS};
pub use bits::{decode_active_bits, BitPosition, Bitmask};
pub use engine::{reconcile_field, ReconcileError};
pub use ports::{FaultLogStore, GatewayError, StoreError, TimeSeriesGateway};
pub use types::*;
