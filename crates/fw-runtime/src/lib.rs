//! fw-runtime
//!
//! Batch orchestration: one run reconciles every monitored field of every
//! requested site, with sites fanned out under a concurrency bound and each
//! site's units processed in order.

mod clock;
mod orchestrator;
mod report;

pub use clock::{Clock, FixedClock, SystemClock};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use report::{RunReport, SiteReport};
