//! Boundaries the engine calls through.
//!
//! Implementations must be `Send + Sync`: one handle is shared by every
//! concurrently running site task.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::bits::BitPosition;
use crate::types::{EpisodeId, EpisodeKey, NewEpisode, OpenEpisode, Sample};

// ---------------------------------------------------------------------------
// Time-series gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no data for selector")]
    NoData,
    #[error("latest value is null")]
    NullValue,
    #[error("unsupported value type: {0}")]
    UnsupportedType(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Read access to the status fields of remote sites.
#[async_trait::async_trait]
pub trait TimeSeriesGateway: Send + Sync {
    /// Most recent value of `field` for `site_code`.
    async fn latest_value(&self, site_code: &str, field: &str) -> Result<f64, GatewayError>;

    /// Samples with `ts >= since`, ascending. Rows with unparsable
    /// timestamps or non-numeric values are dropped, not reported.
    async fn history(
        &self,
        site_code: &str,
        field: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Sample>, GatewayError>;
}

// ---------------------------------------------------------------------------
// Fault-log store
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("episode {0} not found")]
    NotFound(EpisodeId),
    #[error("{op} failed: {source}")]
    Backend {
        op: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    pub fn backend(
        op: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        StoreError::Backend {
            op,
            source: source.into(),
        }
    }
}

/// Durable log of fault episodes.
///
/// At most one episode per (site, field, equipment, bit) is open at a time.
/// The engine keeps that true by only creating when [`episode_exists`]
/// is false.
///
/// [`episode_exists`]: FaultLogStore::episode_exists
#[async_trait::async_trait]
pub trait FaultLogStore: Send + Sync {
    async fn open_episodes(&self, key: &EpisodeKey) -> Result<Vec<OpenEpisode>, StoreError>;

    /// Sets the end timestamp. `NotFound` when no episode has this id.
    async fn close_episode(&self, id: EpisodeId, end: DateTime<Utc>) -> Result<(), StoreError>;

    /// True if any episode, open or closed, was ever recorded for the tuple.
    async fn episode_exists(&self, key: &EpisodeKey, bit: BitPosition)
        -> Result<bool, StoreError>;

    async fn create_episode(&self, episode: &NewEpisode) -> Result<EpisodeId, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_carries_cause() {
        let err = StoreError::backend("close_episode", "connection reset");
        assert_eq!(err.to_string(), "close_episode failed: connection reset");
        assert_eq!(
            StoreError::NotFound(EpisodeId(7)).to_string(),
            "episode 7 not found"
        );
    }

    #[test]
    fn gateway_error_display() {
        assert_eq!(
            GatewayError::QueryFailed("timeout".into()).to_string(),
            "query failed: timeout"
        );
        assert_eq!(GatewayError::NullValue.to_string(), "latest value is null");
    }
}
