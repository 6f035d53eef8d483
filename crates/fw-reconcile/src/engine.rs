use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backfill::{find_rising_edge, lookback_start};
use crate::bits::{BitPosition, Bitmask};
use crate::ports::{FaultLogStore, GatewayError, StoreError, TimeSeriesGateway};
use crate::types::{EpisodeKey, FieldOutcome, FieldUnit, NewEpisode, OpenEpisode, Sample};

/// Failures that abandon a whole unit for this cycle.
///
/// Anything that goes wrong after the open episodes are known is handled
/// per episode or per bit and only shows up in [`FieldOutcome::failed_ops`].
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("latest value: {0}")]
    Gateway(#[from] GatewayError),
    #[error("latest value {0} is not a 32-bit mask")]
    ValueOutOfRange(f64),
    #[error("open episodes: {0}")]
    Store(#[from] StoreError),
}

/// Where a new episode's start time came from.
enum Onset {
    Recovered(DateTime<Utc>),
    Assumed(DateTime<Utc>),
}

/// Run one reconciliation cycle for a single monitored field.
///
/// Order matters: every cleared episode is closed before any new episode is
/// considered, so existence checks see this cycle's closures.
pub async fn reconcile_field(
    gateway: &dyn TimeSeriesGateway,
    store: &dyn FaultLogStore,
    unit: &FieldUnit<'_>,
    now: DateTime<Utc>,
    lookback: Duration,
) -> Result<FieldOutcome, ReconcileError> {
    let raw = gateway.latest_value(unit.site_code, unit.field_name).await?;
    let mask = Bitmask::from_sample(raw).ok_or(ReconcileError::ValueOutOfRange(raw))?;

    let key = unit.episode_key();
    let open = store.open_episodes(&key).await?;
    debug!(
        kind = unit.kind.as_str(),
        value = mask.bits(),
        open = open.len(),
        "snapshot read"
    );

    let mut outcome = FieldOutcome::default();
    close_cleared(store, &open, mask, now, &mut outcome).await;
    open_new(gateway, store, unit, &key, mask, now, lookback, &mut outcome).await;

    Ok(outcome)
}

async fn close_cleared(
    store: &dyn FaultLogStore,
    open: &[OpenEpisode],
    mask: Bitmask,
    now: DateTime<Utc>,
    outcome: &mut FieldOutcome,
) {
    for ep in open.iter().filter(|ep| !mask.is_set(ep.bit)) {
        match store.close_episode(ep.id, now).await {
            Ok(()) => {
                outcome.closed += 1;
                info!(episode_id = %ep.id, bit = %ep.bit, end = %now, "episode closed");
            }
            Err(err) => {
                outcome.failed_ops += 1;
                warn!(episode_id = %ep.id, bit = %ep.bit, error = %err, "episode close failed");
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn open_new(
    gateway: &dyn TimeSeriesGateway,
    store: &dyn FaultLogStore,
    unit: &FieldUnit<'_>,
    key: &EpisodeKey,
    mask: Bitmask,
    now: DateTime<Utc>,
    lookback: Duration,
    outcome: &mut FieldOutcome,
) {
    let mut history = History::Unfetched;

    for bit in mask.active_bits() {
        let Some(description) = unit.bits.describe(bit) else {
            outcome.unmapped_active += 1;
            continue;
        };

        // Once an episode was ever logged for this tuple, reactivations are
        // not logged again.
        match store.episode_exists(key, bit).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(err) => {
                outcome.failed_ops += 1;
                warn!(bit = %bit, error = %err, "episode existence check failed");
                continue;
            }
        }

        let Some(onset) =
            resolve_onset(gateway, unit, bit, now, lookback, &mut history, outcome).await
        else {
            continue;
        };

        let (start, recovered) = match onset {
            Onset::Recovered(ts) => (ts, true),
            Onset::Assumed(ts) => (ts, false),
        };

        let episode = NewEpisode {
            key: key.clone(),
            bit,
            description: description.to_string(),
            start,
        };

        match store.create_episode(&episode).await {
            Ok(id) => {
                outcome.created += 1;
                if recovered {
                    outcome.backfilled += 1;
                } else {
                    outcome.fallback_now += 1;
                }
                info!(
                    episode_id = %id,
                    bit = %bit,
                    description,
                    start = %start,
                    backfilled = recovered,
                    "episode created"
                );
            }
            Err(err) => {
                outcome.failed_ops += 1;
                warn!(bit = %bit, description, error = %err, "episode create failed");
            }
        }
    }
}

/// History of one unit for one cycle. Fetched on first need and shared by
/// every new bit; a failed fetch is not retried within the cycle.
enum History {
    Unfetched,
    Fetched(Vec<Sample>),
    Unavailable,
}

/// `None` defers the bit to a later cycle: the history could not be read,
/// and stamping `now` would lose the real start for good.
async fn resolve_onset(
    gateway: &dyn TimeSeriesGateway,
    unit: &FieldUnit<'_>,
    bit: BitPosition,
    now: DateTime<Utc>,
    lookback: Duration,
    history: &mut History,
    outcome: &mut FieldOutcome,
) -> Option<Onset> {
    if let History::Unfetched = history {
        let since = lookback_start(now, lookback);
        *history = match gateway.history(unit.site_code, unit.field_name, since).await {
            Ok(samples) => History::Fetched(samples),
            Err(err) => {
                outcome.failed_ops += 1;
                warn!(bit = %bit, error = %err, "history unavailable, creation deferred");
                History::Unavailable
            }
        };
    }

    let samples = match history {
        History::Fetched(samples) => samples.as_slice(),
        History::Unfetched | History::Unavailable => {
            debug!(bit = %bit, "creation deferred, history unavailable this cycle");
            return None;
        }
    };

    match find_rising_edge(samples, bit) {
        Ok(ts) => Some(Onset::Recovered(ts)),
        Err(err) => {
            warn!(bit = %bit, error = %err, start = %now, "start not found in history, using now");
            Some(Onset::Assumed(now))
        }
    }
}
