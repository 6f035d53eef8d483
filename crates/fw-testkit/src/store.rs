use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fw_reconcile::{
    BitPosition, EpisodeId, EpisodeKey, FaultLogStore, NewEpisode, OpenEpisode, StoreError,
};

/// One row of the in-memory fault log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpisodeRecord {
    pub id: EpisodeId,
    pub key: EpisodeKey,
    pub bit: BitPosition,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl EpisodeRecord {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

#[derive(Default)]
struct Inner {
    rows: Vec<EpisodeRecord>,
    next_id: i64,
    fail_open_for_site: HashSet<String>,
    fail_close: HashSet<EpisodeId>,
    fail_exists_bits: HashSet<u8>,
    fail_create_bits: HashSet<u8>,
    create_calls: usize,
}

/// [`FaultLogStore`] backed by a vector, with per-operation failure injection.
#[derive(Default)]
pub struct MemoryFaultLog {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

impl MemoryFaultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `episode_exists` sleeps this long, like a database round trip, so
    /// racing callers interleave between the check and the insert.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert(
        &self,
        key: EpisodeKey,
        bit: BitPosition,
        description: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> EpisodeId {
        let mut g = self.lock();
        g.next_id += 1;
        let id = EpisodeId(g.next_id);
        g.rows.push(EpisodeRecord {
            id,
            key,
            bit,
            description: description.to_string(),
            start,
            end,
        });
        id
    }

    pub fn seed_open(
        &self,
        key: EpisodeKey,
        bit: BitPosition,
        description: &str,
        start: DateTime<Utc>,
    ) -> EpisodeId {
        self.insert(key, bit, description, start, None)
    }

    pub fn seed_closed(
        &self,
        key: EpisodeKey,
        bit: BitPosition,
        description: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> EpisodeId {
        self.insert(key, bit, description, start, Some(end))
    }

    /// Seed an open row under an explicit id, for scenarios that name ids.
    pub fn seed_open_with_id(
        &self,
        id: EpisodeId,
        key: EpisodeKey,
        bit: BitPosition,
        description: &str,
        start: DateTime<Utc>,
    ) {
        let mut g = self.lock();
        g.next_id = g.next_id.max(id.0);
        g.rows.push(EpisodeRecord {
            id,
            key,
            bit,
            description: description.to_string(),
            start,
            end: None,
        });
    }

    pub fn fail_open_episodes_for_site(&self, site: &str) {
        self.lock().fail_open_for_site.insert(site.to_string());
    }

    pub fn fail_close(&self, id: EpisodeId) {
        self.lock().fail_close.insert(id);
    }

    pub fn fail_exists_for_bit(&self, bit: BitPosition) {
        self.lock().fail_exists_bits.insert(bit.get());
    }

    pub fn fail_create_for_bit(&self, bit: BitPosition) {
        self.lock().fail_create_bits.insert(bit.get());
    }

    pub fn episodes(&self) -> Vec<EpisodeRecord> {
        self.lock().rows.clone()
    }

    pub fn episode(&self, id: EpisodeId) -> Option<EpisodeRecord> {
        self.lock().rows.iter().find(|r| r.id == id).cloned()
    }

    pub fn episodes_for(&self, key: &EpisodeKey) -> Vec<EpisodeRecord> {
        self.lock()
            .rows
            .iter()
            .filter(|r| &r.key == key)
            .cloned()
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.lock().rows.iter().filter(|r| r.is_open()).count()
    }

    /// Successful and failed `create_episode` calls alike.
    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }
}

fn injected(op: &'static str) -> StoreError {
    StoreError::backend(op, "injected failure")
}

#[async_trait]
impl FaultLogStore for MemoryFaultLog {
    async fn open_episodes(&self, key: &EpisodeKey) -> Result<Vec<OpenEpisode>, StoreError> {
        let g = self.lock();
        if g.fail_open_for_site.contains(&key.site) {
            return Err(injected("open_episodes"));
        }
        Ok(g.rows
            .iter()
            .filter(|r| &r.key == key && r.is_open())
            .map(|r| OpenEpisode { id: r.id, bit: r.bit })
            .collect())
    }

    async fn close_episode(&self, id: EpisodeId, end: DateTime<Utc>) -> Result<(), StoreError> {
        let mut g = self.lock();
        if g.fail_close.contains(&id) {
            return Err(injected("close_episode"));
        }
        match g.rows.iter_mut().find(|r| r.id == id) {
            Some(row) => {
                row.end = Some(end);
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn episode_exists(&self, key: &EpisodeKey, bit: BitPosition) -> Result<bool, StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let g = self.lock();
        if g.fail_exists_bits.contains(&bit.get()) {
            return Err(injected("episode_exists"));
        }
        Ok(g.rows.iter().any(|r| &r.key == key && r.bit == bit))
    }

    async fn create_episode(&self, episode: &NewEpisode) -> Result<EpisodeId, StoreError> {
        {
            let mut g = self.lock();
            g.create_calls += 1;
            if g.fail_create_bits.contains(&episode.bit.get()) {
                return Err(injected("create_episode"));
            }
        }
        Ok(self.insert(
            episode.key.clone(),
            episode.bit,
            &episode.description,
            episode.start,
            None,
        ))
    }
}
