use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fw_reconcile::{GatewayError, Sample, TimeSeriesGateway};

#[derive(Clone, Debug)]
enum Latest {
    Value(f64),
    Null,
    Fail(String),
}

#[derive(Clone, Debug)]
enum History {
    Samples(Vec<Sample>),
    Fail(String),
}

type Selector = (String, String);

#[derive(Default)]
struct Script {
    latest: HashMap<Selector, Latest>,
    history: HashMap<Selector, History>,
    default_latest: Option<f64>,
    panic_sites: HashSet<String>,
}

/// [`TimeSeriesGateway`] answering from per-(site, field) scripts.
///
/// Unscripted latest values answer `NoData` unless a default is set;
/// unscripted histories are empty. Tracks how many `latest_value` calls are
/// in flight at once.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latest_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `latest_value` call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_default_latest(self, value: f64) -> Self {
        self.lock().default_latest = Some(value);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn selector(site: &str, field: &str) -> Selector {
        (site.to_string(), field.to_string())
    }

    pub fn set_latest(&self, site: &str, field: &str, value: f64) {
        self.lock()
            .latest
            .insert(Self::selector(site, field), Latest::Value(value));
    }

    pub fn set_latest_null(&self, site: &str, field: &str) {
        self.lock()
            .latest
            .insert(Self::selector(site, field), Latest::Null);
    }

    pub fn fail_latest(&self, site: &str, field: &str, msg: &str) {
        self.lock()
            .latest
            .insert(Self::selector(site, field), Latest::Fail(msg.to_string()));
    }

    pub fn set_history(&self, site: &str, field: &str, samples: Vec<Sample>) {
        self.lock()
            .history
            .insert(Self::selector(site, field), History::Samples(samples));
    }

    pub fn fail_history(&self, site: &str, field: &str, msg: &str) {
        self.lock()
            .history
            .insert(Self::selector(site, field), History::Fail(msg.to_string()));
    }

    /// Any read for this site panics, simulating a crashed site task.
    pub fn panic_on_site(&self, site: &str) {
        self.lock().panic_sites.insert(site.to_string());
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn scripted_latest(&self, site: &str, field: &str) -> Result<f64, GatewayError> {
        let g = self.lock();
        if g.panic_sites.contains(site) {
            drop(g);
            panic!("scripted panic for site {site}");
        }
        match g.latest.get(&Self::selector(site, field)) {
            Some(Latest::Value(v)) => Ok(*v),
            Some(Latest::Null) => Err(GatewayError::NullValue),
            Some(Latest::Fail(msg)) => Err(GatewayError::QueryFailed(msg.clone())),
            None => g.default_latest.ok_or(GatewayError::NoData),
        }
    }
}

#[async_trait]
impl TimeSeriesGateway for ScriptedGateway {
    async fn latest_value(&self, site_code: &str, field: &str) -> Result<f64, GatewayError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let out = self.scripted_latest(site_code, field);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }

    async fn history(
        &self,
        site_code: &str,
        field: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Sample>, GatewayError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let g = self.lock();
        match g.history.get(&Self::selector(site_code, field)) {
            Some(History::Samples(s)) => Ok(s.iter().copied().filter(|x| x.ts >= since).collect()),
            Some(History::Fail(msg)) => Err(GatewayError::QueryFailed(msg.clone())),
            None => Ok(Vec::new()),
        }
    }
}
