use chrono::{DateTime, Utc};
use fw_reconcile::FieldOutcome;
use serde::Serialize;

/// Result of one site task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SiteReport {
    pub site_code: String,
    pub site_name: String,
    pub units_ok: usize,
    pub units_failed: usize,
    pub outcome: FieldOutcome,
    /// The task died before finishing; unit counters are partial or zero.
    pub aborted: bool,
}

impl SiteReport {
    pub fn new(site_code: impl Into<String>, site_name: impl Into<String>) -> Self {
        Self {
            site_code: site_code.into(),
            site_name: site_name.into(),
            ..Self::default()
        }
    }

    pub fn aborted(site_code: impl Into<String>, site_name: impl Into<String>) -> Self {
        Self {
            aborted: true,
            ..Self::new(site_code, site_name)
        }
    }

    pub fn is_clean(&self) -> bool {
        !self.aborted && self.units_failed == 0 && self.outcome.failed_ops == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// In the order the sites were requested.
    pub sites: Vec<SiteReport>,
}

impl RunReport {
    pub fn totals(&self) -> FieldOutcome {
        let mut total = FieldOutcome::default();
        for s in &self.sites {
            total += s.outcome;
        }
        total
    }

    pub fn units_ok(&self) -> usize {
        self.sites.iter().map(|s| s.units_ok).sum()
    }

    pub fn units_failed(&self) -> usize {
        self.sites.iter().map(|s| s.units_failed).sum()
    }

    pub fn aborted_sites(&self) -> Vec<&str> {
        self.sites
            .iter()
            .filter(|s| s.aborted)
            .map(|s| s.site_code.as_str())
            .collect()
    }

    pub fn site(&self, code: &str) -> Option<&SiteReport> {
        self.sites.iter().find(|s| s.site_code == code)
    }

    /// One-line operator summary.
    pub fn summary_line(&self) -> String {
        let t = self.totals();
        format!(
            "sites={} units_ok={} units_failed={} closed={} created={} backfilled={} fallback_now={} failed_ops={} aborted_sites={}",
            self.sites.len(),
            self.units_ok(),
            self.units_failed(),
            t.closed,
            t.created,
            t.backfilled,
            t.fallback_now,
            t.failed_ops,
            self.aborted_sites().len(),
        )
    }
}
