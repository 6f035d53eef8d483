use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use fw_catalog::Catalog;
use fw_config::RuntimeSettings;
use fw_reconcile::{reconcile_field, FaultLogStore, FieldUnit, TimeSeriesGateway};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

use crate::clock::Clock;
use crate::report::{RunReport, SiteReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Site tasks allowed to run at once. Values below 1 are treated as 1.
    pub site_concurrency: usize,
    pub lookback: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(rt: &RuntimeSettings) -> Self {
        Self {
            site_concurrency: rt.site_concurrency,
            lookback: Duration::days(rt.lookback_days),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&RuntimeSettings::default())
    }
}

/// Runs one reconciliation batch over a set of sites.
///
/// Handles are shared by every site task. Each (site, field, equipment, bit)
/// tuple is only touched by its own site's task, so no locking happens here.
#[derive(Clone)]
pub struct Orchestrator {
    gateway: Arc<dyn TimeSeriesGateway>,
    store: Arc<dyn FaultLogStore>,
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn TimeSeriesGateway>,
        store: Arc<dyn FaultLogStore>,
        catalog: Arc<Catalog>,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            gateway,
            store,
            catalog,
            clock,
            settings,
        }
    }

    /// Reconcile every site and wait for all of them.
    ///
    /// Sites are deduplicated by the name episodes are keyed on, first
    /// occurrence kept, so no tuple is ever touched by two tasks. A site task
    /// that panics is reported as aborted; its siblings keep running. Site
    /// reports come back in request order.
    pub async fn run(&self, sites: &[String]) -> RunReport {
        let started_at = self.clock.now();
        let sites = self.distinct_sites(sites);
        let width = self.settings.site_concurrency.max(1);
        let permits = Arc::new(Semaphore::new(width));
        info!(sites = sites.len(), concurrency = width, "run started");

        let mut handles: Vec<(String, JoinHandle<SiteReport>)> = Vec::with_capacity(sites.len());
        for code in &sites {
            let this = self.clone();
            let permits = Arc::clone(&permits);
            let site_code = code.clone();
            let span = info_span!("site", site = %site_code);
            let handle = tokio::spawn(
                async move {
                    let _permit = match permits.acquire_owned().await {
                        Ok(p) => p,
                        Err(err) => {
                            warn!(error = %err, "site permit unavailable");
                            let name = this.catalog.site_name(&site_code).to_string();
                            return SiteReport::aborted(site_code, name);
                        }
                    };
                    this.process_site(&site_code).await
                }
                .instrument(span),
            );
            handles.push((code.clone(), handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (code, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    warn!(site = %code, error = %err, "site task aborted");
                    let name = self.catalog.site_name(&code).to_string();
                    reports.push(SiteReport::aborted(code, name));
                }
            }
        }

        let report = RunReport {
            started_at,
            finished_at: self.clock.now(),
            sites: reports,
        };
        info!(summary = %report.summary_line(), "run finished");
        report
    }

    fn distinct_sites(&self, sites: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(sites.len());
        for code in sites {
            let name = self.catalog.site_name(code);
            if seen.insert(name) {
                out.push(code.clone());
            } else {
                warn!(site = %code, site_name = %name, "duplicate site skipped");
            }
        }
        out
    }

    /// Every equipment unit of one site, in catalog order, IC before PC.
    pub async fn process_site(&self, site_code: &str) -> SiteReport {
        let site_name = self.catalog.site_name(site_code);
        let mut report = SiteReport::new(site_code, site_name);

        for equipment in &self.catalog.equipment {
            for (kind, field) in equipment.fields() {
                let unit = FieldUnit {
                    site_code,
                    site_name,
                    equipment: &equipment.eqp_name,
                    field_name: &field.field,
                    kind,
                    bits: &field.bits,
                };
                let span = info_span!("unit", eqp = %equipment.eqp_name, field = %field.field);
                let result = reconcile_field(
                    self.gateway.as_ref(),
                    self.store.as_ref(),
                    &unit,
                    self.clock.now(),
                    self.settings.lookback,
                )
                .instrument(span)
                .await;

                match result {
                    Ok(outcome) => {
                        report.units_ok += 1;
                        report.outcome += outcome;
                    }
                    Err(err) => {
                        report.units_failed += 1;
                        warn!(
                            eqp = %equipment.eqp_name,
                            field = %field.field,
                            kind = kind.as_str(),
                            error = %err,
                            "unit reconcile failed"
                        );
                    }
                }
            }
        }

        info!(
            site_name = %report.site_name,
            units_ok = report.units_ok,
            units_failed = report.units_failed,
            closed = report.outcome.closed,
            created = report.outcome.created,
            failed_ops = report.outcome.failed_ops,
            "site reconciled"
        );
        report
    }
}
