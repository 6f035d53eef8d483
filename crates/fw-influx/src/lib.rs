//! fw-influx
//!
//! InfluxDB 1.x implementation of [`TimeSeriesGateway`] over the HTTP
//! `/query` API.
//!
//! Queries never interpolate caller values: field and measurement names are
//! quoted as identifiers, the site code and the lower time bound travel as
//! bound parameters in the `params` JSON object.

mod response;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use fw_config::{InfluxSettings, ResolvedSecrets};
use fw_reconcile::{GatewayError, Sample, TimeSeriesGateway};
use tracing::warn;

use response::QueryResponse;

/// Connection parameters for one InfluxDB database.
///
/// Credentials are never logged; `Debug` redacts them.
#[derive(Clone)]
pub struct InfluxEndpoint {
    pub base_url: String,
    pub database: String,
    pub measurement: String,
    pub site_tag: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure_skip_verify: bool,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for InfluxEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxEndpoint")
            .field("base_url", &self.base_url)
            .field("database", &self.database)
            .field("measurement", &self.measurement)
            .field("site_tag", &self.site_tag)
            .field("username", &self.username.as_ref().map(|_| "<REDACTED>"))
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl InfluxEndpoint {
    pub fn from_config(settings: &InfluxSettings, secrets: &ResolvedSecrets) -> Self {
        Self {
            base_url: settings.url.clone(),
            database: settings.database.clone(),
            measurement: settings.measurement.clone(),
            site_tag: settings.site_tag.clone(),
            username: secrets.influx_username.clone(),
            password: secrets.influx_password.clone(),
            insecure_skip_verify: settings.insecure_skip_verify,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InfluxGateway {
    endpoint: InfluxEndpoint,
    http: reqwest::Client,
}

impl InfluxGateway {
    pub fn new(endpoint: InfluxEndpoint) -> Result<Self> {
        if endpoint.insecure_skip_verify {
            warn!(url = %endpoint.base_url, "TLS certificate validation disabled for influx");
        }
        let http = reqwest::Client::builder()
            .timeout(endpoint.request_timeout)
            .danger_accept_invalid_certs(endpoint.insecure_skip_verify)
            .build()
            .context("influx http client build failed")?;
        Ok(Self { endpoint, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.base_url.trim_end_matches('/'), path)
    }

    /// Startup connectivity check (`GET /ping`, any 2xx).
    pub async fn ping(&self) -> Result<()> {
        let mut req = self.http.get(self.url("ping"));
        if let Some(user) = &self.endpoint.username {
            req = req.basic_auth(user, self.endpoint.password.as_ref());
        }
        let resp = req.send().await.context("influx ping request failed")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("influx ping http status={}", status.as_u16()));
        }
        Ok(())
    }

    fn latest_statement(&self, field: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = $site ORDER BY time DESC LIMIT 1",
            quote_ident(field),
            quote_ident(&self.endpoint.measurement),
            quote_ident(&self.endpoint.site_tag),
        )
    }

    fn history_statement(&self, field: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = $site AND time >= $since ORDER BY time ASC",
            quote_ident(field),
            quote_ident(&self.endpoint.measurement),
            quote_ident(&self.endpoint.site_tag),
        )
    }

    async fn query(
        &self,
        statement: &str,
        params: serde_json::Value,
    ) -> Result<QueryResponse, GatewayError> {
        let params = params.to_string();
        let mut req = self.http.get(self.url("query")).query(&[
            ("db", self.endpoint.database.as_str()),
            ("q", statement),
            ("params", params.as_str()),
        ]);
        if let Some(user) = &self.endpoint.username {
            req = req.basic_auth(user, self.endpoint.password.as_ref());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| GatewayError::QueryFailed(format!("influx request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GatewayError::QueryFailed(format!("influx body read failed: {e}")))?;

        let parsed: Option<QueryResponse> = serde_json::from_str(&body).ok();
        if !status.is_success() {
            let msg = parsed
                .and_then(|p| p.error)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(GatewayError::QueryFailed(format!(
                "influx http status={} {}",
                status.as_u16(),
                msg
            )));
        }

        let parsed = parsed.ok_or_else(|| {
            GatewayError::QueryFailed("influx response json decode failed".to_string())
        })?;
        parsed.check_errors()?;
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl TimeSeriesGateway for InfluxGateway {
    async fn latest_value(&self, site_code: &str, field: &str) -> Result<f64, GatewayError> {
        let resp = self
            .query(
                &self.latest_statement(field),
                serde_json::json!({ "site": site_code }),
            )
            .await?;
        resp.latest_value(field)
    }

    async fn history(
        &self,
        site_code: &str,
        field: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Sample>, GatewayError> {
        let since_ns = since.timestamp_nanos_opt().ok_or_else(|| {
            GatewayError::QueryFailed(format!("lower bound {since} outside nanosecond range"))
        })?;
        let resp = self
            .query(
                &self.history_statement(field),
                serde_json::json!({ "site": site_code, "since": since_ns }),
            )
            .await?;
        Ok(resp.samples(field))
    }
}

/// Quote an InfluxQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> InfluxEndpoint {
        InfluxEndpoint {
            base_url: "https://tsdb.example.com/".to_string(),
            database: "signals".to_string(),
            measurement: "fastcharge".to_string(),
            site_tag: "project".to_string(),
            username: Some("nw".to_string()),
            password: Some("pw".to_string()),
            insecure_skip_verify: false,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn identifiers_are_quoted_and_escaped() {
        assert_eq!(quote_ident("SEQ02.OLI.A.IC1"), "\"SEQ02.OLI.A.IC1\"");
        assert_eq!(quote_ident("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote_ident("a\\b"), "\"a\\\\b\"");
    }

    #[test]
    fn statements_bind_site_and_time() {
        let g = InfluxGateway::new(endpoint()).unwrap();
        assert_eq!(
            g.latest_statement("SEQ02.OLI.A.IC1"),
            "SELECT \"SEQ02.OLI.A.IC1\" FROM \"fastcharge\" WHERE \"project\" = $site ORDER BY time DESC LIMIT 1"
        );
        assert_eq!(
            g.history_statement("SEQ12.OLI.A.PC1"),
            "SELECT \"SEQ12.OLI.A.PC1\" FROM \"fastcharge\" WHERE \"project\" = $site AND time >= $since ORDER BY time ASC"
        );
    }

    #[test]
    fn url_join_trims_trailing_slash() {
        let g = InfluxGateway::new(endpoint()).unwrap();
        assert_eq!(g.url("query"), "https://tsdb.example.com/query");
    }

    #[test]
    fn endpoint_debug_redacts_credentials() {
        let dbg = format!("{:?}", endpoint());
        assert!(dbg.contains("<REDACTED>"));
        assert!(!dbg.contains("\"pw\""));
    }
}
