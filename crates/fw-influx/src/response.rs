//! `/query` response decoding.
//!
//! Shape (InfluxDB 1.x, default RFC3339 timestamps):
//! `{"results":[{"statement_id":0,"series":[{"name":..,"columns":["time",<field>],"values":[[..]]}]}]}`

use chrono::{DateTime, Utc};
use fw_reconcile::{GatewayError, Sample};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatementResult {
    #[serde(default)]
    pub series: Vec<Series>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Series {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl Series {
    /// Index of the value column: the field's own column, else the first
    /// non-time column.
    fn value_column(&self, field: &str) -> usize {
        self.columns.iter().position(|c| c == field).unwrap_or(1)
    }
}

impl QueryResponse {
    pub fn check_errors(&self) -> Result<(), GatewayError> {
        if let Some(e) = &self.error {
            return Err(GatewayError::QueryFailed(e.clone()));
        }
        if let Some(e) = self.results.iter().find_map(|r| r.error.as_ref()) {
            return Err(GatewayError::QueryFailed(e.clone()));
        }
        Ok(())
    }

    pub fn latest_value(&self, field: &str) -> Result<f64, GatewayError> {
        let series = self
            .results
            .first()
            .and_then(|r| r.series.first())
            .ok_or(GatewayError::NoData)?;
        let row = series.values.first().ok_or(GatewayError::NoData)?;
        let cell = row
            .get(series.value_column(field))
            .ok_or(GatewayError::NoData)?;
        coerce_number(cell)
    }

    /// Every usable row across all series, ascending by time.
    pub fn samples(&self, field: &str) -> Vec<Sample> {
        let mut out = Vec::new();
        for series in self.results.iter().flat_map(|r| r.series.iter()) {
            let col = series.value_column(field);
            for row in &series.values {
                let Some(ts) = row.first().and_then(parse_time) else {
                    continue;
                };
                let Some(value) = row.get(col).and_then(|c| coerce_number(c).ok()) else {
                    continue;
                };
                out.push(Sample::new(ts, value));
            }
        }
        out.sort_by_key(|s| s.ts);
        out
    }
}

fn parse_time(cell: &Value) -> Option<DateTime<Utc>> {
    let s = cell.as_str()?;
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn coerce_number(cell: &Value) -> Result<f64, GatewayError> {
    match cell {
        Value::Null => Err(GatewayError::NullValue),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| GatewayError::UnsupportedType(format!("number {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| GatewayError::UnsupportedType(format!("string {s:?}"))),
        Value::Bool(_) => Err(GatewayError::UnsupportedType("bool".to_string())),
        Value::Array(_) => Err(GatewayError::UnsupportedType("array".to_string())),
        Value::Object(_) => Err(GatewayError::UnsupportedType("object".to_string())),
    }
}
