//! fw-config
//!
//! Layered YAML configuration, built once at startup into an immutable
//! [`FaultWatchConfig`] and passed down by reference. Nothing below the CLI
//! reads the process environment; credentials are resolved separately by
//! [`secrets::resolve_secrets`] from env var *names* held in the config.

pub mod secrets;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

use fw_reconcile::DEFAULT_LOOKBACK_DAYS;

pub use secrets::{resolve_secrets, resolve_secrets_with, ResolvedSecrets};

/// Leaf string values starting with one of these abort loading.
const SECRET_PREFIXES: &[&str] = &[
    "-----BEGIN", // PEM private keys
    "mysql://",   // DSN with inline credentials
    "mariadb://",
    "sk-",
    "AKIA",
    "ghp_",
    "glpat-",
];

// ---------------------------------------------------------------------------
// Typed configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InfluxSettings {
    /// Base URL, e.g. `https://tsdb.example.com:443`.
    pub url: String,
    pub database: String,
    pub measurement: String,
    /// Tag carrying the site code.
    pub site_tag: String,
    pub username_env: String,
    pub password_env: String,
    /// Disables TLS certificate validation. Operational escape hatch only.
    pub insecure_skip_verify: bool,
    pub request_timeout_secs: u64,
}

impl Default for InfluxSettings {
    fn default() -> Self {
        Self {
            url: "https://localhost:8086".to_string(),
            database: "signals".to_string(),
            measurement: "fastcharge".to_string(),
            site_tag: "project".to_string(),
            username_env: "INFLUX_USER".to_string(),
            password_env: "INFLUX_PW".to_string(),
            insecure_skip_verify: false,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Env var holding the `mysql://` connection URL.
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url_env: "FW_DATABASE_URL".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSettings {
    /// Maximum number of sites reconciled concurrently.
    pub site_concurrency: usize,
    /// History window scanned for the onset of a new fault.
    pub lookback_days: i64,
    /// Upper bound on one whole batch. `None` = unbounded.
    pub run_timeout_secs: Option<u64>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            site_concurrency: 10,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            run_timeout_secs: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaultWatchConfig {
    pub influx: InfluxSettings,
    pub store: StoreSettings,
    pub runtime: RuntimeSettings,
    /// YAML catalog replacing the built-in equipment/site tables.
    pub catalog_path: Option<String>,
}

impl FaultWatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.runtime.site_concurrency == 0 {
            bail!("CONFIG_INVALID runtime.site_concurrency must be >= 1");
        }
        if self.runtime.lookback_days < 1 {
            bail!("CONFIG_INVALID runtime.lookback_days must be >= 1");
        }
        if self.runtime.run_timeout_secs == Some(0) {
            bail!("CONFIG_INVALID runtime.run_timeout_secs must be > 0 when set");
        }
        if self.store.max_connections == 0 {
            bail!("CONFIG_INVALID store.max_connections must be >= 1");
        }
        for (name, v) in [
            ("influx.url", &self.influx.url),
            ("influx.database", &self.influx.database),
            ("influx.measurement", &self.influx.measurement),
            ("influx.site_tag", &self.influx.site_tag),
        ] {
            if v.trim().is_empty() {
                bail!("CONFIG_INVALID {name} must not be empty");
            }
        }
        for (name, v) in [
            ("influx.username_env", &self.influx.username_env),
            ("influx.password_env", &self.influx.password_env),
            ("store.url_env", &self.store.url_env),
        ] {
            if !is_env_var_name(v) {
                bail!("CONFIG_INVALID {name} must be an env var name, got a literal value");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// SHA-256 of `canonical_json`, hex.
    pub config_hash: String,
    /// Effective config (defaults applied) as compact JSON.
    pub canonical_json: String,
    pub config: FaultWatchConfig,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Merge YAML docs in order (later docs override earlier ones) and apply
/// defaults. An empty slice yields the default configuration.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as "no overrides".
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let config: FaultWatchConfig =
        serde_json::from_value(merged).context("config does not match schema")?;
    config.validate()?;

    let canonical_json =
        serde_json::to_string(&config).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_string_leaves(v, "", &mut leaves);
    for (ptr, s) in leaves {
        if looks_like_secret(s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn collect_string_leaves<'a>(v: &'a Value, prefix: &str, out: &mut Vec<(String, &'a str)>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                collect_string_leaves(vv, &format!("{prefix}/{k}"), out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_string_leaves(vv, &format!("{prefix}/{i}"), out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.as_str())),
        _ => {}
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    // A URL with userinfo carries credentials whatever the scheme.
    if let Some((_, rest)) = t.split_once("://") {
        let authority = rest.split('/').next().unwrap_or("");
        if authority.contains('@') {
            return true;
        }
    }
    t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

fn is_env_var_name(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_defaults() {
        let rt = RuntimeSettings::default();
        assert_eq!(rt.lookback_days, DEFAULT_LOOKBACK_DAYS);
        assert_eq!(rt.site_concurrency, 10);
        assert_eq!(rt.run_timeout_secs, None);
    }

    #[test]
    fn env_var_name_shape() {
        assert!(is_env_var_name("FW_DATABASE_URL"));
        assert!(is_env_var_name("INFLUX_PW"));
        assert!(!is_env_var_name("hunter2"));
        assert!(!is_env_var_name("1ABC"));
        assert!(!is_env_var_name(""));
    }

    #[test]
    fn url_with_userinfo_is_secret() {
        assert!(looks_like_secret("https://nw:pw@tsdb.example.com"));
        assert!(looks_like_secret("mysql://root:pw@db/charges"));
        assert!(!looks_like_secret("https://tsdb.example.com:443"));
    }

    #[test]
    fn deep_merge_overrides_leaves_only() {
        let a = serde_json::json!({"influx": {"url": "a", "database": "d"}});
        let b = serde_json::json!({"influx": {"url": "b"}});
        let m = deep_merge(a, b);
        assert_eq!(m["influx"]["url"], "b");
        assert_eq!(m["influx"]["database"], "d");
    }
}
