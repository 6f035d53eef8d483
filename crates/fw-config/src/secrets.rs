//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES. `resolve_secrets` reads them once
//! at startup; the resulting [`ResolvedSecrets`] is handed to the adapters
//! that need it. `Debug` output redacts every value and error messages
//! mention the variable name, never its content.

use anyhow::{bail, Result};

use crate::FaultWatchConfig;

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// InfluxDB basic-auth user. `None` = unauthenticated.
    pub influx_username: Option<String>,
    pub influx_password: Option<String>,
    /// `mysql://` URL of the fault log.
    pub database_url: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "influx_username",
                &self.influx_username.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "influx_password",
                &self.influx_password.as_ref().map(|_| "<REDACTED>"),
            )
            .field("database_url", &"<REDACTED>")
            .finish()
    }
}

/// Resolve secrets from the process environment.
pub fn resolve_secrets(cfg: &FaultWatchConfig) -> Result<ResolvedSecrets> {
    resolve_secrets_with(cfg, |name| std::env::var(name).ok())
}

/// Resolve secrets through `lookup` (env var name -> value).
///
/// Blank values count as unset. The database URL is required; Influx
/// credentials are optional but must come as a pair.
pub fn resolve_secrets_with<F>(cfg: &FaultWatchConfig, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let Some(database_url) = get(&cfg.store.url_env) else {
        bail!(
            "SECRETS_MISSING: required env var '{}' (fault log database url) is not set or empty",
            cfg.store.url_env
        );
    };

    let influx_username = get(&cfg.influx.username_env);
    let influx_password = get(&cfg.influx.password_env);
    match (&influx_username, &influx_password) {
        (Some(_), None) => bail!(
            "SECRETS_MISSING: '{}' is set but '{}' (influx password) is not",
            cfg.influx.username_env,
            cfg.influx.password_env
        ),
        (None, Some(_)) => bail!(
            "SECRETS_MISSING: '{}' is set but '{}' (influx username) is not",
            cfg.influx.password_env,
            cfg.influx.username_env
        ),
        _ => {}
    }

    Ok(ResolvedSecrets {
        influx_username,
        influx_password,
        database_url,
    })
}
