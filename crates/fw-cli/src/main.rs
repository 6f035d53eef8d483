use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use fw_catalog::Catalog;
use fw_config::{FaultWatchConfig, LoadedConfig};
use fw_influx::{InfluxEndpoint, InfluxGateway};
use fw_reconcile::{Bitmask, FieldKind};
use fw_runtime::{Orchestrator, OrchestratorSettings, SystemClock};
use tracing::info;

#[derive(Parser)]
#[command(name = "faultwatch")]
#[command(about = "Fault-episode reconciliation for charging-site status bitmasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every monitored field of the selected sites once
    Run {
        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Site codes to process (default: every site in the catalog)
        #[arg(long = "site")]
        sites: Vec<String>,

        /// Override runtime.site_concurrency
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print the run report as JSON after the summary line
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Database commands
    Db {
        /// Layered config paths in merge order
        #[arg(long = "config", global = true)]
        config_paths: Vec<String>,

        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print the active bits of a raw field value
    Decode {
        /// Raw value as read from the time-series store
        #[arg(allow_negative_numbers = true)]
        value: String,

        /// Equipment id (DC1, PDC3, ...) whose bit map describes the bits
        #[arg(long, requires = "field")]
        equipment: Option<String>,

        /// ic | pc
        #[arg(long, requires = "equipment")]
        field: Option<String>,

        /// YAML catalog replacing the built-in tables
        #[arg(long)]
        catalog: Option<String>,
    },

    /// List monitored site codes and display names
    Sites {
        /// YAML catalog replacing the built-in tables
        #[arg(long)]
        catalog: Option<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connectivity, schema presence, open episode count
    Status,

    /// Apply SQL migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent when the file does not exist; deployments inject env vars directly.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Run {
            config_paths,
            sites,
            concurrency,
            json,
        } => {
            let loaded = load_config(&config_paths)?;
            let mut cfg = loaded.config.clone();
            if let Some(n) = concurrency {
                cfg.runtime.site_concurrency = n;
                cfg.validate()?;
            }
            run_batch(&loaded, cfg, sites, json).await?;
        }

        Commands::Db { config_paths, cmd } => {
            let loaded = load_config(&config_paths)?;
            let secrets = fw_config::resolve_secrets(&loaded.config)?;
            let pool =
                fw_db::connect(&secrets.database_url, loaded.config.store.max_connections).await?;
            match cmd {
                DbCmd::Status => {
                    let s = fw_db::status(&pool).await?;
                    let open = fw_db::count_open_episodes(&pool).await?;
                    println!(
                        "db_ok={} has_fault_log_table={} open_episodes={}",
                        s.ok, s.has_fault_log_table, open
                    );
                }
                DbCmd::Migrate => {
                    fw_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = fw_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Decode {
            value,
            equipment,
            field,
            catalog,
        } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let target = match (equipment, field) {
                (Some(eq), Some(f)) => {
                    let kind = FieldKind::parse(&f)
                        .ok_or_else(|| anyhow!("--field must be ic or pc, got {f:?}"))?;
                    Some((eq, kind))
                }
                _ => None,
            };
            for line in decode_lines(&catalog, &value, target)? {
                println!("{line}");
            }
        }

        Commands::Sites { catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            for s in &catalog.sites {
                println!("{}\t{}", s.code, s.name);
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// No paths means built-in defaults.
fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    fw_config::load_layered_yaml(&path_refs)
}

fn load_catalog(path: Option<&str>) -> Result<Catalog> {
    match path {
        Some(p) => Catalog::load_yaml(p),
        None => Ok(Catalog::builtin()),
    }
}

async fn run_batch(
    loaded: &LoadedConfig,
    cfg: FaultWatchConfig,
    sites: Vec<String>,
    json: bool,
) -> Result<()> {
    let secrets = fw_config::resolve_secrets(&cfg)?;
    let catalog = Arc::new(load_catalog(cfg.catalog_path.as_deref())?);
    info!(config_hash = %loaded.config_hash, "config loaded");

    // Both backing stores must be reachable before any site is touched.
    let pool = fw_db::connect(&secrets.database_url, cfg.store.max_connections).await?;
    let st = fw_db::status(&pool).await?;
    if !st.has_fault_log_table {
        bail!("fault log table missing; run `faultwatch db migrate` first");
    }
    let gateway = InfluxGateway::new(InfluxEndpoint::from_config(&cfg.influx, &secrets))?;
    gateway
        .ping()
        .await
        .context("influx unreachable at startup")?;

    let sites = if sites.is_empty() {
        catalog.site_codes()
    } else {
        sites
    };

    let orchestrator = Orchestrator::new(
        Arc::new(gateway),
        Arc::new(fw_db::MySqlFaultLog::new(pool)),
        catalog,
        Arc::new(SystemClock),
        OrchestratorSettings::from_config(&cfg.runtime),
    );

    let report = match cfg.runtime.run_timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), orchestrator.run(&sites))
            .await
            .map_err(|_| anyhow!("run exceeded runtime.run_timeout_secs={secs}"))?,
        None => orchestrator.run(&sites).await,
    };

    println!("{}", report.summary_line());
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("report serialize failed")?
        );
    }
    Ok(())
}

/// Operator-facing breakdown of a raw value, no I/O.
fn decode_lines(
    catalog: &Catalog,
    raw: &str,
    target: Option<(String, FieldKind)>,
) -> Result<Vec<String>> {
    let value: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("not a number: {raw:?}"))?;
    let mask = Bitmask::from_sample(value)
        .ok_or_else(|| anyhow!("value {value} is not a 32-bit mask"))?;

    let bits = match &target {
        Some((eq, kind)) => {
            let equipment = catalog
                .equipment(eq)
                .ok_or_else(|| anyhow!("unknown equipment {eq:?}"))?;
            Some((equipment, equipment.field(*kind)))
        }
        None => None,
    };

    let mut out = vec![format!("value={} mask=0x{:08x}", mask.bits(), mask.bits())];
    if let Some((equipment, field)) = bits {
        out.push(format!("eqp={} field={}", equipment.eqp_name, field.field));
    }
    for bit in mask.active_bits() {
        let line = match bits.and_then(|(_, f)| f.bits.describe(bit)) {
            Some(desc) => format!("bit={bit} {desc}"),
            None if bits.is_some() => format!("bit={bit} (unmapped)"),
            None => format!("bit={bit}"),
        };
        out.push(line);
    }
    Ok(out)
}
