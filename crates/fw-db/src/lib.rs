//! fw-db
//!
//! MySQL access for the fault-episode log (`kpi_defauts_log`).
//! Pool setup, embedded migrations, operator status queries, and the
//! [`MySqlFaultLog`] adapter the reconciliation engine writes through.

mod faultlog;

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

pub use faultlog::MySqlFaultLog;

/// Env var the DB-backed tests read their connection URL from.
pub const ENV_DB_URL: &str = "FW_DATABASE_URL";

pub const FAULT_LOG_TABLE: &str = "kpi_defauts_log";

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connect a pool shared by every site task.
pub async fn connect(url: &str, max_connections: u32) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to MySQL")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &MySqlPool) -> Result<()> {
    MIGRATOR.run(pool).await.context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_fault_log_table: bool,
}

/// Connectivity plus schema presence.
pub async fn status(pool: &MySqlPool) -> Result<DbStatus> {
    let (one,): (i64,) = sqlx::query_as::<_, (i64,)>("SELECT CAST(1 AS SIGNED)")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (tables,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        SELECT COUNT(*)
        FROM information_schema.tables
        WHERE table_schema = DATABASE() AND table_name = ?
        "#,
    )
    .bind(FAULT_LOG_TABLE)
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_fault_log_table: tables > 0,
    })
}

/// Episodes whose `date_fin` is still null, across every site.
///
/// Zero when the table does not exist yet.
pub async fn count_open_episodes(pool: &MySqlPool) -> Result<i64> {
    let st = status(pool).await?;
    if !st.has_fault_log_table {
        return Ok(0);
    }

    let (n,): (i64,) =
        sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM kpi_defauts_log WHERE date_fin IS NULL")
            .fetch_one(pool)
            .await
            .context("count_open_episodes failed")?;
    Ok(n)
}
