use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fw_reconcile::{
    BitPosition, EpisodeId, EpisodeKey, FaultLogStore, NewEpisode, OpenEpisode, StoreError,
};
use sqlx::mysql::MySqlPool;
use sqlx::Row;
use tracing::warn;

/// [`FaultLogStore`] over the `kpi_defauts_log` table.
///
/// `DATETIME` columns carry no zone; values are written and read as UTC.
#[derive(Debug, Clone)]
pub struct MySqlFaultLog {
    pool: MySqlPool,
}

impl MySqlFaultLog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl FaultLogStore for MySqlFaultLog {
    async fn open_episodes(&self, key: &EpisodeKey) -> Result<Vec<OpenEpisode>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, bit_position
            FROM kpi_defauts_log
            WHERE site = ? AND field_name = ? AND eqp = ? AND date_fin IS NULL
            ORDER BY id
            "#,
        )
        .bind(&key.site)
        .bind(&key.field_name)
        .bind(&key.equipment)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::backend("open_episodes", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = match row.try_get("id") {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "open episode row without readable id skipped");
                    continue;
                }
            };
            let bit = row
                .try_get::<i32, _>("bit_position")
                .map_err(|e| e.to_string())
                .and_then(|raw| BitPosition::try_from(i64::from(raw)));
            match bit {
                Ok(bit) => out.push(OpenEpisode {
                    id: EpisodeId(id),
                    bit,
                }),
                Err(e) => warn!(episode_id = id, error = %e, "open episode with bad bit_position skipped"),
            }
        }
        Ok(out)
    }

    async fn close_episode(&self, id: EpisodeId, end: DateTime<Utc>) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE kpi_defauts_log SET date_fin = ? WHERE id = ?")
            .bind(end.naive_utc())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::backend("close_episode", e))?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn episode_exists(&self, key: &EpisodeKey, bit: BitPosition) -> Result<bool, StoreError> {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT COUNT(*)
            FROM kpi_defauts_log
            WHERE site = ? AND field_name = ? AND eqp = ? AND bit_position = ?
            "#,
        )
        .bind(&key.site)
        .bind(&key.field_name)
        .bind(&key.equipment)
        .bind(i32::from(bit.get()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::backend("episode_exists", e))?;
        Ok(n > 0)
    }

    async fn create_episode(&self, episode: &NewEpisode) -> Result<EpisodeId, StoreError> {
        let res = sqlx::query(
            r#"
            INSERT INTO kpi_defauts_log
              (site, date_debut, date_fin, defaut, eqp, bit_position, field_name)
            VALUES (?, ?, NULL, ?, ?, ?, ?)
            "#,
        )
        .bind(&episode.key.site)
        .bind(episode.start.naive_utc())
        .bind(&episode.description)
        .bind(&episode.key.equipment)
        .bind(i32::from(episode.bit.get()))
        .bind(&episode.key.field_name)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend("create_episode", e))?;

        let id = i64::try_from(res.last_insert_id())
            .map_err(|e| StoreError::backend("create_episode", e))?;
        Ok(EpisodeId(id))
    }
}
