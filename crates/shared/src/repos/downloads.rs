use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Row};

use crate::models::{Download, DownloadEvent};
use crate::tracking::{DownloadExecutor, DownloadInsertFuture};

use super::{Store, StoreError};

impl Store {
    pub async fn add_download(&self, event: &DownloadEvent) -> Result<(), StoreError> {
        insert_download_row(&self.pool, event).await
    }

    pub async fn list_downloads_for_file(&self, file_id: &str) -> Result<Vec<Download>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, file_id, ip, cache_hit, created_at
             FROM downloads
             WHERE file_id = $1
             ORDER BY created_at ASC, id ASC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                let file_id: Option<String> = row.try_get("file_id")?;
                let ip: Option<String> = row.try_get("ip")?;
                let cache_hit: bool = row.try_get("cache_hit")?;
                let created_at: DateTime<Utc> = row.try_get("created_at")?;

                Ok(Download {
                    id,
                    file_id,
                    ip,
                    cache_hit,
                    created_at,
                })
            })
            .collect()
    }
}

impl DownloadExecutor for Store {
    fn insert_download<'a>(&'a self, event: &'a DownloadEvent) -> DownloadInsertFuture<'a> {
        Box::pin(self.add_download(event))
    }
}

impl DownloadExecutor for PgPool {
    fn insert_download<'a>(&'a self, event: &'a DownloadEvent) -> DownloadInsertFuture<'a> {
        Box::pin(insert_download_row(self, event))
    }
}

async fn insert_download_row<'e, E>(executor: E, event: &DownloadEvent) -> Result<(), StoreError>
where
    E: PgExecutor<'e>,
{
    sqlx::query("INSERT INTO downloads (file_id, ip, cache_hit) VALUES ($1, $2, $3)")
        .bind(&event.file_id)
        .bind(&event.ip)
        .bind(event.cache_hit)
        .execute(executor)
        .await?;

    Ok(())
}
