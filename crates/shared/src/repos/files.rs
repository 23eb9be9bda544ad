use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::models::{NewFile, StoredFile};

use super::{Store, StoreError};

impl Store {
    pub async fn create_file(&self, file: &NewFile) -> Result<StoredFile, StoreError> {
        let row = sqlx::query(
            "INSERT INTO files (id, slug, name, hash, content_type, size)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, slug, name, hash, content_type, size, created_at, updated_at",
        )
        .bind(&file.id)
        .bind(&file.slug)
        .bind(&file.name)
        .bind(&file.hash)
        .bind(&file.content_type)
        .bind(file.size)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored_file_from_row(&row)?)
    }

    pub async fn find_file_by_slug(&self, slug: &str) -> Result<Option<StoredFile>, StoreError> {
        let row = sqlx::query(
            "SELECT id, slug, name, hash, content_type, size, created_at, updated_at
             FROM files
             WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| stored_file_from_row(&row))
            .transpose()
            .map_err(StoreError::from)
    }
}

fn stored_file_from_row(row: &PgRow) -> Result<StoredFile, sqlx::Error> {
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(StoredFile {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        name: row.try_get("name")?,
        hash: row.try_get("hash")?,
        content_type: row.try_get("content_type")?,
        size: row.try_get("size")?,
        created_at,
        updated_at,
    })
}
