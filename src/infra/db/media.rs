use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{MediaRepo, RepoError};
use crate::domain::entities::PropertyImageRecord;

use super::{PostgresRepositories, map_sqlx_error};

const IMAGE_COLUMNS: &str =
    "id, property_id, stored_path, content_type, size_bytes, caption, is_primary, sort_order, created_at";

#[derive(sqlx::FromRow)]
struct PropertyImageRow {
    id: Uuid,
    property_id: Uuid,
    stored_path: String,
    content_type: String,
    size_bytes: i64,
    caption: Option<String>,
    is_primary: bool,
    sort_order: i32,
    created_at: OffsetDateTime,
}

impl From<PropertyImageRow> for PropertyImageRecord {
    fn from(row: PropertyImageRow) -> Self {
        Self {
            id: row.id,
            property_id: row.property_id,
            stored_path: row.stored_path,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            caption: row.caption,
            is_primary: row.is_primary,
            sort_order: row.sort_order,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl MediaRepo for PostgresRepositories {
    async fn insert_image(&self, record: PropertyImageRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO property_images (
                id, property_id, stored_path, content_type, size_bytes,
                caption, is_primary, sort_order, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.property_id)
        .bind(record.stored_path)
        .bind(record.content_type)
        .bind(record.size_bytes)
        .bind(record.caption)
        .bind(record.is_primary)
        .bind(record.sort_order)
        .bind(record.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_images(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<PropertyImageRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PropertyImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM property_images \
             WHERE property_id = $1 ORDER BY sort_order, created_at"
        ))
        .bind(property_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PropertyImageRecord::from).collect())
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<PropertyImageRecord>, RepoError> {
        let row = sqlx::query_as::<_, PropertyImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM property_images WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PropertyImageRecord::from))
    }

    async fn mark_primary(&self, property_id: Uuid, image_id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // Demote the previous primary image before promoting the new one.
        sqlx::query(
            "UPDATE property_images SET is_primary = FALSE WHERE property_id = $1 AND id <> $2",
        )
        .bind(property_id)
        .bind(image_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("UPDATE property_images SET is_primary = TRUE WHERE id = $1")
            .bind(image_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_image(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM property_images WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}
