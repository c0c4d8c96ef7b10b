use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{FavoriteToggle, FavoritesRepo, RepoError};
use crate::domain::entities::{FavoriteRecord, PropertyRecord};
use crate::domain::types::{PropertyKind, PropertyStatus};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct FavoriteRow {
    id: Uuid,
    user_id: Uuid,
    property_id: Uuid,
    created_at: OffsetDateTime,
}

impl From<FavoriteRow> for FavoriteRecord {
    fn from(row: FavoriteRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            property_id: row.property_id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FavoriteWithPropertyRow {
    id: Uuid,
    user_id: Uuid,
    favorite_created_at: OffsetDateTime,
    property_id: Uuid,
    title: String,
    description: String,
    kind: PropertyKind,
    status: PropertyStatus,
    price: i64,
    currency: String,
    area_m2: f64,
    bedrooms: i32,
    bathrooms: i32,
    city: String,
    region: String,
    quarter: Option<String>,
    address: String,
    owner_id: Uuid,
    is_featured: bool,
    is_verified: bool,
    views_count: i32,
    favorites_count: i32,
    published_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

/// Recompute the denormalized favorites counter from the favorite rows.
/// Runs inside the toggle transaction so the counter and the rows commit
/// together.
async fn recompute_favorites_count(
    tx: &mut Transaction<'_, Postgres>,
    property_id: Uuid,
) -> Result<i32, RepoError> {
    sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE properties
           SET favorites_count = (
               SELECT COUNT(*) FROM favorites WHERE property_id = $1
           )::int
         WHERE id = $1
        RETURNING favorites_count
        "#,
    )
    .bind(property_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(map_sqlx_error)
}

#[async_trait]
impl FavoritesRepo for PostgresRepositories {
    async fn toggle_favorite(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<FavoriteToggle, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // Single atomic insert-or-detect: a returned row means the pair was
        // absent and is now added; no row means it existed, so this call
        // removes it. Concurrent togglers serialize at the unique index.
        let inserted: Option<FavoriteRow> = sqlx::query_as::<_, FavoriteRow>(
            r#"
            INSERT INTO favorites (id, user_id, property_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, property_id) DO NOTHING
            RETURNING id, user_id, property_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(property_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let toggle = match inserted {
            Some(row) => {
                let favorites_count = recompute_favorites_count(&mut tx, property_id).await?;
                FavoriteToggle::Added {
                    favorite: FavoriteRecord::from(row),
                    favorites_count,
                }
            }
            None => {
                sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND property_id = $2")
                    .bind(user_id)
                    .bind(property_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;

                let favorites_count = recompute_favorites_count(&mut tx, property_id).await?;
                FavoriteToggle::Removed { favorites_count }
            }
        };

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(toggle)
    }

    async fn list_with_properties(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(FavoriteRecord, PropertyRecord)>, RepoError> {
        let rows = sqlx::query_as::<_, FavoriteWithPropertyRow>(
            r#"
            SELECT f.id, f.user_id, f.created_at AS favorite_created_at,
                   p.id AS property_id, p.title, p.description, p.kind, p.status,
                   p.price, p.currency, p.area_m2, p.bedrooms, p.bathrooms,
                   p.city, p.region, p.quarter, p.address, p.owner_id,
                   p.is_featured, p.is_verified, p.views_count, p.favorites_count,
                   p.published_at, p.created_at, p.updated_at
              FROM favorites f
              JOIN properties p ON p.id = f.property_id
             WHERE f.user_id = $1
             ORDER BY f.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let favorite = FavoriteRecord {
                    id: row.id,
                    user_id: row.user_id,
                    property_id: row.property_id,
                    created_at: row.favorite_created_at,
                };
                let property = PropertyRecord {
                    id: row.property_id,
                    title: row.title,
                    description: row.description,
                    kind: row.kind,
                    status: row.status,
                    price: row.price,
                    currency: row.currency,
                    area_m2: row.area_m2,
                    bedrooms: row.bedrooms,
                    bathrooms: row.bathrooms,
                    city: row.city,
                    region: row.region,
                    quarter: row.quarter,
                    address: row.address,
                    owner_id: row.owner_id,
                    is_featured: row.is_featured,
                    is_verified: row.is_verified,
                    views_count: row.views_count,
                    favorites_count: row.favorites_count,
                    published_at: row.published_at,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                };
                (favorite, property)
            })
            .collect())
    }

    async fn exists(&self, user_id: Uuid, property_id: Uuid) -> Result<bool, RepoError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND property_id = $2)",
        )
        .bind(user_id)
        .bind(property_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(exists)
    }

    async fn find_favorite(&self, id: Uuid) -> Result<Option<FavoriteRecord>, RepoError> {
        let row = sqlx::query_as::<_, FavoriteRow>(
            "SELECT id, user_id, property_id, created_at FROM favorites WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(FavoriteRecord::from))
    }

    async fn delete_favorite(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // Capture the parent reference before the row disappears.
        let property_id: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM favorites WHERE id = $1 RETURNING property_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        let Some(property_id) = property_id else {
            return Err(RepoError::NotFound);
        };

        recompute_favorites_count(&mut tx, property_id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
