use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, ReviewCursor};
use crate::application::repos::{
    CreateReviewParams, RatingBucket, RepoError, ReviewLikeToggle, ReviewQueryFilter, ReviewStats,
    ReviewsRepo, UpdateReviewParams,
};
use crate::domain::entities::ReviewRecord;

use super::{PostgresRepositories, map_sqlx_error};

const REVIEW_COLUMNS: &str = "id, user_id, property_id, rating, title, comment, is_approved, \
     is_edited, likes_count, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    property_id: Uuid,
    rating: i32,
    title: String,
    comment: String,
    is_approved: bool,
    is_edited: bool,
    likes_count: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ReviewRow> for ReviewRecord {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            property_id: row.property_id,
            rating: row.rating,
            title: row.title,
            comment: row.comment,
            is_approved: row.is_approved,
            is_edited: row.is_edited,
            likes_count: row.likes_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Recompute the denormalized likes counter from the like rows, inside the
/// toggle transaction.
async fn recompute_likes_count(
    tx: &mut Transaction<'_, Postgres>,
    review_id: Uuid,
) -> Result<i32, RepoError> {
    sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE reviews
           SET likes_count = (
               SELECT COUNT(*) FROM review_likes WHERE review_id = $1
           )::int
         WHERE id = $1
        RETURNING likes_count
        "#,
    )
    .bind(review_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(map_sqlx_error)
}

#[async_trait]
impl ReviewsRepo for PostgresRepositories {
    async fn list_reviews(
        &self,
        filter: &ReviewQueryFilter,
        page: PageRequest<ReviewCursor>,
    ) -> Result<CursorPage<ReviewRecord>, RepoError> {
        let limit = page.limit.clamp(1, 100) as i64;
        let mut qb = QueryBuilder::new(format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE is_approved = TRUE "
        ));

        if let Some(property_id) = filter.property_id {
            qb.push(" AND property_id = ");
            qb.push_bind(property_id);
        }

        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ");
            qb.push_bind(user_id);
        }

        if let Some(min_rating) = filter.min_rating {
            qb.push(" AND rating >= ");
            qb.push_bind(min_rating);
        }

        if let Some(cursor) = page.cursor {
            qb.push(" AND (created_at, id) < (");
            qb.push_bind(cursor.created_at());
            qb.push(", ");
            qb.push_bind(cursor.id());
            qb.push(")");
        }

        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(limit + 1);

        let mut rows = qb
            .build_query_as::<ReviewRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let next_cursor = if (rows.len() as i64) > limit {
            let overflow = rows.pop().expect("overflow row exists when len > limit");
            Some(ReviewCursor::new(overflow.created_at, overflow.id).encode())
        } else {
            None
        };

        let records = rows.into_iter().map(ReviewRecord::from).collect();
        Ok(CursorPage::new(records, next_cursor))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ReviewRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ReviewRecord::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ReviewRecord>, RepoError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ReviewRecord::from))
    }

    async fn create_review(&self, params: CreateReviewParams) -> Result<ReviewRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            INSERT INTO reviews (id, user_id, property_id, rating, title, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.property_id)
        .bind(params.rating)
        .bind(params.title)
        .bind(params.comment)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ReviewRecord::from(row))
    }

    async fn update_review(&self, params: UpdateReviewParams) -> Result<ReviewRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            UPDATE reviews
               SET rating = $2,
                   title = $3,
                   comment = $4,
                   is_edited = TRUE,
                   updated_at = $5
             WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(params.id)
        .bind(params.rating)
        .bind(params.title)
        .bind(params.comment)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ReviewRecord::from(row))
    }

    async fn delete_review(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn toggle_like(
        &self,
        user_id: Uuid,
        review_id: Uuid,
    ) -> Result<ReviewLikeToggle, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // Same atomic add-or-remove shape as the favorite toggle.
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO review_likes (id, user_id, review_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, review_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(review_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let toggle = match inserted {
            Some(_) => {
                let likes_count = recompute_likes_count(&mut tx, review_id).await?;
                ReviewLikeToggle::Added { likes_count }
            }
            None => {
                sqlx::query("DELETE FROM review_likes WHERE user_id = $1 AND review_id = $2")
                    .bind(user_id)
                    .bind(review_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;

                let likes_count = recompute_likes_count(&mut tx, review_id).await?;
                ReviewLikeToggle::Removed { likes_count }
            }
        };

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(toggle)
    }

    async fn stats_for_property(&self, property_id: Uuid) -> Result<ReviewStats, RepoError> {
        #[derive(sqlx::FromRow)]
        struct TotalsRow {
            total_reviews: i64,
            avg_rating: f64,
        }

        let totals: TotalsRow = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT COUNT(*) AS total_reviews,
                   COALESCE(AVG(rating), 0)::float8 AS avg_rating
              FROM reviews
             WHERE property_id = $1 AND is_approved = TRUE
            "#,
        )
        .bind(property_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        #[derive(sqlx::FromRow)]
        struct BucketRow {
            rating: i32,
            count: i64,
        }

        let buckets = sqlx::query_as::<_, BucketRow>(
            r#"
            SELECT rating, COUNT(*) AS count
              FROM reviews
             WHERE property_id = $1 AND is_approved = TRUE
             GROUP BY rating
             ORDER BY rating
            "#,
        )
        .bind(property_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ReviewStats {
            total_reviews: totals.total_reviews as u64,
            avg_rating: totals.avg_rating,
            rating_distribution: buckets
                .into_iter()
                .map(|bucket| RatingBucket {
                    rating: bucket.rating,
                    count: bucket.count as u64,
                })
                .collect(),
        })
    }
}
