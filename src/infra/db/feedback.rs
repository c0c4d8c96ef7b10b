use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateFeedbackParams, FeedbackRepo, RepoError, RespondFeedbackParams,
};
use crate::domain::entities::FeedbackRecord;
use crate::domain::types::FeedbackKind;

use super::{PostgresRepositories, map_sqlx_error};

const FEEDBACK_COLUMNS: &str = "id, user_id, kind, rating, title, message, email, is_resolved, \
     response, responded_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: Uuid,
    user_id: Option<Uuid>,
    kind: FeedbackKind,
    rating: Option<i32>,
    title: String,
    message: String,
    email: Option<String>,
    is_resolved: bool,
    response: Option<String>,
    responded_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<FeedbackRow> for FeedbackRecord {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            rating: row.rating,
            title: row.title,
            message: row.message,
            email: row.email,
            is_resolved: row.is_resolved,
            response: row.response,
            responded_at: row.responded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl FeedbackRepo for PostgresRepositories {
    async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            r#"
            INSERT INTO feedback (id, user_id, kind, rating, title, message, email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.kind)
        .bind(params.rating)
        .bind(params.title)
        .bind(params.message)
        .bind(params.email)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(FeedbackRecord::from(row))
    }

    async fn list_all(&self) -> Result<Vec<FeedbackRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FeedbackRecord::from).collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<FeedbackRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FeedbackRecord::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FeedbackRecord>, RepoError> {
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(FeedbackRecord::from))
    }

    async fn respond(&self, params: RespondFeedbackParams) -> Result<FeedbackRecord, RepoError> {
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            r#"
            UPDATE feedback
               SET response = $2,
                   is_resolved = TRUE,
                   responded_at = $3,
                   updated_at = $3
             WHERE id = $1
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(params.id)
        .bind(params.response)
        .bind(params.responded_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(FeedbackRecord::from(row))
    }
}
