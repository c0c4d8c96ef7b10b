use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateNotificationParams, NotificationQueryFilter, NotificationsRepo, RepoError,
};
use crate::domain::entities::NotificationRecord;
use crate::domain::types::NotificationKind;

use super::{PostgresRepositories, map_sqlx_error};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, message, kind, is_read, read_at, link, created_at";

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    message: String,
    kind: NotificationKind,
    is_read: bool,
    read_at: Option<OffsetDateTime>,
    link: Option<String>,
    created_at: OffsetDateTime,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            kind: row.kind,
            is_read: row.is_read,
            read_at: row.read_at,
            link: row.link,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl NotificationsRepo for PostgresRepositories {
    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: NotificationQueryFilter,
    ) -> Result<Vec<NotificationRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = "
        ));
        qb.push_bind(user_id);

        if let Some(is_read) = filter.is_read {
            qb.push(" AND is_read = ");
            qb.push_bind(is_read);
        }

        if let Some(kind) = filter.kind {
            qb.push(" AND kind = ");
            qb.push_bind(kind);
        }

        qb.push(" ORDER BY created_at DESC, id DESC ");

        let rows = qb
            .build_query_as::<NotificationRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(NotificationRecord::from).collect())
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(count as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>, RepoError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(NotificationRecord::from))
    }

    async fn create_notification(
        &self,
        params: CreateNotificationParams,
    ) -> Result<NotificationRecord, RepoError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            INSERT INTO notifications (id, user_id, title, message, kind, link, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.title)
        .bind(params.message)
        .bind(params.kind)
        .bind(params.link)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(NotificationRecord::from(row))
    }

    async fn mark_read(&self, user_id: Uuid, ids: &[Uuid]) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
               SET is_read = TRUE, read_at = $3
             WHERE user_id = $1 AND is_read = FALSE AND id = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(ids)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
               SET is_read = TRUE, read_at = $2
             WHERE user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn mark_one_read(&self, id: Uuid) -> Result<Option<NotificationRecord>, RepoError> {
        let updated = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            UPDATE notifications
               SET is_read = TRUE, read_at = $2
             WHERE id = $1 AND is_read = FALSE
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match updated {
            Some(row) => Ok(Some(NotificationRecord::from(row))),
            // Already read: the transition is one-way, return the stored row.
            None => self.find_by_id(id).await,
        }
    }

    async fn delete_notification(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}
