//! Notification lifecycle: unread → read, one way.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CreateNotificationParams, NotificationQueryFilter, NotificationsRepo, RepoError,
};
use crate::domain::entities::NotificationRecord;
use crate::domain::error::DomainError;
use crate::domain::sanitize::strip_html;
use crate::domain::types::NotificationKind;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("notification not found")]
    NotFound,
    #[error("caller does not own this notification")]
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct CreateNotificationCommand {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationListing {
    pub count: usize,
    pub unread_count: u64,
    pub notifications: Vec<NotificationRecord>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadOutcome {
    pub count: u64,
    pub message: String,
}

pub struct NotificationService {
    repo: Arc<dyn NotificationsRepo>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationsRepo>) -> Self {
        Self { repo }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filter: NotificationQueryFilter,
    ) -> Result<NotificationListing, NotificationError> {
        let notifications = self.repo.list_for_user(user_id, filter).await?;
        let unread_count = self.repo.unread_count(user_id).await?;
        Ok(NotificationListing {
            count: notifications.len(),
            unread_count,
            notifications,
        })
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64, NotificationError> {
        self.repo.unread_count(user_id).await.map_err(Into::into)
    }

    /// Retrieve one notification, implicitly transitioning it to read.
    pub async fn retrieve(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<NotificationRecord, NotificationError> {
        let notification = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(NotificationError::NotFound)?;
        if notification.user_id != user_id {
            return Err(NotificationError::Forbidden);
        }

        if notification.is_read {
            return Ok(notification);
        }

        self.repo
            .mark_one_read(id)
            .await?
            .ok_or(NotificationError::NotFound)
    }

    /// Users may only create notifications addressed to themselves; system
    /// components write through the repository directly.
    pub async fn create(
        &self,
        user_id: Uuid,
        command: CreateNotificationCommand,
    ) -> Result<NotificationRecord, NotificationError> {
        let title = strip_html(command.title.trim());
        let message = strip_html(command.message.trim());
        if title.is_empty() {
            return Err(DomainError::validation("title must not be empty").into());
        }
        if message.is_empty() {
            return Err(DomainError::validation("message must not be empty").into());
        }

        self.repo
            .create_notification(CreateNotificationParams {
                user_id,
                title,
                message,
                kind: command.kind,
                link: command.link,
            })
            .await
            .map_err(Into::into)
    }

    /// Mark the given notifications read in one set-based update. With no
    /// ids, the most recent unread notification is marked instead.
    pub async fn mark_read(
        &self,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> Result<MarkReadOutcome, NotificationError> {
        if !ids.is_empty() {
            let count = self.repo.mark_read(user_id, ids).await?;
            return Ok(MarkReadOutcome {
                count,
                message: format!("{count} notifications marked as read."),
            });
        }

        let unread = self
            .repo
            .list_for_user(
                user_id,
                NotificationQueryFilter {
                    is_read: Some(false),
                    kind: None,
                },
            )
            .await?;

        match unread.first() {
            Some(notification) => {
                self.repo.mark_one_read(notification.id).await?;
                Ok(MarkReadOutcome {
                    count: 1,
                    message: "1 notification marked as read.".to_string(),
                })
            }
            None => Ok(MarkReadOutcome {
                count: 0,
                message: "No unread notifications to mark.".to_string(),
            }),
        }
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<MarkReadOutcome, NotificationError> {
        let count = self.repo.mark_all_read(user_id).await?;
        Ok(MarkReadOutcome {
            count,
            message: format!("{count} notifications marked as read."),
        })
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), NotificationError> {
        let notification = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(NotificationError::NotFound)?;
        if notification.user_id != user_id {
            return Err(NotificationError::Forbidden);
        }

        self.repo.delete_notification(id).await.map_err(Into::into)
    }
}
