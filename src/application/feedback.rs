//! Application feedback: submission, listing, and staff responses.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::mailer::Mailer;
use crate::application::repos::{
    CreateFeedbackParams, FeedbackRepo, RepoError, RespondFeedbackParams,
};
use crate::domain::entities::FeedbackRecord;
use crate::domain::error::DomainError;
use crate::domain::sanitize::{sanitize_rich_text, strip_html};
use crate::domain::types::FeedbackKind;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("feedback not found")]
    NotFound,
    #[error("staff access required")]
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct SubmitFeedbackCommand {
    pub kind: FeedbackKind,
    pub rating: Option<i32>,
    pub title: String,
    pub message: String,
    pub email: Option<String>,
}

pub struct FeedbackService {
    repo: Arc<dyn FeedbackRepo>,
    mailer: Arc<dyn Mailer>,
}

impl FeedbackService {
    pub fn new(repo: Arc<dyn FeedbackRepo>, mailer: Arc<dyn Mailer>) -> Self {
        Self { repo, mailer }
    }

    /// Submit feedback, attributed to the caller when authenticated.
    pub async fn submit(
        &self,
        user_id: Option<Uuid>,
        command: SubmitFeedbackCommand,
    ) -> Result<FeedbackRecord, FeedbackError> {
        let title = strip_html(command.title.trim());
        let message = sanitize_rich_text(command.message.trim());
        if title.is_empty() {
            return Err(DomainError::validation("title must not be empty").into());
        }
        if message.is_empty() {
            return Err(DomainError::validation("message must not be empty").into());
        }
        if let Some(rating) = command.rating
            && !(1..=5).contains(&rating)
        {
            return Err(DomainError::validation("rating must be between 1 and 5").into());
        }

        self.repo
            .create_feedback(CreateFeedbackParams {
                user_id,
                kind: command.kind,
                rating: command.rating,
                title,
                message,
                email: command.email,
            })
            .await
            .map_err(Into::into)
    }

    /// Staff see every submission; everyone else sees only their own.
    pub async fn list(
        &self,
        caller_id: Uuid,
        caller_is_staff: bool,
    ) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        if caller_is_staff {
            self.repo.list_all().await.map_err(Into::into)
        } else {
            self.repo.list_for_user(caller_id).await.map_err(Into::into)
        }
    }

    /// Record a staff response, resolve the feedback, and mail the submitter
    /// when a contact address exists. Mail failures are swallowed.
    pub async fn respond(
        &self,
        caller_is_staff: bool,
        id: Uuid,
        response_text: &str,
    ) -> Result<FeedbackRecord, FeedbackError> {
        if !caller_is_staff {
            return Err(FeedbackError::Forbidden);
        }

        let response_text = sanitize_rich_text(response_text.trim());
        if response_text.is_empty() {
            return Err(DomainError::validation("response text is required").into());
        }

        let feedback = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(FeedbackError::NotFound)?;

        let updated = self
            .repo
            .respond(RespondFeedbackParams {
                id,
                response: response_text.clone(),
                responded_at: OffsetDateTime::now_utc(),
            })
            .await?;

        if let Some(email) = feedback.email.as_deref() {
            let subject = format!("Response to your feedback: {}", feedback.title);
            let body = format!(
                "Dear user,\n\nHere is our response to your feedback:\n\n{response_text}\n\n\
                 Kind regards,\nThe IMMOB team"
            );
            if let Err(err) = self.mailer.send(email, &subject, &body).await {
                warn!(
                    target = "immob::feedback",
                    feedback_id = %id,
                    error = %err,
                    "feedback response mail failed"
                );
            }
        }

        Ok(updated)
    }
}
