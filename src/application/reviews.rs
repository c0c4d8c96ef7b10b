//! Reviews, review likes, and the likes counter.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, ReviewCursor};
use crate::application::repos::{
    CreateReviewParams, PropertiesRepo, RepoError, ReviewLikeToggle, ReviewQueryFilter,
    ReviewsRepo, UpdateReviewParams,
};
use crate::cache::{CacheKey, CachePrefix, ResponseCache};
use crate::domain::entities::ReviewRecord;
use crate::domain::error::DomainError;
use crate::domain::sanitize::{sanitize_rich_text, strip_html};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("review not found")]
    NotFound,
    #[error("property not found")]
    PropertyNotFound,
    #[error("user already reviewed this property")]
    AlreadyReviewed,
    #[error("caller does not own this review")]
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct CreateReviewCommand {
    pub property_id: Uuid,
    pub rating: i32,
    pub title: String,
    pub comment: String,
}

#[derive(Debug, Clone)]
pub struct UpdateReviewCommand {
    pub rating: i32,
    pub title: String,
    pub comment: String,
}

/// Like-toggle outcome returned to the client; mirrors the favorite toggle
/// shape so the two actions stay symmetric.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LikeToggleOutcome {
    pub is_liked: bool,
    pub likes_count: i32,
    pub message: &'static str,
}

pub struct ReviewService {
    reviews: Arc<dyn ReviewsRepo>,
    properties: Arc<dyn PropertiesRepo>,
    cache: Arc<ResponseCache>,
}

impl ReviewService {
    pub fn new(
        reviews: Arc<dyn ReviewsRepo>,
        properties: Arc<dyn PropertiesRepo>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            reviews,
            properties,
            cache,
        }
    }

    pub async fn list(
        &self,
        filter: &ReviewQueryFilter,
        page: PageRequest<ReviewCursor>,
        raw_params: &[(String, String)],
    ) -> Result<Value, ReviewError> {
        let key = CacheKey::for_params(CachePrefix::ReviewList, raw_params);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let listing = self.reviews.list_reviews(filter, page).await?;
        let payload = serde_json::to_value(&listing)
            .map_err(|_| DomainError::invariant("response serialization failed"))?;
        self.cache
            .set(key, payload.clone(), self.cache.config().review_list_ttl());
        Ok(payload)
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        command: CreateReviewCommand,
    ) -> Result<ReviewRecord, ReviewError> {
        let (rating, title, comment) =
            validate_review_fields(command.rating, command.title, command.comment)?;

        self.properties
            .find_by_id(command.property_id)
            .await?
            .ok_or(ReviewError::PropertyNotFound)?;

        let review = match self
            .reviews
            .create_review(CreateReviewParams {
                user_id,
                property_id: command.property_id,
                rating,
                title,
                comment,
            })
            .await
        {
            Ok(review) => review,
            Err(RepoError::Duplicate { .. }) => return Err(ReviewError::AlreadyReviewed),
            Err(err) => return Err(err.into()),
        };

        self.invalidate_review_caches(command.property_id);
        Ok(review)
    }

    pub async fn update(
        &self,
        caller_id: Uuid,
        caller_is_staff: bool,
        id: Uuid,
        command: UpdateReviewCommand,
    ) -> Result<ReviewRecord, ReviewError> {
        let existing = self
            .reviews
            .find_by_id(id)
            .await?
            .ok_or(ReviewError::NotFound)?;
        if existing.user_id != caller_id && !caller_is_staff {
            return Err(ReviewError::Forbidden);
        }

        let (rating, title, comment) =
            validate_review_fields(command.rating, command.title, command.comment)?;

        let review = self
            .reviews
            .update_review(UpdateReviewParams {
                id,
                rating,
                title,
                comment,
            })
            .await?;

        self.invalidate_review_caches(existing.property_id);
        Ok(review)
    }

    pub async fn delete(
        &self,
        caller_id: Uuid,
        caller_is_staff: bool,
        id: Uuid,
    ) -> Result<(), ReviewError> {
        let existing = self
            .reviews
            .find_by_id(id)
            .await?
            .ok_or(ReviewError::NotFound)?;
        if existing.user_id != caller_id && !caller_is_staff {
            return Err(ReviewError::Forbidden);
        }

        self.reviews.delete_review(id).await?;
        self.invalidate_review_caches(existing.property_id);
        Ok(())
    }

    /// Add or remove the caller's like in one atomic operation.
    pub async fn toggle_like(
        &self,
        user_id: Uuid,
        review_id: Uuid,
    ) -> Result<LikeToggleOutcome, ReviewError> {
        let review = self
            .reviews
            .find_by_id(review_id)
            .await?
            .ok_or(ReviewError::NotFound)?;

        let outcome = match self.reviews.toggle_like(user_id, review_id).await? {
            ReviewLikeToggle::Added { likes_count } => LikeToggleOutcome {
                is_liked: true,
                likes_count,
                message: "Like added",
            },
            ReviewLikeToggle::Removed { likes_count } => LikeToggleOutcome {
                is_liked: false,
                likes_count,
                message: "Like removed",
            },
        };

        self.invalidate_review_caches(review.property_id);
        Ok(outcome)
    }

    pub async fn my_reviews(&self, user_id: Uuid) -> Result<Vec<ReviewRecord>, ReviewError> {
        self.reviews.list_for_user(user_id).await.map_err(Into::into)
    }

    pub async fn property_stats(&self, property_id: Uuid) -> Result<Value, ReviewError> {
        let key = CacheKey::for_id(CachePrefix::ReviewStats, property_id);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let stats = self.reviews.stats_for_property(property_id).await?;
        let payload = serde_json::to_value(&stats)
            .map_err(|_| DomainError::invariant("response serialization failed"))?;
        self.cache
            .set(key, payload.clone(), self.cache.config().review_stats_ttl());
        Ok(payload)
    }

    fn invalidate_review_caches(&self, property_id: Uuid) {
        self.cache.delete_by_prefix(CachePrefix::ReviewList);
        self.cache
            .delete(&CacheKey::for_id(CachePrefix::ReviewStats, property_id));
    }
}

fn validate_review_fields(
    rating: i32,
    title: String,
    comment: String,
) -> Result<(i32, String, String), ReviewError> {
    if !(1..=5).contains(&rating) {
        return Err(DomainError::validation("rating must be between 1 and 5").into());
    }

    let title = strip_html(title.trim());
    let comment = sanitize_rich_text(comment.trim());
    if title.is_empty() {
        return Err(DomainError::validation("title must not be empty").into());
    }
    if comment.is_empty() {
        return Err(DomainError::validation("comment must not be empty").into());
    }

    Ok((rating, title, comment))
}
