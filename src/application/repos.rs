//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{
    CursorPage, PageRequest, PaginationError, PropertyCursor, ReviewCursor,
};
use crate::domain::entities::{
    FavoriteRecord, FeedbackRecord, NotificationRecord, PasswordResetTokenRecord,
    PropertyImageRecord, PropertyRecord, ReviewRecord, UserRecord,
};
use crate::domain::types::{FeedbackKind, NotificationKind, PropertyKind, PropertyStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub is_agent: bool,
    pub agency_name: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateUserProfileParams {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub agency_name: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateResetTokenParams {
    pub user_id: Uuid,
    pub token_digest: String,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn update_profile(
        &self,
        params: UpdateUserProfileParams,
    ) -> Result<UserRecord, RepoError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepoError>;

    /// Delete the account; child rows (listings, favorites, reviews, likes,
    /// notifications) cascade at the store.
    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError>;

    async fn create_reset_token(
        &self,
        params: CreateResetTokenParams,
    ) -> Result<PasswordResetTokenRecord, RepoError>;

    async fn find_reset_token(
        &self,
        token_digest: &str,
    ) -> Result<Option<PasswordResetTokenRecord>, RepoError>;

    async fn mark_reset_token_used(&self, id: Uuid) -> Result<(), RepoError>;

    async fn delete_unused_reset_tokens(&self, user_id: Uuid) -> Result<(), RepoError>;
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct PropertyQueryFilter {
    pub status: Option<PropertyStatus>,
    pub kind: Option<PropertyKind>,
    pub featured: Option<bool>,
    pub verified: Option<bool>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub min_bedrooms: Option<i32>,
    pub max_bedrooms: Option<i32>,
    pub min_bathrooms: Option<i32>,
    pub max_bathrooms: Option<i32>,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePropertyParams {
    pub title: String,
    pub description: String,
    pub kind: PropertyKind,
    pub status: PropertyStatus,
    pub price: i64,
    pub currency: String,
    pub area_m2: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub city: String,
    pub region: String,
    pub quarter: Option<String>,
    pub address: String,
    pub owner_id: Uuid,
    pub is_featured: bool,
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct UpdatePropertyParams {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub kind: PropertyKind,
    pub status: PropertyStatus,
    pub price: i64,
    pub currency: String,
    pub area_m2: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub city: String,
    pub region: String,
    pub quarter: Option<String>,
    pub address: String,
    pub is_featured: bool,
    pub published_at: Option<OffsetDateTime>,
}

/// Platform-wide listing aggregates served by the stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyStats {
    pub total_properties: u64,
    pub for_sale: u64,
    pub for_rent: u64,
    pub featured_properties: u64,
    pub verified_properties: u64,
    pub total_views: i64,
    pub avg_price_for_sale: f64,
    pub avg_price_for_rent: f64,
}

#[async_trait]
pub trait PropertiesRepo: Send + Sync {
    async fn list_properties(
        &self,
        filter: &PropertyQueryFilter,
        page: PageRequest<PropertyCursor>,
    ) -> Result<CursorPage<PropertyRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PropertyRecord>, RepoError>;

    /// Fetch a property for a detail view, atomically incrementing its view
    /// counter in the same statement.
    async fn retrieve_incrementing_views(
        &self,
        id: Uuid,
    ) -> Result<Option<PropertyRecord>, RepoError>;

    async fn list_featured(&self, limit: u32) -> Result<Vec<PropertyRecord>, RepoError>;

    async fn stats(&self) -> Result<PropertyStats, RepoError>;
}

#[async_trait]
pub trait PropertiesWriteRepo: Send + Sync {
    async fn create_property(
        &self,
        params: CreatePropertyParams,
    ) -> Result<PropertyRecord, RepoError>;

    async fn update_property(
        &self,
        params: UpdatePropertyParams,
    ) -> Result<PropertyRecord, RepoError>;

    async fn delete_property(&self, id: Uuid) -> Result<(), RepoError>;
}

// ============================================================================
// Media
// ============================================================================

#[async_trait]
pub trait MediaRepo: Send + Sync {
    async fn insert_image(&self, record: PropertyImageRecord) -> Result<(), RepoError>;

    async fn list_images(&self, property_id: Uuid)
    -> Result<Vec<PropertyImageRecord>, RepoError>;

    async fn find_image(&self, id: Uuid) -> Result<Option<PropertyImageRecord>, RepoError>;

    /// Mark one image primary, demoting any previous primary image of the
    /// same property in the same transaction.
    async fn mark_primary(&self, property_id: Uuid, image_id: Uuid) -> Result<(), RepoError>;

    async fn delete_image(&self, id: Uuid) -> Result<(), RepoError>;
}

// ============================================================================
// Favorites
// ============================================================================

/// Outcome of an atomic favorite toggle, carrying the recomputed counter.
#[derive(Debug, Clone, PartialEq)]
pub enum FavoriteToggle {
    Added {
        favorite: FavoriteRecord,
        favorites_count: i32,
    },
    Removed {
        favorites_count: i32,
    },
}

#[async_trait]
pub trait FavoritesRepo: Send + Sync {
    /// Atomically add or remove the (user, property) favorite pair and
    /// recompute the property's `favorites_count` before returning.
    async fn toggle_favorite(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<FavoriteToggle, RepoError>;

    async fn list_with_properties(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(FavoriteRecord, PropertyRecord)>, RepoError>;

    async fn exists(&self, user_id: Uuid, property_id: Uuid) -> Result<bool, RepoError>;

    async fn find_favorite(&self, id: Uuid) -> Result<Option<FavoriteRecord>, RepoError>;

    /// Delete one favorite row and recompute the parent counter.
    async fn delete_favorite(&self, id: Uuid) -> Result<(), RepoError>;
}

// ============================================================================
// Reviews
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReviewQueryFilter {
    pub property_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub min_rating: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CreateReviewParams {
    pub user_id: Uuid,
    pub property_id: Uuid,
    pub rating: i32,
    pub title: String,
    pub comment: String,
}

#[derive(Debug, Clone)]
pub struct UpdateReviewParams {
    pub id: Uuid,
    pub rating: i32,
    pub title: String,
    pub comment: String,
}

/// Outcome of an atomic review-like toggle, carrying the recomputed counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewLikeToggle {
    Added { likes_count: i32 },
    Removed { likes_count: i32 },
}

/// Per-property review aggregates served by the review stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewStats {
    pub total_reviews: u64,
    pub avg_rating: f64,
    pub rating_distribution: Vec<RatingBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingBucket {
    pub rating: i32,
    pub count: u64,
}

#[async_trait]
pub trait ReviewsRepo: Send + Sync {
    async fn list_reviews(
        &self,
        filter: &ReviewQueryFilter,
        page: PageRequest<ReviewCursor>,
    ) -> Result<CursorPage<ReviewRecord>, RepoError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ReviewRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ReviewRecord>, RepoError>;

    /// Insert a review; a second review for the same (user, property) pair
    /// surfaces as [`RepoError::Duplicate`].
    async fn create_review(&self, params: CreateReviewParams) -> Result<ReviewRecord, RepoError>;

    async fn update_review(&self, params: UpdateReviewParams) -> Result<ReviewRecord, RepoError>;

    async fn delete_review(&self, id: Uuid) -> Result<(), RepoError>;

    /// Atomically add or remove the (user, review) like pair and recompute
    /// the review's `likes_count` before returning.
    async fn toggle_like(
        &self,
        user_id: Uuid,
        review_id: Uuid,
    ) -> Result<ReviewLikeToggle, RepoError>;

    async fn stats_for_property(&self, property_id: Uuid) -> Result<ReviewStats, RepoError>;
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationQueryFilter {
    pub is_read: Option<bool>,
    pub kind: Option<NotificationKind>,
}

#[derive(Debug, Clone)]
pub struct CreateNotificationParams {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
}

#[async_trait]
pub trait NotificationsRepo: Send + Sync {
    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: NotificationQueryFilter,
    ) -> Result<Vec<NotificationRecord>, RepoError>;

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>, RepoError>;

    async fn create_notification(
        &self,
        params: CreateNotificationParams,
    ) -> Result<NotificationRecord, RepoError>;

    /// Set-based transition of the given unread notifications to read.
    /// Returns the number of rows that actually transitioned.
    async fn mark_read(&self, user_id: Uuid, ids: &[Uuid]) -> Result<u64, RepoError>;

    /// Set-based transition of every unread notification of the user.
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, RepoError>;

    /// Transition one notification to read if it is still unread, returning
    /// the stored row either way.
    async fn mark_one_read(&self, id: Uuid) -> Result<Option<NotificationRecord>, RepoError>;

    async fn delete_notification(&self, id: Uuid) -> Result<(), RepoError>;
}

// ============================================================================
// Feedback
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateFeedbackParams {
    pub user_id: Option<Uuid>,
    pub kind: FeedbackKind,
    pub rating: Option<i32>,
    pub title: String,
    pub message: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RespondFeedbackParams {
    pub id: Uuid,
    pub response: String,
    pub responded_at: OffsetDateTime,
}

#[async_trait]
pub trait FeedbackRepo: Send + Sync {
    async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError>;

    async fn list_all(&self) -> Result<Vec<FeedbackRecord>, RepoError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<FeedbackRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FeedbackRecord>, RepoError>;

    async fn respond(&self, params: RespondFeedbackParams) -> Result<FeedbackRecord, RepoError>;
}
