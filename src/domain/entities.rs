//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{FeedbackKind, NotificationKind, PropertyKind, PropertyStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub is_agent: bool,
    pub agency_name: Option<String>,
    pub license_number: Option<String>,
    pub is_staff: bool,
    pub is_verified: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl UserRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PasswordResetTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub token_digest: String,
    pub expires_at: OffsetDateTime,
    pub used: bool,
    pub created_at: OffsetDateTime,
}

impl PasswordResetTokenRecord {
    pub fn is_valid(&self, now: OffsetDateTime) -> bool {
        !self.used && now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyRecord {
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
    pub owner_id: Uuid,
    pub is_featured: bool,
    pub is_verified: bool,
    pub views_count: i32,
    pub favorites_count: i32,
    pub published_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyImageRecord {
    pub id: Uuid,
    pub property_id: Uuid,
    pub stored_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub caption: Option<String>,
    pub is_primary: bool,
    pub sort_order: i32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoriteRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub property_id: Uuid,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub property_id: Uuid,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub is_approved: bool,
    pub is_edited: bool,
    pub likes_count: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewLikeRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub review_id: Uuid,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub is_read: bool,
    pub read_at: Option<OffsetDateTime>,
    pub link: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub kind: FeedbackKind,
    pub rating: Option<i32>,
    pub title: String,
    pub message: String,
    pub email: Option<String>,
    pub is_resolved: bool,
    pub response: Option<String>,
    pub responded_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
