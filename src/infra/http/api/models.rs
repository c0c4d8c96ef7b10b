//! Request payloads and query models for the JSON API.

use serde::Deserialize;
use uuid::Uuid;

use crate::domain::types::{FeedbackKind, NotificationKind, PropertyKind, PropertyStatus};

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_agent: bool,
    pub agency_name: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone_number: Option<String>,
    pub agency_name: Option<String>,
    pub license_number: Option<String>,
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PropertyListQuery {
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
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyCreateRequest {
    pub title: String,
    pub description: String,
    pub kind: PropertyKind,
    #[serde(default = "default_property_status")]
    pub status: PropertyStatus,
    pub price: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub area_m2: f64,
    #[serde(default)]
    pub bedrooms: i32,
    #[serde(default)]
    pub bathrooms: i32,
    pub city: String,
    pub region: String,
    pub quarter: Option<String>,
    pub address: String,
    #[serde(default)]
    pub is_featured: bool,
}

fn default_property_status() -> PropertyStatus {
    PropertyStatus::Pending
}

fn default_currency() -> String {
    "XAF".to_string()
}

// ============================================================================
// Favorites
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FavoriteToggleRequest {
    pub property_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteCheckQuery {
    pub property_id: Uuid,
}

// ============================================================================
// Reviews
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReviewListQuery {
    pub property: Option<Uuid>,
    pub user: Option<Uuid>,
    pub min_rating: Option<i32>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewStatsQuery {
    pub property_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ReviewCreateRequest {
    pub property_id: Uuid,
    pub rating: i32,
    pub title: String,
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewUpdateRequest {
    pub rating: i32,
    pub title: String,
    pub comment: String,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    pub is_read: Option<bool>,
    #[serde(rename = "type")]
    pub kind: Option<NotificationKind>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationCreateRequest {
    pub title: String,
    pub message: String,
    #[serde(default = "default_notification_kind")]
    pub kind: NotificationKind,
    pub link: Option<String>,
}

fn default_notification_kind() -> NotificationKind {
    NotificationKind::System
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    #[serde(default)]
    pub notification_ids: Vec<Uuid>,
}

// ============================================================================
// Feedback
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FeedbackCreateRequest {
    #[serde(default = "default_feedback_kind")]
    pub kind: FeedbackKind,
    pub rating: Option<i32>,
    pub title: String,
    pub message: String,
    pub email: Option<String>,
}

fn default_feedback_kind() -> FeedbackKind {
    FeedbackKind::General
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRespondRequest {
    pub response: String,
}
