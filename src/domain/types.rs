//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "property_kind", rename_all = "snake_case")]
pub enum PropertyKind {
    Apartment,
    House,
    Land,
    Office,
    Studio,
    Villa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "property_status", rename_all = "snake_case")]
pub enum PropertyStatus {
    ForSale,
    ForRent,
    Sold,
    Rented,
    Pending,
}

impl PropertyStatus {
    /// Listings in these states are publicly visible and carry a publication time.
    pub fn is_listed(self) -> bool {
        matches!(self, PropertyStatus::ForSale | PropertyStatus::ForRent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
pub enum NotificationKind {
    PropertyUpdate,
    NewMessage,
    FavoriteUpdate,
    System,
    ReviewResponse,
    Payment,
    Booking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "feedback_kind", rename_all = "snake_case")]
pub enum FeedbackKind {
    General,
    Bug,
    Suggestion,
    Complaint,
    Praise,
}
