//! Favorite toggling and the favorites counter.
//!
//! The toggle is a single atomic add-or-remove at the store; both arms
//! recompute `Property.favorites_count` from the favorite rows before the
//! transaction commits, so the counter can never drift from the rows it
//! summarizes.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{
    CreateNotificationParams, FavoriteToggle, FavoritesRepo, NotificationsRepo, PropertiesRepo,
    RepoError,
};
use crate::cache::{CacheKey, CachePrefix, ResponseCache};
use crate::domain::entities::{FavoriteRecord, PropertyRecord};
use crate::domain::types::NotificationKind;

#[derive(Debug, Error)]
pub enum FavoriteError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("property not found")]
    PropertyNotFound,
    #[error("favorite not found")]
    NotFound,
    #[error("caller does not own this favorite")]
    Forbidden,
}

/// Toggle outcome returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteToggleOutcome {
    pub is_favorited: bool,
    pub favorites_count: i32,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<FavoriteRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteWithProperty {
    #[serde(flatten)]
    pub favorite: FavoriteRecord,
    pub property: PropertyRecord,
}

pub struct FavoriteService {
    favorites: Arc<dyn FavoritesRepo>,
    properties: Arc<dyn PropertiesRepo>,
    notifications: Arc<dyn NotificationsRepo>,
    cache: Arc<ResponseCache>,
}

impl FavoriteService {
    pub fn new(
        favorites: Arc<dyn FavoritesRepo>,
        properties: Arc<dyn PropertiesRepo>,
        notifications: Arc<dyn NotificationsRepo>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            favorites,
            properties,
            notifications,
            cache,
        }
    }

    /// Add or remove the (user, property) favorite in one atomic operation.
    pub async fn toggle(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<FavoriteToggleOutcome, FavoriteError> {
        let property = self
            .properties
            .find_by_id(property_id)
            .await?
            .ok_or(FavoriteError::PropertyNotFound)?;

        let outcome = match self.favorites.toggle_favorite(user_id, property_id).await? {
            FavoriteToggle::Added {
                favorite,
                favorites_count,
            } => {
                self.notify_owner(&property, user_id).await;
                FavoriteToggleOutcome {
                    is_favorited: true,
                    favorites_count,
                    message: "Added to favorites",
                    favorite: Some(favorite),
                }
            }
            FavoriteToggle::Removed { favorites_count } => FavoriteToggleOutcome {
                is_favorited: false,
                favorites_count,
                message: "Removed from favorites",
                favorite: None,
            },
        };

        self.invalidate_property_caches(property_id);
        Ok(outcome)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<FavoriteWithProperty>, FavoriteError> {
        let rows = self.favorites.list_with_properties(user_id).await?;
        Ok(rows
            .into_iter()
            .map(|(favorite, property)| FavoriteWithProperty { favorite, property })
            .collect())
    }

    pub async fn check(&self, user_id: Uuid, property_id: Uuid) -> Result<bool, FavoriteError> {
        self.favorites
            .exists(user_id, property_id)
            .await
            .map_err(Into::into)
    }

    pub async fn remove(&self, user_id: Uuid, favorite_id: Uuid) -> Result<(), FavoriteError> {
        let favorite = self
            .favorites
            .find_favorite(favorite_id)
            .await?
            .ok_or(FavoriteError::NotFound)?;
        if favorite.user_id != user_id {
            return Err(FavoriteError::Forbidden);
        }

        self.favorites.delete_favorite(favorite_id).await?;
        self.invalidate_property_caches(favorite.property_id);
        Ok(())
    }

    /// Owner notification on a new favorite. Best effort: the toggle has
    /// already committed, so a notification failure only logs.
    async fn notify_owner(&self, property: &PropertyRecord, favoriting_user: Uuid) {
        if property.owner_id == favoriting_user {
            return;
        }

        let params = CreateNotificationParams {
            user_id: property.owner_id,
            title: "Your listing was favorited".to_string(),
            message: format!("\"{}\" was added to a user's favorites.", property.title),
            kind: NotificationKind::FavoriteUpdate,
            link: Some(format!("/properties/{}/", property.id)),
        };

        if let Err(err) = self.notifications.create_notification(params).await {
            warn!(
                target = "immob::favorites",
                property_id = %property.id,
                error = %err,
                "favorite notification failed"
            );
        }
    }

    fn invalidate_property_caches(&self, property_id: Uuid) {
        self.cache.delete_by_prefix(CachePrefix::PropertyList);
        self.cache.delete(&CacheKey::bare(CachePrefix::PropertyStats));
        self.cache
            .delete(&CacheKey::for_id(CachePrefix::PropertyDetail, property_id));
    }
}
