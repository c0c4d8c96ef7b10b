//! In-memory repository implementations and request helpers for API tests.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;

use immob::application::auth::JwtAuthenticator;
use immob::application::favorites::FavoriteService;
use immob::application::feedback::FeedbackService;
use immob::application::mailer::{MailError, Mailer};
use immob::application::notifications::NotificationService;
use immob::application::pagination::{CursorPage, PageRequest, PropertyCursor, ReviewCursor};
use immob::application::properties::PropertyService;
use immob::application::repos::*;
use immob::application::reviews::ReviewService;
use immob::application::users::UserService;
use immob::cache::{CacheConfig, ResponseCache};
use immob::domain::entities::*;
use immob::infra::http::{ApiRateLimiter, ApiState, build_api_router};
use immob::infra::media::MediaStorage;

const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared in-memory store standing in for Postgres. Uniqueness constraints
/// and counter recomputation mirror the SQL implementations.
#[derive(Default)]
pub struct MemoryStore {
    pub users: Mutex<Vec<UserRecord>>,
    pub reset_tokens: Mutex<Vec<PasswordResetTokenRecord>>,
    pub properties: Mutex<Vec<PropertyRecord>>,
    pub images: Mutex<Vec<PropertyImageRecord>>,
    pub favorites: Mutex<Vec<FavoriteRecord>>,
    pub reviews: Mutex<Vec<ReviewRecord>>,
    pub review_likes: Mutex<Vec<ReviewLikeRecord>>,
    pub notifications: Mutex<Vec<NotificationRecord>>,
    pub feedback: Mutex<Vec<FeedbackRecord>>,
}

impl MemoryStore {
    pub fn property(&self, id: Uuid) -> Option<PropertyRecord> {
        lock(&self.properties).iter().find(|p| p.id == id).cloned()
    }

    pub fn favorite_rows(&self, property_id: Uuid) -> usize {
        lock(&self.favorites)
            .iter()
            .filter(|f| f.property_id == property_id)
            .count()
    }

    pub fn like_rows(&self, review_id: Uuid) -> usize {
        lock(&self.review_likes)
            .iter()
            .filter(|l| l.review_id == review_id)
            .count()
    }

    pub fn review(&self, id: Uuid) -> Option<ReviewRecord> {
        lock(&self.reviews).iter().find(|r| r.id == id).cloned()
    }

    pub fn promote_to_staff(&self, user_id: Uuid) {
        if let Some(user) = lock(&self.users).iter_mut().find(|u| u.id == user_id) {
            user.is_staff = true;
        }
    }

    pub fn approve_all_reviews(&self) {
        for review in lock(&self.reviews).iter_mut() {
            review.is_approved = true;
        }
    }

    /// Out-of-band insert bypassing every service-layer path; used to prove
    /// cache hits serve stale data until invalidation.
    pub fn insert_property_directly(&self, property: PropertyRecord) {
        lock(&self.properties).push(property);
    }

    fn recompute_favorites_count(&self, property_id: Uuid) -> i32 {
        let count = self.favorite_rows(property_id) as i32;
        if let Some(property) = lock(&self.properties)
            .iter_mut()
            .find(|p| p.id == property_id)
        {
            property.favorites_count = count;
        }
        count
    }

    fn recompute_likes_count(&self, review_id: Uuid) -> i32 {
        let count = self.like_rows(review_id) as i32;
        if let Some(review) = lock(&self.reviews).iter_mut().find(|r| r.id == review_id) {
            review.likes_count = count;
        }
        count
    }
}

fn duplicate(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut users = lock(&self.users);
        if users.iter().any(|u| u.email == params.email) {
            return Err(duplicate("users_email_key"));
        }

        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: params.email,
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            password_hash: params.password_hash,
            phone_number: params.phone_number,
            is_agent: params.is_agent,
            agency_name: params.agency_name,
            license_number: params.license_number,
            is_staff: false,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(lock(&self.users).iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(lock(&self.users).iter().find(|u| u.email == email).cloned())
    }

    async fn update_profile(
        &self,
        params: UpdateUserProfileParams,
    ) -> Result<UserRecord, RepoError> {
        let mut users = lock(&self.users);
        let user = users
            .iter_mut()
            .find(|u| u.id == params.id)
            .ok_or(RepoError::NotFound)?;
        user.username = params.username;
        user.first_name = params.first_name;
        user.last_name = params.last_name;
        user.phone_number = params.phone_number;
        user.agency_name = params.agency_name;
        user.license_number = params.license_number;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepoError> {
        let mut users = lock(&self.users);
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        // Cascade child rows the way the foreign keys do, without touching
        // any denormalized counter.
        lock(&self.users).retain(|u| u.id != id);
        let owned: Vec<Uuid> = lock(&self.properties)
            .iter()
            .filter(|p| p.owner_id == id)
            .map(|p| p.id)
            .collect();
        lock(&self.properties).retain(|p| p.owner_id != id);
        lock(&self.favorites)
            .retain(|f| f.user_id != id && !owned.contains(&f.property_id));
        let removed_reviews: Vec<Uuid> = lock(&self.reviews)
            .iter()
            .filter(|r| r.user_id == id || owned.contains(&r.property_id))
            .map(|r| r.id)
            .collect();
        lock(&self.reviews).retain(|r| !removed_reviews.contains(&r.id));
        lock(&self.review_likes)
            .retain(|l| l.user_id != id && !removed_reviews.contains(&l.review_id));
        lock(&self.notifications).retain(|n| n.user_id != id);
        lock(&self.reset_tokens).retain(|t| t.user_id != id);
        Ok(())
    }

    async fn create_reset_token(
        &self,
        params: CreateResetTokenParams,
    ) -> Result<PasswordResetTokenRecord, RepoError> {
        let record = PasswordResetTokenRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            token_digest: params.token_digest,
            expires_at: params.expires_at,
            used: false,
            created_at: OffsetDateTime::now_utc(),
        };
        lock(&self.reset_tokens).push(record.clone());
        Ok(record)
    }

    async fn find_reset_token(
        &self,
        token_digest: &str,
    ) -> Result<Option<PasswordResetTokenRecord>, RepoError> {
        Ok(lock(&self.reset_tokens)
            .iter()
            .find(|t| t.token_digest == token_digest)
            .cloned())
    }

    async fn mark_reset_token_used(&self, id: Uuid) -> Result<(), RepoError> {
        if let Some(token) = lock(&self.reset_tokens).iter_mut().find(|t| t.id == id) {
            token.used = true;
        }
        Ok(())
    }

    async fn delete_unused_reset_tokens(&self, user_id: Uuid) -> Result<(), RepoError> {
        lock(&self.reset_tokens).retain(|t| t.user_id != user_id || t.used);
        Ok(())
    }
}

fn matches_filter(property: &PropertyRecord, filter: &PropertyQueryFilter) -> bool {
    let status_ok = match filter.status {
        Some(status) => property.status == status,
        None => property.status.is_listed(),
    };

    status_ok
        && filter.kind.is_none_or(|kind| property.kind == kind)
        && filter
            .featured
            .is_none_or(|featured| property.is_featured == featured)
        && filter
            .verified
            .is_none_or(|verified| property.is_verified == verified)
        && filter.city.as_ref().is_none_or(|city| {
            property.city.to_lowercase().contains(&city.to_lowercase())
        })
        && filter
            .region
            .as_ref()
            .is_none_or(|region| &property.region == region)
        && filter.min_price.is_none_or(|min| property.price >= min)
        && filter.max_price.is_none_or(|max| property.price <= max)
        && filter.min_area.is_none_or(|min| property.area_m2 >= min)
        && filter.max_area.is_none_or(|max| property.area_m2 <= max)
        && filter
            .min_bedrooms
            .is_none_or(|min| property.bedrooms >= min)
        && filter
            .max_bedrooms
            .is_none_or(|max| property.bedrooms <= max)
        && filter
            .min_bathrooms
            .is_none_or(|min| property.bathrooms >= min)
        && filter
            .max_bathrooms
            .is_none_or(|max| property.bathrooms <= max)
        && filter.search.as_ref().is_none_or(|needle| {
            let needle = needle.to_lowercase();
            property.title.to_lowercase().contains(&needle)
                || property.description.to_lowercase().contains(&needle)
                || property.city.to_lowercase().contains(&needle)
        })
}

#[async_trait]
impl PropertiesRepo for MemoryStore {
    async fn list_properties(
        &self,
        filter: &PropertyQueryFilter,
        page: PageRequest<PropertyCursor>,
    ) -> Result<CursorPage<PropertyRecord>, RepoError> {
        let mut matching: Vec<PropertyRecord> = lock(&self.properties)
            .iter()
            .filter(|p| matches_filter(p, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        if let Some(cursor) = page.cursor {
            matching.retain(|p| {
                (p.created_at, p.id) < (cursor.created_at(), cursor.id())
            });
        }

        let limit = page.limit.clamp(1, 100) as usize;
        let next_cursor = if matching.len() > limit {
            let overflow = &matching[limit];
            Some(PropertyCursor::new(overflow.created_at, overflow.id).encode())
        } else {
            None
        };
        matching.truncate(limit);

        Ok(CursorPage::new(matching, next_cursor))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PropertyRecord>, RepoError> {
        Ok(self.property(id))
    }

    async fn retrieve_incrementing_views(
        &self,
        id: Uuid,
    ) -> Result<Option<PropertyRecord>, RepoError> {
        let mut properties = lock(&self.properties);
        let Some(property) = properties.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        property.views_count += 1;
        Ok(Some(property.clone()))
    }

    async fn list_featured(&self, limit: u32) -> Result<Vec<PropertyRecord>, RepoError> {
        let mut featured: Vec<PropertyRecord> = lock(&self.properties)
            .iter()
            .filter(|p| p.is_featured && p.status.is_listed())
            .cloned()
            .collect();
        featured.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        featured.truncate(limit as usize);
        Ok(featured)
    }

    async fn stats(&self) -> Result<PropertyStats, RepoError> {
        use immob::domain::types::PropertyStatus;

        let properties = lock(&self.properties);
        let avg = |status: PropertyStatus| {
            let prices: Vec<i64> = properties
                .iter()
                .filter(|p| p.status == status)
                .map(|p| p.price)
                .collect();
            if prices.is_empty() {
                0.0
            } else {
                prices.iter().sum::<i64>() as f64 / prices.len() as f64
            }
        };

        Ok(PropertyStats {
            total_properties: properties.len() as u64,
            for_sale: properties
                .iter()
                .filter(|p| p.status == PropertyStatus::ForSale)
                .count() as u64,
            for_rent: properties
                .iter()
                .filter(|p| p.status == PropertyStatus::ForRent)
                .count() as u64,
            featured_properties: properties.iter().filter(|p| p.is_featured).count() as u64,
            verified_properties: properties.iter().filter(|p| p.is_verified).count() as u64,
            total_views: properties.iter().map(|p| p.views_count as i64).sum(),
            avg_price_for_sale: avg(PropertyStatus::ForSale),
            avg_price_for_rent: avg(PropertyStatus::ForRent),
        })
    }
}

#[async_trait]
impl PropertiesWriteRepo for MemoryStore {
    async fn create_property(
        &self,
        params: CreatePropertyParams,
    ) -> Result<PropertyRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let property = PropertyRecord {
            id: Uuid::new_v4(),
            title: params.title,
            description: params.description,
            kind: params.kind,
            status: params.status,
            price: params.price,
            currency: params.currency,
            area_m2: params.area_m2,
            bedrooms: params.bedrooms,
            bathrooms: params.bathrooms,
            city: params.city,
            region: params.region,
            quarter: params.quarter,
            address: params.address,
            owner_id: params.owner_id,
            is_featured: params.is_featured,
            is_verified: false,
            views_count: 0,
            favorites_count: 0,
            published_at: params.published_at,
            created_at: now,
            updated_at: now,
        };
        lock(&self.properties).push(property.clone());
        Ok(property)
    }

    async fn update_property(
        &self,
        params: UpdatePropertyParams,
    ) -> Result<PropertyRecord, RepoError> {
        let mut properties = lock(&self.properties);
        let property = properties
            .iter_mut()
            .find(|p| p.id == params.id)
            .ok_or(RepoError::NotFound)?;
        property.title = params.title;
        property.description = params.description;
        property.kind = params.kind;
        property.status = params.status;
        property.price = params.price;
        property.currency = params.currency;
        property.area_m2 = params.area_m2;
        property.bedrooms = params.bedrooms;
        property.bathrooms = params.bathrooms;
        property.city = params.city;
        property.region = params.region;
        property.quarter = params.quarter;
        property.address = params.address;
        property.is_featured = params.is_featured;
        property.published_at = params.published_at;
        property.updated_at = OffsetDateTime::now_utc();
        Ok(property.clone())
    }

    async fn delete_property(&self, id: Uuid) -> Result<(), RepoError> {
        lock(&self.properties).retain(|p| p.id != id);
        lock(&self.favorites).retain(|f| f.property_id != id);
        lock(&self.images).retain(|i| i.property_id != id);
        Ok(())
    }
}

#[async_trait]
impl MediaRepo for MemoryStore {
    async fn insert_image(&self, record: PropertyImageRecord) -> Result<(), RepoError> {
        lock(&self.images).push(record);
        Ok(())
    }

    async fn list_images(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<PropertyImageRecord>, RepoError> {
        let mut images: Vec<PropertyImageRecord> = lock(&self.images)
            .iter()
            .filter(|i| i.property_id == property_id)
            .cloned()
            .collect();
        images.sort_by_key(|i| (i.sort_order, i.created_at));
        Ok(images)
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<PropertyImageRecord>, RepoError> {
        Ok(lock(&self.images).iter().find(|i| i.id == id).cloned())
    }

    async fn mark_primary(&self, property_id: Uuid, image_id: Uuid) -> Result<(), RepoError> {
        for image in lock(&self.images).iter_mut() {
            if image.property_id == property_id {
                image.is_primary = image.id == image_id;
            }
        }
        Ok(())
    }

    async fn delete_image(&self, id: Uuid) -> Result<(), RepoError> {
        lock(&self.images).retain(|i| i.id != id);
        Ok(())
    }
}

#[async_trait]
impl FavoritesRepo for MemoryStore {
    async fn toggle_favorite(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<FavoriteToggle, RepoError> {
        let existing = lock(&self.favorites)
            .iter()
            .find(|f| f.user_id == user_id && f.property_id == property_id)
            .map(|f| f.id);

        match existing {
            None => {
                let favorite = FavoriteRecord {
                    id: Uuid::new_v4(),
                    user_id,
                    property_id,
                    created_at: OffsetDateTime::now_utc(),
                };
                lock(&self.favorites).push(favorite.clone());
                let favorites_count = self.recompute_favorites_count(property_id);
                Ok(FavoriteToggle::Added {
                    favorite,
                    favorites_count,
                })
            }
            Some(id) => {
                lock(&self.favorites).retain(|f| f.id != id);
                let favorites_count = self.recompute_favorites_count(property_id);
                Ok(FavoriteToggle::Removed { favorites_count })
            }
        }
    }

    async fn list_with_properties(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(FavoriteRecord, PropertyRecord)>, RepoError> {
        let favorites: Vec<FavoriteRecord> = lock(&self.favorites)
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        Ok(favorites
            .into_iter()
            .filter_map(|f| self.property(f.property_id).map(|p| (f, p)))
            .collect())
    }

    async fn exists(&self, user_id: Uuid, property_id: Uuid) -> Result<bool, RepoError> {
        Ok(lock(&self.favorites)
            .iter()
            .any(|f| f.user_id == user_id && f.property_id == property_id))
    }

    async fn find_favorite(&self, id: Uuid) -> Result<Option<FavoriteRecord>, RepoError> {
        Ok(lock(&self.favorites).iter().find(|f| f.id == id).cloned())
    }

    async fn delete_favorite(&self, id: Uuid) -> Result<(), RepoError> {
        let property_id = lock(&self.favorites)
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.property_id)
            .ok_or(RepoError::NotFound)?;
        lock(&self.favorites).retain(|f| f.id != id);
        self.recompute_favorites_count(property_id);
        Ok(())
    }
}

#[async_trait]
impl ReviewsRepo for MemoryStore {
    async fn list_reviews(
        &self,
        filter: &ReviewQueryFilter,
        page: PageRequest<ReviewCursor>,
    ) -> Result<CursorPage<ReviewRecord>, RepoError> {
        let mut matching: Vec<ReviewRecord> = lock(&self.reviews)
            .iter()
            .filter(|r| r.is_approved)
            .filter(|r| filter.property_id.is_none_or(|p| r.property_id == p))
            .filter(|r| filter.user_id.is_none_or(|u| r.user_id == u))
            .filter(|r| filter.min_rating.is_none_or(|min| r.rating >= min))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        if let Some(cursor) = page.cursor {
            matching.retain(|r| (r.created_at, r.id) < (cursor.created_at(), cursor.id()));
        }

        let limit = page.limit.clamp(1, 100) as usize;
        let next_cursor = if matching.len() > limit {
            let overflow = &matching[limit];
            Some(ReviewCursor::new(overflow.created_at, overflow.id).encode())
        } else {
            None
        };
        matching.truncate(limit);

        Ok(CursorPage::new(matching, next_cursor))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ReviewRecord>, RepoError> {
        let mut reviews: Vec<ReviewRecord> = lock(&self.reviews)
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ReviewRecord>, RepoError> {
        Ok(self.review(id))
    }

    async fn create_review(&self, params: CreateReviewParams) -> Result<ReviewRecord, RepoError> {
        let mut reviews = lock(&self.reviews);
        if reviews
            .iter()
            .any(|r| r.user_id == params.user_id && r.property_id == params.property_id)
        {
            return Err(duplicate("reviews_user_id_property_id_key"));
        }

        let now = OffsetDateTime::now_utc();
        let review = ReviewRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            property_id: params.property_id,
            rating: params.rating,
            title: params.title,
            comment: params.comment,
            is_approved: false,
            is_edited: false,
            likes_count: 0,
            created_at: now,
            updated_at: now,
        };
        reviews.push(review.clone());
        Ok(review)
    }

    async fn update_review(&self, params: UpdateReviewParams) -> Result<ReviewRecord, RepoError> {
        let mut reviews = lock(&self.reviews);
        let review = reviews
            .iter_mut()
            .find(|r| r.id == params.id)
            .ok_or(RepoError::NotFound)?;
        review.rating = params.rating;
        review.title = params.title;
        review.comment = params.comment;
        review.is_edited = true;
        review.updated_at = OffsetDateTime::now_utc();
        Ok(review.clone())
    }

    async fn delete_review(&self, id: Uuid) -> Result<(), RepoError> {
        lock(&self.reviews).retain(|r| r.id != id);
        lock(&self.review_likes).retain(|l| l.review_id != id);
        Ok(())
    }

    async fn toggle_like(
        &self,
        user_id: Uuid,
        review_id: Uuid,
    ) -> Result<ReviewLikeToggle, RepoError> {
        let existing = lock(&self.review_likes)
            .iter()
            .find(|l| l.user_id == user_id && l.review_id == review_id)
            .map(|l| l.id);

        match existing {
            None => {
                lock(&self.review_likes).push(ReviewLikeRecord {
                    id: Uuid::new_v4(),
                    user_id,
                    review_id,
                    created_at: OffsetDateTime::now_utc(),
                });
                Ok(ReviewLikeToggle::Added {
                    likes_count: self.recompute_likes_count(review_id),
                })
            }
            Some(id) => {
                lock(&self.review_likes).retain(|l| l.id != id);
                Ok(ReviewLikeToggle::Removed {
                    likes_count: self.recompute_likes_count(review_id),
                })
            }
        }
    }

    async fn stats_for_property(&self, property_id: Uuid) -> Result<ReviewStats, RepoError> {
        let reviews = lock(&self.reviews);
        let approved: Vec<&ReviewRecord> = reviews
            .iter()
            .filter(|r| r.property_id == property_id && r.is_approved)
            .collect();

        let avg_rating = if approved.is_empty() {
            0.0
        } else {
            approved.iter().map(|r| r.rating as f64).sum::<f64>() / approved.len() as f64
        };

        let mut rating_distribution = Vec::new();
        for rating in 1..=5 {
            let count = approved.iter().filter(|r| r.rating == rating).count() as u64;
            if count > 0 {
                rating_distribution.push(RatingBucket { rating, count });
            }
        }

        Ok(ReviewStats {
            total_reviews: approved.len() as u64,
            avg_rating,
            rating_distribution,
        })
    }
}

#[async_trait]
impl NotificationsRepo for MemoryStore {
    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: NotificationQueryFilter,
    ) -> Result<Vec<NotificationRecord>, RepoError> {
        let mut notifications: Vec<NotificationRecord> = lock(&self.notifications)
            .iter()
            .filter(|n| n.user_id == user_id)
            .filter(|n| filter.is_read.is_none_or(|read| n.is_read == read))
            .filter(|n| filter.kind.is_none_or(|kind| n.kind == kind))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, RepoError> {
        Ok(lock(&self.notifications)
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>, RepoError> {
        Ok(lock(&self.notifications).iter().find(|n| n.id == id).cloned())
    }

    async fn create_notification(
        &self,
        params: CreateNotificationParams,
    ) -> Result<NotificationRecord, RepoError> {
        let notification = NotificationRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            title: params.title,
            message: params.message,
            kind: params.kind,
            is_read: false,
            read_at: None,
            link: params.link,
            created_at: OffsetDateTime::now_utc(),
        };
        lock(&self.notifications).push(notification.clone());
        Ok(notification)
    }

    async fn mark_read(&self, user_id: Uuid, ids: &[Uuid]) -> Result<u64, RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut affected = 0;
        for notification in lock(&self.notifications).iter_mut() {
            if notification.user_id == user_id
                && !notification.is_read
                && ids.contains(&notification.id)
            {
                notification.is_read = true;
                notification.read_at = Some(now);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut affected = 0;
        for notification in lock(&self.notifications).iter_mut() {
            if notification.user_id == user_id && !notification.is_read {
                notification.is_read = true;
                notification.read_at = Some(now);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn mark_one_read(&self, id: Uuid) -> Result<Option<NotificationRecord>, RepoError> {
        let mut notifications = lock(&self.notifications);
        let Some(notification) = notifications.iter_mut().find(|n| n.id == id) else {
            return Ok(None);
        };
        if !notification.is_read {
            notification.is_read = true;
            notification.read_at = Some(OffsetDateTime::now_utc());
        }
        Ok(Some(notification.clone()))
    }

    async fn delete_notification(&self, id: Uuid) -> Result<(), RepoError> {
        lock(&self.notifications).retain(|n| n.id != id);
        Ok(())
    }
}

#[async_trait]
impl FeedbackRepo for MemoryStore {
    async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = FeedbackRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            kind: params.kind,
            rating: params.rating,
            title: params.title,
            message: params.message,
            email: params.email,
            is_resolved: false,
            response: None,
            responded_at: None,
            created_at: now,
            updated_at: now,
        };
        lock(&self.feedback).push(record.clone());
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<FeedbackRecord>, RepoError> {
        Ok(lock(&self.feedback).clone())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<FeedbackRecord>, RepoError> {
        Ok(lock(&self.feedback)
            .iter()
            .filter(|f| f.user_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FeedbackRecord>, RepoError> {
        Ok(lock(&self.feedback).iter().find(|f| f.id == id).cloned())
    }

    async fn respond(&self, params: RespondFeedbackParams) -> Result<FeedbackRecord, RepoError> {
        let mut feedback = lock(&self.feedback);
        let record = feedback
            .iter_mut()
            .find(|f| f.id == params.id)
            .ok_or(RepoError::NotFound)?;
        record.response = Some(params.response);
        record.is_resolved = true;
        record.responded_at = Some(params.responded_at);
        record.updated_at = params.responded_at;
        Ok(record.clone())
    }
}

/// Mailer double that records deliveries.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl RecordingMailer {
    pub fn deliveries(&self) -> Vec<SentMail> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        lock(&self.sent).push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_app() -> TestApp {
    test_app_with(CacheConfig::default(), 120)
}

pub fn test_app_with(cache_config: CacheConfig, rate_limit_max: u32) -> TestApp {
    let store = Arc::new(MemoryStore::default());
    let mailer = Arc::new(RecordingMailer::default());
    let cache = Arc::new(ResponseCache::new(cache_config));

    let jwt = Arc::new(JwtAuthenticator::new(
        JWT_SECRET,
        Duration::minutes(60),
        Duration::days(1),
    ));

    let users = Arc::new(UserService::new(
        store.clone(),
        jwt,
        mailer.clone(),
        Duration::hours(1),
        "http://localhost:3000".to_string(),
    ));
    let properties = Arc::new(PropertyService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        cache.clone(),
    ));
    let favorites = Arc::new(FavoriteService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        cache.clone(),
    ));
    let reviews = Arc::new(ReviewService::new(store.clone(), store.clone(), cache));
    let notifications = Arc::new(NotificationService::new(store.clone()));
    let feedback = Arc::new(FeedbackService::new(store.clone(), mailer.clone()));

    let media_root = std::env::temp_dir().join(format!("immob-test-media-{}", Uuid::new_v4()));
    let media_storage = Arc::new(MediaStorage::new(media_root).expect("media storage"));

    let state = ApiState {
        users,
        properties,
        favorites,
        reviews,
        notifications,
        feedback,
        media_storage,
        rate_limiter: Arc::new(ApiRateLimiter::new(
            StdDuration::from_secs(60),
            rate_limit_max,
        )),
    };

    TestApp {
        router: build_api_router(state, 5 * 1024 * 1024),
        store,
        mailer,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request builds"),
            None => builder.body(Body::empty()).expect("request builds"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    /// Register an account and return `(user_id, access_token)`.
    pub async fn register_and_login(&self, email: &str, username: &str) -> (Uuid, String) {
        let (status, user) = self
            .request(
                "POST",
                "/api/v1/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "username": username,
                    "password": "Str0ng!Passphrase#42",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "registration failed: {user}");
        let user_id: Uuid = user["id"].as_str().expect("user id").parse().expect("uuid");

        let (status, tokens) = self
            .request(
                "POST",
                "/api/v1/auth/token",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": "Str0ng!Passphrase#42",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {tokens}");

        (
            user_id,
            tokens["access_token"].as_str().expect("token").to_string(),
        )
    }

    /// Create a listed property through the API and return its id.
    pub async fn create_property(&self, token: &str, title: &str) -> Uuid {
        let (status, property) = self
            .request(
                "POST",
                "/api/v1/properties",
                Some(token),
                Some(serde_json::json!({
                    "title": title,
                    "description": "Bright three-bedroom flat with a balcony.",
                    "kind": "apartment",
                    "status": "for_sale",
                    "price": 45_000_000i64,
                    "area_m2": 120.0,
                    "bedrooms": 3,
                    "bathrooms": 2,
                    "city": "Douala",
                    "region": "littoral",
                    "address": "12 Rue des Cocotiers",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "property create failed: {property}");
        property["id"].as_str().expect("id").parse().expect("uuid")
    }
}
