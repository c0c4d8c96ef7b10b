//! Listing reads and writes, with response caching around the read side.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, PropertyCursor};
use crate::application::repos::{
    CreatePropertyParams, MediaRepo, PropertiesRepo, PropertiesWriteRepo, PropertyQueryFilter,
    RepoError, UpdatePropertyParams,
};
use crate::cache::{CacheKey, CachePrefix, ResponseCache};
use crate::domain::entities::{PropertyImageRecord, PropertyRecord};
use crate::domain::error::DomainError;
use crate::domain::sanitize::{sanitize_rich_text, strip_html};
use crate::domain::types::{PropertyKind, PropertyStatus};

const FEATURED_LIMIT: u32 = 8;

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("property not found")]
    NotFound,
    #[error("caller does not own this property")]
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct PropertyCommand {
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
}

#[derive(Debug, Clone)]
pub struct AttachImageCommand {
    pub stored_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub caption: Option<String>,
    pub is_primary: bool,
}

/// Property detail payload: the record plus its gallery.
#[derive(Debug, Serialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: PropertyRecord,
    pub images: Vec<PropertyImageRecord>,
}

pub struct PropertyService {
    reader: Arc<dyn PropertiesRepo>,
    writer: Arc<dyn PropertiesWriteRepo>,
    media: Arc<dyn MediaRepo>,
    cache: Arc<ResponseCache>,
}

impl PropertyService {
    pub fn new(
        reader: Arc<dyn PropertiesRepo>,
        writer: Arc<dyn PropertiesWriteRepo>,
        media: Arc<dyn MediaRepo>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            reader,
            writer,
            media,
            cache,
        }
    }

    /// List properties, serving the serialized page from cache when the same
    /// parameter fingerprint was queried within the TTL.
    pub async fn list(
        &self,
        filter: &PropertyQueryFilter,
        page: PageRequest<PropertyCursor>,
        raw_params: &[(String, String)],
    ) -> Result<Value, PropertyError> {
        let key = CacheKey::for_params(CachePrefix::PropertyList, raw_params);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let listing: CursorPage<PropertyRecord> = self.reader.list_properties(filter, page).await?;
        let payload = to_value(&listing)?;
        self.cache
            .set(key, payload.clone(), self.cache.config().property_list_ttl());
        Ok(payload)
    }

    /// Retrieve a property detail, incrementing its view counter on every
    /// call. The increment is never gated by the cache; the serialized
    /// detail is refreshed under its per-id key afterwards.
    pub async fn detail(&self, id: Uuid) -> Result<Value, PropertyError> {
        let property = self
            .reader
            .retrieve_incrementing_views(id)
            .await?
            .ok_or(PropertyError::NotFound)?;

        let images = self.media.list_images(id).await?;
        let payload = to_value(&PropertyDetail { property, images })?;

        self.cache.set(
            CacheKey::for_id(CachePrefix::PropertyDetail, id),
            payload.clone(),
            self.cache.config().property_detail_ttl(),
        );
        Ok(payload)
    }

    pub async fn featured(&self) -> Result<Value, PropertyError> {
        let key = CacheKey::bare(CachePrefix::PropertyFeatured);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let featured = self.reader.list_featured(FEATURED_LIMIT).await?;
        let payload = to_value(&featured)?;
        self.cache
            .set(key, payload.clone(), self.cache.config().featured_ttl());
        Ok(payload)
    }

    pub async fn stats(&self) -> Result<Value, PropertyError> {
        let key = CacheKey::bare(CachePrefix::PropertyStats);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let stats = self.reader.stats().await?;
        let payload = to_value(&stats)?;
        self.cache
            .set(key, payload.clone(), self.cache.config().stats_ttl());
        Ok(payload)
    }

    pub async fn create(
        &self,
        owner_id: Uuid,
        command: PropertyCommand,
    ) -> Result<PropertyRecord, PropertyError> {
        let command = validate_command(command)?;

        let published_at = command
            .status
            .is_listed()
            .then(OffsetDateTime::now_utc);

        let property = self
            .writer
            .create_property(CreatePropertyParams {
                title: command.title,
                description: command.description,
                kind: command.kind,
                status: command.status,
                price: command.price,
                currency: command.currency,
                area_m2: command.area_m2,
                bedrooms: command.bedrooms,
                bathrooms: command.bathrooms,
                city: command.city,
                region: command.region,
                quarter: command.quarter,
                address: command.address,
                owner_id,
                is_featured: command.is_featured,
                published_at,
            })
            .await?;

        self.invalidate_listing_caches(None);
        Ok(property)
    }

    pub async fn update(
        &self,
        caller_id: Uuid,
        caller_is_staff: bool,
        id: Uuid,
        command: PropertyCommand,
    ) -> Result<PropertyRecord, PropertyError> {
        let existing = self
            .reader
            .find_by_id(id)
            .await?
            .ok_or(PropertyError::NotFound)?;
        ensure_owner(&existing, caller_id, caller_is_staff)?;

        let command = validate_command(command)?;

        // First transition into a listed state stamps the publication time.
        let published_at = match existing.published_at {
            Some(at) => Some(at),
            None => command.status.is_listed().then(OffsetDateTime::now_utc),
        };

        let property = self
            .writer
            .update_property(UpdatePropertyParams {
                id,
                title: command.title,
                description: command.description,
                kind: command.kind,
                status: command.status,
                price: command.price,
                currency: command.currency,
                area_m2: command.area_m2,
                bedrooms: command.bedrooms,
                bathrooms: command.bathrooms,
                city: command.city,
                region: command.region,
                quarter: command.quarter,
                address: command.address,
                is_featured: command.is_featured,
                published_at,
            })
            .await?;

        self.invalidate_listing_caches(Some(id));
        Ok(property)
    }

    pub async fn delete(
        &self,
        caller_id: Uuid,
        caller_is_staff: bool,
        id: Uuid,
    ) -> Result<(), PropertyError> {
        let existing = self
            .reader
            .find_by_id(id)
            .await?
            .ok_or(PropertyError::NotFound)?;
        ensure_owner(&existing, caller_id, caller_is_staff)?;

        self.writer.delete_property(id).await?;
        self.invalidate_listing_caches(Some(id));
        Ok(())
    }

    pub async fn attach_image(
        &self,
        caller_id: Uuid,
        property_id: Uuid,
        command: AttachImageCommand,
    ) -> Result<PropertyImageRecord, PropertyError> {
        let property = self
            .reader
            .find_by_id(property_id)
            .await?
            .ok_or(PropertyError::NotFound)?;
        ensure_owner(&property, caller_id, false)?;

        let existing = self.media.list_images(property_id).await?;
        let record = PropertyImageRecord {
            id: Uuid::new_v4(),
            property_id,
            stored_path: command.stored_path,
            content_type: command.content_type,
            size_bytes: command.size_bytes,
            caption: command.caption.map(|caption| strip_html(&caption)),
            is_primary: command.is_primary,
            sort_order: existing.len() as i32,
            created_at: OffsetDateTime::now_utc(),
        };

        self.media.insert_image(record.clone()).await?;
        if record.is_primary {
            self.media.mark_primary(property_id, record.id).await?;
        }

        self.invalidate_listing_caches(Some(property_id));
        Ok(record)
    }

    /// Delete an image row, returning the record so the caller can remove
    /// the stored file.
    pub async fn remove_image(
        &self,
        caller_id: Uuid,
        property_id: Uuid,
        image_id: Uuid,
    ) -> Result<PropertyImageRecord, PropertyError> {
        let property = self
            .reader
            .find_by_id(property_id)
            .await?
            .ok_or(PropertyError::NotFound)?;
        ensure_owner(&property, caller_id, false)?;

        let image = self
            .media
            .find_image(image_id)
            .await?
            .filter(|image| image.property_id == property_id)
            .ok_or(PropertyError::NotFound)?;

        self.media.delete_image(image_id).await?;
        self.invalidate_listing_caches(Some(property_id));
        Ok(image)
    }

    /// Best-effort invalidation after a write: every parameter variant of
    /// the list, the aggregate keys, and the per-id detail when known.
    pub fn invalidate_listing_caches(&self, id: Option<Uuid>) {
        self.cache.delete_by_prefix(CachePrefix::PropertyList);
        self.cache.delete(&CacheKey::bare(CachePrefix::PropertyStats));
        self.cache
            .delete(&CacheKey::bare(CachePrefix::PropertyFeatured));
        if let Some(id) = id {
            self.cache
                .delete(&CacheKey::for_id(CachePrefix::PropertyDetail, id));
        }
    }
}

fn ensure_owner(
    property: &PropertyRecord,
    caller_id: Uuid,
    caller_is_staff: bool,
) -> Result<(), PropertyError> {
    if property.owner_id == caller_id || caller_is_staff {
        Ok(())
    } else {
        Err(PropertyError::Forbidden)
    }
}

fn validate_command(mut command: PropertyCommand) -> Result<PropertyCommand, PropertyError> {
    command.title = strip_html(command.title.trim());
    command.description = sanitize_rich_text(command.description.trim());
    command.city = strip_html(command.city.trim());
    command.region = strip_html(command.region.trim());
    command.address = strip_html(command.address.trim());

    if command.title.is_empty() {
        return Err(DomainError::validation("title must not be empty").into());
    }
    if command.description.is_empty() {
        return Err(DomainError::validation("description must not be empty").into());
    }
    if command.price <= 0 {
        return Err(DomainError::validation("price must be positive").into());
    }
    if command.area_m2 <= 0.0 {
        return Err(DomainError::validation("area must be positive").into());
    }
    if command.bedrooms < 0 || command.bathrooms < 0 {
        return Err(DomainError::validation("room counts must not be negative").into());
    }
    if command.city.is_empty() || command.region.is_empty() || command.address.is_empty() {
        return Err(DomainError::validation("location fields must not be empty").into());
    }

    Ok(command)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, PropertyError> {
    serde_json::to_value(value).map_err(|err| {
        warn!(target = "immob::properties", error = %err, "response serialization failed");
        PropertyError::Domain(DomainError::invariant("response serialization failed"))
    })
}
