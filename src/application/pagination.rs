//! Shared cursor pagination helpers.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PropertyCursorPayload {
    created_at: OffsetDateTime,
    id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ReviewCursorPayload {
    created_at: OffsetDateTime,
    id: Uuid,
}

/// Cursor for paginating property listings in reverse chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyCursor {
    created_at: OffsetDateTime,
    id: Uuid,
}

/// Cursor for paginating reviews in reverse chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewCursor {
    created_at: OffsetDateTime,
    id: Uuid,
}

fn encode_payload<T: Serialize>(payload: &T) -> String {
    let json = serde_json::to_vec(payload).expect("cursor payload serializes");
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_payload<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, PaginationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(raw)
        .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| PaginationError::InvalidCursor(err.to_string()))
}

impl PropertyCursor {
    pub fn new(created_at: OffsetDateTime, id: Uuid) -> Self {
        Self { created_at, id }
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn encode(&self) -> String {
        encode_payload(&PropertyCursorPayload {
            created_at: self.created_at,
            id: self.id,
        })
    }

    pub fn decode(raw: &str) -> Result<Self, PaginationError> {
        let payload: PropertyCursorPayload = decode_payload(raw)?;
        Ok(Self {
            created_at: payload.created_at,
            id: payload.id,
        })
    }
}

impl ReviewCursor {
    pub fn new(created_at: OffsetDateTime, id: Uuid) -> Self {
        Self { created_at, id }
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn encode(&self) -> String {
        encode_payload(&ReviewCursorPayload {
            created_at: self.created_at,
            id: self.id,
        })
    }

    pub fn decode(raw: &str) -> Result<Self, PaginationError> {
        let payload: ReviewCursorPayload = decode_payload(raw)?;
        Ok(Self {
            created_at: payload.created_at,
            id: payload.id,
        })
    }
}

/// A bounded page request with an optional continuation cursor.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<C> {
    pub limit: u32,
    pub cursor: Option<C>,
}

impl<C> PageRequest<C> {
    pub fn new(limit: u32, cursor: Option<C>) -> Self {
        Self { limit, cursor }
    }
}

/// One page of results plus the encoded cursor for the next page, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }
}
