//! # Item Store
//!
//! Records live in named collections as `{_id, data, created_at, updated_at}`.
//! A [`Backend`] is the execution end of an NLQ: given a [`ParsedQuery`] and a
//! collection it returns one page of records plus the unpaged total.

pub mod executor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nlq_core::backend::DEFAULT_MAX_LIMIT;
use nlq_core::ParsedQuery;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::BackendError;

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Free-form JSON object.
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(data: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Wire form of a whole record.
    pub fn to_json(&self) -> Value {
        json!({
            "_id": self.id,
            "data": self.data,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMeta {
    /// Matches before paging.
    pub total: usize,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<Value>,
    pub meta: PageMeta,
}

// =============================================================================
// Backend Trait
// =============================================================================

#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    async fn insert(&self, collection: &str, data: Value) -> Result<Item, BackendError>;

    async fn get(&self, collection: &str, id: Uuid) -> Result<Item, BackendError>;

    /// Replaces the payload and bumps `updated_at`.
    async fn replace(&self, collection: &str, id: Uuid, data: Value) -> Result<Item, BackendError>;

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), BackendError>;

    /// Filter, count, sort, page and project in one go.
    async fn execute(&self, parsed: &ParsedQuery, target: &str) -> Result<Page, BackendError>;
}

// =============================================================================
// In-Memory Backend
// =============================================================================

/// Collections kept in insertion order behind one lock.
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Vec<Item>>>,
    max_limit: u32,
}

impl MemoryBackend {
    pub fn new(max_limit: u32) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            max_limit,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LIMIT)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert(&self, collection: &str, data: Value) -> Result<Item, BackendError> {
        if !data.is_object() {
            return Err(BackendError::InvalidData);
        }
        let item = Item::new(data);
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(item.clone());
        tracing::debug!(collection, id = %item.id, "item created");
        Ok(item)
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Item, BackendError> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .and_then(|items| items.iter().find(|item| item.id == id))
            .cloned()
            .ok_or(BackendError::NotFound(id))
    }

    async fn replace(&self, collection: &str, id: Uuid, data: Value) -> Result<Item, BackendError> {
        if !data.is_object() {
            return Err(BackendError::InvalidData);
        }
        let mut collections = self.collections.write().await;
        let item = collections
            .get_mut(collection)
            .and_then(|items| items.iter_mut().find(|item| item.id == id))
            .ok_or(BackendError::NotFound(id))?;
        item.data = data;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), BackendError> {
        let mut collections = self.collections.write().await;
        let items = collections
            .get_mut(collection)
            .ok_or(BackendError::NotFound(id))?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Err(BackendError::NotFound(id));
        }
        tracing::debug!(collection, %id, "item deleted");
        Ok(())
    }

    async fn execute(&self, parsed: &ParsedQuery, target: &str) -> Result<Page, BackendError> {
        let collections = self.collections.read().await;
        let items = collections.get(target).map(Vec::as_slice).unwrap_or(&[]);
        Ok(executor::execute(parsed, items, self.max_limit))
    }
}
