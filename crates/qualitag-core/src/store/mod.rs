//! Persistence seam
//!
//! [`EntityStore`] is the minimal keyed document store the core needs.
//! Services never talk to it directly; they go through [`Repository`],
//! which types the records and bounds every call with a timeout.

mod memory;
mod mongo;
mod repository;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{QualitagConfig, StorageBackend};
use crate::error::QualitagResult;
use crate::models::{Collection, Record, RefField, User};

pub use memory::{InMemoryStore, StoreOp, StoreSnapshot};
pub use mongo::MongoStore;
pub use repository::Repository;

/// Keyed document store over the five collections.
///
/// Each call is atomic for a single record; there are no multi-record
/// transactions.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> QualitagResult<Option<Record>>;

    /// Insert or replace a record. A record with an empty id is assigned a
    /// fresh one; the stored id is returned.
    async fn put(&self, record: Record) -> QualitagResult<String>;

    /// Returns whether a record was removed
    async fn delete(&self, collection: Collection, id: &str) -> QualitagResult<bool>;

    async fn find_user_by_email(&self, email: &str) -> QualitagResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> QualitagResult<Option<User>>;

    /// Whether a project that is not closed already uses `name`
    async fn project_name_exists(&self, name: &str, exclude_id: Option<&str>)
        -> QualitagResult<bool>;

    /// Records of `collection` whose `field` holds `id`
    async fn find_referencing(
        &self,
        collection: Collection,
        field: RefField,
        id: &str,
    ) -> QualitagResult<Vec<Record>>;
}

/// Fresh record id
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Open the backend selected by the configuration
pub async fn open_store(config: &QualitagConfig) -> anyhow::Result<Arc<dyn EntityStore>> {
    match config.storage_backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageBackend::MongoDB => {
            let store = MongoStore::connect(&config.mongodb_url, &config.mongodb_database).await?;
            Ok(Arc::new(store))
        }
    }
}
