//! Typed, time-bounded access to an [`EntityStore`]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::EntityStore;
use crate::error::{QualitagError, QualitagResult};
use crate::models::{Entity, EntityRef, Record, RefField, User};

/// Store facade used by every service.
///
/// Each call is wrapped in a timeout; an elapsed timeout surfaces as
/// [`QualitagError::ServiceUnavailable`].
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn EntityStore>,
    timeout: Duration,
}

impl Repository {
    pub fn new(store: Arc<dyn EntityStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    async fn bounded<T, F>(&self, action: &str, call: F) -> QualitagResult<T>
    where
        F: Future<Output = QualitagResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    action = %action,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(QualitagError::ServiceUnavailable(format!(
                    "store {} timed out after {}ms",
                    action,
                    self.timeout.as_millis()
                )))
            }
        }
    }

    /// Load a record, `None` when absent
    pub async fn find<T: Entity>(&self, id: &str) -> QualitagResult<Option<T>> {
        let record = self
            .bounded("get", self.store.get(T::COLLECTION, id))
            .await?;
        match record {
            Some(record) => T::from_record(record).map(Some).ok_or_else(|| {
                QualitagError::Internal(format!(
                    "record {} is not a {}",
                    id,
                    T::COLLECTION.kind()
                ))
            }),
            None => Ok(None),
        }
    }

    /// Load a record that must exist
    pub async fn get<T: Entity>(&self, id: &str) -> QualitagResult<T> {
        self.find(id)
            .await?
            .ok_or_else(|| QualitagError::not_found(T::COLLECTION, id))
    }

    /// Persist a record, assigning its id when it has none
    pub async fn save<T: Entity>(&self, entity: &mut T) -> QualitagResult<()> {
        let record = entity.clone().into_record();
        let id = self.bounded("put", self.store.put(record)).await?;
        entity.set_id(id);
        Ok(())
    }

    /// Load an untyped record
    pub async fn find_record(&self, target: &EntityRef) -> QualitagResult<Option<Record>> {
        self.bounded("get", self.store.get(target.collection, &target.id))
            .await
    }

    /// Persist an untyped record that already has an id
    pub async fn save_record(&self, record: Record) -> QualitagResult<()> {
        self.bounded("put", self.store.put(record)).await?;
        Ok(())
    }

    /// Remove a record; returns whether it existed
    pub async fn delete(&self, target: &EntityRef) -> QualitagResult<bool> {
        self.bounded("delete", self.store.delete(target.collection, &target.id))
            .await
    }

    pub async fn user_by_email(&self, email: &str) -> QualitagResult<Option<User>> {
        self.bounded("find_user_by_email", self.store.find_user_by_email(email))
            .await
    }

    pub async fn user_by_username(&self, username: &str) -> QualitagResult<Option<User>> {
        self.bounded(
            "find_user_by_username",
            self.store.find_user_by_username(username),
        )
        .await
    }

    pub async fn project_name_taken(
        &self,
        name: &str,
        exclude_id: Option<&str>,
    ) -> QualitagResult<bool> {
        self.bounded(
            "project_name_exists",
            self.store.project_name_exists(name, exclude_id),
        )
        .await
    }

    /// Records of type `T` whose `field` holds `id`
    pub async fn referencing<T: Entity>(
        &self,
        field: RefField,
        id: &str,
    ) -> QualitagResult<Vec<T>> {
        let records = self
            .bounded(
                "find_referencing",
                self.store.find_referencing(T::COLLECTION, field, id),
            )
            .await?;
        Ok(records.into_iter().filter_map(T::from_record).collect())
    }
}
