//! In-memory store with fault and latency injection

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{new_id, EntityStore};
use crate::error::{QualitagError, QualitagResult};
use crate::models::{Collection, Entity, Record, RefField, User};

/// Full copy of the store contents, ordered for comparison
pub type StoreSnapshot = BTreeMap<Collection, BTreeMap<String, Record>>;

/// Store call kinds that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Put,
    Delete,
}

#[derive(Debug, Clone)]
struct Fault {
    op: StoreOp,
    collection: Collection,
    id: Option<String>,
    /// Matching calls still allowed through before the fault fires
    skip: usize,
    /// Removed after firing
    once: bool,
}

impl Fault {
    fn matches(&self, op: StoreOp, collection: Collection, id: &str) -> bool {
        self.op == op
            && self.collection == collection
            && self.id.as_deref().map_or(true, |fault_id| fault_id == id)
    }
}

/// Process-local [`EntityStore`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Collection, BTreeMap<String, Record>>>,
    faults: Mutex<Vec<Fault>>,
    latency: Mutex<Option<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every matching call fail until faults are cleared.
    /// With `id` unset the whole collection is affected.
    pub fn fail_on(&self, op: StoreOp, collection: Collection, id: Option<&str>) {
        lock(&self.faults).push(Fault {
            op,
            collection,
            id: id.map(str::to_string),
            skip: 0,
            once: false,
        });
    }

    /// Let `skip` matching calls succeed, then fail the rest
    pub fn fail_after(&self, op: StoreOp, collection: Collection, skip: usize) {
        lock(&self.faults).push(Fault {
            op,
            collection,
            id: None,
            skip,
            once: false,
        });
    }

    /// Let `skip` matching calls succeed, fail the next one, then clear
    pub fn fail_once(&self, op: StoreOp, collection: Collection, id: Option<&str>, skip: usize) {
        lock(&self.faults).push(Fault {
            op,
            collection,
            id: id.map(str::to_string),
            skip,
            once: true,
        });
    }

    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    /// Delay applied to every call
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|(_, by_id)| !by_id.is_empty())
            .map(|(collection, by_id)| (*collection, by_id.clone()))
            .collect()
    }

    pub async fn count(&self, collection: Collection) -> usize {
        self.records
            .read()
            .await
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    /// Every record of one entity type
    pub async fn all<T: Entity>(&self) -> Vec<T> {
        self.records
            .read()
            .await
            .get(&T::COLLECTION)
            .map(|by_id| by_id.values().cloned().filter_map(T::from_record).collect())
            .unwrap_or_default()
    }

    async fn before_call(
        &self,
        op: StoreOp,
        collection: Collection,
        id: &str,
    ) -> QualitagResult<()> {
        let latency = *lock(&self.latency);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        let mut faults = lock(&self.faults);
        for index in 0..faults.len() {
            let fault = &mut faults[index];
            if !fault.matches(op, collection, id) {
                continue;
            }
            if fault.skip > 0 {
                fault.skip -= 1;
                continue;
            }
            if fault.once {
                faults.remove(index);
            }
            return Err(QualitagError::Store(format!(
                "injected {:?} failure on {} {}",
                op,
                collection.kind(),
                id
            )));
        }
        Ok(())
    }

    async fn scan_users<F>(&self, predicate: F) -> QualitagResult<Option<User>>
    where
        F: Fn(&User) -> bool,
    {
        self.before_call(StoreOp::Get, Collection::Users, "").await?;
        let records = self.records.read().await;
        Ok(records
            .get(&Collection::Users)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter_map(|record| match record {
                Record::User(user) if predicate(user) => Some(user.clone()),
                _ => None,
            })
            .next())
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> QualitagResult<Option<Record>> {
        self.before_call(StoreOp::Get, collection, id).await?;
        let records = self.records.read().await;
        Ok(records.get(&collection).and_then(|by_id| by_id.get(id)).cloned())
    }

    async fn put(&self, mut record: Record) -> QualitagResult<String> {
        if record.id().is_empty() {
            record.set_id(new_id());
        }
        let collection = record.collection();
        let id = record.id().to_string();
        self.before_call(StoreOp::Put, collection, &id).await?;

        let mut records = self.records.write().await;
        records.entry(collection).or_default().insert(id.clone(), record);
        Ok(id)
    }

    async fn delete(&self, collection: Collection, id: &str) -> QualitagResult<bool> {
        self.before_call(StoreOp::Delete, collection, id).await?;
        let mut records = self.records.write().await;
        Ok(records
            .get_mut(&collection)
            .and_then(|by_id| by_id.remove(id))
            .is_some())
    }

    async fn find_user_by_email(&self, email: &str) -> QualitagResult<Option<User>> {
        self.scan_users(|user| user.email.eq_ignore_ascii_case(email)).await
    }

    async fn find_user_by_username(&self, username: &str) -> QualitagResult<Option<User>> {
        self.scan_users(|user| user.username == username).await
    }

    async fn project_name_exists(
        &self,
        name: &str,
        exclude_id: Option<&str>,
    ) -> QualitagResult<bool> {
        self.before_call(StoreOp::Get, Collection::Projects, "").await?;
        let records = self.records.read().await;
        Ok(records
            .get(&Collection::Projects)
            .into_iter()
            .flat_map(BTreeMap::values)
            .any(|record| match record {
                Record::Project(project) => {
                    project.name == name
                        && !project.is_closed()
                        && exclude_id != Some(project.id.as_str())
                }
                _ => false,
            }))
    }

    async fn find_referencing(
        &self,
        collection: Collection,
        field: RefField,
        id: &str,
    ) -> QualitagResult<Vec<Record>> {
        self.before_call(StoreOp::Get, collection, "").await?;
        let records = self.records.read().await;
        Ok(records
            .get(&collection)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|record| record.references(field, id))
            .cloned()
            .collect())
    }
}
