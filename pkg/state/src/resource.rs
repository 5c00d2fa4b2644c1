use chrono::Utc;
use pkg_constants::state::{NAMESPACES_PREFIX, REVISION_KEY};
use pkg_types::meta::{ObjectKey, Resource};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::client::StateStore;
use crate::error::StoreError;

/// Typed, versioned view over the [`StateStore`].
///
/// Writes are validated, stamped with a store-wide revision used as the
/// optimistic-concurrency token, and serialized through a single writer lock
/// so the read-compare-write of an update is atomic.
#[derive(Clone)]
pub struct ResourceStore {
    store: StateStore,
    revision: Arc<Mutex<u64>>,
}

impl ResourceStore {
    /// Wrap a raw store, resuming the revision counter it persisted.
    pub async fn new(store: StateStore) -> Result<Self, StoreError> {
        let revision = match store.get(REVISION_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => 0,
        };
        Ok(Self {
            store,
            revision: Arc::new(Mutex::new(revision)),
        })
    }

    /// The underlying raw key/value store.
    pub fn state(&self) -> &StateStore {
        &self.store
    }

    pub async fn get<R: Resource>(&self, key: &ObjectKey) -> Result<Option<R>, StoreError> {
        match self.store.get(&R::registry_key(key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List objects of a kind, optionally restricted to one namespace.
    pub async fn list<R: Resource>(&self, namespace: Option<&str>) -> Result<Vec<R>, StoreError> {
        let prefix = match namespace {
            Some(ns) if R::NAMESPACED => format!("{}{}/", R::PREFIX, ns),
            _ => R::PREFIX.to_string(),
        };
        let entries = self.store.list_prefix(&prefix).await?;
        let mut objects = Vec::with_capacity(entries.len());
        for (_, value) in entries {
            objects.push(serde_json::from_slice(&value)?);
        }
        Ok(objects)
    }

    /// Create a new object. Assigns uid, resource version and creation time.
    pub async fn create<R: Resource>(&self, obj: &R) -> Result<R, StoreError> {
        let key = obj.key();
        validate(obj)?;

        let mut revision = self.revision.lock().await;
        if let Some(ns) = &key.namespace {
            let ns_key = ObjectKey::cluster(ns.clone()).registry_key(NAMESPACES_PREFIX);
            if self.store.get(&ns_key).await?.is_none() {
                return Err(StoreError::NamespaceNotFound(ns.clone()));
            }
        }
        let registry_key = R::registry_key(&key);
        if self.store.get(&registry_key).await?.is_some() {
            return Err(StoreError::AlreadyExists { kind: R::KIND, key });
        }

        let mut created = obj.clone();
        let meta = created.meta_mut();
        meta.uid = Uuid::new_v4().to_string();
        meta.creation_timestamp = Some(Utc::now());
        meta.resource_version = self.bump(&mut *revision).await?;

        self.store
            .put(&registry_key, &serde_json::to_vec(&created)?)
            .await?;
        debug!(kind = R::KIND, %key, "created");
        Ok(created)
    }

    /// Replace an existing object.
    ///
    /// `obj` must carry the resource version last read; a stale version fails
    /// with [`StoreError::Conflict`]. An update that changes nothing is
    /// accepted without writing.
    pub async fn update<R: Resource>(&self, obj: &R) -> Result<R, StoreError> {
        let key = obj.key();
        validate(obj)?;

        let mut revision = self.revision.lock().await;
        let registry_key = R::registry_key(&key);
        let current: R = match self.store.get(&registry_key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => return Err(StoreError::NotFound { kind: R::KIND, key }),
        };
        let current_version = current.meta().resource_version;
        if obj.meta().resource_version != current_version {
            return Err(StoreError::Conflict {
                kind: R::KIND,
                key,
                expected: obj.meta().resource_version,
                current: current_version,
            });
        }

        let mut updated = obj.clone();
        let meta = updated.meta_mut();
        meta.uid = current.meta().uid.clone();
        meta.creation_timestamp = current.meta().creation_timestamp;

        if serde_json::to_value(&updated)? == serde_json::to_value(&current)? {
            debug!(kind = R::KIND, %key, "update is a no-op");
            return Ok(current);
        }

        updated.meta_mut().resource_version = self.bump(&mut *revision).await?;
        self.store
            .put(&registry_key, &serde_json::to_vec(&updated)?)
            .await?;
        debug!(kind = R::KIND, %key, "updated");
        Ok(updated)
    }

    pub async fn delete<R: Resource>(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let _revision = self.revision.lock().await;
        if self.store.delete(&R::registry_key(key)).await? {
            debug!(kind = R::KIND, %key, "deleted");
            Ok(())
        } else {
            Err(StoreError::NotFound {
                kind: R::KIND,
                key: key.clone(),
            })
        }
    }

    /// Fetch the raw document stored under a registry key, whatever its kind.
    pub async fn get_raw(
        &self,
        registry_key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        match self.store.get(registry_key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete by registry key, whatever its kind. Returns whether it existed.
    pub async fn delete_raw(&self, registry_key: &str) -> Result<bool, StoreError> {
        let _revision = self.revision.lock().await;
        Ok(self.store.delete(registry_key).await?)
    }

    async fn bump(&self, revision: &mut u64) -> Result<u64, StoreError> {
        let next = *revision + 1;
        self.store
            .put(REVISION_KEY, &serde_json::to_vec(&next)?)
            .await?;
        *revision = next;
        Ok(next)
    }
}

fn validate<R: Resource>(obj: &R) -> Result<(), StoreError> {
    obj.validate().map_err(|reason| StoreError::Invalid {
        kind: R::KIND,
        key: obj.key(),
        reason,
    })
}
