use pkg_constants::state::OWNERSHIP_PREFIX;
use pkg_types::meta::{ObjectKey, Resource};
use serde::{Deserialize, Serialize};

use crate::client::StateStore;

/// One derived object recorded against its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedChild {
    pub kind: String,
    pub key: ObjectKey,
    pub registry_key: String,
}

impl OwnedChild {
    pub fn of<R: Resource>(key: &ObjectKey) -> Self {
        Self {
            kind: R::KIND.to_string(),
            key: key.clone(),
            registry_key: R::registry_key(key),
        }
    }
}

/// Children of one owner, in the order they were first recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub children: Vec<OwnedChild>,
}

/// Durable mapping from an owner name to the objects derived from it.
///
/// The store has no cascading delete, so this ledger is what lets the
/// owner's removal be followed by removal of everything it created.
#[derive(Clone)]
pub struct OwnershipLedger {
    store: StateStore,
}

impl OwnershipLedger {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    fn key_for(owner: &str) -> String {
        format!("{}{}", OWNERSHIP_PREFIX, owner)
    }

    pub async fn get(&self, owner: &str) -> anyhow::Result<Option<OwnershipRecord>> {
        match self.store.get(&Self::key_for(owner)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Record `child` under `owner`. Returns `false` when it was already known.
    pub async fn record(&self, owner: &str, child: OwnedChild) -> anyhow::Result<bool> {
        let mut record = self.get(owner).await?.unwrap_or_default();
        if record.children.contains(&child) {
            return Ok(false);
        }
        record.children.push(child);
        self.store
            .put(&Self::key_for(owner), &serde_json::to_vec(&record)?)
            .await?;
        Ok(true)
    }

    /// Drop everything known about `owner`.
    pub async fn forget(&self, owner: &str) -> anyhow::Result<()> {
        self.store.delete(&Self::key_for(owner)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::EventLog;
    use pkg_types::namespace::Namespace;
    use pkg_types::quota::ResourceQuota;

    #[tokio::test]
    async fn records_in_order_without_duplicates() {
        let ledger = OwnershipLedger::new(StateStore::in_memory(EventLog::new(16)));
        let ns = OwnedChild::of::<Namespace>(&ObjectKey::cluster("project1"));
        let rq = OwnedChild::of::<ResourceQuota>(&ObjectKey::namespaced(
            "project1",
            "cno-resource-quota",
        ));

        assert!(ledger.record("environment", ns.clone()).await.unwrap());
        assert!(ledger.record("environment", rq.clone()).await.unwrap());
        assert!(!ledger.record("environment", ns.clone()).await.unwrap());

        let record = ledger.get("environment").await.unwrap().unwrap();
        assert_eq!(record.children, vec![ns, rq.clone()]);
        assert_eq!(
            rq.registry_key,
            "/registry/resourcequotas/project1/cno-resource-quota"
        );

        ledger.forget("environment").await.unwrap();
        assert!(ledger.get("environment").await.unwrap().is_none());
    }
}
