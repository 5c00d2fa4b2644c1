use anyhow::Context;
use pkg_constants::environment::ENVIRONMENT_KIND;
use pkg_state::ownership::OwnershipLedger;
use pkg_state::resource::ResourceStore;
use pkg_types::meta::ObjectMeta;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Deserialize)]
struct ObjectStub {
    metadata: ObjectMeta,
}

/// Deletes what an Environment created once the Environment itself is gone.
pub struct GarbageCollector {
    store: ResourceStore,
    ledger: OwnershipLedger,
}

impl GarbageCollector {
    pub fn new(store: ResourceStore, ledger: OwnershipLedger) -> Self {
        Self { store, ledger }
    }

    /// Delete every recorded child of `owner`, newest first, then drop the
    /// ledger entry. Children no longer controlled by `owner` are left alone.
    /// Returns the number of objects deleted.
    pub async fn collect(&self, owner: &str) -> anyhow::Result<usize> {
        let Some(record) = self.ledger.get(owner).await? else {
            return Ok(0);
        };

        let mut deleted = 0;
        for child in record.children.iter().rev() {
            let Some(value) = self
                .store
                .get_raw(&child.registry_key)
                .await
                .with_context(|| format!("get {} '{}'", child.kind, child.key))?
            else {
                debug!("{} {} already gone", child.kind, child.key);
                continue;
            };

            let stub: ObjectStub = serde_json::from_value(value)?;
            let owned = stub
                .metadata
                .controller_owner()
                .is_some_and(|o| o.kind == ENVIRONMENT_KIND && o.name == owner);
            if !owned {
                info!(
                    "Leaving {} {}: no longer controlled by Environment {}",
                    child.kind, child.key, owner
                );
                continue;
            }

            if self
                .store
                .delete_raw(&child.registry_key)
                .await
                .with_context(|| format!("delete {} '{}'", child.kind, child.key))?
            {
                info!("Deleted {} {} (owner {} removed)", child.kind, child.key, owner);
                deleted += 1;
            }
        }

        self.ledger.forget(owner).await?;
        Ok(deleted)
    }
}
