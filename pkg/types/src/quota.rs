use anyhow::Context;
use pkg_constants::state::RESOURCE_QUOTAS_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::{ObjectMeta, Resource, validate_object_meta};
use crate::validate::validate_quantity;

/// Resource quota for a namespace: hard caps on aggregate requests and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub metadata: ObjectMeta,
    pub spec: ResourceQuotaSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceQuotaSpec {
    /// Resource name (e.g. `requests.cpu`) to quantity string.
    #[serde(default)]
    pub hard: BTreeMap<String, String>,
}

impl Resource for ResourceQuota {
    const KIND: &'static str = "ResourceQuota";
    const PREFIX: &'static str = RESOURCE_QUOTAS_PREFIX;
    const NAMESPACED: bool = true;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn validate(&self) -> anyhow::Result<()> {
        validate_object_meta::<Self>(&self.metadata)?;
        for (resource, quantity) in &self.spec.hard {
            validate_quantity(quantity)
                .with_context(|| format!("spec.hard[{}]", resource))?;
        }
        Ok(())
    }
}
