use anyhow::Context;
use pkg_constants::state::LIMIT_RANGES_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::{ObjectMeta, Resource, validate_object_meta};
use crate::validate::validate_quantity;

/// Per-container defaults applied to workloads in a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitRange {
    pub metadata: ObjectMeta,
    pub spec: LimitRangeSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitRangeSpec {
    #[serde(default)]
    pub limits: Vec<LimitRangeItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitRangeItem {
    /// Scope of the item, e.g. `Container`.
    #[serde(rename = "type")]
    pub limit_type: String,
    #[serde(default)]
    pub default: BTreeMap<String, String>,
    #[serde(default)]
    pub default_request: BTreeMap<String, String>,
}

impl Resource for LimitRange {
    const KIND: &'static str = "LimitRange";
    const PREFIX: &'static str = LIMIT_RANGES_PREFIX;
    const NAMESPACED: bool = true;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn validate(&self) -> anyhow::Result<()> {
        validate_object_meta::<Self>(&self.metadata)?;
        for (i, item) in self.spec.limits.iter().enumerate() {
            for (resource, quantity) in item.default.iter().chain(&item.default_request) {
                validate_quantity(quantity)
                    .with_context(|| format!("spec.limits[{}].{}", i, resource))?;
            }
        }
        Ok(())
    }
}
