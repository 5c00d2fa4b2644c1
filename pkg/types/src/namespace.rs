use pkg_constants::state::NAMESPACES_PREFIX;
use serde::{Deserialize, Serialize};

use crate::meta::{ObjectMeta, Resource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub metadata: ObjectMeta,
}

impl Resource for Namespace {
    const KIND: &'static str = "Namespace";
    const PREFIX: &'static str = NAMESPACES_PREFIX;
    const NAMESPACED: bool = false;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
