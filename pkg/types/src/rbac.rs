use anyhow::bail;
use pkg_constants::state::ROLE_BINDINGS_PREFIX;
use serde::{Deserialize, Serialize};

use crate::meta::{ObjectMeta, Resource, validate_object_meta};

// --- Subject ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::User,
            name: name.into(),
            namespace: None,
        }
    }
}

// --- RoleRef ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    pub api_group: String,
    pub kind: String,
    pub name: String,
}

// --- RoleBinding ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBinding {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    pub role_ref: RoleRef,
}

impl Resource for RoleBinding {
    const KIND: &'static str = "RoleBinding";
    const PREFIX: &'static str = ROLE_BINDINGS_PREFIX;
    const NAMESPACED: bool = true;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn validate(&self) -> anyhow::Result<()> {
        validate_object_meta::<Self>(&self.metadata)?;
        if self.role_ref.name.is_empty() {
            bail!("roleRef.name must not be empty");
        }
        if let Some(i) = self.subjects.iter().position(|s| s.name.is_empty()) {
            bail!("subjects[{}].name must not be empty", i);
        }
        Ok(())
    }
}
