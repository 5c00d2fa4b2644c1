use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::validate::validate_name;

/// Metadata shared by every stored object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Assigned by the store on create.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Opaque concurrency token. Assigned by the store on every write;
    /// an update must carry the value observed at read time.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Metadata for a cluster-scoped object.
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Metadata for an object living in `namespace`.
    pub fn namespaced(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// The owner reference marked as managing controller, if any.
    pub fn controller_owner(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }

    /// Make `owner` the managing controller of this object.
    ///
    /// Fails when a different controller already owns the object. A
    /// controller of the same kind and name but another uid is an earlier
    /// incarnation of `owner` and is replaced.
    pub fn set_controller_reference(&mut self, owner: OwnerReference) -> Result<()> {
        if let Some(existing) = self.controller_owner()
            && existing.uid != owner.uid
            && (existing.kind != owner.kind || existing.name != owner.name)
        {
            bail!(
                "object '{}' is already controlled by {} '{}'",
                self.name,
                existing.kind,
                existing.name
            );
        }
        self.owner_references
            .retain(|r| !r.controller && r.uid != owner.uid);
        self.owner_references.push(owner);
        Ok(())
    }
}

/// Back-reference from a derived object to the object that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
    #[serde(default)]
    pub block_owner_deletion: bool,
}

/// Identifies an object of a given kind: its name, plus its namespace for
/// namespaced kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Full store key under a kind's registry prefix.
    pub fn registry_key(&self, prefix: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}{}/{}", prefix, ns, self.name),
            None => format!("{}{}", prefix, self.name),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A kind of object the state store knows how to key, version and validate.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;
    /// Registry prefix, e.g. `/registry/namespaces/`.
    const PREFIX: &'static str;
    const NAMESPACED: bool;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ObjectKey {
        let meta = self.meta();
        ObjectKey {
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
        }
    }

    fn registry_key(key: &ObjectKey) -> String {
        key.registry_key(Self::PREFIX)
    }

    /// Checks run by the store before every create or update.
    fn validate(&self) -> Result<()> {
        validate_object_meta::<Self>(self.meta())
    }
}

/// Name and scope checks common to every kind.
pub fn validate_object_meta<R: Resource>(meta: &ObjectMeta) -> Result<()> {
    validate_name(&meta.name)?;
    match (&meta.namespace, R::NAMESPACED) {
        (Some(ns), true) => validate_name(ns),
        (None, false) => Ok(()),
        (None, true) => bail!("{} '{}' requires a namespace", R::KIND, meta.name),
        (Some(ns), false) => bail!(
            "{} '{}' is cluster-scoped but has namespace '{}'",
            R::KIND,
            meta.name,
            ns
        ),
    }
}
