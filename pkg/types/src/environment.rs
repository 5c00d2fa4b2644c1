use pkg_constants::environment::{ENVIRONMENT_API_VERSION, ENVIRONMENT_KIND};
use pkg_constants::state::ENVIRONMENTS_PREFIX;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::meta::{ObjectMeta, OwnerReference, Resource};

/// Declarative description of a tenant environment. Cluster-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: EnvironmentSpec,
    #[serde(default)]
    pub status: EnvironmentStatus,
}

fn default_api_version() -> String {
    ENVIRONMENT_API_VERSION.to_string()
}

fn default_kind() -> String {
    ENVIRONMENT_KIND.to_string()
}

impl Environment {
    pub fn new(name: impl Into<String>, spec: EnvironmentSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta::cluster(name),
            spec,
            status: EnvironmentStatus::default(),
        }
    }

    /// Ownership link placed on every object derived from this Environment.
    pub fn controller_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: ENVIRONMENT_API_VERSION.to_string(),
            kind: ENVIRONMENT_KIND.to_string(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
            controller: true,
            block_owner_deletion: true,
        }
    }
}

impl Resource for Environment {
    const KIND: &'static str = ENVIRONMENT_KIND;
    const PREFIX: &'static str = ENVIRONMENTS_PREFIX;
    const NAMESPACED: bool = false;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Target namespace name; also the namespace hosting every derived object.
    pub name: String,
    #[serde(default, rename = "isprod", alias = "isProd")]
    pub is_prod: bool,
    #[serde(default)]
    pub resources: Resources,
    pub storage: String,
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default, rename = "requests")]
    pub resource_requests: ResourceDescription,
    #[serde(default, rename = "limits")]
    pub resource_limits: ResourceDescription,
}

/// Quantity strings, copied verbatim into the ResourceQuota.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescription {
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub memory: String,
    #[serde(default, rename = "ephemeral-storage", alias = "ephemeralStorage")]
    pub ephemeral_storage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_full_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment_id: String,
    /// Raw role string; unknown values are kept so they round-trip.
    pub role: String,
}

impl User {
    pub fn new(username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
            ..Default::default()
        }
    }

    /// The recognised role, or `None` for any other value.
    pub fn role(&self) -> Option<Role> {
        match self.role.as_str() {
            "admin" => Some(Role::Admin),
            "dev" => Some(Role::Dev),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Dev,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Dev => write!(f, "dev"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

/// Observed outcome of the last reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_status: Option<EnvironmentPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentPhase {
    Success,
    Failed,
}

impl fmt::Display for EnvironmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentPhase::Success => write!(f, "success"),
            EnvironmentPhase::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
apiVersion: onboarding.beopenit.com/v1alpha1
kind: Environment
metadata:
  name: environment
  labels:
    team: payments
spec:
  name: project1
  isprod: true
  resources:
    requests:
      cpu: 1000m
      memory: 100Mi
      ephemeral-storage: 1Gi
    limits:
      cpu: 2000m
      memory: 500Mi
      ephemeral-storage: 2Gi
  storage: 10Gi
  users:
    - username: user1
      role: admin
    - username: user2
      userFullName: User Two
      role: guest
"#;

    #[test]
    fn parses_manifest() {
        let env: Environment = serde_yaml::from_str(MANIFEST).unwrap();
        assert_eq!(env.metadata.name, "environment");
        assert_eq!(env.metadata.labels["team"], "payments");
        assert_eq!(env.spec.name, "project1");
        assert!(env.spec.is_prod);
        assert_eq!(env.spec.resources.resource_requests.ephemeral_storage, "1Gi");
        assert_eq!(env.spec.resources.resource_limits.cpu, "2000m");
        assert_eq!(env.spec.storage, "10Gi");
        assert_eq!(env.spec.users[1].user_full_name, "User Two");
        assert_eq!(env.status, EnvironmentStatus::default());
    }

    #[test]
    fn unknown_role_round_trips() {
        let env: Environment = serde_yaml::from_str(MANIFEST).unwrap();
        assert_eq!(env.spec.users[0].role(), Some(Role::Admin));
        assert_eq!(env.spec.users[1].role(), None);

        let json = serde_json::to_string(&env).unwrap();
        let back: Environment = serde_json::from_str(&json).unwrap();
        assert_eq!(back.spec.users[1].role, "guest");
    }

    #[test]
    fn camel_case_is_prod_alias() {
        let json = r#"{"name":"p","isProd":true,"storage":"1Gi"}"#;
        let spec: EnvironmentSpec = serde_json::from_str(json).unwrap();
        assert!(spec.is_prod);
    }

    #[test]
    fn controller_reference_points_at_environment() {
        let mut env = Environment::new("environment", EnvironmentSpec::default());
        env.metadata.uid = "uid-1".to_string();
        let owner = env.controller_reference();
        assert_eq!(owner.kind, "Environment");
        assert_eq!(owner.name, "environment");
        assert_eq!(owner.uid, "uid-1");
        assert!(owner.controller);
    }

    #[test]
    fn phase_serializes_lowercase() {
        let status = EnvironmentStatus {
            environment_status: Some(EnvironmentPhase::Failed),
            message: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["environmentStatus"], "failed");
    }
}
