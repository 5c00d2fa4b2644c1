//! Names and fixed values of the resources derived from an Environment.

/// API group/version of the Environment kind.
pub const ENVIRONMENT_API_VERSION: &str = "onboarding.beopenit.com/v1alpha1";

/// Kind name of the Environment resource.
pub const ENVIRONMENT_KIND: &str = "Environment";

/// Name of the ResourceQuota created in every environment namespace.
pub const RESOURCE_QUOTA_NAME: &str = "cno-resource-quota";

/// Name of the LimitRange created in every environment namespace.
pub const LIMIT_RANGE_NAME: &str = "cno-limit-range";

/// Name of the RoleBinding granting the admin cluster role.
pub const ADMIN_ROLE_BINDING_NAME: &str = "cno-admin-role-binding";

/// Name of the RoleBinding granting the viewer cluster role.
pub const VIEWER_ROLE_BINDING_NAME: &str = "cno-viewer-role-binding";

/// Cluster role referenced by the admin binding.
pub const ADMIN_CLUSTER_ROLE: &str = "cno-admin-cluster-role";

/// Cluster role referenced by the viewer binding.
pub const VIEWER_CLUSTER_ROLE: &str = "cno-viewer-cluster-role";

pub const CLUSTER_ROLE_KIND: &str = "ClusterRole";
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
pub const USER_SUBJECT_KIND: &str = "User";

// ─── LimitRange ───────────────────────────────────────────────────────────
// These do not depend on the Environment spec.

/// Scope of the single LimitRange item.
pub const LIMIT_TYPE_CONTAINER: &str = "Container";

pub const DEFAULT_LIMIT_CPU: &str = "500m";
pub const DEFAULT_LIMIT_MEMORY: &str = "512Mi";
pub const DEFAULT_REQUEST_CPU: &str = "100m";
pub const DEFAULT_REQUEST_MEMORY: &str = "256Mi";

// ─── ResourceQuota hard keys ──────────────────────────────────────────────

pub const QUOTA_REQUESTS_CPU: &str = "requests.cpu";
pub const QUOTA_REQUESTS_MEMORY: &str = "requests.memory";
pub const QUOTA_REQUESTS_EPHEMERAL_STORAGE: &str = "requests.ephemeral-storage";
pub const QUOTA_LIMITS_CPU: &str = "limits.cpu";
pub const QUOTA_LIMITS_MEMORY: &str = "limits.memory";
pub const QUOTA_LIMITS_EPHEMERAL_STORAGE: &str = "limits.ephemeral-storage";
pub const QUOTA_REQUESTS_STORAGE: &str = "requests.storage";
