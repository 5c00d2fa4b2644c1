//! State store key layout.
//!
//! Objects live under etcd-style keys:
//! `/registry/<plural>/<name>` for cluster-scoped kinds and
//! `/registry/<plural>/<namespace>/<name>` for namespaced kinds.

/// Root of every object key.
pub const REGISTRY_ROOT: &str = "/registry";

/// Prefix for Environment objects (cluster-scoped).
pub const ENVIRONMENTS_PREFIX: &str = "/registry/environments/";

/// Prefix for Namespace objects (cluster-scoped).
pub const NAMESPACES_PREFIX: &str = "/registry/namespaces/";

/// Prefix for ResourceQuota objects.
pub const RESOURCE_QUOTAS_PREFIX: &str = "/registry/resourcequotas/";

/// Prefix for LimitRange objects.
pub const LIMIT_RANGES_PREFIX: &str = "/registry/limitranges/";

/// Prefix for RoleBinding objects.
pub const ROLE_BINDINGS_PREFIX: &str = "/registry/rolebindings/";

/// Ownership ledger entries, one per Environment name.
pub const OWNERSHIP_PREFIX: &str = "/registry/ownership/environments/";

/// Store-wide revision counter used to mint resource versions.
pub const REVISION_KEY: &str = "/registry/meta/revision";

/// Number of recent watch events kept in memory for replay.
pub const EVENT_LOG_CAPACITY: usize = 1024;

/// Capacity of the live watch broadcast channel.
pub const WATCH_CHANNEL_CAPACITY: usize = 1024;
