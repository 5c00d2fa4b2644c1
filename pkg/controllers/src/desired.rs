//! Desired state of the objects derived from an Environment.
//!
//! Pure builders: same Environment in, structurally identical objects out.
//! Quantities are copied verbatim and only checked when the store writes them.

use pkg_constants::environment::{
    ADMIN_CLUSTER_ROLE, ADMIN_ROLE_BINDING_NAME, CLUSTER_ROLE_KIND, DEFAULT_LIMIT_CPU,
    DEFAULT_LIMIT_MEMORY, DEFAULT_REQUEST_CPU, DEFAULT_REQUEST_MEMORY, LIMIT_RANGE_NAME,
    LIMIT_TYPE_CONTAINER, QUOTA_LIMITS_CPU, QUOTA_LIMITS_EPHEMERAL_STORAGE, QUOTA_LIMITS_MEMORY,
    QUOTA_REQUESTS_CPU, QUOTA_REQUESTS_EPHEMERAL_STORAGE, QUOTA_REQUESTS_MEMORY,
    QUOTA_REQUESTS_STORAGE, RBAC_API_GROUP, RESOURCE_QUOTA_NAME, VIEWER_CLUSTER_ROLE,
    VIEWER_ROLE_BINDING_NAME,
};
use pkg_types::environment::Environment;
use pkg_types::limit_range::{LimitRange, LimitRangeItem, LimitRangeSpec};
use pkg_types::meta::ObjectMeta;
use pkg_types::namespace::Namespace;
use pkg_types::quota::{ResourceQuota, ResourceQuotaSpec};
use pkg_types::rbac::{RoleBinding, RoleRef, Subject};
use std::collections::BTreeMap;

use crate::partition::AccessPartition;

/// Metadata for an object living in the environment's namespace.
fn child_meta(env: &Environment, name: &str) -> ObjectMeta {
    ObjectMeta::namespaced(name, env.spec.name.clone()).with_labels(env.metadata.labels.clone())
}

pub fn namespace_for(env: &Environment) -> Namespace {
    Namespace {
        metadata: ObjectMeta::cluster(env.spec.name.clone())
            .with_labels(env.metadata.labels.clone()),
    }
}

pub fn resource_quota_for(env: &Environment) -> ResourceQuota {
    let requests = &env.spec.resources.resource_requests;
    let limits = &env.spec.resources.resource_limits;
    let hard = [
        (QUOTA_REQUESTS_CPU, &requests.cpu),
        (QUOTA_REQUESTS_MEMORY, &requests.memory),
        (QUOTA_REQUESTS_EPHEMERAL_STORAGE, &requests.ephemeral_storage),
        (QUOTA_LIMITS_CPU, &limits.cpu),
        (QUOTA_LIMITS_MEMORY, &limits.memory),
        (QUOTA_LIMITS_EPHEMERAL_STORAGE, &limits.ephemeral_storage),
        (QUOTA_REQUESTS_STORAGE, &env.spec.storage),
    ]
    .into_iter()
    .map(|(resource, quantity)| (resource.to_string(), quantity.clone()))
    .collect();

    ResourceQuota {
        metadata: child_meta(env, RESOURCE_QUOTA_NAME),
        spec: ResourceQuotaSpec { hard },
    }
}

/// Container defaults; only the namespace depends on the Environment.
pub fn limit_range_for(env: &Environment) -> LimitRange {
    let resources = |cpu: &str, memory: &str| {
        BTreeMap::from([
            ("cpu".to_string(), cpu.to_string()),
            ("memory".to_string(), memory.to_string()),
        ])
    };
    LimitRange {
        metadata: child_meta(env, LIMIT_RANGE_NAME),
        spec: LimitRangeSpec {
            limits: vec![LimitRangeItem {
                limit_type: LIMIT_TYPE_CONTAINER.to_string(),
                default: resources(DEFAULT_LIMIT_CPU, DEFAULT_LIMIT_MEMORY),
                default_request: resources(DEFAULT_REQUEST_CPU, DEFAULT_REQUEST_MEMORY),
            }],
        },
    }
}

/// The admin and viewer bindings, in that order.
pub fn role_bindings_for(env: &Environment, partition: AccessPartition) -> [RoleBinding; 2] {
    [
        role_binding(env, ADMIN_ROLE_BINDING_NAME, ADMIN_CLUSTER_ROLE, partition.admins),
        role_binding(env, VIEWER_ROLE_BINDING_NAME, VIEWER_CLUSTER_ROLE, partition.viewers),
    ]
}

fn role_binding(
    env: &Environment,
    name: &str,
    cluster_role: &str,
    subjects: Vec<Subject>,
) -> RoleBinding {
    RoleBinding {
        metadata: child_meta(env, name),
        subjects,
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: CLUSTER_ROLE_KIND.to_string(),
            name: cluster_role.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition_users;
    use pkg_types::environment::{EnvironmentSpec, ResourceDescription, Resources, User};
    use pkg_types::meta::{ObjectKey, Resource};

    fn environment() -> Environment {
        let mut env = Environment::new(
            "environment",
            EnvironmentSpec {
                name: "project1".to_string(),
                is_prod: false,
                resources: Resources {
                    resource_requests: ResourceDescription {
                        cpu: "1000m".to_string(),
                        memory: "100Mi".to_string(),
                        ephemeral_storage: "1Gi".to_string(),
                    },
                    resource_limits: ResourceDescription {
                        cpu: "2000m".to_string(),
                        memory: "500Mi".to_string(),
                        ephemeral_storage: "2Gi".to_string(),
                    },
                },
                storage: "10Gi".to_string(),
                users: vec![User::new("user1", "admin"), User::new("user2", "viewer")],
            },
        );
        env.metadata.labels = BTreeMap::from([
            ("uid".to_string(), "test-uid".to_string()),
            ("name".to_string(), "environment".to_string()),
        ]);
        env
    }

    #[test]
    fn namespace_takes_spec_name_and_labels() {
        let env = environment();
        let ns = namespace_for(&env);
        assert_eq!(ns.metadata.name, "project1");
        assert_eq!(ns.metadata.namespace, None);
        assert_eq!(ns.metadata.labels, env.metadata.labels);
    }

    #[test]
    fn quota_copies_quantities_verbatim() {
        let rq = resource_quota_for(&environment());
        assert_eq!(rq.key(), ObjectKey::namespaced("project1", "cno-resource-quota"));
        let expected = BTreeMap::from([
            ("requests.cpu".to_string(), "1000m".to_string()),
            ("requests.memory".to_string(), "100Mi".to_string()),
            ("requests.ephemeral-storage".to_string(), "1Gi".to_string()),
            ("limits.cpu".to_string(), "2000m".to_string()),
            ("limits.memory".to_string(), "500Mi".to_string()),
            ("limits.ephemeral-storage".to_string(), "2Gi".to_string()),
            ("requests.storage".to_string(), "10Gi".to_string()),
        ]);
        assert_eq!(rq.spec.hard, expected);
    }

    #[test]
    fn malformed_quantity_is_not_checked_here() {
        let mut env = environment();
        env.spec.storage = "plenty".to_string();
        assert_eq!(resource_quota_for(&env).spec.hard["requests.storage"], "plenty");
    }

    #[test]
    fn limit_range_is_fixed() {
        let mut env = environment();
        let lr = limit_range_for(&env);
        assert_eq!(lr.key(), ObjectKey::namespaced("project1", "cno-limit-range"));
        assert_eq!(lr.spec.limits.len(), 1);
        let item = &lr.spec.limits[0];
        assert_eq!(item.limit_type, "Container");
        assert_eq!(item.default["cpu"], "500m");
        assert_eq!(item.default["memory"], "512Mi");
        assert_eq!(item.default_request["cpu"], "100m");
        assert_eq!(item.default_request["memory"], "256Mi");

        env.spec.storage = "1Ti".to_string();
        env.spec.is_prod = true;
        assert_eq!(limit_range_for(&env).spec, lr.spec);
    }

    #[test]
    fn role_bindings_reference_cluster_roles() {
        let env = environment();
        let [admin, viewer] =
            role_bindings_for(&env, partition_users(&env.spec.users, env.spec.is_prod));

        assert_eq!(admin.key(), ObjectKey::namespaced("project1", "cno-admin-role-binding"));
        assert_eq!(admin.subjects, vec![Subject::user("user1")]);
        assert_eq!(admin.role_ref.name, "cno-admin-cluster-role");
        assert_eq!(admin.role_ref.kind, "ClusterRole");
        assert_eq!(admin.role_ref.api_group, "rbac.authorization.k8s.io");

        assert_eq!(viewer.key(), ObjectKey::namespaced("project1", "cno-viewer-role-binding"));
        assert_eq!(viewer.subjects, vec![Subject::user("user2")]);
        assert_eq!(viewer.role_ref.name, "cno-viewer-cluster-role");
    }

    #[test]
    fn empty_users_still_yield_both_bindings() {
        let mut env = environment();
        env.spec.users.clear();
        let bindings = role_bindings_for(&env, partition_users(&env.spec.users, true));
        assert!(bindings.iter().all(|rb| rb.subjects.is_empty()));
    }

    #[test]
    fn naming_depends_only_on_spec_name() {
        let mut env = environment();
        env.metadata.name = "other".to_string();
        env.spec.is_prod = true;
        env.spec.users = vec![User::new("x", "dev")];
        env.spec.resources = Resources::default();

        assert_eq!(
            resource_quota_for(&env).key(),
            ObjectKey::namespaced("project1", "cno-resource-quota")
        );
        let [admin, viewer] = role_bindings_for(&env, AccessPartition::default());
        assert_eq!(admin.key(), ObjectKey::namespaced("project1", "cno-admin-role-binding"));
        assert_eq!(viewer.key(), ObjectKey::namespaced("project1", "cno-viewer-role-binding"));
    }

    #[test]
    fn builders_are_deterministic() {
        let env = environment();
        assert_eq!(namespace_for(&env), namespace_for(&env));
        assert_eq!(resource_quota_for(&env), resource_quota_for(&env));
        assert_eq!(limit_range_for(&env), limit_range_for(&env));
    }
}
