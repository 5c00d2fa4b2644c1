use pkg_controllers::child::StepOutcome;
use pkg_controllers::{Action, EnvironmentReconciler};
use pkg_metrics::{GARBAGE_COLLECTED_TOTAL, MetricsRegistry, RECONCILE_ERRORS_TOTAL};
use pkg_state::client::StateStore;
use pkg_state::resource::ResourceStore;
use pkg_state::watch::EventLog;
use pkg_types::environment::{
    Environment, EnvironmentPhase, EnvironmentSpec, ResourceDescription, Resources, User,
};
use pkg_types::limit_range::LimitRange;
use pkg_types::meta::ObjectKey;
use pkg_types::namespace::Namespace;
use pkg_types::quota::ResourceQuota;
use pkg_types::rbac::RoleBinding;
use std::sync::Arc;

struct Harness {
    store: ResourceStore,
    metrics: Arc<MetricsRegistry>,
    reconciler: EnvironmentReconciler,
}

async fn harness() -> Harness {
    let store = ResourceStore::new(StateStore::in_memory(EventLog::new(256)))
        .await
        .unwrap();
    let metrics = Arc::new(MetricsRegistry::with_operator_metrics());
    let reconciler = EnvironmentReconciler::new(store.clone(), metrics.clone());
    Harness {
        store,
        metrics,
        reconciler,
    }
}

fn project1() -> Environment {
    Environment::new(
        "project1-env",
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
    )
}

fn in_project1(name: &str) -> ObjectKey {
    ObjectKey::namespaced("project1", name)
}

fn subject_names(binding: &RoleBinding) -> Vec<&str> {
    binding.subjects.iter().map(|s| s.name.as_str()).collect()
}

async fn environment(store: &ResourceStore, name: &str) -> Environment {
    store
        .get(&ObjectKey::cluster(name))
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn converges_in_two_passes() {
    let h = harness().await;
    h.store.create(&project1()).await.unwrap();

    // Pass 1: only the namespace, then ask to be called again.
    let first = h.reconciler.run("project1-env").await.unwrap();
    assert_eq!(first.action, Action::Requeue);
    assert_eq!(first.steps.len(), 1);
    assert_eq!(
        first.outcome("Namespace", &ObjectKey::cluster("project1")),
        Some(StepOutcome::Created)
    );
    let quota: Option<ResourceQuota> = h
        .store
        .get(&in_project1("cno-resource-quota"))
        .await
        .unwrap();
    assert!(quota.is_none());

    // Pass 2: everything else.
    let second = h.reconciler.run("project1-env").await.unwrap();
    assert_eq!(second.action, Action::AwaitChange);
    assert_eq!(
        second.outcome("Namespace", &ObjectKey::cluster("project1")),
        Some(StepOutcome::Unchanged)
    );
    for (kind, name) in [
        ("ResourceQuota", "cno-resource-quota"),
        ("LimitRange", "cno-limit-range"),
        ("RoleBinding", "cno-admin-role-binding"),
        ("RoleBinding", "cno-viewer-role-binding"),
    ] {
        assert_eq!(
            second.outcome(kind, &in_project1(name)),
            Some(StepOutcome::Created),
            "{} {}",
            kind,
            name
        );
    }

    let quota: ResourceQuota = h
        .store
        .get(&in_project1("cno-resource-quota"))
        .await
        .unwrap()
        .unwrap();
    let hard: Vec<(&str, &str)> = quota
        .spec
        .hard
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        hard,
        vec![
            ("limits.cpu", "2000m"),
            ("limits.ephemeral-storage", "2Gi"),
            ("limits.memory", "500Mi"),
            ("requests.cpu", "1000m"),
            ("requests.ephemeral-storage", "1Gi"),
            ("requests.memory", "100Mi"),
            ("requests.storage", "10Gi"),
        ]
    );

    let env = environment(&h.store, "project1-env").await;
    let owner = quota.metadata.controller_owner().unwrap();
    assert_eq!(owner.kind, "Environment");
    assert_eq!(owner.name, "project1-env");
    assert_eq!(owner.uid, env.metadata.uid);

    let admin: RoleBinding = h
        .store
        .get(&in_project1("cno-admin-role-binding"))
        .await
        .unwrap()
        .unwrap();
    let viewer: RoleBinding = h
        .store
        .get(&in_project1("cno-viewer-role-binding"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subject_names(&admin), vec!["user1"]);
    assert_eq!(admin.role_ref.name, "cno-admin-cluster-role");
    assert_eq!(subject_names(&viewer), vec!["user2"]);
    assert_eq!(viewer.role_ref.name, "cno-viewer-cluster-role");

    assert_eq!(env.status.environment_status, Some(EnvironmentPhase::Success));
}

#[tokio::test]
async fn converged_pass_changes_nothing() {
    let h = harness().await;
    h.store.create(&project1()).await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();

    let quota_before: ResourceQuota = h
        .store
        .get(&in_project1("cno-resource-quota"))
        .await
        .unwrap()
        .unwrap();
    let seq = h.store.state().event_log.current_seq().await;

    let third = h.reconciler.run("project1-env").await.unwrap();
    assert_eq!(third.action, Action::AwaitChange);
    assert_eq!(
        third.outcome("LimitRange", &in_project1("cno-limit-range")),
        Some(StepOutcome::Unchanged)
    );
    // Overwritten kinds are re-issued, but identical content is not rewritten.
    assert_eq!(
        third.outcome("ResourceQuota", &in_project1("cno-resource-quota")),
        Some(StepOutcome::Updated)
    );
    let quota_after: ResourceQuota = h
        .store
        .get(&in_project1("cno-resource-quota"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(quota_after, quota_before);
    assert_eq!(h.store.state().event_log.current_seq().await, seq);
}

#[tokio::test]
async fn drifted_quota_is_overwritten() {
    let h = harness().await;
    h.store.create(&project1()).await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();

    let mut quota: ResourceQuota = h
        .store
        .get(&in_project1("cno-resource-quota"))
        .await
        .unwrap()
        .unwrap();
    quota
        .spec
        .hard
        .insert("requests.cpu".to_string(), "64".to_string());
    h.store.update(&quota).await.unwrap();

    h.reconciler.run("project1-env").await.unwrap();
    let quota: ResourceQuota = h
        .store
        .get(&in_project1("cno-resource-quota"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(quota.spec.hard["requests.cpu"], "1000m");
}

#[tokio::test]
async fn spec_changes_reach_role_bindings() {
    let h = harness().await;
    h.store.create(&project1()).await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();

    let mut env = environment(&h.store, "project1-env").await;
    env.spec.users.push(User::new("user3", "dev"));
    h.store.update(&env).await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();

    let admin: RoleBinding = h
        .store
        .get(&in_project1("cno-admin-role-binding"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subject_names(&admin), vec!["user1", "user3"]);

    // Flipping to production drops dev users from the admin binding.
    let mut env = environment(&h.store, "project1-env").await;
    env.spec.is_prod = true;
    h.store.update(&env).await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();

    let admin: RoleBinding = h
        .store
        .get(&in_project1("cno-admin-role-binding"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subject_names(&admin), vec!["user1"]);
}

#[tokio::test]
async fn malformed_quantity_aborts_before_later_steps() {
    let h = harness().await;
    let mut env = project1();
    env.spec.resources.resource_requests.cpu = "lots".to_string();
    h.store.create(&env).await.unwrap();

    assert_eq!(
        h.reconciler.run("project1-env").await.unwrap().action,
        Action::Requeue
    );
    let err = h.reconciler.run("project1-env").await.unwrap_err();
    assert!(format!("{:#}", err).contains("cno-resource-quota"));

    let limit_range: Option<LimitRange> = h
        .store
        .get(&in_project1("cno-limit-range"))
        .await
        .unwrap();
    assert!(limit_range.is_none());
    let admin: Option<RoleBinding> = h
        .store
        .get(&in_project1("cno-admin-role-binding"))
        .await
        .unwrap();
    assert!(admin.is_none());

    let env = environment(&h.store, "project1-env").await;
    assert_eq!(env.status.environment_status, Some(EnvironmentPhase::Failed));
    assert!(env.status.message.unwrap().contains("requests.cpu"));
    assert_eq!(h.metrics.counter_value(RECONCILE_ERRORS_TOTAL), Some(1));
}

#[tokio::test]
async fn absent_environment_is_not_an_error() {
    let h = harness().await;
    let report = h.reconciler.run("ghost").await.unwrap();
    assert_eq!(report.action, Action::AwaitChange);
    assert!(report.steps.is_empty());
    assert_eq!(report.collected, 0);
}

#[tokio::test]
async fn deleting_environment_collects_children() {
    let h = harness().await;
    h.store.create(&project1()).await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();

    h.store
        .delete::<Environment>(&ObjectKey::cluster("project1-env"))
        .await
        .unwrap();
    let report = h.reconciler.run("project1-env").await.unwrap();
    assert_eq!(report.action, Action::AwaitChange);
    assert_eq!(report.collected, 5);
    assert_eq!(h.metrics.counter_value(GARBAGE_COLLECTED_TOTAL), Some(5));

    let ns: Option<Namespace> = h.store.get(&ObjectKey::cluster("project1")).await.unwrap();
    assert!(ns.is_none());
    let quotas: Vec<ResourceQuota> = h.store.list(None).await.unwrap();
    assert!(quotas.is_empty());

    // A second pass has nothing left to do.
    let report = h.reconciler.run("project1-env").await.unwrap();
    assert_eq!(report.collected, 0);
}

#[tokio::test]
async fn preexisting_namespace_is_left_alone() {
    let h = harness().await;
    h.store
        .create(&Namespace {
            metadata: pkg_types::meta::ObjectMeta::cluster("project1"),
        })
        .await
        .unwrap();
    h.store.create(&project1()).await.unwrap();

    // The namespace already exists, so one pass converges.
    let report = h.reconciler.run("project1-env").await.unwrap();
    assert_eq!(report.action, Action::AwaitChange);
    assert_eq!(report.steps.len(), 5);

    h.store
        .delete::<Environment>(&ObjectKey::cluster("project1-env"))
        .await
        .unwrap();
    let report = h.reconciler.run("project1-env").await.unwrap();
    assert_eq!(report.collected, 4);
    let ns: Option<Namespace> = h.store.get(&ObjectKey::cluster("project1")).await.unwrap();
    assert!(ns.is_some());
}

#[tokio::test]
async fn second_environment_cannot_take_over_a_namespace() {
    let h = harness().await;
    h.store.create(&project1()).await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();

    let mut rival = project1();
    rival.metadata.name = "rival".to_string();
    h.store.create(&rival).await.unwrap();

    let err = h.reconciler.run("rival").await.unwrap_err();
    assert!(format!("{:#}", err).contains("already controlled by Environment 'project1-env'"));
    let rival = environment(&h.store, "rival").await;
    assert_eq!(rival.status.environment_status, Some(EnvironmentPhase::Failed));

    // Removing the rival leaves the first Environment's objects alone.
    h.store
        .delete::<Environment>(&ObjectKey::cluster("rival"))
        .await
        .unwrap();
    assert_eq!(h.reconciler.run("rival").await.unwrap().collected, 0);
    let ns: Option<Namespace> = h.store.get(&ObjectKey::cluster("project1")).await.unwrap();
    assert!(ns.is_some());
}

#[tokio::test]
async fn recreated_environment_adopts_its_objects() {
    let h = harness().await;
    h.store.create(&project1()).await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();
    h.reconciler.run("project1-env").await.unwrap();

    // Deleted and recreated before garbage collection ran.
    h.store
        .delete::<Environment>(&ObjectKey::cluster("project1-env"))
        .await
        .unwrap();
    let recreated = h.store.create(&project1()).await.unwrap();

    let limit_range_before: LimitRange = h
        .store
        .get(&in_project1("cno-limit-range"))
        .await
        .unwrap()
        .unwrap();

    let report = h.reconciler.run("project1-env").await.unwrap();
    assert_eq!(report.action, Action::AwaitChange);
    assert_eq!(
        report.outcome("Namespace", &ObjectKey::cluster("project1")),
        Some(StepOutcome::Adopted)
    );
    assert_eq!(
        report.outcome("LimitRange", &in_project1("cno-limit-range")),
        Some(StepOutcome::Adopted)
    );

    let new_uid = recreated.metadata.uid.as_str();
    let ns: Namespace = h
        .store
        .get(&ObjectKey::cluster("project1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ns.metadata.controller_owner().unwrap().uid, new_uid);
    assert_eq!(ns.metadata.owner_references.len(), 1);

    let limit_range: LimitRange = h
        .store
        .get(&in_project1("cno-limit-range"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(limit_range.metadata.controller_owner().unwrap().uid, new_uid);
    // Only the owner moved; the create-only content is kept as stored.
    assert_eq!(limit_range.spec, limit_range_before.spec);
    assert_eq!(limit_range.metadata.uid, limit_range_before.metadata.uid);

    let quota: ResourceQuota = h
        .store
        .get(&in_project1("cno-resource-quota"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(quota.metadata.controller_owner().unwrap().uid, new_uid);

    // Once adopted, a further pass leaves the create-only kinds alone.
    let report = h.reconciler.run("project1-env").await.unwrap();
    assert_eq!(
        report.outcome("Namespace", &ObjectKey::cluster("project1")),
        Some(StepOutcome::Unchanged)
    );
    assert_eq!(
        report.outcome("LimitRange", &in_project1("cno-limit-range")),
        Some(StepOutcome::Unchanged)
    );
}
