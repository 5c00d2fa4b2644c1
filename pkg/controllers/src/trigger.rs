use pkg_constants::environment::{ENVIRONMENT_API_VERSION, ENVIRONMENT_KIND};
use pkg_constants::state::{
    ENVIRONMENTS_PREFIX, LIMIT_RANGES_PREFIX, NAMESPACES_PREFIX, RESOURCE_QUOTAS_PREFIX,
    ROLE_BINDINGS_PREFIX,
};
use pkg_state::watch::WatchEvent;
use pkg_types::meta::ObjectMeta;
use serde::Deserialize;

const CHILD_PREFIXES: [&str; 4] = [
    NAMESPACES_PREFIX,
    RESOURCE_QUOTAS_PREFIX,
    LIMIT_RANGES_PREFIX,
    ROLE_BINDINGS_PREFIX,
];

#[derive(Deserialize)]
struct ObjectStub {
    metadata: ObjectMeta,
}

/// Map a store change to the Environment that must be reconciled, if any.
///
/// Changes to an Environment enqueue it by name. Changes to a derived kind
/// enqueue the Environment named by the object's controller reference, so
/// drift or deletion of a child is repaired. Anything else is ignored.
pub fn request_for(event: &WatchEvent) -> Option<String> {
    if let Some(name) = event.key.strip_prefix(ENVIRONMENTS_PREFIX) {
        return (!name.is_empty() && !name.contains('/')).then(|| name.to_string());
    }

    if !CHILD_PREFIXES.iter().any(|p| event.key.starts_with(p)) {
        return None;
    }
    let stub: ObjectStub = serde_json::from_value(event.value.clone()?).ok()?;
    let owner = stub.metadata.controller_owner()?;
    (owner.kind == ENVIRONMENT_KIND && owner.api_version == ENVIRONMENT_API_VERSION)
        .then(|| owner.name.clone())
}
