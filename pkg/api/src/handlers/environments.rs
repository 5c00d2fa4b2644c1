use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use pkg_constants::environment::{ENVIRONMENT_API_VERSION, ENVIRONMENT_KIND};
use pkg_state::error::StoreError;
use pkg_types::environment::{Environment, EnvironmentStatus};
use pkg_types::meta::ObjectKey;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

fn check_type(env: &Environment) -> Result<(), ApiError> {
    if env.api_version != ENVIRONMENT_API_VERSION || env.kind != ENVIRONMENT_KIND {
        return Err(ApiError::bad_request(format!(
            "expected {} {}, got {} {}",
            ENVIRONMENT_API_VERSION, ENVIRONMENT_KIND, env.api_version, env.kind
        )));
    }
    Ok(())
}

fn not_found(name: &str) -> ApiError {
    StoreError::NotFound {
        kind: ENVIRONMENT_KIND,
        key: ObjectKey::cluster(name),
    }
    .into()
}

pub async fn list_environments(
    State(state): State<AppState>,
) -> Result<Json<Vec<Environment>>, ApiError> {
    Ok(Json(state.store.list(None).await?))
}

/// POST: status and store-assigned metadata in the body are ignored.
pub async fn create_environment(
    State(state): State<AppState>,
    Json(mut env): Json<Environment>,
) -> Result<(StatusCode, Json<Environment>), ApiError> {
    check_type(&env)?;
    env.status = EnvironmentStatus::default();
    env.metadata.resource_version = 0;

    let created = state.store.create(&env).await?;
    info!("Created Environment {}", created.metadata.name);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_environment(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Environment>, ApiError> {
    state
        .store
        .get(&ObjectKey::cluster(name.as_str()))
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&name))
}

/// PUT: replaces `spec` and `metadata.labels`. A zero `resourceVersion` means "whatever is
/// stored"; any other value must match. Status is kept as stored.
pub async fn replace_environment(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(mut env): Json<Environment>,
) -> Result<Json<Environment>, ApiError> {
    check_type(&env)?;
    if env.metadata.name.is_empty() {
        env.metadata.name = name.clone();
    } else if env.metadata.name != name {
        return Err(ApiError::bad_request(format!(
            "metadata.name '{}' does not match path '{}'",
            env.metadata.name, name
        )));
    }

    let current: Environment = state
        .store
        .get(&ObjectKey::cluster(name.as_str()))
        .await?
        .ok_or_else(|| not_found(&name))?;
    if env.metadata.resource_version == 0 {
        env.metadata.resource_version = current.metadata.resource_version;
    }
    env.status = current.status;

    let updated = state.store.update(&env).await?;
    info!(
        "Updated Environment {} (resourceVersion {})",
        name, updated.metadata.resource_version
    );
    Ok(Json(updated))
}

pub async fn delete_environment(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .delete::<Environment>(&ObjectKey::cluster(name.as_str()))
        .await?;
    info!("Deleted Environment {}", name);
    Ok(StatusCode::NO_CONTENT)
}
