//! Read-only views of the objects the controller derives.

use axum::{
    Json,
    extract::{Path, State},
};
use pkg_state::error::StoreError;
use pkg_types::meta::{ObjectKey, Resource};
use pkg_types::namespace::Namespace;

use crate::AppState;
use crate::error::ApiError;

pub async fn list_namespaces(
    State(state): State<AppState>,
) -> Result<Json<Vec<Namespace>>, ApiError> {
    Ok(Json(state.store.list(None).await?))
}

pub async fn get_namespace(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Namespace>, ApiError> {
    let key = ObjectKey::cluster(name);
    match state.store.get::<Namespace>(&key).await? {
        Some(ns) => Ok(Json(ns)),
        None => Err(StoreError::NotFound {
            kind: Namespace::KIND,
            key,
        }
        .into()),
    }
}

/// Objects of kind `R` in one namespace. An unknown namespace lists empty.
pub async fn list_in_namespace<R: Resource>(
    State(state): State<AppState>,
    Path(ns): Path<String>,
) -> Result<Json<Vec<R>>, ApiError> {
    Ok(Json(state.store.list::<R>(Some(&ns)).await?))
}
