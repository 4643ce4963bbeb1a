use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog;
use crate::models::catalog::*;
use crate::AppState;

use super::{created, validation_error, ApiError};

// --- Create DC form lookups ---

pub async fn list_locations(State(state): State<Arc<AppState>>) -> Result<Json<Vec<NamedOption>>, ApiError> {
    Ok(Json(catalog::list_locations(&state.client).await?))
}

pub async fn list_providers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<NamedOption>>, ApiError> {
    Ok(Json(catalog::list_providers(&state.client).await?))
}

pub async fn list_designs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<NamedOption>>, ApiError> {
    Ok(Json(catalog::list_designs(&state.client).await?))
}

pub async fn list_prefixes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<NamedOption>>, ApiError> {
    Ok(Json(catalog::list_active_prefixes(&state.client).await?))
}

/// Create a data center on its own branch and open a proposed change for it
pub async fn create_datacenter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDataCenterRequest>,
) -> Result<(StatusCode, Json<CreateDataCenterResponse>), ApiError> {
    validation_error(req.validate())?;

    let branch = req.branch_name();
    if catalog::branch_exists(&state.client, &branch).await? {
        return Err(ApiError::conflict(format!("Branch {} already exists", branch)));
    }

    let resp = catalog::create_datacenter(
        &state.client,
        &state.client.with_branch(&branch),
        &state.config.infrahub_ui_url,
        Duration::from_secs(state.config.generator_wait_time),
        &req,
    )
    .await?;
    Ok(created(resp))
}
